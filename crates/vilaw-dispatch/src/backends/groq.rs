use async_trait::async_trait;
use vilaw_core::{VilawError, VilawResult};

use crate::config::BackendConfig;
use crate::invoker::{BackendInvoker, Completion};
use crate::pool::Credential;

/// OpenAI-compatible chat-completions invoker.
///
/// Works with Groq and any other provider implementing the OpenAI chat
/// completions API. The credential is supplied per call by the dispatcher,
/// not baked into the client, so one invoker serves the whole pool.
pub struct GroqInvoker {
    config: BackendConfig,
    http: reqwest::Client,
}

impl GroqInvoker {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn build_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model_id,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        })
    }
}

#[async_trait]
impl BackendInvoker for GroqInvoker {
    async fn invoke(&self, credential: &Credential, prompt: &str) -> VilawResult<Completion> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", credential.secret()))
            .header("Content-Type", "application/json")
            .json(&self.build_body(prompt))
            .send()
            .await
            .map_err(|e| VilawError::Backend(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let error_body = resp
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(VilawError::Backend(format!(
                "chat completions error {status}: {error_body}"
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| VilawError::Backend(e.to_string()))?;

        parse_completion(&body)
    }
}

/// Extract the text payload and reported usage from a chat-completions
/// response body.
pub fn parse_completion(body: &serde_json::Value) -> VilawResult<Completion> {
    let text = body["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| {
            VilawError::Backend(format!("malformed completion payload: {body}"))
        })?
        .to_string();

    // Usage metadata is best-effort: a response without it is still a
    // success with zero token increment.
    let total_tokens = body["usage"]["total_tokens"].as_u64().unwrap_or(0);

    Ok(Completion { text, total_tokens })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_completion_with_usage() {
        let body = serde_json::json!({
            "choices": [{
                "message": { "role": "assistant", "content": "Xin chào" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        });
        let completion = parse_completion(&body).unwrap();
        assert_eq!(completion.text, "Xin chào");
        assert_eq!(completion.total_tokens, 15);
    }

    #[test]
    fn missing_usage_is_success_with_zero_tokens() {
        let body = serde_json::json!({
            "choices": [{ "message": { "content": "ok" } }]
        });
        let completion = parse_completion(&body).unwrap();
        assert_eq!(completion.text, "ok");
        assert_eq!(completion.total_tokens, 0);
    }

    #[test]
    fn missing_content_is_a_backend_error() {
        let body = serde_json::json!({ "choices": [] });
        let err = parse_completion(&body).unwrap_err();
        assert!(matches!(err, VilawError::Backend(_)));
    }
}
