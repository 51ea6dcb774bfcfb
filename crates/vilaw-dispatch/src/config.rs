use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Inference provider the dispatcher fronts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceProvider {
    /// Groq cloud inference — OpenAI-compatible API, free tier with
    /// per-minute rate limits.
    Groq,
    OpenAi,
    OpenRouter,
}

/// Static configuration for one backend/model pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub provider: InferenceProvider,
    pub model_id: String,
    pub api_base_url: Option<String>,
    /// The generation path pins temperature 0 for reproducible answers.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.0
}

fn default_max_tokens() -> u32 {
    1024
}

impl BackendConfig {
    /// Convenience constructor with provider defaults.
    pub fn groq(model_id: impl Into<String>) -> Self {
        Self {
            provider: InferenceProvider::Groq,
            model_id: model_id.into(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }

    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                InferenceProvider::Groq => "https://api.groq.com/openai",
                InferenceProvider::OpenAi => "https://api.openai.com",
                InferenceProvider::OpenRouter => "https://openrouter.ai/api",
            }
        }
    }
}

/// Published per-credential limits for one backend model: how many requests
/// and tokens one account may consume inside one quota window.
///
/// Read-only, loaded once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSpec {
    pub requests_per_window: u32,
    pub tokens_per_window: u64,
    pub window: Duration,
}

impl RateLimitSpec {
    /// A per-minute spec, the granularity the backend accounts at.
    pub fn per_minute(requests_per_window: u32, tokens_per_window: u64) -> Self {
        Self {
            requests_per_window,
            tokens_per_window,
            window: Duration::from_secs(60),
        }
    }

    /// Built-in limits for the Groq free-tier models the assistant drives.
    ///
    /// Returns `None` for unknown models; absence of a spec for the
    /// configured model is a startup configuration error at the call site.
    pub fn builtin(model_id: &str) -> Option<Self> {
        match model_id {
            "llama3-70b-8192" => Some(Self::per_minute(30, 6_000)),
            "llama3-8b-8192" => Some(Self::per_minute(30, 30_000)),
            "mixtral-8x7b-32768" => Some(Self::per_minute(30, 5_000)),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn groq_base_url_default_and_override() {
        let config = BackendConfig::groq("llama3-70b-8192");
        assert_eq!(config.base_url(), "https://api.groq.com/openai");

        let mut config = config;
        config.api_base_url = Some("http://localhost:8080".to_string());
        assert_eq!(config.base_url(), "http://localhost:8080");
    }

    #[test]
    fn builtin_spec_known_and_unknown_models() {
        let spec = RateLimitSpec::builtin("llama3-70b-8192").unwrap();
        assert_eq!(spec.requests_per_window, 30);
        assert_eq!(spec.tokens_per_window, 6_000);
        assert_eq!(spec.window, Duration::from_secs(60));

        assert!(RateLimitSpec::builtin("gpt-oss-unknown").is_none());
    }
}
