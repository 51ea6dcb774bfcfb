use std::sync::Arc;

use tracing::warn;
use vilaw_core::VilawResult;
use vilaw_dispatch::Dispatcher;

use crate::prompt::build_safety_prompt;

/// Outcome of the content-safety check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    Safe,
    /// The violated category codes (e.g. `S2`, `S14`) when the classifier
    /// reported them.
    Unsafe(Vec<String>),
}

/// LLM-based safety classifier.
///
/// Routes its classification call through the shared [`Dispatcher`], so
/// safety checks are quota-accounted like every other backend call.
pub struct SafetyChecker {
    dispatcher: Arc<Dispatcher>,
}

impl SafetyChecker {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Classify `question`, failing closed on output the parser does not
    /// recognise.
    pub async fn check(&self, question: &str) -> VilawResult<SafetyVerdict> {
        let prompt = build_safety_prompt(question);
        let output = self.dispatcher.query(&prompt).await?;
        let verdict = parse_verdict(&output);
        if let SafetyVerdict::Unsafe(categories) = &verdict {
            warn!(?categories, "question classified unsafe");
        }
        Ok(verdict)
    }
}

/// Parse the classifier's two-line verdict format. Anything that is not a
/// recognisable `safe` first line is treated as unsafe.
pub fn parse_verdict(output: &str) -> SafetyVerdict {
    let mut lines = output.trim().lines();
    let first = lines.next().unwrap_or("").trim().to_lowercase();

    if first == "safe" {
        return SafetyVerdict::Safe;
    }

    let categories = if first.starts_with("unsafe") {
        lines
            .next()
            .unwrap_or("")
            .split(',')
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect()
    } else {
        Vec::new()
    };
    SafetyVerdict::Unsafe(categories)
}
