//! Moderation contract.
//!
//! The runtime checks prompts before streaming and responses after, but the
//! moderation service itself is an injected collaborator. Implementations
//! MUST degrade open: when the service is unreachable or rate-limited,
//! return [`SafetyResponse::clear`] (and log) rather than failing the
//! transition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Verdict for a single moderation category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryVerdict {
    pub score: String,
    pub flagged: bool,
}

impl CategoryVerdict {
    pub fn negligible() -> Self {
        Self {
            score: "negligible".to_string(),
            flagged: false,
        }
    }
}

/// Category -> verdict map returned by a moderation check.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SafetyResponse {
    #[serde(flatten)]
    pub categories: BTreeMap<String, CategoryVerdict>,
}

impl SafetyResponse {
    /// The all-clear response used when moderation cannot run.
    pub fn clear() -> Self {
        let mut categories = BTreeMap::new();
        for category in ["hate", "harassment", "sexual_content", "dangerous"] {
            categories.insert(category.to_string(), CategoryVerdict::negligible());
        }
        Self { categories }
    }

    /// True when any category is flagged.
    pub fn flagged(&self) -> bool {
        self.categories.values().any(|verdict| verdict.flagged)
    }
}

/// Moderation collaborator checked around every prompt operation.
#[async_trait]
pub trait SafetyCheck: Send + Sync {
    /// Score `text`. The `provider` hint names the moderation backend the
    /// caller expects (implementations may ignore it).
    async fn check(&self, text: &str, provider: &str) -> SafetyResponse;
}

/// Default moderation: everything passes.
pub struct NoopSafety;

#[async_trait]
impl SafetyCheck for NoopSafety {
    async fn check(&self, _text: &str, _provider: &str) -> SafetyResponse {
        SafetyResponse::clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_response_is_not_flagged() {
        assert!(!SafetyResponse::clear().flagged());
    }

    #[test]
    fn any_flagged_category_flags_the_response() {
        let mut response = SafetyResponse::clear();
        response.categories.insert(
            "dangerous".to_string(),
            CategoryVerdict {
                score: "high".to_string(),
                flagged: true,
            },
        );
        assert!(response.flagged());
    }

    #[tokio::test]
    async fn noop_safety_passes_everything() {
        let response = NoopSafety.check("anything at all", "openai").await;
        assert!(!response.flagged());
    }
}
