//! Provider abstraction and registry.
//!
//! A provider turns a resolved prompt into an async token stream. Providers
//! are shared singletons selected by name (the `executor` field of a
//! [`ModelConfig`]); they must carry no per-call mutable state so one
//! instance can serve any number of orchestrators concurrently.

pub mod lorem;

pub use lorem::LoremProvider;

use crate::config::ModelConfig;
use crate::events::TokenStage;
use crate::BoxStream;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One streamed token with its accounting metadata.
#[derive(Debug, Clone)]
pub struct TokenEvent {
    pub token: String,
    pub tokens: u32,
    pub stage: TokenStage,
}

impl TokenEvent {
    pub fn input(token: impl Into<String>, tokens: u32) -> Self {
        Self {
            token: token.into(),
            tokens,
            stage: TokenStage::Input,
        }
    }

    pub fn output(token: impl Into<String>, tokens: u32) -> Self {
        Self {
            token: token.into(),
            tokens,
            stage: TokenStage::Output,
        }
    }
}

/// Everything a provider needs for one generation. Owned so the returned
/// stream can be `'static`.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub user_prompt: String,
    pub system_prompt: Option<String>,
    pub schema: Option<Value>,
    pub model_config: ModelConfig,
    pub user_id: String,
}

/// Uniform streaming-generate contract implemented by every provider.
pub trait Provider: Send + Sync {
    /// Narrow a validated response for providers whose structured output is
    /// nested (tool-call wrappers). Default: identity.
    fn post_process(&self, raw: Value) -> Value {
        raw
    }

    /// Open a token stream for the request. Accounting events (zero-length
    /// tokens with `stage == Input`) may precede content tokens.
    fn generate(&self, request: GenerateRequest) -> BoxStream<'static, TokenEvent>;
}

/// Name -> provider lookup.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in providers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("lorem", Arc::new(LoremProvider::new()));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }
}

/// Rough token estimate used where no tokenizer is available (lorem input
/// accounting, tool payload multipliers). One token per four characters.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() as u32 + 3) / 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_lorem() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.get("lorem").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
