//! Deterministic lorem provider for tests and pipeline dry runs.
//!
//! Emits one input-token accounting event estimated from the prompts, then
//! `max_tokens` lorem words with a short sleep between each so downstream
//! consumers observe genuine streaming. Word choice cycles through a fixed
//! catalog, so a given config always yields the same text.

use crate::provider::{estimate_tokens, GenerateRequest, Provider, TokenEvent};
use crate::BoxStream;
use serde_json::{json, Value};
use std::time::Duration;

const WORD_CATALOG: &[&str] = &[
    "lorem",
    "ipsum",
    "dolor",
    "sit",
    "amet",
    "consectetur",
    "adipiscing",
    "elit",
    "sed",
    "do",
    "eiusmod",
    "tempor",
    "incididunt",
    "ut",
    "labore",
    "et",
    "dolore",
    "magna",
    "aliqua",
    "enim",
    "ad",
    "minim",
    "veniam",
    "quis",
    "nostrud",
    "exercitation",
    "ullamco",
    "laboris",
    "nisi",
    "aliquip",
    "ex",
    "ea",
    "commodo",
    "consequat",
    "duis",
    "aute",
    "irure",
    "in",
    "reprehenderit",
    "voluptate",
    "velit",
    "esse",
    "cillum",
    "eu",
    "fugiat",
    "nulla",
    "pariatur",
    "excepteur",
    "sint",
    "occaecat",
    "cupidatat",
    "non",
    "proident",
    "sunt",
    "culpa",
    "qui",
    "officia",
    "deserunt",
    "mollit",
    "anim",
    "id",
    "est",
    "laborum",
];

#[derive(Debug, Default)]
pub struct LoremProvider;

impl LoremProvider {
    pub fn new() -> Self {
        Self
    }

    /// Sentence-shape the word at position `i` out of `count`.
    fn shape(word: &str, i: u32, count: u32) -> String {
        let capitalized = || {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        };
        if i == 0 {
            format!("{} ", capitalized())
        } else if i % 10 == 0 {
            format!("{word}. ")
        } else if (i - 1) % 10 == 0 {
            format!("{} ", capitalized())
        } else if i == count - 1 {
            format!("{word}.")
        } else {
            format!("{word} ")
        }
    }
}

impl Provider for LoremProvider {
    fn post_process(&self, raw: Value) -> Value {
        raw.get("output").cloned().unwrap_or_else(|| json!({}))
    }

    fn generate(&self, request: GenerateRequest) -> BoxStream<'static, TokenEvent> {
        let input_tokens = estimate_tokens(&request.user_prompt)
            + request
                .system_prompt
                .as_deref()
                .map(estimate_tokens)
                .unwrap_or(0);
        let count = request.model_config.max_tokens;

        Box::pin(async_stream::stream! {
            yield TokenEvent::input("", input_tokens);

            for i in 0..count {
                let word = WORD_CATALOG[i as usize % WORD_CATALOG.len()];
                tokio::time::sleep(Duration::from_millis(5)).await;
                yield TokenEvent::output(Self::shape(word, i, count), 1);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::events::TokenStage;
    use futures::StreamExt;
    use serde_json::json;

    fn request(max_tokens: u32) -> GenerateRequest {
        GenerateRequest {
            user_prompt: "write something".to_string(),
            system_prompt: None,
            schema: Some(json!({"type": "string"})),
            model_config: ModelConfig {
                max_tokens,
                ..ModelConfig::default()
            },
            user_id: "tester".to_string(),
        }
    }

    #[tokio::test]
    async fn first_event_is_input_accounting() {
        let provider = LoremProvider::new();
        let mut stream = provider.generate(request(3));

        let first = stream.next().await.unwrap();
        assert_eq!(first.stage, TokenStage::Input);
        assert!(first.token.is_empty());
        assert!(first.tokens > 0);
    }

    #[tokio::test]
    async fn emits_max_tokens_words_deterministically() {
        let provider = LoremProvider::new();
        let a: Vec<_> = provider.generate(request(12)).collect().await;
        let b: Vec<_> = provider.generate(request(12)).collect().await;

        assert_eq!(a.len(), 13); // input event + 12 words
        let text_a: String = a.iter().map(|e| e.token.as_str()).collect();
        let text_b: String = b.iter().map(|e| e.token.as_str()).collect();
        assert_eq!(text_a, text_b);
        assert!(text_a.starts_with("Lorem "));
        assert!(text_a.ends_with('.'));
    }

    #[test]
    fn post_process_unwraps_output() {
        let provider = LoremProvider::new();
        assert_eq!(
            provider.post_process(json!({"output": {"a": 1}})),
            json!({"a": 1})
        );
        assert_eq!(provider.post_process(json!({"other": 1})), json!({}));
    }
}
