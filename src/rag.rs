//! Retrieval contract for `rag` outputs.

use crate::config::RagConfig;
use async_trait::async_trait;
use serde_json::Value;

/// Injected retrieval collaborator.
///
/// Only `query` is driven by the runtime today; `embed` is part of the
/// contract so implementations can be used to build collections out of band.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn query(&self, prompt: &str, config: &RagConfig) -> anyhow::Result<Value>;

    async fn embed(
        &self,
        documents: Vec<String>,
        metadata: Option<Vec<Value>>,
    ) -> anyhow::Result<()>;
}
