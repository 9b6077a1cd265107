//! Token-usage accounting hooks.
//!
//! The runtime reports token counts at two granularities: per streamed chunk
//! and per invocation (prompt or tool). Applications that bill or budget
//! implement [`CostTracker`]; the defaults pass the counts straight through
//! so the events still carry meaningful numbers.

use crate::config::ModelConfig;
use crate::events::TokenStage;
use crate::setup::ToolPlan;
use async_trait::async_trait;

#[async_trait]
pub trait CostTracker: Send + Sync {
    /// Cost attributed to a single streamed chunk. Returned value is what
    /// `CHUNK` events carry.
    async fn calculate_chunk_cost(
        &self,
        _stage: TokenStage,
        _config: &ModelConfig,
        tokens: u32,
    ) -> u32 {
        tokens
    }

    /// Record the totals for one prompt invocation.
    async fn record_prompt_token_usage(
        &self,
        _user: &str,
        _session_id: &str,
        _config: &ModelConfig,
        input_tokens: u32,
        output_tokens: u32,
    ) -> u32 {
        input_tokens + output_tokens
    }

    /// Record the declared cost of one tool execution.
    async fn record_tool_token_usage(
        &self,
        _user: &str,
        _session_id: &str,
        _plan: &ToolPlan,
        tokens: f64,
    ) -> f64 {
        tokens
    }
}

/// Default tracker: no persistence, counts pass through.
pub struct NoopCostTracker;

#[async_trait]
impl CostTracker for NoopCostTracker {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_pass_counts_through() {
        let tracker = NoopCostTracker;
        let config = ModelConfig::default();

        assert_eq!(
            tracker
                .calculate_chunk_cost(TokenStage::Output, &config, 7)
                .await,
            7
        );
        assert_eq!(
            tracker
                .record_prompt_token_usage("u", "s", &config, 10, 5)
                .await,
            15
        );
    }
}
