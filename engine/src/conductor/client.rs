//! Stage Client
//!
//! Every upstream call a request makes goes through one `StageClient`, which
//! bounds it with the configured timeout and records its usage.

use crate::config::LLMConfig;
use crate::conductor::usage::UsageAggregator;
use crate::llm::{CallStage, Completion, CompletionRequest, LLMError, LLMProvider, Message};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

pub struct StageClient {
    provider: Arc<dyn LLMProvider>,
    usage: Arc<UsageAggregator>,
    timeout: Duration,
    effort: Option<String>,
    json_object: bool,
}

impl StageClient {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        usage: Arc<UsageAggregator>,
        config: &LLMConfig,
    ) -> Self {
        Self {
            provider,
            usage,
            timeout: Duration::from_secs(config.timeout_secs),
            effort: config.reasoning_effort.clone(),
            json_object: config.json_response_format,
        }
    }

    /// Model name requests are sent to
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Run one completion for `stage`
    ///
    /// Expiry of the timeout drops the in-flight call and yields
    /// [`LLMError::Timeout`]. Usage is recorded only for calls that returned.
    pub async fn call(
        &self,
        stage: CallStage,
        messages: Vec<Message>,
    ) -> Result<Completion, LLMError> {
        let mut request = CompletionRequest::new(stage, messages);
        request.effort = self.effort.clone();
        request.json_object = self.json_object;

        let start = Instant::now();
        let result = match timeout(self.timeout, self.provider.complete(&request)).await {
            Ok(result) => result,
            Err(_) => Err(LLMError::Timeout),
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(completion) => {
                self.usage.record(&completion.usage);
                debug!(
                    stage = %stage,
                    latency_ms,
                    input_tokens = completion.usage.input_tokens,
                    output_tokens = completion.usage.output_tokens,
                    reasoning_tokens = completion.usage.reasoning_tokens,
                    total_tokens = completion.usage.total_tokens,
                    "Upstream call completed"
                );
            }
            Err(e) => {
                warn!(stage = %stage, latency_ms, error = %e, "Upstream call failed");
            }
        }

        result
    }
}
