//! Conductor System
//!
//! Orchestrates one variant-generation request:
//!
//! 1. [`ContextAnalyzer`] names the knowledge point (once)
//! 2. [`VariationPlanner`] issues one directive per requested variant (once)
//! 3. One [`RetryController`] per directive drafts and validates, with at most
//!    `min(num, generation.max_concurrency)` directives in flight
//! 4. Outcomes are joined in directive order into a `VariantResult`
//!
//! Nothing here spawns tasks. Directive futures are polled by the request
//! future itself, so dropping it (a client disconnect) cancels every
//! in-flight upstream call.

pub mod analyzer;
pub mod client;
pub mod controller;
pub mod drafter;
pub mod planner;
pub mod prompts;
pub mod review;
pub mod usage;
pub mod validator;

pub use analyzer::ContextAnalyzer;
pub use client::StageClient;
pub use controller::{DirectiveOutcome, RetryController, StageResult};
pub use drafter::QuestionDrafter;
pub use planner::VariationPlanner;
pub use review::SemanticReviewer;
pub use usage::UsageAggregator;
pub use validator::Validator;

use crate::config::Config;
use crate::llm::LLMProvider;
use futures::stream::{self, StreamExt};
use sdk::errors::VariantError;
use sdk::types::{UsageRecord, VariantQuestion, VariantRequest, VariantResult};
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

/// A failed request, with whatever usage it had accumulated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationFailure {
    pub error: VariantError,
    pub usage: UsageRecord,
    pub elapsed_ms: u64,
}

/// Runs the generation pipeline against one provider
///
/// Holds only read-only state; one instance serves every request.
pub struct Conductor {
    provider: Arc<dyn LLMProvider>,
    config: Arc<Config>,
}

impl Conductor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: Arc<Config>) -> Self {
        Self { provider, config }
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Generate `request.num` variants of `request.question`
    pub async fn generate(
        &self,
        request: &VariantRequest,
    ) -> Result<VariantResult, GenerationFailure> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("generate", request_id = %request_id, num = request.num);
        self.generate_inner(request).instrument(span).await
    }

    async fn generate_inner(
        &self,
        request: &VariantRequest,
    ) -> Result<VariantResult, GenerationFailure> {
        let usage = Arc::new(UsageAggregator::new());
        let mut guard = CancellationGuard::new(Arc::clone(&usage));

        let result = self.run(request, &usage).await;
        guard.disarm();

        let elapsed_ms = usage.elapsed_ms();
        let totals = usage.snapshot();

        match result {
            Ok(assembled) => {
                info!(
                    elapsed_ms,
                    calls = usage.calls(),
                    total_tokens = totals.total_tokens,
                    variants = assembled.questions.len(),
                    "Request completed"
                );
                Ok(VariantResult {
                    knowledge_point_name: assembled.knowledge_point.name,
                    knowledge_point_summary: assembled.knowledge_point.summary,
                    variant_questions: assembled.questions,
                    time: elapsed_ms,
                    usage: totals,
                    unmet_directives: assembled.unmet_directives,
                })
            }
            Err(error) => {
                error!(
                    elapsed_ms,
                    calls = usage.calls(),
                    input_tokens = totals.input_tokens,
                    output_tokens = totals.output_tokens,
                    total_tokens = totals.total_tokens,
                    error = %error,
                    "Request failed"
                );
                Err(GenerationFailure {
                    error,
                    usage: totals,
                    elapsed_ms,
                })
            }
        }
    }

    async fn run(
        &self,
        request: &VariantRequest,
        usage: &Arc<UsageAggregator>,
    ) -> Result<Assembled, VariantError> {
        let generation = &self.config.generation;
        let client = StageClient::new(
            Arc::clone(&self.provider),
            Arc::clone(usage),
            &self.config.llm,
        );

        let knowledge_point = ContextAnalyzer::new(&client)
            .analyze(&request.question)
            .await?;

        let directives = VariationPlanner::new(&client, generation.max_replans)
            .plan(&knowledge_point, &request.question, request.num)
            .await?;

        let validator = Validator::new(&request.question, generation, client.model());
        let drafter = QuestionDrafter::new(&client);
        let reviewer = generation
            .semantic_review
            .then(|| SemanticReviewer::new(&client));
        let controller = RetryController::new(
            &drafter,
            &validator,
            reviewer.as_ref(),
            generation.max_attempts,
        );

        let workers = directives.len().min(generation.max_concurrency).max(1);
        // Directives are cloned in; a borrowed item breaks `Send` on the request future
        let mut in_flight = stream::iter(directives.iter().cloned().enumerate())
            .map(|(index, directive)| {
                let controller = &controller;
                let knowledge_point = &knowledge_point;
                let question = request.question.as_str();
                async move { (index, controller.run(knowledge_point, question, &directive).await) }
            })
            .buffer_unordered(workers);

        let mut outcomes: Vec<Option<DirectiveOutcome>> = vec![None; directives.len()];
        while let Some((index, outcome)) = in_flight.next().await {
            if let DirectiveOutcome::Fatal(error) = outcome {
                // Dropping the stream cancels the remaining directives
                return Err(error);
            }
            outcomes[index] = Some(outcome);
        }
        drop(in_flight);

        let outcomes: Vec<DirectiveOutcome> = outcomes.into_iter().flatten().collect();
        let (questions, unmet_directives) = assemble(outcomes, generation.allow_partial)?;

        Ok(Assembled {
            knowledge_point,
            questions,
            unmet_directives,
        })
    }
}

struct Assembled {
    knowledge_point: sdk::types::KnowledgePoint,
    questions: Vec<VariantQuestion>,
    unmet_directives: Vec<String>,
}

/// Join directive outcomes, given in directive order
///
/// Any abandoned directive fails the request with `DirectiveExhausted` for the
/// first one, unless `allow_partial` is set and at least one was accepted.
pub fn assemble(
    outcomes: Vec<DirectiveOutcome>,
    allow_partial: bool,
) -> Result<(Vec<VariantQuestion>, Vec<String>), VariantError> {
    let mut questions = Vec::with_capacity(outcomes.len());
    let mut unmet = Vec::new();
    let mut first_abandoned = None;

    for outcome in outcomes {
        match outcome {
            DirectiveOutcome::Accepted(candidate) => {
                let question = candidate.to_question().ok_or_else(|| {
                    VariantError::UpstreamMalformedOutput(format!(
                        "accepted candidate for {} is incomplete",
                        candidate.directive_id
                    ))
                })?;
                questions.push(question);
            }
            DirectiveOutcome::Abandoned {
                directive_id,
                attempts,
                violations,
            } => {
                unmet.push(directive_id.clone());
                first_abandoned.get_or_insert(VariantError::DirectiveExhausted {
                    directive_id,
                    attempts,
                    violations,
                });
            }
            DirectiveOutcome::Fatal(error) => return Err(error),
        }
    }

    match first_abandoned {
        None => Ok((questions, unmet)),
        Some(_) if allow_partial && !questions.is_empty() => {
            warn!(unmet = ?unmet, "Returning partial result");
            Ok((questions, unmet))
        }
        Some(error) => Err(error),
    }
}

/// Logs partial usage when a request future is dropped before finishing
struct CancellationGuard {
    usage: Arc<UsageAggregator>,
    armed: bool,
}

impl CancellationGuard {
    fn new(usage: Arc<UsageAggregator>) -> Self {
        Self { usage, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancellationGuard {
    fn drop(&mut self) {
        if self.armed {
            let totals = self.usage.snapshot();
            warn!(
                elapsed_ms = self.usage.elapsed_ms(),
                calls = self.usage.calls(),
                total_tokens = totals.total_tokens,
                "Request cancelled"
            );
        }
    }
}
