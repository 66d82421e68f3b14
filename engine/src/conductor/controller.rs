//! Retry Controller
//!
//! Drives one directive through `Draft → Validate → {Accept | Retry | Abandon}`.
//! Attempts are strictly sequential because each draft carries the previous
//! attempt's violations as feedback.

use crate::conductor::drafter::QuestionDrafter;
use crate::conductor::review::SemanticReviewer;
use crate::conductor::validator::Validator;
use crate::llm::LLMError;
use sdk::errors::VariantError;
use sdk::types::{KnowledgePoint, ValidationOutcome, VariantCandidate, VariationDirective};
use tracing::{info, warn};

/// Where a directive is in its attempt loop
#[derive(Debug)]
enum ControllerState {
    Draft {
        attempt: u32,
        feedback: Vec<String>,
    },
    Validate {
        attempt: u32,
        drafted: Option<VariantCandidate>,
    },
    Done(DirectiveOutcome),
}

/// Result of one stage of the loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    /// Candidate passed and was added to the accepted set
    Accepted(VariantCandidate),

    /// Attempt failed with budget left; the violations become feedback
    Retrying { feedback: Vec<String> },

    /// Last attempt failed
    Abandoned { violations: Vec<String> },

    /// Failure no retry can fix
    Fatal(VariantError),
}

/// Terminal state of one directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveOutcome {
    Accepted(VariantCandidate),
    Abandoned {
        directive_id: String,
        attempts: u32,
        violations: Vec<String>,
    },
    Fatal(VariantError),
}

impl DirectiveOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DirectiveOutcome::Accepted(_))
    }
}

pub struct RetryController<'a> {
    drafter: &'a QuestionDrafter<'a>,
    validator: &'a Validator,
    reviewer: Option<&'a SemanticReviewer<'a>>,
    max_attempts: u32,
}

impl<'a> RetryController<'a> {
    pub fn new(
        drafter: &'a QuestionDrafter<'a>,
        validator: &'a Validator,
        reviewer: Option<&'a SemanticReviewer<'a>>,
        max_attempts: u32,
    ) -> Self {
        Self {
            drafter,
            validator,
            reviewer,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Run the directive to a terminal state
    pub async fn run(
        &self,
        knowledge_point: &KnowledgePoint,
        question: &str,
        directive: &VariationDirective,
    ) -> DirectiveOutcome {
        let mut state = ControllerState::Draft {
            attempt: 1,
            feedback: Vec::new(),
        };

        loop {
            state = match state {
                ControllerState::Draft { attempt, feedback } => {
                    match self
                        .drafter
                        .draft(knowledge_point, question, directive, attempt, &feedback)
                        .await
                    {
                        Ok(drafted) => ControllerState::Validate { attempt, drafted },
                        Err(e) => {
                            let result = self.failed_call(attempt, e);
                            self.transition(directive, attempt, result)
                        }
                    }
                }
                ControllerState::Validate { attempt, drafted } => {
                    let result = self
                        .evaluate(knowledge_point, attempt, drafted.as_ref())
                        .await;
                    self.transition(directive, attempt, result)
                }
                ControllerState::Done(outcome) => return outcome,
            };
        }
    }

    async fn evaluate(
        &self,
        knowledge_point: &KnowledgePoint,
        attempt: u32,
        drafted: Option<&VariantCandidate>,
    ) -> StageResult {
        let outcome = self.validator.check(drafted);
        let candidate = match drafted {
            Some(candidate) if outcome.passed => candidate,
            _ => return self.settle(attempt, outcome),
        };

        if let Some(reviewer) = self.reviewer {
            match reviewer.review(knowledge_point, candidate).await {
                Ok(None) => {}
                Ok(Some(reason)) => return self.settle(attempt, ValidationOutcome::failed(reason)),
                Err(e) => return self.failed_call(attempt, e),
            }
        }

        match self.validator.try_accept(candidate) {
            Ok(()) => StageResult::Accepted(candidate.clone()),
            Err(reason) => self.settle(attempt, ValidationOutcome::failed(reason)),
        }
    }

    /// An upstream failure either ends the request or costs one attempt
    fn failed_call(&self, attempt: u32, error: LLMError) -> StageResult {
        if !error.is_retryable() {
            return StageResult::Fatal(error.into());
        }
        self.settle(
            attempt,
            ValidationOutcome::failed(format!("Previous attempt failed: {}", error)),
        )
    }

    fn settle(&self, attempt: u32, outcome: ValidationOutcome) -> StageResult {
        if attempt < self.max_attempts {
            StageResult::Retrying {
                feedback: outcome.violations,
            }
        } else {
            StageResult::Abandoned {
                violations: outcome.violations,
            }
        }
    }

    fn transition(
        &self,
        directive: &VariationDirective,
        attempt: u32,
        result: StageResult,
    ) -> ControllerState {
        match result {
            StageResult::Accepted(candidate) => {
                info!(directive = %directive.id, axis = %directive.axis, attempt, "Directive accepted");
                ControllerState::Done(DirectiveOutcome::Accepted(candidate))
            }
            StageResult::Retrying { feedback } => {
                warn!(
                    directive = %directive.id,
                    attempt,
                    max_attempts = self.max_attempts,
                    violations = ?feedback,
                    "Candidate rejected, retrying"
                );
                ControllerState::Draft {
                    attempt: attempt + 1,
                    feedback,
                }
            }
            StageResult::Abandoned { violations } => {
                warn!(
                    directive = %directive.id,
                    attempts = attempt,
                    violations = ?violations,
                    "Directive abandoned"
                );
                ControllerState::Done(DirectiveOutcome::Abandoned {
                    directive_id: directive.id.clone(),
                    attempts: attempt,
                    violations,
                })
            }
            StageResult::Fatal(error) => {
                warn!(directive = %directive.id, attempt, error = %error, "Directive failed");
                ControllerState::Done(DirectiveOutcome::Fatal(error))
            }
        }
    }
}
