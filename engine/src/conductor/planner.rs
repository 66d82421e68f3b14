//! Variation Planner
//!
//! Turns a knowledge point into one `VariationDirective` per requested
//! variant. Focus axes are assigned here, cycling through
//! [`FocusAxis::ALL`]; the model only writes the guidance for each slot.

use crate::conductor::client::StageClient;
use crate::conductor::prompts;
use crate::llm::{extract_json, CallStage, LLMError};
use sdk::errors::VariantError;
use sdk::types::{FocusAxis, KnowledgePoint, VariationDirective};
use serde_json::Value;
use std::collections::HashSet;

pub struct VariationPlanner<'a> {
    client: &'a StageClient,
    max_replans: u32,
}

impl<'a> VariationPlanner<'a> {
    pub fn new(client: &'a StageClient, max_replans: u32) -> Self {
        Self {
            client,
            max_replans,
        }
    }

    /// Produce exactly `count` directives
    ///
    /// Malformed output is retried up to `max_replans` times with the
    /// rejection reason as feedback. Transport failures end planning at once.
    pub async fn plan(
        &self,
        knowledge_point: &KnowledgePoint,
        question: &str,
        count: u8,
    ) -> Result<Vec<VariationDirective>, VariantError> {
        let axes: Vec<FocusAxis> = (0..count as usize).map(FocusAxis::for_index).collect();
        let slots: Vec<&str> = axes.iter().map(FocusAxis::as_str).collect();
        let max_attempts = self.max_replans + 1;

        let mut feedback: Option<String> = None;
        let mut attempt = 0;

        while attempt < max_attempts {
            attempt += 1;

            let messages = prompts::plan(knowledge_point, question, &slots, feedback.as_deref());
            let reason = match self.client.call(CallStage::Plan, messages).await {
                Ok(completion) => match parse_directives(&completion.content, &axes) {
                    Ok(directives) => {
                        tracing::info!(count = directives.len(), attempt, "Variations planned");
                        return Ok(directives);
                    }
                    Err(reason) => reason,
                },
                Err(LLMError::ParseError(msg)) => format!("unreadable response: {}", msg),
                Err(e) => return Err(e.into()),
            };

            tracing::warn!(attempt, max_attempts, reason = %reason, "Rejected variation plan");
            feedback = Some(reason);
        }

        Err(VariantError::PlanningFailed {
            attempts: max_attempts,
            reason: feedback.unwrap_or_default(),
        })
    }
}

/// Parse planner output against the pre-assigned axes
///
/// Accepts `{"variations": [...]}` or a bare array; each entry may be an
/// object with `guidance` (or `focus`) or a plain string.
fn parse_directives(content: &str, axes: &[FocusAxis]) -> Result<Vec<VariationDirective>, String> {
    let value = extract_json(content).ok_or("response is not JSON")?;

    let entries = match &value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("variations")
            .and_then(Value::as_array)
            .ok_or("response has no \"variations\" array")?,
        _ => return Err("response is not JSON".to_string()),
    };

    if entries.len() != axes.len() {
        return Err(format!(
            "expected {} variations, got {}",
            axes.len(),
            entries.len()
        ));
    }

    let mut seen = HashSet::new();
    let mut directives = Vec::with_capacity(axes.len());

    for (i, (entry, axis)) in entries.iter().zip(axes).enumerate() {
        let guidance = match entry {
            Value::String(s) => s.as_str(),
            Value::Object(map) => map
                .get("guidance")
                .or_else(|| map.get("focus"))
                .and_then(Value::as_str)
                .unwrap_or(""),
            _ => "",
        }
        .trim();

        if guidance.is_empty() {
            return Err(format!("variation {} has no guidance", i + 1));
        }
        if !seen.insert(guidance.to_lowercase()) {
            return Err(format!(
                "variation {} repeats the guidance of an earlier variation",
                i + 1
            ));
        }

        directives.push(VariationDirective {
            id: format!("d{}", i + 1),
            axis: *axis,
            guidance: guidance.to_string(),
        });
    }

    Ok(directives)
}
