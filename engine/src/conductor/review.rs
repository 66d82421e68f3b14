//! Semantic Review
//!
//! Optional second opinion from the model on a candidate that already passed
//! every local check. Enabled with `generation.semantic_review`.

use crate::conductor::client::StageClient;
use crate::conductor::prompts;
use crate::llm::{extract_json_object, CallStage, LLMError};
use sdk::types::{KnowledgePoint, VariantCandidate};

const GENERIC_REJECTION: &str = "Reviewer judged the question invalid for the knowledge point";

pub struct SemanticReviewer<'a> {
    client: &'a StageClient,
}

impl<'a> SemanticReviewer<'a> {
    pub fn new(client: &'a StageClient) -> Self {
        Self { client }
    }

    /// Returns `Ok(Some(reason))` when the reviewer rejects the candidate
    pub async fn review(
        &self,
        knowledge_point: &KnowledgePoint,
        candidate: &VariantCandidate,
    ) -> Result<Option<String>, LLMError> {
        let completion = self
            .client
            .call(CallStage::Review, prompts::review(knowledge_point, candidate))
            .await?;

        Ok(parse_verdict(&completion.content))
    }
}

/// An unreadable verdict counts as a pass
fn parse_verdict(content: &str) -> Option<String> {
    let map = extract_json_object(content)?;

    let is_valid = match map.get("is_valid") {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => !s.trim().eq_ignore_ascii_case("false"),
        _ => true,
    };
    if is_valid {
        return None;
    }

    let feedback = map
        .get("feedback")
        .and_then(|f| f.as_str())
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(GENERIC_REJECTION);

    Some(format!("Review: {}", feedback))
}
