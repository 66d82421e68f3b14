//! Question Drafter
//!
//! One upstream call per attempt. The response is parsed leniently; anything
//! the parser cannot place is left empty for the validator to report.

use crate::conductor::client::StageClient;
use crate::conductor::prompts;
use crate::llm::{extract_json_object, CallStage, LLMError};
use sdk::types::{KnowledgePoint, OptionLetter, VariantCandidate, VariationDirective};
use serde_json::{Map, Value};
use tracing::Instrument;

pub struct QuestionDrafter<'a> {
    client: &'a StageClient,
}

impl<'a> QuestionDrafter<'a> {
    pub fn new(client: &'a StageClient) -> Self {
        Self { client }
    }

    /// Draft one candidate
    ///
    /// Returns `Ok(None)` when the response carries no JSON object at all.
    pub async fn draft(
        &self,
        knowledge_point: &KnowledgePoint,
        question: &str,
        directive: &VariationDirective,
        attempt: u32,
        feedback: &[String],
    ) -> Result<Option<VariantCandidate>, LLMError> {
        let messages = prompts::draft(knowledge_point, question, directive, feedback);
        let span = tracing::debug_span!("draft", directive = %directive.id, attempt);
        let completion = self
            .client
            .call(CallStage::Draft, messages)
            .instrument(span)
            .await?;

        Ok(parse_candidate(&completion.content, &directive.id, attempt))
    }
}

pub(crate) fn parse_candidate(
    content: &str,
    directive_id: &str,
    attempt: u32,
) -> Option<VariantCandidate> {
    let map = extract_json_object(content)?;

    Some(VariantCandidate {
        directive_id: directive_id.to_string(),
        attempt,
        prompt: text_field(&map, &["prompt", "question"]),
        options: parse_options(&map),
        correct_option: text_field(&map, &["correct_option", "answer", "correct_answer"]),
        explanation: text_field(&map, &["explanation"]),
    })
}

fn text_field(map: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Options as `option_a..option_d`, an `options` array, or an `options` object keyed A-D
fn parse_options(map: &Map<String, Value>) -> Vec<String> {
    let flat_keys = ["option_a", "option_b", "option_c", "option_d"];
    if flat_keys.iter().any(|key| map.contains_key(*key)) {
        return flat_keys
            .iter()
            .map(|key| text_field(map, &[*key]))
            .collect();
    }

    match map.get("options") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().unwrap_or("").trim().to_string())
            .collect(),
        Some(Value::Object(keyed)) => OptionLetter::ALL
            .iter()
            .map(|letter| {
                let upper = letter.to_string();
                let lower = upper.to_lowercase();
                text_field(keyed, &[upper.as_str(), lower.as_str()])
            })
            .collect(),
        _ => Vec::new(),
    }
}
