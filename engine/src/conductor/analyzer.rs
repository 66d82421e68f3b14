//! Context Analyzer
//!
//! Names the knowledge point a source question tests. Runs once per request;
//! every directive reads the result.

use crate::conductor::client::StageClient;
use crate::conductor::prompts;
use crate::llm::{extract_json_object, CallStage};
use sdk::errors::VariantError;
use sdk::types::KnowledgePoint;

pub struct ContextAnalyzer<'a> {
    client: &'a StageClient,
}

impl<'a> ContextAnalyzer<'a> {
    pub fn new(client: &'a StageClient) -> Self {
        Self { client }
    }

    /// Any failure here is fatal to the request, since nothing downstream can run without it
    pub async fn analyze(&self, question: &str) -> Result<KnowledgePoint, VariantError> {
        let completion = self
            .client
            .call(CallStage::Analyze, prompts::analyze(question))
            .await?;

        let knowledge_point = parse_knowledge_point(&completion.content)?;
        tracing::info!(knowledge_point = %knowledge_point.name, "Knowledge point identified");

        Ok(knowledge_point)
    }
}

fn parse_knowledge_point(content: &str) -> Result<KnowledgePoint, VariantError> {
    let map = extract_json_object(content).ok_or_else(|| {
        VariantError::UpstreamMalformedOutput(
            "knowledge point response is not a JSON object".to_string(),
        )
    })?;

    let field = |key: &str| {
        map.get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };

    let name = field("knowledge_point_name");
    if name.is_empty() {
        return Err(VariantError::UpstreamMalformedOutput(
            "knowledge point response has no knowledge_point_name".to_string(),
        ));
    }

    Ok(KnowledgePoint {
        name,
        summary: field("knowledge_point_summary"),
    })
}
