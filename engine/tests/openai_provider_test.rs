//! Integration tests for the OpenAI-compatible provider
//!
//! Validates request shape, usage parsing and status mapping against a mock server

mod common;

use common::*;
use sdk::errors::VariantError;
use sdk::types::VariantRequest;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use variant_engine::conductor::Conductor;
use variant_engine::config::{Config, LLMConfig};
use variant_engine::llm::openai::OpenAIProvider;
use variant_engine::llm::{
    CallStage, CompletionRequest, LLMError, LLMProvider, Message,
};
use variant_engine::secrets::SecretString;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, Request, Respond, ResponseTemplate,
};

const API_KEY: &str = "sk-test-0123456789abcdef";

fn llm_config(server: &MockServer) -> LLMConfig {
    LLMConfig {
        base_url: server.uri(),
        ..LLMConfig::default()
    }
}

fn provider(server: &MockServer) -> OpenAIProvider {
    OpenAIProvider::new(llm_config(server), Some(SecretString::from(API_KEY)))
}

fn analyze_request() -> CompletionRequest {
    CompletionRequest::new(
        CallStage::Analyze,
        vec![Message::system("Name the knowledge point."), Message::user("Which lane?")],
    )
}

fn chat_response(content: &str) -> Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": 120,
            "completion_tokens": 80,
            "total_tokens": 200,
            "completion_tokens_details": { "reasoning_tokens": 32 }
        }
    })
}

async fn mount_status(server: &MockServer, status: u16, body: Value) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_completion_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", format!("Bearer {}", API_KEY).as_str()))
        .and(body_partial_json(json!({
            "model": "gpt-5-mini",
            "messages": [
                { "role": "system", "content": "Name the knowledge point." },
                { "role": "user", "content": "Which lane?" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("{\"ok\": true}")))
        .expect(1)
        .mount(&server)
        .await;

    let completion = provider(&server).complete(&analyze_request()).await.unwrap();

    assert_eq!(completion.content, "{\"ok\": true}");
    assert_eq!(completion.usage.input_tokens, 120);
    assert_eq!(completion.usage.output_tokens, 80);
    assert_eq!(completion.usage.reasoning_tokens, 32);
    assert_eq!(completion.usage.total_tokens, 200);
}

#[tokio::test]
async fn test_status_mapping() {
    let cases: Vec<(u16, Value, LLMError)> = vec![
        (
            401,
            json!({ "error": { "message": "Incorrect API key provided" } }),
            LLMError::AuthenticationFailed("Incorrect API key provided".to_string()),
        ),
        (429, json!({ "error": { "message": "slow down" } }), LLMError::RateLimitExceeded),
        (
            400,
            json!({ "error": { "message": "Unsupported parameter: temperature" } }),
            LLMError::InvalidRequest {
                status: 400,
                message: "Unsupported parameter: temperature".to_string(),
            },
        ),
        (
            503,
            json!({ "error": { "message": "overloaded" } }),
            LLMError::ProviderUnavailable("HTTP 503".to_string()),
        ),
    ];

    for (status, body, expected) in cases {
        let server = MockServer::start().await;
        mount_status(&server, status, body).await;

        let err = provider(&server).complete(&analyze_request()).await.unwrap_err();
        assert_eq!(err, expected, "status {}", status);
    }
}

#[tokio::test]
async fn test_rejection_message_is_scrubbed() {
    let server = MockServer::start().await;
    mount_status(
        &server,
        400,
        json!({ "error": { "message": format!("Key {} lacks access", API_KEY) } }),
    )
    .await;

    let err = provider(&server).complete(&analyze_request()).await.unwrap_err();

    match err {
        LLMError::InvalidRequest { message, .. } => assert!(!message.contains(API_KEY)),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_content_is_parse_error() {
    let server = MockServer::start().await;
    mount_status(&server, 200, json!({ "choices": [] })).await;

    let err = provider(&server).complete(&analyze_request()).await.unwrap_err();
    assert!(matches!(err, LLMError::ParseError(_)));
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .mount(&server)
        .await;

    assert!(provider(&server).check_health().await);

    let down = MockServer::start().await;
    assert!(!provider(&down).check_health().await);
}

#[tokio::test]
async fn test_health_check_gives_up_after_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/models"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": [] }))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let config = LLMConfig {
        timeout_secs: 1,
        ..llm_config(&server)
    };
    let provider = OpenAIProvider::new(config, Some(SecretString::from(API_KEY)));

    let started = Instant::now();
    assert!(!provider.check_health().await);
    assert!(started.elapsed() < Duration::from_secs(5));
}

/// Answers each pipeline stage, recognised by its system prompt
struct PipelineResponder;

impl Respond for PipelineResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let messages = body["messages"].as_array().cloned().unwrap_or_default();
        let system = messages
            .first()
            .and_then(|m| m["content"].as_str())
            .unwrap_or_default();

        let stage = if system.starts_with("You analyse") {
            CallStage::Analyze
        } else if system.starts_with("You plan") {
            CallStage::Plan
        } else if system.starts_with("You review") {
            CallStage::Review
        } else {
            CallStage::Draft
        };

        let text = messages
            .iter()
            .filter_map(|m| m["content"].as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let scripted = CompletionRequest::new(stage, vec![Message::user(text)]);

        match happy_script(&scripted) {
            Script::Reply(content) => {
                ResponseTemplate::new(200).set_body_json(chat_response(&content))
            }
            _ => ResponseTemplate::new(500),
        }
    }
}

#[tokio::test]
async fn test_pipeline_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(PipelineResponder)
        .mount(&server)
        .await;

    let config = Config {
        llm: llm_config(&server),
        ..Config::default()
    };
    let provider: Arc<dyn LLMProvider> = Arc::new(provider(&server));
    let conductor = Conductor::new(provider, Arc::new(config));

    let request = VariantRequest::new(LANES_QUESTION, 2).unwrap();
    let result = conductor.generate(&request).await.unwrap();

    assert_eq!(result.variant_questions.len(), 2);
    assert_eq!(result.variant_questions[0].prompt, candidate_prompt(1));
    // analyze + plan + two drafts, 200 tokens each
    assert_eq!(result.usage.total_tokens, 800);
    assert_eq!(result.usage.reasoning_tokens, 128);
}

#[tokio::test]
async fn test_pipeline_auth_failure_is_generic() {
    let server = MockServer::start().await;
    mount_status(
        &server,
        401,
        json!({ "error": { "message": "Incorrect API key provided" } }),
    )
    .await;

    let config = Config {
        llm: llm_config(&server),
        ..Config::default()
    };
    let provider: Arc<dyn LLMProvider> = Arc::new(provider(&server));
    let conductor = Conductor::new(provider, Arc::new(config));

    let request = VariantRequest::new(LANES_QUESTION, 1).unwrap();
    let failure = conductor.generate(&request).await.unwrap_err();

    assert!(matches!(failure.error, VariantError::UpstreamUnavailable(_)));
    assert!(!failure.error.to_string().contains("API key"));
}
