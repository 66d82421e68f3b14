use super::{usage_from_metadata, Completion, CompletionRequest, LLMError, LLMProvider};
use crate::config::LLMConfig;
use crate::secrets::{scrub_secrets, SecretString};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Client for OpenAI-compatible `/chat/completions` endpoints
pub struct OpenAIProvider {
    config: LLMConfig,
    api_key: Option<SecretString>,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: LLMConfig, api_key: Option<SecretString>) -> Self {
        Self {
            config,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    fn api_key(&self) -> super::Result<&SecretString> {
        self.api_key.as_ref().ok_or_else(|| {
            LLMError::AuthenticationFailed(format!(
                "{} is not set",
                self.config.api_key_env
            ))
        })
    }

    fn payload(&self, request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content
                })
            })
            .collect();

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages,
            "max_completion_tokens": self.config.max_tokens,
        });

        if let Some(temperature) = self.config.temperature {
            payload["temperature"] = json!(temperature);
        }
        if let Some(effort) = &request.effort {
            payload["reasoning_effort"] = json!(effort);
        }
        if request.json_object {
            payload["response_format"] = json!({ "type": "json_object" });
        }

        payload
    }
}

/// Pull `error.message` out of an OpenAI error body, falling back to the raw text
fn error_message(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());

    scrub_secrets(&message)
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn check_health(&self) -> bool {
        let Ok(api_key) = self.api_key() else {
            return false;
        };

        let url = format!("{}/models", self.config.base_url);
        match self
            .client
            .get(&url)
            .header("Authorization", api_key.bearer())
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> super::Result<Completion> {
        let api_key = self.api_key()?;
        let url = format!("{}/chat/completions", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", api_key.bearer())
            .header("Content-Type", "application/json")
            .json(&self.payload(request))
            .send()
            .await
            .map_err(|e| LLMError::NetworkError(scrub_secrets(&e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let code = status.as_u16();

            return Err(match code {
                401 | 403 => LLMError::AuthenticationFailed(error_message(&text)),
                429 => LLMError::RateLimitExceeded,
                400..=499 => LLMError::InvalidRequest {
                    status: code,
                    message: error_message(&text),
                },
                _ => LLMError::ProviderUnavailable(format!("HTTP {}", code)),
            });
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| LLMError::ParseError(e.to_string()))?;

        let content = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| LLMError::ParseError("No message content in response".to_string()))?;

        let usage = usage_from_metadata(data.get("usage").unwrap_or(&Value::Null));

        Ok(Completion::new(content, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CallStage, Message};

    #[test]
    fn test_payload_optional_fields() {
        let mut config = LLMConfig::default();
        config.temperature = Some(0.7);
        let provider = OpenAIProvider::new(config, Some(SecretString::from("sk-test")));

        let mut request = CompletionRequest::new(CallStage::Draft, vec![Message::user("hi")]);
        let payload = provider.payload(&request);
        assert_eq!(payload["model"], "gpt-5-mini");
        assert_eq!(payload["max_completion_tokens"], 2048);
        assert!(payload.get("reasoning_effort").is_none());
        assert!(payload.get("response_format").is_none());
        assert!(payload["temperature"].as_f64().is_some());

        request.effort = Some("low".to_string());
        request.json_object = true;
        let payload = provider.payload(&request);
        assert_eq!(payload["reasoning_effort"], "low");
        assert_eq!(payload["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"error": {"message": "maximum context length exceeded", "type": "invalid_request_error"}}"#;
        assert_eq!(error_message(body), "maximum context length exceeded");
        assert_eq!(error_message("  plain text  "), "plain text");
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_network() {
        let provider = OpenAIProvider::new(LLMConfig::default(), None);
        let request = CompletionRequest::new(CallStage::Analyze, vec![Message::user("hi")]);

        let err = provider.complete(&request).await.unwrap_err();
        assert!(matches!(err, LLMError::AuthenticationFailed(msg) if msg.contains("OPENAI_API_KEY")));
        assert!(!provider.check_health().await);
    }
}
