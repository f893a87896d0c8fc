//! OpenAI-compatible completion provider.
//!
//! Speaks `POST {base_url}/chat/completions` with a bearer key, which covers
//! OpenRouter, OpenAI and most hosted inference APIs. No `system` role is
//! ever sent; instructions travel inside the first user message.

use super::{ChatRequest, ChatResponse, Message, Provider, ProviderError, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// A provider that speaks the OpenAI-compatible chat completions API.
pub struct CompatibleProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct CompatibleRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct CompatibleResponse {
    #[serde(default)]
    choices: Vec<CompatibleChoice>,
    #[serde(default)]
    usage: Option<CompatibleUsage>,
}

#[derive(Debug, Deserialize)]
struct CompatibleChoice {
    #[serde(default)]
    message: Option<CompatibleResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompatibleResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompatibleUsage {
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    total_tokens: Option<i64>,
}

impl CompatibleProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: &str,
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            client: Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Create a provider from the `llm` config section.
    pub fn from_config(config: &agora_common::Config) -> Self {
        let name = if config.llm.base_url.contains("openrouter.ai") {
            "openrouter"
        } else {
            "compatible"
        };

        Self::new(
            name,
            &config.llm.base_url,
            config.llm_api_key(),
            Duration::from_secs(config.llm.timeout_secs),
        )
    }

    fn error(&self, model: &str, message: String, status_code: Option<u16>) -> ProviderError {
        ProviderError {
            provider: self.name.clone(),
            model: model.to_string(),
            message,
            status_code,
        }
    }
}

#[async_trait]
impl Provider for CompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = Instant::now();

        let api_key = self.api_key.as_ref().ok_or_else(|| {
            self.error(
                &request.model,
                format!("{} API key not set", self.name),
                None,
            )
        })?;

        let body = CompatibleRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await.map_err(|e| {
            let message = if e.is_timeout() {
                format!("Request timed out: {}", e)
            } else {
                format!("Request failed: {}", e)
            };
            self.error(&request.model, message, None)
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.error(
                &request.model,
                format!("API error ({}): {}", status.as_u16(), error_text),
                Some(status.as_u16()),
            ));
        }

        let result: CompatibleResponse = response.json().await.map_err(|e| {
            self.error(
                &request.model,
                format!("Failed to parse response: {}", e),
                None,
            )
        })?;

        let (content, finish_reason) = match result.choices.into_iter().next() {
            Some(choice) => (
                choice.message.and_then(|m| m.content),
                choice.finish_reason,
            ),
            None => (None, None),
        };

        let usage = result.usage.map_or(TokenUsage::default(), |u| TokenUsage {
            input_tokens: u.prompt_tokens.unwrap_or(0),
            output_tokens: u.completion_tokens.unwrap_or(0),
            total_tokens: u.total_tokens.unwrap_or(0),
        });

        Ok(ChatResponse {
            provider: self.name.clone(),
            model: request.model,
            content,
            usage,
            finish_reason,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(base_url: &str, api_key: Option<&str>) -> CompatibleProvider {
        CompatibleProvider::new("test", base_url, api_key, Duration::from_secs(5))
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "test-model".into(),
            messages: vec![Message::user("[Be nice]\n\nHello")],
            temperature: 0.7,
        }
    }

    #[test]
    fn strips_trailing_slash() {
        let provider = provider("https://api.example.com/v1/", Some("key"));
        assert_eq!(provider.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn from_config_names_openrouter() {
        let config = agora_common::Config::default();
        let provider = CompatibleProvider::from_config(&config);
        assert_eq!(provider.name(), "openrouter");
    }

    #[test]
    fn response_with_null_content_deserializes() {
        let json = r#"{"choices": [{"message": {"content": null}, "finish_reason": "stop"}]}"#;
        let resp: CompatibleResponse = serde_json::from_str(json).unwrap();
        assert!(resp.choices[0].message.as_ref().unwrap().content.is_none());
    }

    #[tokio::test]
    async fn sends_openai_shaped_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer secret"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "temperature": 0.7,
                "messages": [{"role": "user", "content": "[Be nice]\n\nHello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "Hi!"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 2, "total_tokens": 14}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = provider(&server.uri(), Some("secret"))
            .chat(request())
            .await
            .unwrap();

        assert_eq!(response.content.as_deref(), Some("Hi!"));
        assert_eq!(response.usage.total_tokens, 14);
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn empty_choices_yield_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let response = provider(&server.uri(), Some("secret"))
            .chat(request())
            .await
            .unwrap();
        assert!(response.content.is_none());
    }

    #[tokio::test]
    async fn non_success_status_carries_code_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too many requests"))
            .mount(&server)
            .await;

        let err = provider(&server.uri(), Some("secret"))
            .chat(request())
            .await
            .unwrap_err();

        assert_eq!(err.status_code, Some(429));
        assert_eq!(err.message, "API error (429): Too many requests");
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = provider(&server.uri(), Some("secret"))
            .chat(request())
            .await
            .unwrap_err();

        assert!(err.message.starts_with("Failed to parse response"));
        assert!(err.status_code.is_none());
    }

    #[tokio::test]
    async fn missing_key_fails_before_sending() {
        let err = provider("http://127.0.0.1:9", None)
            .chat(request())
            .await
            .unwrap_err();
        assert!(err.message.contains("API key"));
    }
}
