use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::error::{CoreError, CoreResult};

use super::retry::{with_retry, RetryPolicy};
use super::{
    command_prompt, fallback_test, strip_code_fences, test_prompt, CodeGenerator,
    GeneratedArtifact, GenerationError, GenerationRequest,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API client.
pub struct AnthropicGenerator {
    client: reqwest::Client,
    config: GenerationConfig,
    retry: RetryPolicy,
}

impl std::fmt::Debug for AnthropicGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicGenerator")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl AnthropicGenerator {
    pub fn new(config: GenerationConfig) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                CoreError::Internal(format!("failed to build http client: {error}"))
            })?;
        let retry = config.retry_policy();
        Ok(Self {
            client,
            config,
            retry,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One Messages API round trip, classified for retry.
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| GenerationError::NotConfigured("missing API key".to_string()))?;
        let url = format!("{}/messages", self.config.base_url.trim_end_matches('/'));
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let message = format!("generation service returned {status}: {detail}");
            return Err(if is_transient_status(status) {
                GenerationError::Transient(message)
            } else {
                GenerationError::Service(message)
            });
        }

        let parsed: MessagesResponse = response.json().await.map_err(|error| {
            GenerationError::Service(format!("invalid generation response: {error}"))
        })?;
        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .ok_or(GenerationError::Empty)
    }
}

#[async_trait]
impl CodeGenerator for AnthropicGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GeneratedArtifact, GenerationError> {
        tracing::info!("generating code for command {}", request.name);
        let prompt = command_prompt(request);
        let raw = with_retry(&self.retry, || self.complete(&prompt)).await?;
        let source = strip_code_fences(&raw);
        if source.is_empty() {
            return Err(GenerationError::Empty);
        }

        let prompt = test_prompt(request, &source);
        let test_source = match with_retry(&self.retry, || self.complete(&prompt)).await {
            Ok(raw) => {
                let test_source = strip_code_fences(&raw);
                if test_source.is_empty() {
                    fallback_test(&request.name)
                } else {
                    test_source
                }
            }
            Err(error) => {
                tracing::warn!("test generation for {} failed: {error}", request.name);
                fallback_test(&request.name)
            }
        };

        Ok(GeneratedArtifact {
            source,
            test_source: Some(test_source),
        })
    }
}

fn classify_transport_error(error: reqwest::Error) -> GenerationError {
    if error.is_timeout() || error.is_connect() {
        GenerationError::Transient(format!("generation request failed: {error}"))
    } else {
        GenerationError::Service(format!("generation request failed: {error}"))
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer) -> AnthropicGenerator {
        let config = GenerationConfig {
            api_key: Some("test-key".to_string()),
            base_url: server.uri(),
            ..GenerationConfig::default()
        };
        AnthropicGenerator::new(config)
            .expect("generator")
            .with_retry_policy(RetryPolicy {
                initial_backoff: Duration::ZERO,
                jitter: false,
                ..RetryPolicy::default()
            })
    }

    fn text_response(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": text }]
        }))
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            name: "calcx".to_string(),
            description: "adds two numbers".to_string(),
        }
    }

    #[tokio::test]
    async fn generates_source_and_tests() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(text_response("```rust\npub async fn calcx_handler() {}\n```"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(text_response("#[tokio::test]\nasync fn t() {}"))
            .mount(&server)
            .await;

        let artifact = generator(&server).generate(&request()).await.expect("artifact");
        assert_eq!(artifact.source, "pub async fn calcx_handler() {}");
        assert_eq!(
            artifact.test_source.as_deref(),
            Some("#[tokio::test]\nasync fn t() {}")
        );
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(529))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(text_response("fn ok() {}"))
            .mount(&server)
            .await;

        let artifact = generator(&server).generate(&request()).await.expect("artifact");
        assert_eq!(artifact.source, "fn ok() {}");
    }

    #[tokio::test]
    async fn client_errors_surface_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad model"))
            .expect(1)
            .mount(&server)
            .await;

        let error = generator(&server)
            .generate(&request())
            .await
            .expect_err("client error");
        assert!(matches!(error, GenerationError::Service(ref message) if message.contains("bad model")));
    }

    #[tokio::test]
    async fn exhausted_retries_report_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let error = generator(&server)
            .generate(&request())
            .await
            .expect_err("exhausted");
        assert!(matches!(error, GenerationError::Exhausted { attempts: 3, .. }));
        assert!(error.to_string().starts_with("failed to generate code after 3 attempts"));
    }

    #[tokio::test]
    async fn failed_test_generation_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(text_response("fn ok() {}"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let artifact = generator(&server).generate(&request()).await.expect("artifact");
        assert_eq!(artifact.test_source, Some(fallback_test("calcx")));
    }

    #[tokio::test]
    async fn empty_generation_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(text_response("```rust\n```"))
            .mount(&server)
            .await;

        let error = generator(&server)
            .generate(&request())
            .await
            .expect_err("empty");
        assert_eq!(error, GenerationError::Empty);
    }

    #[tokio::test]
    async fn missing_api_key_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(text_response("fn ok() {}"))
            .expect(0)
            .mount(&server)
            .await;
        let config = GenerationConfig {
            api_key: None,
            base_url: server.uri(),
            ..GenerationConfig::default()
        };
        let error = AnthropicGenerator::new(config)
            .expect("generator")
            .generate(&request())
            .await
            .expect_err("not configured");
        assert!(matches!(error, GenerationError::NotConfigured(_)));
    }
}
