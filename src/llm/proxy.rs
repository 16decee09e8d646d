//! Model-proxy HTTP client with automatic retry for rate-limited requests.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
use super::{ChatMessage, TemplateResponse, TextGenerator};

/// Client for the model-proxy service.
///
/// The proxy owns the actual model credentials and system prompt; this client
/// only ships conversations over and gets a single text blob back.
pub struct ProxyClient {
    client: Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl ProxyClient {
    /// Create a new proxy client with default retry configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: trim_trailing_slash(base_url.into()),
            retry_config: RetryConfig::default(),
        }
    }

    /// Create a new proxy client with custom retry configuration.
    pub fn with_retry_config(base_url: impl Into<String>, retry_config: RetryConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: trim_trailing_slash(base_url.into()),
            retry_config,
        }
    }

    /// Parse Retry-After header if present.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok().map(Duration::from_secs))
    }

    /// Create an LlmError from HTTP response status and body.
    fn create_error(
        status: reqwest::StatusCode,
        body: &str,
        retry_after: Option<Duration>,
    ) -> LlmError {
        let status_code = status.as_u16();
        match classify_http_status(status_code) {
            LlmErrorKind::RateLimited => LlmError::rate_limited(body.to_string(), retry_after),
            _ => LlmError::upstream(status_code, body.to_string()),
        }
    }

    /// Execute a single POST without retry, returning the raw response body.
    async fn execute_request<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<String, LlmError> {
        let url = format!("{}{}", self.base_url, path);
        let response = match self.client.post(&url).json(payload).send().await {
            Ok(r) => r,
            Err(e) => {
                if e.is_timeout() {
                    return Err(LlmError::network_error(format!("Request timeout: {}", e)));
                } else if e.is_connect() {
                    return Err(LlmError::network_error(format!("Connection failed: {}", e)));
                } else {
                    return Err(LlmError::network_error(format!("Request failed: {}", e)));
                }
            }
        };

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(Self::create_error(status, &body, retry_after));
        }

        Ok(body)
    }

    /// Execute a POST with automatic retry for rate-limited requests.
    ///
    /// Exhausting the attempt ceiling escalates the last rate-limit error to a
    /// terminal failure for this request.
    async fn execute_with_retry<T: Serialize>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<String, LlmError> {
        let mut attempt = 0;

        loop {
            match self.execute_request(path, payload).await {
                Ok(body) => {
                    if attempt > 0 {
                        tracing::info!("Proxy request succeeded after {} retries", attempt);
                    }
                    return Ok(body);
                }
                Err(error) => {
                    if !self.retry_config.should_retry(&error, attempt) {
                        if attempt > 0 {
                            tracing::error!(
                                "Proxy request failed after {} retries: {}",
                                attempt,
                                error
                            );
                        } else {
                            tracing::error!("Proxy request failed (non-retryable): {}", error);
                        }
                        return Err(error);
                    }

                    let delay = error.suggested_delay(attempt);
                    tracing::warn!(
                        "Retry attempt {} failed with {}, retrying in {:?}",
                        attempt + 1,
                        error.kind,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl TextGenerator for ProxyClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
    ) -> Result<String, LlmError> {
        let request = ChatRequest {
            messages: messages.to_vec(),
            system: system.map(str::to_string),
        };

        tracing::debug!("Sending {} messages to model proxy", messages.len());

        let body = self.execute_with_retry("/chat", &request).await?;
        let parsed: ChatResponseBody = serde_json::from_str(&body).map_err(|e| {
            LlmError::parse_error(format!("Failed to parse chat response: {}, body: {}", e, body))
        })?;

        parsed
            .content
            .or(parsed.response)
            .ok_or_else(|| LlmError::parse_error("No content in chat response".to_string()))
    }

    async fn fetch_template(&self, prompt: &str) -> Result<TemplateResponse, LlmError> {
        let request = TemplateRequest {
            prompt: prompt.to_string(),
        };

        let body = self.execute_with_retry("/template", &request).await?;
        serde_json::from_str(&body).map_err(|e| {
            LlmError::parse_error(format!(
                "Failed to parse template response: {}, body: {}",
                e, body
            ))
        })
    }
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

/// Chat request wire format.
#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

/// Chat response wire format. Older proxy builds used `response` instead of
/// `content`; accept both.
#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    response: Option<String>,
}

/// Template request wire format.
#[derive(Debug, Serialize)]
struct TemplateRequest {
    prompt: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Spawn a local stand-in proxy whose `/chat` returns `failures` rate-limit
    /// responses (with Retry-After: 0) before succeeding.
    async fn spawn_stub_proxy(failures: u32, failure_status: StatusCode) -> (String, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let hits_for_handler = Arc::clone(&hits);

        let app = Router::new()
            .route(
                "/chat",
                post(move |Json(_body): Json<serde_json::Value>| {
                    let hits = Arc::clone(&hits_for_handler);
                    async move {
                        let n = hits.fetch_add(1, Ordering::SeqCst);
                        if n < failures {
                            (
                                failure_status,
                                [(header::RETRY_AFTER, "0")],
                                Json(serde_json::json!({ "error": "try later" })),
                            )
                                .into_response()
                        } else {
                            (
                                StatusCode::OK,
                                Json(serde_json::json!({ "content": "<p>hello</p>" })),
                            )
                                .into_response()
                        }
                    }
                }),
            )
            .route(
                "/template",
                post(|Json(_body): Json<serde_json::Value>| async {
                    Json(serde_json::json!({
                        "message": "react",
                        "prompts": ["base", "starter"],
                        "uiprompt": "<boltAction type=\"file\" filePath=\"index.html\">hi</boltAction>",
                    }))
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}", addr), hits)
    }

    #[tokio::test]
    async fn rate_limit_retried_within_ceiling() {
        let (url, hits) = spawn_stub_proxy(2, StatusCode::TOO_MANY_REQUESTS).await;
        let client = ProxyClient::new(url);

        let content = client
            .generate(&[ChatMessage::user("build me a todo app")], None)
            .await
            .unwrap();

        assert_eq!(content, "<p>hello</p>");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn rate_limit_escalates_past_ceiling() {
        let (url, hits) = spawn_stub_proxy(10, StatusCode::TOO_MANY_REQUESTS).await;
        let client = ProxyClient::with_retry_config(url, RetryConfig { max_retries: 2 });

        let err = client
            .generate(&[ChatMessage::user("hi")], None)
            .await
            .unwrap_err();

        assert_eq!(err.kind, LlmErrorKind::RateLimited);
        // Initial attempt + 2 retries
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn upstream_failure_not_retried() {
        let (url, hits) = spawn_stub_proxy(10, StatusCode::INTERNAL_SERVER_ERROR).await;
        let client = ProxyClient::new(url);

        let err = client
            .generate(&[ChatMessage::user("hi")], None)
            .await
            .unwrap_err();

        assert_eq!(err.kind, LlmErrorKind::Upstream);
        assert_eq!(err.status_code, Some(500));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn template_fetch_parses_wire_format() {
        let (url, _hits) = spawn_stub_proxy(0, StatusCode::TOO_MANY_REQUESTS).await;
        let client = ProxyClient::new(url);

        let template = client.fetch_template("make a landing page").await.unwrap();

        assert_eq!(template.kind, crate::llm::TemplateKind::React);
        assert_eq!(template.prompts.len(), 2);
        assert!(template.starter.contains("index.html"));
    }
}
