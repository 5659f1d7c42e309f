//! Assistant backend client

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use super::models::ChatRequest;
use super::models::ChatResponse;
use super::models::HistoryEntry;
use super::models::HistoryResponse;
use super::models::StatusResponse;
use crate::error::ApiError;

const CHAT_PATH: &str = "/asistente/chat";
const HISTORY_PATH: &str = "/asistente/chat/historial";
const STATUS_PATH: &str = "/asistente/claude/estado";

/// Deadlines per endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Used by any call without its own deadline.
    ///
    /// Default: 8 seconds
    pub default: Duration,
    /// Default: 30 seconds
    pub chat: Duration,
    /// Default: 5 seconds
    pub history: Duration,
    /// Default: 5 seconds
    pub status: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(8),
            chat: Duration::from_secs(30),
            history: Duration::from_secs(5),
            status: Duration::from_secs(5),
        }
    }
}

/// Client for the assistant backend.
///
/// Cheap to clone; clones share the connection pool.
///
/// # Example
///
/// ```ignore
/// let client = AssistantClient::builder()
///     .url("https://lab.example.org")
///     .chat_timeout(Duration::from_secs(20))
///     .build()?;
///
/// let available = client.status().await?;
/// ```
#[derive(Clone)]
pub struct AssistantClient {
    inner: Arc<AssistantClientInner>,
}

struct AssistantClientInner {
    base_url: Url,
    http_client: Client,
    timeouts: Timeouts,
}

impl AssistantClient {
    pub fn builder() -> AssistantClientBuilder<Missing> {
        AssistantClientBuilder::new()
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn timeouts(&self) -> Timeouts {
        self.inner.timeouts
    }

    /// Sends a chat message.
    ///
    /// The backend reports application failures with `success: false` and
    /// any status code, so a parseable body is returned as-is.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let timeout = self.inner.timeouts.chat;
        let url = self.endpoint(CHAT_PATH)?;
        let response = self
            .inner
            .http_client
            .post(url)
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ApiError::from_transport(e, CHAT_PATH, timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::from_transport(e, CHAT_PATH, timeout))?;
        match serde_json::from_str::<ChatResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(ApiError::http(status.as_u16(), body)),
            Err(e) => Err(ApiError::parse(e.to_string())),
        }
    }

    /// Loads the stored conversation.
    ///
    /// Backends without history support (404, 501) yield an empty history.
    pub async fn history(&self, limit: u32, protocol_id: Option<i64>) -> Result<Vec<HistoryEntry>, ApiError> {
        let timeout = self.inner.timeouts.history;
        let mut url = self.endpoint(HISTORY_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limite", &limit.to_string());
            if let Some(id) = protocol_id {
                query.append_pair("protocolo_id", &id.to_string());
            }
        }

        let response = self
            .inner
            .http_client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ApiError::from_transport(e, HISTORY_PATH, timeout))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::NOT_IMPLEMENTED {
            log::info!("AssistantClient: history not available ({})", status.as_u16());
            return Ok(Vec::new());
        }
        let history: HistoryResponse = Self::decode(response, HISTORY_PATH, timeout).await?;
        if !history.success {
            return Ok(Vec::new());
        }
        Ok(history.entries)
    }

    /// Returns `true` if the backend's language model is reachable.
    pub async fn status(&self) -> Result<bool, ApiError> {
        let timeout = self.inner.timeouts.status;
        let url = self.endpoint(STATUS_PATH)?;
        let response = self
            .inner
            .http_client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ApiError::from_transport(e, STATUS_PATH, timeout))?;
        let status: StatusResponse = Self::decode(response, STATUS_PATH, timeout).await?;
        Ok(status.assistant_available)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        resource: &str,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::http(status.as_u16(), body));
        }
        response
            .json()
            .await
            .map_err(|e| ApiError::from_transport(e, resource, timeout))
    }
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Marker type for a missing required builder field.
pub struct Missing;

/// Marker type for a set builder field.
pub struct Set<T>(T);

/// Builder for an [`AssistantClient`]. The base URL is required.
pub struct AssistantClientBuilder<U> {
    url: U,
    timeouts: Timeouts,
    http_client: Option<Client>,
}

impl AssistantClientBuilder<Missing> {
    pub fn new() -> Self {
        Self {
            url: Missing,
            timeouts: Timeouts::default(),
            http_client: None,
        }
    }

    /// Sets the backend's base URL.
    pub fn url(self, url: impl Into<String>) -> AssistantClientBuilder<Set<String>> {
        AssistantClientBuilder {
            url: Set(url.into()),
            timeouts: self.timeouts,
            http_client: self.http_client,
        }
    }
}

impl Default for AssistantClientBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> AssistantClientBuilder<U> {
    /// Deadline used when building the HTTP client.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.default = timeout;
        self
    }

    pub fn chat_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.chat = timeout;
        self
    }

    pub fn history_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.history = timeout;
        self
    }

    pub fn status_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.status = timeout;
        self
    }

    /// Uses a preconfigured HTTP client.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

impl AssistantClientBuilder<Set<String>> {
    pub fn build(self) -> Result<AssistantClient, ApiError> {
        let Set(raw) = self.url;
        let base_url = Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => Client::builder()
                .timeout(self.timeouts.default)
                .build()
                .map_err(ApiError::Network)?,
        };

        Ok(AssistantClient {
            inner: Arc::new(AssistantClientInner {
                base_url,
                http_client,
                timeouts: self.timeouts,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::body_json;
    use wiremock::matchers::method;
    use wiremock::matchers::path;
    use wiremock::matchers::query_param;

    use super::*;

    fn client(server: &MockServer) -> AssistantClient {
        AssistantClient::builder().url(server.uri()).build().unwrap()
    }

    fn request(message: &str) -> ChatRequest {
        ChatRequest {
            message: message.to_string(),
            protocol_id: None,
            history_ids: Vec::new(),
            study_type: String::new(),
            images: Vec::new(),
        }
    }

    #[test]
    fn test_invalid_url() {
        let result = AssistantClient::builder().url("not a url").build();
        assert!(matches!(result, Err(ApiError::InvalidUrl(_))));
    }

    #[test]
    fn test_default_timeouts() {
        let client = AssistantClient::builder().url("http://localhost").build().unwrap();
        assert_eq!(client.timeouts().chat, Duration::from_secs(30));
        assert_eq!(client.timeouts().status, Duration::from_secs(5));
        assert_eq!(client.timeouts().default, Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_chat_posts_wire_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .and(body_json(json!({"mensaje": "Hola", "protocolo_id": null, "historial_ids": [], "tipo_estudio": ""})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "respuesta": "¿En qué puedo ayudarte?",
                "claude_disponible": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server).chat(&request("Hola")).await.unwrap();
        assert!(response.success);
        assert_eq!(response.reply.as_deref(), Some("¿En qué puedo ayudarte?"));
    }

    #[tokio::test]
    async fn test_chat_failure_body_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "success": false,
                "error": "Servicio saturado",
                "claude_disponible": false
            })))
            .mount(&server)
            .await;

        let response = client(&server).chat(&request("Hola")).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.assistant_available, Some(false));
    }

    #[tokio::test]
    async fn test_chat_http_error_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client(&server).chat(&request("Hola")).await.unwrap_err();
        assert_eq!(err.status_code(), Some(500));
    }

    #[tokio::test]
    async fn test_chat_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(CHAT_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "respuesta": "tarde"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = AssistantClient::builder()
            .url(server.uri())
            .chat_timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let err = client.chat(&request("Hola")).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("/asistente/chat"));
    }

    #[tokio::test]
    async fn test_history_query_and_missing_route() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HISTORY_PATH))
            .and(query_param("limite", "20"))
            .and(query_param("protocolo_id", "9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "historial": [{"mensaje": "a", "respuesta": "b", "historial_id": 4}]
            })))
            .mount(&server)
            .await;

        let entries = client(&server).history(20, Some(9)).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].history_id, Some(4));

        let empty = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(HISTORY_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&empty)
            .await;
        assert!(client(&empty).history(20, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(STATUS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"claude_disponible": true})))
            .mount(&server)
            .await;

        assert!(client(&server).status().await.unwrap());
    }
}
