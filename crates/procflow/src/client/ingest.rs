//! Ingestion HTTP transport
//!
//! Posts one wire event per request as JSON. A single call is a single
//! delivery attempt: retries and backoff belong to the delivery queue, which
//! owns ordering.
//!
//! A non-success status, a transport failure and a reply whose `success`
//! flag is not `true` are all reported as [`DeliveryError`]s.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};

use crate::contracts::{IngestResponse, WireEvent};
use crate::error::DeliveryError;

/// Default ingestion endpoint of the local flow server
pub const DEFAULT_INGEST_ENDPOINT: &str = "http://localhost:27182/api/flow";

/// One delivery attempt to the ingestion boundary
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one event; `Ok` only when the service confirmed success
    async fn deliver(&self, event: &WireEvent) -> Result<IngestResponse, DeliveryError>;

    /// Where events are delivered, for logging
    fn endpoint(&self) -> &str;
}

/// HTTP transport backed by `reqwest`
pub struct HttpTransport {
    client: Client,
    endpoint: String,
    method: Method,
    headers: HeaderMap,
}

impl HttpTransport {
    /// POST JSON to `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Self {
        HttpTransportBuilder::new().endpoint(endpoint).build()
    }

    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, event: &WireEvent) -> Result<IngestResponse, DeliveryError> {
        let body = serde_json::to_vec(event)?;

        let response = self
            .client
            .request(self.method.clone(), &self.endpoint)
            .headers(self.headers.clone())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: IngestResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Http(format!("Failed to parse response: {}", e)))?;

        if !reply.success {
            return Err(DeliveryError::Rejected(event.id.clone()));
        }

        tracing::debug!(
            process_id = %event.id,
            status = %event.status,
            "Ingestion endpoint accepted event"
        );
        Ok(reply)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Builder for HttpTransport
pub struct HttpTransportBuilder {
    endpoint: String,
    method: Method,
    headers: HeaderMap,
    client: Option<Client>,
}

impl HttpTransportBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            endpoint: DEFAULT_INGEST_ENDPOINT.to_string(),
            method: Method::POST,
            headers,
            client: None,
        }
    }

    /// Set the ingestion endpoint URL
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the HTTP method
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a request header; invalid names or values are ignored with a warning
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "Ignoring invalid ingestion header"),
        }
        self
    }

    /// Use a preconfigured `reqwest` client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Build the transport
    pub fn build(self) -> HttpTransport {
        HttpTransport {
            client: self.client.unwrap_or_default(),
            endpoint: self.endpoint,
            method: self.method,
            headers: self.headers,
        }
    }
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Flow, ProcessRecord};
    use crate::value::ProcessValue;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event() -> WireEvent {
        WireEvent::pending(&ProcessRecord::new(
            "p1",
            &Flow::with_id("f", None),
            ProcessValue::object(),
        ))
    }

    #[test]
    fn test_builder_defaults() {
        let transport = HttpTransport::builder().build();
        assert_eq!(transport.endpoint(), DEFAULT_INGEST_ENDPOINT);
        assert_eq!(transport.method(), &Method::POST);
        assert_eq!(
            transport.headers.get(CONTENT_TYPE).unwrap().to_str().unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_builder_ignores_invalid_header() {
        let transport = HttpTransport::builder()
            .header("X-Flow-Client", "procflow")
            .header("bad header", "x")
            .build();
        assert_eq!(
            transport.headers.get("x-flow-client").unwrap().to_str().unwrap(),
            "procflow"
        );
        assert_eq!(transport.headers.len(), 2);
    }

    #[tokio::test]
    async fn test_deliver_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/flow"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(serde_json::json!({"id": "p1", "status": "pending"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(format!("{}/api/flow", server.uri()));
        let reply = transport.deliver(&event()).await.unwrap();
        assert!(reply.success);
    }

    #[tokio::test]
    async fn test_deliver_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("storage down"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri());
        let err = transport.deliver(&event()).await.unwrap_err();
        assert!(
            matches!(err, DeliveryError::Status { status: 500, ref body } if body == "storage down")
        );
    }

    #[tokio::test]
    async fn test_deliver_unconfirmed_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": false})),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri());
        let err = transport.deliver(&event()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected(id) if id == "p1"));
    }

    #[tokio::test]
    async fn test_deliver_connection_refused() {
        // Port 9 (discard) is not expected to accept HTTP connections.
        let transport = HttpTransport::new("http://127.0.0.1:9/api/flow");
        let err = transport.deliver(&event()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Http(_)));
    }
}
