use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, TryStreamExt, stream};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use url::Url;

use crate::data::{ClientConfig, RequestContext};
use crate::error::{ConfigError, Error, Result};

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// The body of a [`TransportResponse`]: chunks until the stream ends or fails.
pub type BodyStream = BoxStream<'static, Result<Bytes>>;

/// A fully materialized outbound request.
///
/// The body is a shared buffer, so the request can be inspected, recorded and still
/// forwarded without being consumed.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method:  Method,
    pub url:     Url,
    pub headers: HeaderMap,
    pub body:    Bytes,
    pub context: RequestContext,
}

/// The raw response a transport hands back before it is wrapped in a
/// [`Response`](crate::Response).
pub struct TransportResponse {
    pub status:  StatusCode,
    pub headers: HeaderMap,
    pub body:    BodyStream,
}

impl TransportResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: BodyStream) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response whose body is already in memory.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self::new(status, headers, Box::pin(stream::once(async move { Ok::<_, Error>(body) })))
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &"{ ... }")
            .finish()
    }
}

/// Executes one request.
///
/// Implementations own their connection pooling and must honor the deadline in
/// [`TransportRequest::context`].
///
/// # Implementations
///
/// - [`ReqwestTransport`]: Production implementation using `reqwest`
/// - The fake transport of `courier-fake`, and test stubs
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// Builds the pooled transport of one named client.
///
/// The [`Factory`](crate::Factory) calls this at most once per published client name.
pub trait TransportTemplate: Send + Sync {
    fn build(&self, name: &str, config: &ClientConfig) -> Result<Arc<dyn Transport>, ConfigError>;
}

/// Production transport over a pooled [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn round_trip(&self, request: TransportRequest) -> Result<TransportResponse> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        if let Some(remaining) = request.context.remaining() {
            if remaining.is_zero() {
                return Err(Error::DeadlineExceeded);
            }
            builder = builder.timeout(remaining);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes_stream().map_err(Error::from);

        Ok(TransportResponse::new(status, headers, Box::pin(body)))
    }
}

/// Template producing one [`ReqwestTransport`] per named client.
///
/// Settings shared by every client live here; the per-client pool sizing and timeouts
/// come from [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTemplate {
    connect_timeout: Option<Duration>,
    user_agent:      Option<String>,
}

impl ReqwestTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    fn builder(&self, config: &ClientConfig) -> reqwest::ClientBuilder {
        let mut builder = reqwest::Client::builder()
            .pool_max_idle_per_host(config.max_idle_conns_per_host);

        if !config.idle_conn_timeout.is_zero() {
            builder = builder.pool_idle_timeout(config.idle_conn_timeout);
        } else {
            builder = builder.pool_idle_timeout(None);
        }
        if !config.timeout.is_zero() {
            builder = builder.timeout(config.timeout);
        }
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(ref user_agent) = self.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        builder
    }
}

impl TransportTemplate for ReqwestTemplate {
    fn build(&self, name: &str, config: &ClientConfig) -> Result<Arc<dyn Transport>, ConfigError> {
        let client = self
            .builder(config)
            .build()
            .map_err(|e| ConfigError::Transport {
                name:   name.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            client = name,
            base_url = %config.base_url,
            max_idle_conns_per_host = config.max_idle_conns_per_host,
            "built pooled transport"
        );
        Ok(Arc::new(ReqwestTransport::new(client)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_transport_response_from_bytes() {
        let mut response =
            TransportResponse::from_bytes(StatusCode::CREATED, HeaderMap::new(), Bytes::from("hi"));
        assert_eq!(response.status, StatusCode::CREATED);
        let chunk = response.body.next().await.unwrap().unwrap();
        assert_eq!(chunk, Bytes::from("hi"));
        assert!(response.body.next().await.is_none());
    }

    #[test]
    fn test_reqwest_template_builds_distinct_transports() {
        let template = ReqwestTemplate::new()
            .connect_timeout(Duration::from_secs(1))
            .user_agent("courier-test");
        let config = ClientConfig::default().idle_conn_timeout(Duration::ZERO);

        let a = template.build("a", &config).unwrap();
        let b = template.build("a", &config).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_reqwest_transport_rejects_expired_deadline() {
        let transport = ReqwestTransport::new(reqwest::Client::new());
        let request = TransportRequest {
            method:  Method::GET,
            url:     Url::parse("http://127.0.0.1:9/").unwrap(),
            headers: HeaderMap::new(),
            body:    Bytes::new(),
            context: RequestContext::new().with_timeout(Duration::ZERO),
        };
        let err = transport.round_trip(request).await.unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded));
    }
}
