use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{COOKIE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::form_urlencoded;

use crate::core::{build_url, cookie_header};
use crate::data::{Cookie, RequestContext};
use crate::effects::bind::{BindTarget, Binding};
use crate::effects::client::Client;
use crate::effects::response::Response;
use crate::effects::transport::TransportRequest;
use crate::error::{ConfigError, Error, Result};

/// Serialize `value` as a JSON request body.
pub fn json_body<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(value)?))
}

/// A fluent, cloneable request builder bound to one [`Client`].
///
/// Builder methods consume and return the request. [`Clone`] copies every collection
/// (headers, cookies, query and URL parameters), so a clone can be changed freely
/// without affecting the original.
///
/// A request produced for a client that failed to resolve is still a normal request:
/// it chains like any other and every terminal verb returns the stored
/// [`ConfigError`].
///
/// # URL construction
///
/// 1. A relative URI is prefixed with the base URL (per-request override first, then
///    the client's configured one).
/// 2. `{key}` tokens are replaced by URL parameters; unbound tokens stay as written.
/// 3. The result is parsed.
/// 4. Query parameters are appended to any query already present in the URI.
#[derive(Clone)]
pub struct Request {
    client:     std::result::Result<Arc<Client>, ConfigError>,
    headers:    Vec<(String, String)>,
    cookies:    Vec<Cookie>,
    query:      Vec<(String, String)>,
    url_params: HashMap<String, String>,
    bind:       Option<Arc<dyn BindTarget>>,
    context:    RequestContext,
    base_url:   Option<String>,
}

impl Request {
    pub fn new(client: Arc<Client>) -> Self {
        Self::with_client(Ok(client))
    }

    /// A lazy-error request: chainable, but every terminal verb fails with `error`.
    pub fn failed(error: ConfigError) -> Self {
        Self::with_client(Err(error))
    }

    fn with_client(client: std::result::Result<Arc<Client>, ConfigError>) -> Self {
        Self {
            client,
            headers: Vec::new(),
            cookies: Vec::new(),
            query: Vec::new(),
            url_params: HashMap::new(),
            bind: None,
            context: RequestContext::default(),
            base_url: None,
        }
    }

    pub fn client(&self) -> Option<&Arc<Client>> {
        self.client.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ConfigError> {
        self.client.as_ref().err()
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn url_params(&self) -> &HashMap<String, String> {
        &self.url_params
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Set `name`, replacing every existing value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Append a value to `name`, keeping existing values.
    #[must_use]
    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(self, |request, (k, v)| request.with_header(k, v))
    }

    /// Drop every header, then set `headers`.
    #[must_use]
    pub fn replace_headers<I, K, V>(self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.flush_headers().with_headers(headers)
    }

    #[must_use]
    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self
    }

    #[must_use]
    pub fn flush_headers(mut self) -> Self {
        self.headers.clear();
        self
    }

    #[must_use]
    pub fn accept(self, content_type: impl Into<String>) -> Self {
        self.with_header("Accept", content_type)
    }

    #[must_use]
    pub fn accept_json(self) -> Self {
        self.accept("application/json")
    }

    #[must_use]
    pub fn content_type(self, content_type: impl Into<String>) -> Self {
        self.with_header("Content-Type", content_type)
    }

    #[must_use]
    pub fn as_form(self) -> Self {
        self.content_type("application/x-www-form-urlencoded")
    }

    /// `Authorization: Bearer <token>`.
    #[must_use]
    pub fn with_token(self, token: impl AsRef<str>) -> Self {
        self.with_token_type("Bearer", token)
    }

    #[must_use]
    pub fn with_token_type(self, kind: impl AsRef<str>, token: impl AsRef<str>) -> Self {
        self.with_header(
            "Authorization",
            format!("{} {}", kind.as_ref(), token.as_ref()),
        )
    }

    #[must_use]
    pub fn without_token(self) -> Self {
        self.without_header("Authorization")
    }

    #[must_use]
    pub fn with_basic_auth(self, username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        let credentials = STANDARD.encode(format!("{}:{}", username.as_ref(), password.as_ref()));
        self.with_token_type("Basic", credentials)
    }

    /// Add a cookie, replacing any cookie of the same name.
    #[must_use]
    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.retain(|c| c.name != cookie.name);
        self.cookies.push(cookie);
        self
    }

    #[must_use]
    pub fn with_cookies(self, cookies: impl IntoIterator<Item = Cookie>) -> Self {
        cookies.into_iter().fold(self, Self::with_cookie)
    }

    #[must_use]
    pub fn without_cookie(mut self, name: &str) -> Self {
        self.cookies.retain(|c| c.name != name);
        self
    }

    /// Set a query parameter, replacing every existing value of `key`.
    #[must_use]
    pub fn with_query_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.query.retain(|(k, _)| *k != key);
        self.query.push((key, value.into()));
        self
    }

    /// Append a value to `key`, keeping existing values.
    #[must_use]
    pub fn add_query_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_query_parameters<I, K, V>(self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        params
            .into_iter()
            .fold(self, |request, (k, v)| request.with_query_parameter(k, v))
    }

    /// Parse a raw query string (`a=1&b=2`, leading `?` allowed) and append its pairs.
    #[must_use]
    pub fn with_query_string(mut self, query: &str) -> Self {
        let query = query.trim_start_matches('?');
        self.query.extend(
            form_urlencoded::parse(query.as_bytes()).map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
        self
    }

    #[must_use]
    pub fn without_query_parameter(mut self, key: &str) -> Self {
        self.query.retain(|(k, _)| k != key);
        self
    }

    /// Bind a value for `{key}` tokens in the URI.
    #[must_use]
    pub fn with_url_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_url_parameters<I, K, V>(self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        params
            .into_iter()
            .fold(self, |request, (k, v)| request.with_url_parameter(k, v))
    }

    #[must_use]
    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Give the request a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.context = self.context.with_timeout(timeout);
        self
    }

    /// Decode the response body into `target` before the terminal verb returns.
    #[must_use]
    pub fn bind<T>(mut self, target: &Binding<T>) -> Self
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.bind = Some(Arc::new(target.clone()));
        self
    }

    /// Override the client's base URL for this request.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// `GET uri`. The verbs below share the error cases of [`Request::send`].
    pub async fn get(&self, uri: &str) -> Result<Response> {
        self.send(Method::GET, uri, Bytes::new()).await
    }

    pub async fn head(&self, uri: &str) -> Result<Response> {
        self.send(Method::HEAD, uri, Bytes::new()).await
    }

    pub async fn options(&self, uri: &str) -> Result<Response> {
        self.send(Method::OPTIONS, uri, Bytes::new()).await
    }

    pub async fn post(&self, uri: &str, body: impl Into<Bytes>) -> Result<Response> {
        self.send(Method::POST, uri, body).await
    }

    pub async fn put(&self, uri: &str, body: impl Into<Bytes>) -> Result<Response> {
        self.send(Method::PUT, uri, body).await
    }

    pub async fn patch(&self, uri: &str, body: impl Into<Bytes>) -> Result<Response> {
        self.send(Method::PATCH, uri, body).await
    }

    pub async fn delete(&self, uri: &str, body: impl Into<Bytes>) -> Result<Response> {
        self.send(Method::DELETE, uri, body).await
    }

    /// Execute the request through the client's transport.
    ///
    /// `uri` is resolved against the base URL as described on [`Request`]. When a
    /// [`Binding`] is attached the body is read and decoded before this returns.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for a lazy-error request, before anything is sent.
    /// - [`Error::InvalidUrl`] or [`Error::InvalidHeader`] if the request cannot be built.
    /// - [`Error::DeadlineExceeded`] if the context deadline passes first.
    /// - Whatever the transport reports: [`Error::Transport`] from `reqwest`, or the fake
    ///   layer's [`Error::StrayRequest`], [`Error::HandlerReturnedNone`] and
    ///   [`Error::SequenceExhausted`].
    /// - [`Error::Json`] if a bound target fails to decode the body.
    ///
    /// A non-2xx status is not an error; inspect [`Response::status`].
    pub async fn send(&self, method: Method, uri: &str, body: impl Into<Bytes>) -> Result<Response> {
        let client = self.client.as_ref().map_err(|e| Error::Config(e.clone()))?;
        let request = self.to_transport_request(client, method, uri, body.into())?;

        tracing::debug!(
            client = client.name(),
            method = %request.method,
            url = %request.url,
            "sending request"
        );

        let response = Response::from_origin(client.execute(request).await?);
        if let Some(ref target) = self.bind {
            let body = response.body().await?;
            target.decode(&body)?;
        }
        Ok(response)
    }

    fn to_transport_request(
        &self,
        client: &Client,
        method: Method,
        uri: &str,
        body: Bytes,
    ) -> Result<TransportRequest> {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or(&client.config().base_url);
        let url = build_url(base, uri, &self.url_params, &self.query)?;

        Ok(TransportRequest {
            method,
            url,
            headers: self.header_map()?,
            body,
            context: self.context.clone().with_client_name(client.name()),
        })
    }

    fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            map.append(header_name(name)?, header_value(name, value)?);
        }
        if let Some(cookies) = cookie_header(&self.cookies) {
            map.append(COOKIE, header_value("Cookie", &cookies)?);
        }
        Ok(map)
    }
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidHeader {
        name:   name.to_string(),
        reason: e.to_string(),
    })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader {
        name:   name.to_string(),
        reason: e.to_string(),
    })
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("client", &self.client.as_ref().map(|c| c.name()))
            .field("headers", &self.headers)
            .field("cookies", &self.cookies)
            .field("query", &self.query)
            .field("url_params", &self.url_params)
            .field("bind", &self.bind.is_some())
            .field("context", &self.context)
            .field("base_url", &self.base_url)
            .finish()
    }
}
