use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, SET_COOKIE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::core::parse_set_cookie;
use crate::data::Cookie;
use crate::effects::transport::{BodyStream, TransportResponse};
use crate::error::{Error, Result};

/// An HTTP response with a memoized body.
///
/// The underlying stream is read at most once, on the first call to [`Response::body`]
/// (or anything derived from it). Decoded JSON is cached the same way. Clones share the
/// cache, so a canned response can be handed out many times.
#[derive(Clone)]
pub struct Response {
    inner: Arc<Inner>,
}

struct Inner {
    status:  StatusCode,
    headers: HeaderMap,
    state:   Mutex<BodyState>,
}

#[derive(Default)]
struct BodyState {
    stream: Option<BodyStream>,
    body:   Option<Bytes>,
    failed: Option<String>,
    json:   Option<Value>,
}

impl Response {
    /// Wrap a transport response; its body is left unread.
    pub fn from_origin(origin: TransportResponse) -> Self {
        Self::with_state(origin.status, origin.headers, BodyState {
            stream: Some(origin.body),
            ..BodyState::default()
        })
    }

    /// A response whose body is already known.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self::with_state(status, headers, BodyState {
            body: Some(body),
            ..BodyState::default()
        })
    }

    fn with_state(status: StatusCode, headers: HeaderMap, state: BodyState) -> Self {
        Self {
            inner: Arc::new(Inner {
                status,
                headers,
                state: Mutex::new(state),
            }),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.inner.headers
    }

    /// First value of `name`, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
    }

    /// Cookies set by the response, in header order.
    pub fn cookies(&self) -> Vec<Cookie> {
        self.inner
            .headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect()
    }

    pub fn cookie(&self, name: &str) -> Option<Cookie> {
        self.cookies().into_iter().find(|c| c.name == name)
    }

    /// The full body, read from the stream on first use and cached afterwards.
    ///
    /// If the stream fails midway, the partial bytes are discarded: the first call gets
    /// the stream error and every later read gets [`Error::BodyRead`].
    pub async fn body(&self) -> Result<Bytes> {
        let mut state = self.inner.state.lock().await;
        Self::read_body(&mut state).await
    }

    /// The body as text; invalid UTF-8 is replaced.
    pub async fn text(&self) -> Result<String> {
        let body = self.body().await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// The body decoded as JSON, decoded once and cached.
    pub async fn json(&self) -> Result<Value> {
        let mut state = self.inner.state.lock().await;
        if let Some(ref json) = state.json {
            return Ok(json.clone());
        }
        let body = Self::read_body(&mut state).await?;
        let json: Value = serde_json::from_slice(&body)?;
        state.json = Some(json.clone());
        Ok(json)
    }

    /// Decode the body into `T`.
    pub async fn bind<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self.body().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// A fresh transport response carrying the cached body.
    ///
    /// This is how one canned response is replayed for many requests.
    pub async fn to_origin(&self) -> Result<TransportResponse> {
        let body = self.body().await?;
        Ok(TransportResponse::from_bytes(
            self.inner.status,
            self.inner.headers.clone(),
            body,
        ))
    }

    async fn read_body(state: &mut BodyState) -> Result<Bytes> {
        if let Some(ref body) = state.body {
            return Ok(body.clone());
        }
        if let Some(ref reason) = state.failed {
            return Err(Error::BodyRead(reason.clone()));
        }

        let mut buf = BytesMut::new();
        if let Some(mut stream) = state.stream.take() {
            loop {
                match stream.try_next().await {
                    Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
                    Ok(None) => break,
                    Err(e) => {
                        state.failed = Some(e.to_string());
                        return Err(e);
                    }
                }
            }
        }

        let body = buf.freeze();
        state.body = Some(body.clone());
        Ok(body)
    }

    /// 2xx.
    pub fn successful(&self) -> bool {
        self.status().is_success()
    }

    /// 4xx or 5xx.
    pub fn failed(&self) -> bool {
        self.client_error() || self.server_error()
    }

    pub fn client_error(&self) -> bool {
        self.status().is_client_error()
    }

    pub fn server_error(&self) -> bool {
        self.status().is_server_error()
    }

    pub fn redirect(&self) -> bool {
        self.status().is_redirection()
    }

    pub fn ok(&self) -> bool {
        self.status() == StatusCode::OK
    }

    pub fn created(&self) -> bool {
        self.status() == StatusCode::CREATED
    }

    pub fn accepted(&self) -> bool {
        self.status() == StatusCode::ACCEPTED
    }

    pub fn no_content(&self) -> bool {
        self.status() == StatusCode::NO_CONTENT
    }

    pub fn moved_permanently(&self) -> bool {
        self.status() == StatusCode::MOVED_PERMANENTLY
    }

    pub fn found(&self) -> bool {
        self.status() == StatusCode::FOUND
    }

    pub fn bad_request(&self) -> bool {
        self.status() == StatusCode::BAD_REQUEST
    }

    pub fn unauthorized(&self) -> bool {
        self.status() == StatusCode::UNAUTHORIZED
    }

    pub fn payment_required(&self) -> bool {
        self.status() == StatusCode::PAYMENT_REQUIRED
    }

    pub fn forbidden(&self) -> bool {
        self.status() == StatusCode::FORBIDDEN
    }

    pub fn not_found(&self) -> bool {
        self.status() == StatusCode::NOT_FOUND
    }

    pub fn request_timeout(&self) -> bool {
        self.status() == StatusCode::REQUEST_TIMEOUT
    }

    pub fn conflict(&self) -> bool {
        self.status() == StatusCode::CONFLICT
    }

    pub fn unprocessable_entity(&self) -> bool {
        self.status() == StatusCode::UNPROCESSABLE_ENTITY
    }

    pub fn too_many_requests(&self) -> bool {
        self.status() == StatusCode::TOO_MANY_REQUESTS
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.inner.status)
            .field("headers", &self.inner.headers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::{StreamExt, stream};
    use reqwest::header::HeaderValue;

    use super::*;

    fn counted_origin(chunks: &[&'static str], reads: Arc<AtomicUsize>) -> TransportResponse {
        let chunks: Vec<Result<Bytes>> = chunks.iter().map(|c| Ok(Bytes::from(*c))).collect();
        let body = stream::iter(chunks).inspect(move |_| {
            reads.fetch_add(1, Ordering::SeqCst);
        });
        TransportResponse::new(StatusCode::OK, HeaderMap::new(), Box::pin(body))
    }

    #[tokio::test]
    async fn test_body_reads_stream_once() {
        let reads = Arc::new(AtomicUsize::new(0));
        let response = Response::from_origin(counted_origin(&["hello ", "world"], reads.clone()));

        assert_eq!(response.body().await.unwrap(), Bytes::from("hello world"));
        assert_eq!(reads.load(Ordering::SeqCst), 2);

        assert_eq!(response.body().await.unwrap(), Bytes::from("hello world"));
        assert_eq!(response.text().await.unwrap(), "hello world");
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clones_share_cache() {
        let reads = Arc::new(AtomicUsize::new(0));
        let response = Response::from_origin(counted_origin(&["{}"], reads.clone()));
        let clone = response.clone();

        response.body().await.unwrap();
        clone.body().await.unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_json_is_memoized() {
        let reads = Arc::new(AtomicUsize::new(0));
        let response =
            Response::from_origin(counted_origin(&[r#"{"id": 7, "tags": ["a"]}"#], reads.clone()));

        let first = response.json().await.unwrap();
        let second = response.json().await.unwrap();
        assert_eq!(first["id"], 7);
        assert_eq!(first, second);
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_json_single_read() {
        let reads = Arc::new(AtomicUsize::new(0));
        let response = Response::from_origin(counted_origin(&[r#"{"ok": true}"#], reads.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let response = response.clone();
            handles.push(tokio::spawn(async move { response.json().await.unwrap() }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap()["ok"], true);
        }
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_json_decode_error() {
        let response = Response::from_bytes(StatusCode::OK, HeaderMap::new(), Bytes::from("nope"));
        assert!(matches!(response.json().await, Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn test_bind() {
        #[derive(serde::Deserialize)]
        struct User {
            name: String,
        }

        let response = Response::from_bytes(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from(r#"{"name": "ada"}"#),
        );
        let user: User = response.bind().await.unwrap();
        assert_eq!(user.name, "ada");
    }

    #[tokio::test]
    async fn test_stream_failure_is_never_served_as_body() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from(r#"{"items": [1, 2"#)),
            Err(Error::DeadlineExceeded),
        ];
        let origin = TransportResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            Box::pin(stream::iter(chunks)),
        );
        let response = Response::from_origin(origin);
        let other_reader = response.clone();

        assert!(matches!(response.body().await, Err(Error::DeadlineExceeded)));
        assert!(matches!(
            other_reader.text().await,
            Err(Error::BodyRead(ref reason)) if reason == "request deadline exceeded"
        ));
        assert!(matches!(response.json().await, Err(Error::BodyRead(_))));
        assert!(matches!(response.bind::<serde_json::Value>().await, Err(Error::BodyRead(_))));
        assert!(matches!(response.to_origin().await, Err(Error::BodyRead(_))));
    }

    #[tokio::test]
    async fn test_to_origin_replays() {
        let response = Response::from_bytes(StatusCode::ACCEPTED, HeaderMap::new(), Bytes::from("x"));
        for _ in 0..3 {
            let origin = response.to_origin().await.unwrap();
            let replayed = Response::from_origin(origin);
            assert!(replayed.accepted());
            assert_eq!(replayed.body().await.unwrap(), Bytes::from("x"));
        }
    }

    #[test]
    fn test_status_helpers() {
        let make = |code: u16| {
            Response::from_bytes(
                StatusCode::from_u16(code).unwrap(),
                HeaderMap::new(),
                Bytes::new(),
            )
        };

        assert!(make(200).ok() && make(200).successful() && !make(200).failed());
        assert!(make(201).created());
        assert!(make(202).accepted());
        assert!(make(204).no_content());
        assert!(make(301).moved_permanently() && make(301).redirect());
        assert!(make(302).found());
        assert!(make(400).bad_request() && make(400).client_error() && make(400).failed());
        assert!(make(401).unauthorized());
        assert!(make(402).payment_required());
        assert!(make(403).forbidden());
        assert!(make(404).not_found());
        assert!(make(408).request_timeout());
        assert!(make(409).conflict());
        assert!(make(422).unprocessable_entity());
        assert!(make(429).too_many_requests());
        assert!(make(503).server_error() && make(503).failed() && !make(503).client_error());
    }

    #[test]
    fn test_headers_and_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        headers.append(SET_COOKIE, HeaderValue::from_static("session=s1; Path=/; HttpOnly"));
        headers.append(SET_COOKIE, HeaderValue::from_static("theme=dark"));
        let response = Response::from_bytes(StatusCode::OK, headers, Bytes::new());

        assert_eq!(response.header("X-Request-Id"), Some("abc"));
        assert_eq!(response.header("missing"), None);
        assert_eq!(response.cookies().len(), 2);
        assert_eq!(response.cookie("theme"), Some(Cookie::new("theme", "dark")));
        assert_eq!(response.cookie("session").unwrap().value, "s1");
    }
}
