use std::path::Path;

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;

use crate::effects::response::Response;

/// Builds synthetic [`Response`]s from a body, a status and headers.
///
/// Construction never fails: an unusable status, a value that cannot be serialized or
/// an unreadable file all degrade to a `500` response whose body is the error text.
///
/// # Examples
///
/// ```
/// use courier_http::ResponseFactory;
///
/// let factory = ResponseFactory::new();
/// assert!(factory.string("pong", 200).ok());
/// assert!(factory.status(404).not_found());
/// assert!(factory.json(&serde_json::json!({"id": 1}), 201).created());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFactory;

impl ResponseFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn make(&self, body: impl Into<Bytes>, status: u16, headers: HeaderMap) -> Response {
        match StatusCode::from_u16(status) {
            Ok(status) => Response::from_bytes(status, headers, body.into()),
            Err(e) => Self::server_error(format!("invalid status code {status}: {e}")),
        }
    }

    pub fn string(&self, body: impl Into<String>, status: u16) -> Response {
        self.make(
            body.into(),
            status,
            Self::content_type("text/plain; charset=utf-8"),
        )
    }

    pub fn json<T: Serialize + ?Sized>(&self, value: &T, status: u16) -> Response {
        match serde_json::to_vec(value) {
            Ok(body) => self.make(body, status, Self::content_type("application/json")),
            Err(e) => Self::server_error(e.to_string()),
        }
    }

    /// An empty body with the given status.
    pub fn status(&self, status: u16) -> Response {
        self.make(Bytes::new(), status, HeaderMap::new())
    }

    /// The contents of `path` as an `application/octet-stream` body.
    pub fn file(&self, path: impl AsRef<Path>, status: u16) -> Response {
        match std::fs::read(path.as_ref()) {
            Ok(body) => self.make(body, status, Self::content_type("application/octet-stream")),
            Err(e) => Self::server_error(format!(
                "failed to read {}: {e}",
                path.as_ref().display()
            )),
        }
    }

    fn content_type(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(value));
        headers
    }

    fn server_error(message: String) -> Response {
        Response::from_bytes(
            StatusCode::INTERNAL_SERVER_ERROR,
            Self::content_type("text/plain; charset=utf-8"),
            Bytes::from(message),
        )
    }
}
