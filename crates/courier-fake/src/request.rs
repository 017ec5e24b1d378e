use bytes::Bytes;
use courier_http::core::parse_cookie_header;
use courier_http::{Cookie, HeaderMap, Method, TransportRequest, Url};
use serde::de::DeserializeOwned;

/// A snapshot of one intercepted request.
///
/// Handlers and assertions receive this instead of the live [`TransportRequest`], so the
/// original can still be forwarded untouched.
#[derive(Debug, Clone)]
pub struct FakeRequest {
    method:      Method,
    url:         Url,
    headers:     HeaderMap,
    cookies:     Vec<Cookie>,
    body:        Bytes,
    client_name: Option<String>,
}

impl FakeRequest {
    pub fn capture(request: &TransportRequest) -> Self {
        let cookies = request
            .headers
            .get_all("cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_cookie_header)
            .collect();

        Self {
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            cookies,
            body: request.body.clone(),
            client_name: request.context.client_name().map(str::to_string),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of `name` if it is valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn has_header(&self, name: &str, value: &str) -> bool {
        self.headers
            .get_all(name)
            .iter()
            .any(|v| v.to_str().is_ok_and(|v| v == value))
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&Cookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body as text, invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Name of the client that issued the request, if it came through a factory client.
    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// Whether the request was sent to `method` and `url` (compared as written).
    pub fn is(&self, method: Method, url: &str) -> bool {
        self.method == method && self.url.as_str().trim_end_matches('/') == url.trim_end_matches('/')
    }
}
