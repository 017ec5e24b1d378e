use std::fmt;
use std::sync::Arc;

use courier_http::{Error, Response, ResponseFactory, ResponseSequence, StatusCode};

use crate::request::FakeRequest;

/// A per-call response handler.
pub type Handler = Arc<dyn Fn(&FakeRequest) -> Option<Response> + Send + Sync>;

/// What a matched rule answers with.
///
/// The variant is chosen once, when the rule is registered; `From` conversions cover the
/// common shorthands.
///
/// | Value | Variant | Answer |
/// |---|---|---|
/// | `&str` / `String` | [`Mock::Text`] | `200` with a text body |
/// | `u16` / [`StatusCode`] | [`Mock::Status`] | the status, empty body |
/// | [`Response`] | [`Mock::Fixed`] | the same response on every call |
/// | [`ResponseSequence`] | [`Mock::Sequence`] | the next queued entry |
/// | [`Mock::handler`] | [`Mock::Dynamic`] | whatever the closure returns |
/// | `()` | [`Mock::Empty`] | bare `200` |
#[derive(Clone, Default)]
pub enum Mock {
    Text(String),
    Status(StatusCode),
    Fixed(Response),
    Sequence(Arc<ResponseSequence>),
    Dynamic(Handler),
    #[default]
    Empty,
}

impl Mock {
    /// Answer each call by invoking `f`; returning `None` fails the request.
    pub fn handler<F>(f: F) -> Self
    where
        F: Fn(&FakeRequest) -> Option<Response> + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    /// Produce the response for one intercepted request.
    pub fn resolve(&self, request: &FakeRequest) -> courier_http::Result<Response> {
        let factory = ResponseFactory::new();
        match self {
            Self::Text(body) => Ok(factory.string(body.clone(), 200)),
            Self::Status(status) => Ok(factory.status(status.as_u16())),
            Self::Fixed(response) => Ok(response.clone()),
            Self::Sequence(sequence) => sequence.get_next().ok_or(Error::SequenceExhausted),
            Self::Dynamic(handler) => handler(request).ok_or_else(|| Error::HandlerReturnedNone {
                method: request.method().clone(),
                url:    request.url().to_string(),
            }),
            Self::Empty => Ok(factory.status(200)),
        }
    }
}

impl fmt::Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(body) => f.debug_tuple("Text").field(body).finish(),
            Self::Status(status) => f.debug_tuple("Status").field(status).finish(),
            Self::Fixed(response) => f.debug_tuple("Fixed").field(&response.status()).finish(),
            Self::Sequence(sequence) => f
                .debug_struct("Sequence")
                .field("remaining", &sequence.remaining())
                .finish(),
            Self::Dynamic(_) => f.write_str("Dynamic({ ... })"),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

impl From<&str> for Mock {
    fn from(body: &str) -> Self {
        Self::Text(body.to_string())
    }
}

impl From<String> for Mock {
    fn from(body: String) -> Self {
        Self::Text(body)
    }
}

impl From<u16> for Mock {
    fn from(status: u16) -> Self {
        match StatusCode::from_u16(status) {
            Ok(status) => Self::Status(status),
            // Out-of-range codes become the factory's 500.
            Err(_) => Self::Fixed(ResponseFactory::new().status(status)),
        }
    }
}

impl From<StatusCode> for Mock {
    fn from(status: StatusCode) -> Self {
        Self::Status(status)
    }
}

impl From<Response> for Mock {
    fn from(response: Response) -> Self {
        Self::Fixed(response)
    }
}

impl From<ResponseSequence> for Mock {
    fn from(sequence: ResponseSequence) -> Self {
        Self::Sequence(Arc::new(sequence))
    }
}

impl From<Arc<ResponseSequence>> for Mock {
    fn from(sequence: Arc<ResponseSequence>) -> Self {
        Self::Sequence(sequence)
    }
}

impl From<()> for Mock {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}
