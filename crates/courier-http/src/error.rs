//! Error types for courier-http.

use reqwest::Method;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Configuration failures.
///
/// These are captured when a client is resolved and replayed by every terminal verb of
/// the lazy-error request that carries them, so the type is cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("default HTTP client is not configured")]
    MissingDefault,

    #[error("HTTP client [{0}] is not configured")]
    UnknownClient(String),

    #[error("failed to build transport for client [{name}]: {reason}")]
    Transport { name: String, reason: String },

    #[error("failed to load HTTP client configuration: {0}")]
    Load(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stray request: {method} {url}")]
    StrayRequest { method: Method, url: String },

    #[error("fake handler for {method} {url} returned no response")]
    HandlerReturnedNone { method: Method, url: String },

    #[error("response sequence is exhausted")]
    SequenceExhausted,

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// An earlier read of the response body failed; carries that failure's message.
    #[error("response body could not be read: {0}")]
    BodyRead(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
