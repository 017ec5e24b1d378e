//! Error types for courier-fake.

use thiserror::Error;

pub type Result<T, E = FakeError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum FakeError {
    #[error("invalid fake pattern {pattern}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
