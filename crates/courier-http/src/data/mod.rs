//! Data layer: immutable configuration and per-call context.

mod config;
mod context;
mod cookie;

pub use config::{ClientConfig, FactoryConfig};
pub use context::RequestContext;
pub use cookie::Cookie;
