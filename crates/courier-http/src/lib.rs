//! Named, pooled HTTP clients with a fluent request builder.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - [`data`] - Immutable configuration and per-call context
//! - [`core`] - Pure transformations (URL templating, query merging, cookies)
//! - [`effects`] - I/O: transports, clients, the factory, requests and responses
//!
//! # Key Features
//!
//! - **Isolated Pools**: Every named client owns its own pooled transport, built once
//! - **Lazy Errors**: Misconfigured clients still hand out chainable requests that fail on I/O
//! - **Memoized Responses**: The body stream is read once; JSON is decoded once
//! - **Injectable Transport**: Clients are built from a [`TransportTemplate`], so tests can
//!   swap the network for a fake without touching global state
//!
//! # Example
//!
//! ```no_run
//! use courier_http::{ClientConfig, Factory, FactoryConfig};
//!
//! # async fn run() -> courier_http::Result<()> {
//! let config = FactoryConfig::new("github")
//!     .client("github", ClientConfig::new("https://api.github.com"));
//! let factory = Factory::new(config);
//!
//! let response = factory
//!     .client("github")
//!     .accept_json()
//!     .with_url_parameter("owner", "rust-lang")
//!     .get("/repos/{owner}/rust")
//!     .await?;
//!
//! if response.ok() {
//!     let repo = response.json().await?;
//!     println!("{}", repo["full_name"]);
//! }
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use data::{ClientConfig, Cookie, FactoryConfig, RequestContext};
pub use effects::{
    Binding, BindTarget, BodyStream, BoxStream, Client, Factory, Request, Response,
    ResponseFactory, ResponseSequence, ReqwestTemplate, ReqwestTransport, Transport,
    TransportRequest, TransportResponse, TransportTemplate, json_body,
};
pub use error::{ConfigError, Error, Result};

pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
pub use reqwest::{Method, StatusCode};
pub use url::Url;
