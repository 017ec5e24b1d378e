//! Deterministic fakes for `courier-http`.
//!
//! Register `(pattern, mock)` rules in a [`FakeState`], build a
//! [`Factory`](courier_http::Factory) through [`FakeState::factory`] (or wrap any
//! template with [`FakeState::template`]), and every request issued by its clients is
//! intercepted by a [`FakeTransport`].
//!
//! # Patterns
//!
//! | Pattern | Matches |
//! |---|---|
//! | `*` | any request |
//! | `domain.com` | `http://domain.com` or `https://domain.com` |
//! | `domain.com/*` | any path under the domain, either scheme |
//! | `https://exact.com/*` | only the given scheme |
//! | `client` | any request issued through the named client |
//! | `client#/path/*` | that client's requests whose path matches |
//!
//! When several rules match, the longest pattern wins; ties go to the pattern with
//! fewer `*`, then to lexical order.

mod error;
mod mock;
mod request;
mod rule;
mod state;
mod transport;

pub use error::{FakeError, Result};
pub use mock::{Handler, Mock};
pub use request::FakeRequest;
pub use rule::{FakeRule, MatchStrategy};
pub use state::FakeState;
pub use transport::{FakeTemplate, FakeTransport};
