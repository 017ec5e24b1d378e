use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use courier_http::{
    ClientConfig, ConfigError, Error, Result, Transport, TransportRequest, TransportResponse,
    TransportTemplate,
};

use crate::request::FakeRequest;
use crate::state::FakeState;

/// A [`Transport`] that answers from a [`FakeState`] and forwards the rest to `base`.
///
/// Order of operations for each call:
/// 1. an expired deadline fails with [`Error::DeadlineExceeded`];
/// 2. the request is recorded;
/// 3. the most specific matching rule answers;
/// 4. an unmatched request is rejected with [`Error::StrayRequest`] when the stray policy
///    forbids it, and forwarded to `base` otherwise.
pub struct FakeTransport {
    state: Arc<FakeState>,
    base:  Arc<dyn Transport>,
}

impl FakeTransport {
    pub fn new(state: Arc<FakeState>, base: Arc<dyn Transport>) -> Self {
        Self { state, base }
    }

    pub fn state(&self) -> &Arc<FakeState> {
        &self.state
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn round_trip(&self, request: TransportRequest) -> Result<TransportResponse> {
        if request.context.is_expired() {
            return Err(Error::DeadlineExceeded);
        }

        let snapshot = FakeRequest::capture(&request);
        self.state.record(snapshot.clone());

        if let Some(rule) = self.state.matching(&snapshot) {
            tracing::debug!(
                pattern = rule.pattern(),
                method = %snapshot.method(),
                url = %snapshot.url(),
                "fake rule matched"
            );
            let response = rule.mock().resolve(&snapshot)?;
            return response.to_origin().await;
        }

        if !self.state.is_stray_allowed(&snapshot) {
            tracing::warn!(
                method = %snapshot.method(),
                url = %snapshot.url(),
                "rejected stray request"
            );
            return Err(Error::StrayRequest {
                method: request.method,
                url:    request.url.to_string(),
            });
        }

        self.base.round_trip(request).await
    }
}

impl fmt::Debug for FakeTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeTransport")
            .field("patterns", &self.state.patterns())
            .field("base", &"{ ... }")
            .finish()
    }
}

/// Wraps the transports of another template in [`FakeTransport`]s sharing one state.
pub struct FakeTemplate {
    state: Arc<FakeState>,
    base:  Arc<dyn TransportTemplate>,
}

impl FakeTemplate {
    pub fn new(state: Arc<FakeState>, base: Arc<dyn TransportTemplate>) -> Self {
        Self { state, base }
    }
}

impl TransportTemplate for FakeTemplate {
    fn build(
        &self,
        name: &str,
        config: &ClientConfig,
    ) -> std::result::Result<Arc<dyn Transport>, ConfigError> {
        let base = self.base.build(name, config)?;
        Ok(Arc::new(FakeTransport::new(self.state.clone(), base)))
    }
}

impl fmt::Debug for FakeTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeTemplate")
            .field("patterns", &self.state.patterns())
            .finish_non_exhaustive()
    }
}
