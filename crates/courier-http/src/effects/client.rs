use std::fmt;
use std::sync::Arc;

use crate::data::ClientConfig;
use crate::effects::request::Request;
use crate::effects::transport::{Transport, TransportRequest, TransportResponse};
use crate::error::Result;

/// One named HTTP endpoint: its configuration and its own pooled transport.
pub struct Client {
    name:      String,
    config:    ClientConfig,
    transport: Arc<dyn Transport>,
}

impl Client {
    pub fn new(name: impl Into<String>, config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: name.into(),
            config,
            transport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// A fresh request bound to this client.
    pub fn new_request(self: &Arc<Self>) -> Request {
        Request::new(self.clone())
    }

    pub(crate) async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        self.transport.round_trip(request).await
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
