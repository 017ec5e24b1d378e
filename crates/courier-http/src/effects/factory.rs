use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::data::{FactoryConfig, RequestContext};
use crate::effects::bind::Binding;
use crate::effects::client::Client;
use crate::effects::request::Request;
use crate::effects::response::Response;
use crate::effects::transport::{ReqwestTemplate, TransportTemplate};
use crate::error::{ConfigError, Result};

/// Owns the named-client pool.
///
/// Each configured name gets exactly one [`Client`] with its own transport, built on
/// first use from the injected [`TransportTemplate`]. The default client is resolved
/// when the factory is created; the factory itself proxies the common request entry
/// points to it.
///
/// Resolution never panics. A name that is not configured, or whose transport fails
/// to build, yields a lazy-error [`Request`].
pub struct Factory {
    config:   FactoryConfig,
    template: Arc<dyn TransportTemplate>,
    clients:  RwLock<HashMap<String, Arc<Client>>>,
    default:  Request,
}

impl Factory {
    /// A factory backed by pooled `reqwest` transports.
    pub fn new(config: FactoryConfig) -> Self {
        Self::with_template(config, Arc::new(ReqwestTemplate::new()))
    }

    pub fn with_template(config: FactoryConfig, template: Arc<dyn TransportTemplate>) -> Self {
        let mut factory = Self {
            config,
            template,
            clients: RwLock::new(HashMap::new()),
            default: Request::failed(ConfigError::MissingDefault),
        };
        factory.default = factory.resolve_default();
        factory
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub fn template(&self) -> &Arc<dyn TransportTemplate> {
        &self.template
    }

    /// A fresh request for the named client.
    pub fn client(&self, name: &str) -> Request {
        if !self.config.default.is_empty() && name == self.config.default {
            return self.default.clone();
        }
        self.resolve(name)
    }

    /// A fresh request for the default client.
    pub fn default_client(&self) -> Request {
        self.default.clone()
    }

    /// The shared client for `name`, building its transport on first use.
    ///
    /// Concurrent first calls may each build a transport; only the first one published
    /// is kept and the others adopt it.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownClient`] if `name` is not configured.
    /// - [`ConfigError::Transport`] if the template fails to build the transport; nothing
    ///   is cached, so a later call retries.
    pub fn client_for(&self, name: &str) -> Result<Arc<Client>, ConfigError> {
        if let Some(client) = self
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(client.clone());
        }

        let config = self
            .config
            .get(name)
            .ok_or_else(|| ConfigError::UnknownClient(name.to_string()))?;
        let transport = self.template.build(name, config)?;
        let built = Arc::new(Client::new(name, config.clone(), transport));

        let mut clients = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(clients.entry(name.to_string()).or_insert(built).clone())
    }

    fn resolve(&self, name: &str) -> Request {
        match self.client_for(name) {
            Ok(client) => client.new_request(),
            Err(e) => {
                tracing::warn!(client = name, error = %e, "failed to resolve HTTP client");
                Request::failed(e)
            }
        }
    }

    fn resolve_default(&self) -> Request {
        if self.config.default.is_empty() {
            tracing::warn!("default HTTP client is not configured");
            return Request::failed(ConfigError::MissingDefault);
        }
        self.resolve(&self.config.default)
    }

    /// Verbs and request options on the factory itself go to the default client.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingDefault`] (wrapped in [`Error::Config`](crate::Error::Config))
    /// when no default is configured, otherwise as [`Request::send`].
    pub async fn get(&self, uri: &str) -> Result<Response> {
        self.default.get(uri).await
    }

    pub async fn head(&self, uri: &str) -> Result<Response> {
        self.default.head(uri).await
    }

    pub async fn options(&self, uri: &str) -> Result<Response> {
        self.default.options(uri).await
    }

    pub async fn post(&self, uri: &str, body: impl Into<Bytes>) -> Result<Response> {
        self.default.post(uri, body).await
    }

    pub async fn put(&self, uri: &str, body: impl Into<Bytes>) -> Result<Response> {
        self.default.put(uri, body).await
    }

    pub async fn patch(&self, uri: &str, body: impl Into<Bytes>) -> Result<Response> {
        self.default.patch(uri, body).await
    }

    pub async fn delete(&self, uri: &str, body: impl Into<Bytes>) -> Result<Response> {
        self.default.delete(uri, body).await
    }

    pub fn with_header(&self, name: impl Into<String>, value: impl Into<String>) -> Request {
        self.default_client().with_header(name, value)
    }

    pub fn with_headers<I, K, V>(&self, headers: I) -> Request
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.default_client().with_headers(headers)
    }

    pub fn with_token(&self, token: impl AsRef<str>) -> Request {
        self.default_client().with_token(token)
    }

    pub fn with_query_parameter(&self, key: impl Into<String>, value: impl Into<String>) -> Request {
        self.default_client().with_query_parameter(key, value)
    }

    pub fn with_url_parameter(&self, key: impl Into<String>, value: impl Into<String>) -> Request {
        self.default_client().with_url_parameter(key, value)
    }

    pub fn with_context(&self, context: RequestContext) -> Request {
        self.default_client().with_context(context)
    }

    pub fn accept_json(&self) -> Request {
        self.default_client().accept_json()
    }

    pub fn bind<T>(&self, target: &Binding<T>) -> Request
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.default_client().bind(target)
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved: Vec<String> = self
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        f.debug_struct("Factory")
            .field("config", &self.config)
            .field("template", &"{ ... }")
            .field("resolved", &resolved)
            .finish()
    }
}
