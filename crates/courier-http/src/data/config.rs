use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for one named client.
///
/// Every field has a default, so a client declared without settings still resolves:
///
/// | Field | Default |
/// |---|---|
/// | `base_url` | empty (URIs must then be absolute) |
/// | `timeout` | 30s |
/// | `max_idle_conns` | 100 |
/// | `max_idle_conns_per_host` | 2 |
/// | `max_conns_per_host` | 0 (unlimited) |
/// | `idle_conn_timeout` | 90s |
///
/// Durations are (de)serialized as seconds.
///
/// # Examples
///
/// ```
/// use courier_http::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("https://api.stripe.com")
///     .timeout(Duration::from_secs(10))
///     .max_idle_conns_per_host(16);
/// assert_eq!(config.base_url, "https://api.stripe.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,

    /// Whole-request timeout applied by the transport. Zero disables it.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    /// Upper bound on idle connections across all hosts.
    ///
    /// The reqwest transport only bounds idle connections per host; this value is kept
    /// for transports that support a global limit.
    pub max_idle_conns: usize,

    pub max_idle_conns_per_host: usize,

    /// Upper bound on connections per host, 0 meaning unlimited.
    ///
    /// Enforcement is delegated to the transport; reqwest has no such knob.
    pub max_conns_per_host: usize,

    /// How long an idle pooled connection is kept. Zero keeps it forever.
    #[serde(with = "duration_secs")]
    pub idle_conn_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(30),
            max_idle_conns: 100,
            max_idle_conns_per_host: 2,
            max_conns_per_host: 0,
            idle_conn_timeout: Duration::from_secs(90),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_idle_conns(mut self, max: usize) -> Self {
        self.max_idle_conns = max;
        self
    }

    #[must_use]
    pub fn max_idle_conns_per_host(mut self, max: usize) -> Self {
        self.max_idle_conns_per_host = max;
        self
    }

    #[must_use]
    pub fn max_conns_per_host(mut self, max: usize) -> Self {
        self.max_conns_per_host = max;
        self
    }

    #[must_use]
    pub fn idle_conn_timeout(mut self, timeout: Duration) -> Self {
        self.idle_conn_timeout = timeout;
        self
    }
}

/// The named-client table consumed by [`Factory`](crate::Factory).
///
/// `default` must name a key of `clients` for the default client to resolve.
///
/// ```toml
/// default = "github"
///
/// [clients.github]
/// base_url = "https://api.github.com"
/// timeout = 10
///
/// [clients.stripe]
/// base_url = "https://api.stripe.com"
/// max_idle_conns_per_host = 16
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryConfig {
    pub default: String,
    pub clients: HashMap<String, ClientConfig>,
}

impl FactoryConfig {
    /// Prefix of environment variables layered over the file by [`FactoryConfig::load`].
    pub const ENV_PREFIX: &str = "COURIER_HTTP_";

    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            clients: HashMap::new(),
        }
    }

    /// Register (or replace) a named client.
    #[must_use]
    pub fn client(mut self, name: impl Into<String>, config: ClientConfig) -> Self {
        self.clients.insert(name.into(), config);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ClientConfig> {
        self.clients.get(name)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Load from a TOML file, then let `COURIER_HTTP_*` environment variables override it.
    ///
    /// Nested keys are separated by `__`, e.g. `COURIER_HTTP_CLIENTS__GITHUB__TIMEOUT=5`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(Self::ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
    }
}
