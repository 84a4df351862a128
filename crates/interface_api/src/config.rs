//! API configuration

use serde::Deserialize;

/// Which ledger store the server runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Postgres,
    /// Process-local store, lost on restart
    Memory,
}

/// API configuration
///
/// Every field can be set through an `API_`-prefixed environment variable,
/// e.g. `API_PORT=9090` or `API_DEFAULT_LOCALE=es-AR`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Secret used to sign and verify bearer tokens
    pub jwt_secret: String,
    /// Token lifetime in seconds
    pub jwt_expiration_secs: u64,
    pub database_url: String,
    /// Upper bound of the PostgreSQL pool
    pub max_connections: u32,
    pub store: StoreKind,
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,
    /// Locale for error messages when `Accept-Language` matches nothing
    pub default_locale: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/ledger".to_string(),
            max_connections: 10,
            store: StoreKind::Postgres,
            log_level: "info".to_string(),
            default_locale: "en-US".to_string(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `API_*` environment variables over the defaults
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
