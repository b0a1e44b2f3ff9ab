use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

/// Prefix of the environment variables that override configuration defaults,
/// e.g. `STORE_DB_HOST`, `STORE_HTTP_PORT`.
pub const ENV_PREFIX: &str = "STORE";

/// `AppConfig` holds all configuration parameters required by the storefront backend.
///
/// Values come from built-in defaults, optionally overridden by a `.env` file
/// and `STORE_*` environment variables. This struct is deserializable via Serde.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AppConfig {
    // --- Database settings ---
    /// Database hostname or service name.
    pub db_host: String,
    /// Database port (default: 5432).
    pub db_port: u16,
    /// Database user.
    pub db_user: String,
    /// Database password.
    pub db_password: String,
    /// Database name.
    pub db_name: String,
    /// Maximum number of pooled connections.
    pub db_pool_size: usize,
    /// Directory holding the `.sql` migrations applied at start-up.
    pub migrations_dir: String,

    // --- HTTP server ---
    /// The port on which the HTTP server will listen.
    pub http_port: u16,

    // --- Auth ---
    /// HMAC secret used to verify bearer tokens.
    pub jwt_secret: String,
    /// Longest token lifetime (`exp - iat`) the admin guard accepts,
    /// human-friendly format, e.g. "24h".
    #[serde(deserialize_with = "deserialize_duration")]
    pub jwt_max_age: Duration,

    // --- Orders ---
    /// Sentinel e-mail of the account owning all unauthenticated orders.
    pub guest_email: String,
}

/// Accepts human-readable durations like "30m", "24h".
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let val = String::deserialize(deserializer)?;
    humantime::parse_duration(&val)
        .map_err(|e| D::Error::custom(format!("Invalid duration '{val}': {e}")))
}

impl AppConfig {
    /// Loads configuration from defaults, the `.env` file and `STORE_*` variables.
    ///
    /// # Errors
    /// Returns an error if an override has the wrong type or cannot be parsed.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            // Database
            .set_default("db_host", "localhost")?
            .set_default("db_port", 5432)?
            .set_default("db_user", "store_user")?
            .set_default("db_password", "securepassword")?
            .set_default("db_name", "store_db")?
            .set_default("db_pool_size", 16)?
            .set_default("migrations_dir", "migrations")?
            // HTTP
            .set_default("http_port", 3333)?
            // Auth
            .set_default("jwt_secret", "change-me")?
            .set_default("jwt_max_age", "24h")?
            // Orders
            .set_default("guest_email", "guest@lanternstore.com")?
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        settings
            .try_deserialize()
            .context("Failed to load configuration")
    }

    /// Key/value connection string understood by `tokio_postgres::Config`.
    pub fn db_dsn(&self) -> String {
        format!(
            "host={} port={} user={} password={} dbname={} sslmode=disable",
            self.db_host, self.db_port, self.db_user, self.db_password, self.db_name
        )
    }
}
