use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "usd";
const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_PAYMENT_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_SHIPPING_LABEL: &str = "Standard Shipping";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;

/// Application configuration with validation.
///
/// Values are layered from `config/default.toml`, an environment-specific
/// file (`config/<env>.toml`), and `APP_`-prefixed environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_env")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to create missing tables on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// ISO currency code used for all orders
    #[validate(length(min = 3, max = 3))]
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Public base URL the provider redirects buyers back to
    #[validate(custom = "validate_http_url")]
    #[serde(default = "default_base_url")]
    pub public_base_url: String,

    /// Payment provider API base URL (overridable for testing)
    #[validate(custom = "validate_http_url")]
    #[serde(default = "default_payment_api_base")]
    pub payment_api_base: String,

    /// Payment provider secret API key
    #[serde(default)]
    pub payment_secret_key: String,

    /// Shared secret for webhook signature verification. When unset,
    /// webhook payloads are parsed without verification (bootstrap/dev only).
    #[serde(default)]
    pub payment_webhook_secret: Option<String>,

    /// Maximum accepted age of a signed webhook timestamp, in seconds
    #[serde(default = "default_webhook_tolerance")]
    pub payment_webhook_tolerance_secs: u64,

    /// Flat shipping rate applied to every order, in cents
    #[serde(default)]
    pub shipping_flat_rate_cents: i64,

    /// Label shown for the shipping line item
    #[serde(default = "default_shipping_label")]
    pub shipping_label: String,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB connect timeout (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_env() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_payment_api_base() -> String {
    DEFAULT_PAYMENT_API_BASE.to_string()
}
fn default_shipping_label() -> String {
    DEFAULT_SHIPPING_LABEL.to_string()
}
fn default_webhook_tolerance() -> u64 {
    DEFAULT_WEBHOOK_TOLERANCE_SECS
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn validate_http_url(value: &str) -> Result<(), validator::ValidationError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_url"))
    }
}

impl AppConfig {
    /// Minimal constructor used by tests and tooling.
    pub fn new(database_url: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: default_host(),
            port: default_port(),
            environment: environment.into(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            currency: default_currency(),
            public_base_url: default_base_url(),
            payment_api_base: default_payment_api_base(),
            payment_secret_key: String::new(),
            payment_webhook_secret: None,
            payment_webhook_tolerance_secs: default_webhook_tolerance(),
            shipping_flat_rate_cents: 0,
            shipping_label: default_shipping_label(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Loads configuration from files and the environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let config: AppConfig = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, env)).required(false))
        .add_source(Environment::with_prefix("APP"))
        .build()?
        .try_deserialize()?;

    config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    Ok(config)
}
