use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::listings::cache::DEFAULT_CACHE_CAPACITY;
use crate::listings::UserDeletePolicy;

/// Default row cap applied to property listings.
pub const DEFAULT_MAX_PROPERTY_ROWS: usize = 500;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub listings: ListingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let max_property_rows = match env::var("LISTING_MAX_PROPERTY_ROWS") {
            Ok(raw) => match raw.trim().parse::<usize>() {
                Ok(value) if value > 0 => value,
                _ => return Err(ConfigError::InvalidRowCap { value: raw }),
            },
            Err(_) => DEFAULT_MAX_PROPERTY_ROWS,
        };

        let cache_capacity = match env::var("LISTING_CACHE_CAPACITY") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidCacheCapacity { value: raw })?,
            Err(_) => DEFAULT_CACHE_CAPACITY,
        };

        let user_delete_policy = match env::var("LISTING_USER_DELETE_POLICY") {
            Ok(raw) => UserDeletePolicy::parse(&raw)
                .ok_or(ConfigError::InvalidDeletePolicy { value: raw })?,
            Err(_) => UserDeletePolicy::default(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            listings: ListingConfig {
                max_property_rows,
                cache_capacity,
                user_delete_policy,
            },
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for the listing review core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingConfig {
    /// Upper bound on rows returned by a single property listing query.
    pub max_property_rows: usize,
    /// Most cached reads held at once; zero disables the read cache.
    pub cache_capacity: usize,
    pub user_delete_policy: UserDeletePolicy,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            max_property_rows: DEFAULT_MAX_PROPERTY_ROWS,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            user_delete_policy: UserDeletePolicy::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidRowCap { value: String },
    InvalidCacheCapacity { value: String },
    InvalidDeletePolicy { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidRowCap { value } => write!(
                f,
                "LISTING_MAX_PROPERTY_ROWS must be a positive integer, got '{value}'"
            ),
            ConfigError::InvalidCacheCapacity { value } => write!(
                f,
                "LISTING_CACHE_CAPACITY must be a non-negative integer, got '{value}'"
            ),
            ConfigError::InvalidDeletePolicy { value } => write!(
                f,
                "LISTING_USER_DELETE_POLICY must be 'retain' or 'cascade', got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidRowCap { .. }
            | ConfigError::InvalidCacheCapacity { .. }
            | ConfigError::InvalidDeletePolicy { .. } => None,
        }
    }
}
