use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::allocation::{AllocationSettings, RerunPolicy};

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
    pub allocation: AllocationConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            allocation: AllocationConfig::from_env()?,
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

/// Allocation workflow settings plus the optional roster used to seed the store.
#[derive(Debug, Clone)]
pub struct AllocationConfig {
    pub rerun_policy: RerunPolicy,
    pub cycle_start_month: u32,
    pub data_dir: Option<PathBuf>,
}

impl AllocationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let rerun_policy = match env::var("ALLOCATION_RERUN_POLICY") {
            Ok(raw) => {
                RerunPolicy::parse(&raw).ok_or(ConfigError::InvalidRerunPolicy { value: raw })?
            }
            Err(_) => RerunPolicy::default(),
        };

        let cycle_start_month = match env::var("ALLOCATION_CYCLE_START_MONTH") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|month| (1..=12).contains(month))
                .ok_or(ConfigError::InvalidCycleStartMonth { value: raw })?,
            Err(_) => AllocationSettings::default().cycle_start_month,
        };

        let data_dir = env::var("ALLOCATION_DATA_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            rerun_policy,
            cycle_start_month,
            data_dir,
        })
    }

    pub fn settings(&self) -> AllocationSettings {
        AllocationSettings {
            rerun_policy: self.rerun_policy,
            cycle_start_month: self.cycle_start_month,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidRerunPolicy { value: String },
    InvalidCycleStartMonth { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidRerunPolicy { value } => write!(
                f,
                "ALLOCATION_RERUN_POLICY must be 'reset' or 'additive' (got '{}')",
                value
            ),
            ConfigError::InvalidCycleStartMonth { value } => write!(
                f,
                "ALLOCATION_CYCLE_START_MONTH must be a month between 1 and 12 (got '{}')",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidRerunPolicy { .. }
            | ConfigError::InvalidCycleStartMonth { .. } => None,
        }
    }
}
