use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the agent.
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

/// Top-level configuration for the agent.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let storage = StorageConfig {
            config_file: path_var("AUTO_APPLY_CONFIG_FILE", "conf.json")?,
            waitlist_file: path_var("AUTO_APPLY_WAITLIST_FILE", "wait.json")?,
            audit_file: path_var("AUTO_APPLY_AUDIT_FILE", "jobs.csv")?,
        };

        let timeout_secs = env::var("AUTO_APPLY_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidTimeout)?;

        let user_agent = env::var("AUTO_APPLY_USER_AGENT")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let log_level = env::var("AUTO_APPLY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            storage,
            gateway: GatewayConfig {
                request_timeout: Duration::from_secs(timeout_secs),
                user_agent,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

fn path_var(name: &'static str, default: &str) -> Result<PathBuf, ConfigError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptyPath(name)),
        Ok(value) => Ok(PathBuf::from(value.trim())),
        Err(_) => Ok(PathBuf::from(default)),
    }
}

/// Locations of the persisted run state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub config_file: PathBuf,
    pub waitlist_file: PathBuf,
    pub audit_file: PathBuf,
}

/// Settings for the platform HTTP client.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub request_timeout: Duration,
    pub user_agent: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            user_agent: None,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidTimeout,
    EmptyPath(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidTimeout => {
                write!(f, "AUTO_APPLY_HTTP_TIMEOUT_SECS must be a positive integer")
            }
            ConfigError::EmptyPath(name) => write!(f, "{name} must not be empty when set"),
        }
    }
}

impl std::error::Error for ConfigError {}
