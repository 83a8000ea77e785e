use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

const LEVEL_VAR: &str = "AUTO_APPLY_LOG_LEVEL";

#[derive(Debug)]
pub enum TelemetryError {
    /// `AUTO_APPLY_LOG_LEVEL` held something that is not a tracing directive.
    LevelDirective { value: String, source: ParseError },
    /// Another subscriber was already installed in this process.
    AlreadyInstalled(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::LevelDirective { value, .. } => write!(
                f,
                "{LEVEL_VAR}='{value}' is not a log level such as 'info' or 'auto_apply=debug'"
            ),
            TelemetryError::AlreadyInstalled(err) => {
                write!(f, "run logging could not be installed: {err}")
            }
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::LevelDirective { source, .. } => Some(source),
            TelemetryError::AlreadyInstalled(err) => Some(&**err),
        }
    }
}

/// Filter for the configured level; `RUST_LOG` wins when it parses.
fn run_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|source| TelemetryError::LevelDirective {
        value: level.to_string(),
        source,
    })
}

/// Install the process-wide subscriber for one run of the agent.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = run_filter(&config.log_level)?;

    // stdout carries the run report; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::AlreadyInstalled)
}
