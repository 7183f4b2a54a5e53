use std::io;
use std::path::PathBuf;

use sensors::coordinates::CoordinateError;
use thiserror::Error;

/// # Explanation
/// Every recoverable failure of the agent. None of them is fatal: the worker logs the error
/// together with its `kind` and carries on with the next reading or message.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("no network location after {attempts} attempts")]
    LocateTimeout { attempts: u32 },

    #[error("transmission on topic '{topic}' failed: {reason}")]
    Transmission { topic: String, reason: String },

    #[error("payload conversion failed: {0}")]
    Conversion(String),

    #[error("invalid command message: {0}")]
    CommandParse(String),

    #[error("command failed: {0}")]
    CommandExec(String),

    #[error("cannot access {}: {}", .path.display(), .source)]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid position: {0}")]
    InvalidPosition(#[from] CoordinateError),
}

impl TelemetryError {
    pub fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TelemetryError::Persistence {
            path: path.into(),
            source,
        }
    }

    pub fn transmission(topic: &str, reason: impl ToString) -> Self {
        TelemetryError::Transmission {
            topic: topic.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Stable name used as the first field of every error log line.
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryError::LocateTimeout { .. } => "LocateTimeout",
            TelemetryError::Transmission { .. } => "TransmissionError",
            TelemetryError::Conversion(_) => "ConversionError",
            TelemetryError::CommandParse(_) => "CommandParseError",
            TelemetryError::CommandExec(_) => "CommandExecError",
            TelemetryError::Persistence { .. } => "PersistenceError",
            TelemetryError::InvalidPosition(_) => "InvalidPosition",
        }
    }
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// # Explanation
/// Logs the error with its kind. Transient network conditions are warnings, everything else is
/// an error.
pub fn log_error(context: &str, error: &TelemetryError) {
    match error {
        TelemetryError::LocateTimeout { .. } | TelemetryError::Transmission { .. } => {
            log::warn!("[{}] {}: {}", error.kind(), context, error)
        }
        _ => log::error!("[{}] {}: {}", error.kind(), context, error),
    }
}
