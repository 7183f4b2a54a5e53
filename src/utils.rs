use std::error::Error;
use std::fmt::Display;
use std::fs::OpenOptions;
use std::path::Path;
use std::str::FromStr;

use log::LevelFilter;
use simplelog::{Config, WriteLogger};

pub struct Utils;

impl Utils {
    /// # Explanation
    /// Resolves the log level. RUST_LOG wins over the configured level and should be one of off,
    /// error, warn, info, debug or trace. Anything unparsable falls back to info.
    pub fn log_level(configured: &str) -> LevelFilter {
        let log_level = std::env::var("RUST_LOG").unwrap_or(configured.to_string());
        LevelFilter::from_str(&log_level).unwrap_or(LevelFilter::Info)
    }

    /// # Explanation
    /// This function initializes the logger. The log file is appended to, so a restart of the
    /// daemon keeps the history of the previous run.
    pub fn logger_init(configured_level: &str, log_file: &Path) -> Result<(), Box<dyn Error>> {
        let log_level = Self::log_level(configured_level);

        let log_file = OpenOptions::new().create(true).append(true).open(log_file)?;
        WriteLogger::init(log_level, Config::default(), log_file)?;
        Ok(())
    }
}

/// # Explanation
/// The LogErrUnwrap trait contains the function log_err_unwrap. This function should be used to
/// unwrap a result and when this result is an error then the error is logged and the given default
/// value is returned.
pub trait LogErrUnwrap<T> {
    fn log_err_unwrap(self, default: T) -> T;
}

impl<T, E: Display> LogErrUnwrap<T> for Result<T, E> {
    fn log_err_unwrap(self, default: T) -> T {
        self.unwrap_or_else(|e| {
            log::error!("{}", e);
            default
        })
    }
}
