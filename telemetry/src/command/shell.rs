use std::process::Command;

use crate::error::{Result, TelemetryError};

/// # Explanation
/// Runs a remotely requested command and waits for it to finish.
pub trait CommandRunner: Send {
    fn run(&self, command: &str) -> Result<()>;
}

/// # Explanation
/// Runs commands through `sh -c`, but only commands that appear verbatim in the allow-list. An
/// empty allow-list disables remote commands completely.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner {
    allowed: Vec<String>,
}

impl ShellRunner {
    pub fn new(allowed: Vec<String>) -> Self {
        ShellRunner { allowed }
    }

    pub fn is_allowed(&self, command: &str) -> bool {
        self.allowed.iter().any(|allowed| allowed == command)
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str) -> Result<()> {
        if !self.is_allowed(command) {
            return Err(TelemetryError::CommandExec(format!(
                "'{}' is not an allowed command",
                command
            )));
        }

        log::info!("Running command: {}", command);
        let status = Command::new("sh")
            .arg("-c")
            .arg(command)
            .status()
            .map_err(|e| TelemetryError::CommandExec(format!("cannot run '{}': {}", command, e)))?;

        if status.success() {
            log::info!("Command '{}' finished", command);
            Ok(())
        } else {
            Err(TelemetryError::CommandExec(format!(
                "'{}' exited with {}",
                command, status
            )))
        }
    }
}
