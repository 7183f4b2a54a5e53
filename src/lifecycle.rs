use std::error::Error;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::utils::LogErrUnwrap;

const STOP_TIMEOUT: Duration = Duration::from_secs(10);
const STOP_POLL: Duration = Duration::from_millis(100);

pub const USAGE: &str = "usage: truck-tracker start|stop|restart";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Restart,
}

/// Why the command line could not be turned into an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    Missing,
    Unknown(String),
}

impl Action {
    /// # Explanation
    /// Parses the arguments after the program name. Exactly one argument is accepted.
    pub fn from_args(args: &[String]) -> Result<Action, UsageError> {
        match args {
            [action] => match action.as_str() {
                "start" => Ok(Action::Start),
                "stop" => Ok(Action::Stop),
                "restart" => Ok(Action::Restart),
                other => Err(UsageError::Unknown(other.to_string())),
            },
            _ => Err(UsageError::Missing),
        }
    }
}

/// # Explanation
/// The pid file of the daemon. It holds the pid of the running process, a pid file whose process
/// is gone is stale and gets replaced on start.
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        PidFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> io::Result<Option<u32>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.trim().parse::<u32>().ok()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn write(&self, pid: u32) -> io::Result<()> {
        fs::write(&self.path, format!("{}\n", pid))
    }

    pub fn remove(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// The pid of the running daemon (if there is one).
    pub fn running(&self) -> io::Result<Option<u32>> {
        Ok(self.read()?.filter(|pid| is_alive(*pid)))
    }
}

fn is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{}", pid)).exists()
}

/// Sends SIGTERM to a single process. Pid 0 would address the whole process group.
fn terminate(pid: u32) -> io::Result<()> {
    let target = match libc::pid_t::try_from(pid) {
        Ok(target) if target > 0 => target,
        _ => {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid pid {}", pid),
            ))
        }
    };

    // SAFETY: kill only delivers a signal and does not access memory of this process.
    if unsafe { libc::kill(target, libc::SIGTERM) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// # Explanation
/// Starts the daemon in the current process: the pid file is claimed, `run` is executed and the
/// pid file is removed again when `run` returns.
pub fn start<F>(pid_file: &PidFile, run: F) -> Result<(), Box<dyn Error>>
where
    F: FnOnce() -> Result<(), Box<dyn Error>>,
{
    if let Some(pid) = pid_file.running()? {
        return Err(format!(
            "pidfile {} already exists, the daemon is already running as {}",
            pid_file.path().display(),
            pid
        )
        .into());
    }

    let pid = std::process::id();
    pid_file.write(pid)?;
    log::info!("Daemon started as {}", pid);

    let result = run();
    pid_file.remove().log_err_unwrap(());
    result
}

/// # Explanation
/// Stops the running daemon with SIGTERM and waits until the process is gone. A missing daemon is
/// not an error.
pub fn stop(pid_file: &PidFile) -> Result<(), Box<dyn Error>> {
    let pid = match pid_file.running()? {
        Some(pid) => pid,
        None => {
            eprintln!(
                "pidfile {} does not exist, daemon not running?",
                pid_file.path().display()
            );
            return Ok(pid_file.remove()?);
        }
    };

    terminate(pid).map_err(|e| format!("cannot send SIGTERM to {}: {}", pid, e))?;

    let deadline = Instant::now() + STOP_TIMEOUT;
    while is_alive(pid) {
        if Instant::now() >= deadline {
            let reason = format!("the daemon ({}) did not stop within {:?}", pid, STOP_TIMEOUT);
            return Err(reason.into());
        }
        std::thread::sleep(STOP_POLL);
    }

    log::info!("Daemon {} stopped", pid);
    Ok(pid_file.remove()?)
}

pub fn restart<F>(pid_file: &PidFile, run: F) -> Result<(), Box<dyn Error>>
where
    F: FnOnce() -> Result<(), Box<dyn Error>>,
{
    stop(pid_file)?;
    start(pid_file, run)
}
