use std::collections::VecDeque;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{Result, TelemetryError};

/// # Explanation
/// Reads the trailing lines of a file for a remote sender.
pub trait Tailer: Send {
    fn tail(&self, path: &str, lines: usize) -> Result<String>;
}

/// # Explanation
/// Tails files, but only files below one of the allowed directories. Paths are canonicalized
/// first, so `..` and symlinks cannot leave the allowed directories.
#[derive(Debug, Clone, Default)]
pub struct DirectoryTailer {
    allowed_dirs: Vec<PathBuf>,
}

impl DirectoryTailer {
    pub fn new(allowed_dirs: Vec<PathBuf>) -> Self {
        let allowed_dirs = allowed_dirs
            .into_iter()
            .filter_map(|dir| match dir.canonicalize() {
                Ok(dir) => Some(dir),
                Err(e) => {
                    log::warn!("Ignoring tail directory {}: {}", dir.display(), e);
                    None
                }
            })
            .collect();
        DirectoryTailer { allowed_dirs }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let canonical = Path::new(path)
            .canonicalize()
            .map_err(|e| TelemetryError::CommandExec(format!("cannot resolve {}: {}", path, e)))?;

        if self.allowed_dirs.iter().any(|dir| canonical.starts_with(dir)) {
            Ok(canonical)
        } else {
            Err(TelemetryError::CommandExec(format!(
                "{} is outside of the allowed directories",
                path
            )))
        }
    }
}

impl Tailer for DirectoryTailer {
    fn tail(&self, path: &str, lines: usize) -> Result<String> {
        let path = self.resolve(path)?;
        let file = fs::File::open(&path).map_err(|e| {
            TelemetryError::CommandExec(format!("cannot open {}: {}", path.display(), e))
        })?;
        last_lines(BufReader::new(file), lines).map_err(|e| {
            TelemetryError::CommandExec(format!("cannot read {}: {}", path.display(), e))
        })
    }
}

/// # Explanation
/// Streams through the reader and keeps only the last `count` lines, joined with newlines.
/// Invalid utf-8 is replaced instead of failing the whole tail.
pub fn last_lines<R: BufRead>(mut reader: R, count: usize) -> std::io::Result<String> {
    let mut window: VecDeque<String> = VecDeque::with_capacity(count.min(1024));
    if count == 0 {
        return Ok(String::new());
    }

    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buffer);
        if window.len() == count {
            window.pop_front();
        }
        window.push_back(line.trim_end_matches(['\r', '\n']).to_string());
    }

    Ok(Vec::from(window).join("\n"))
}
