use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{Result, TelemetryError};

/// The identity of the tracker as known to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uuid: String,
    pub truck: String,
}

/// # Explanation
/// Persistent storage of the identity. The device UUID is read-only, the truck identifier can be
/// changed remotely.
pub trait IdentityStore: Send {
    fn load_uuid(&self) -> Result<String>;

    fn load_truck(&self) -> Result<String>;

    fn store_truck(&self, truck: &str) -> Result<()>;

    fn load(&self) -> Result<Identity> {
        Ok(Identity {
            uuid: self.load_uuid()?,
            truck: self.load_truck()?,
        })
    }
}

/// Both values live in their own single line text file.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    uuid_file: PathBuf,
    truck_file: PathBuf,
}

impl FileIdentityStore {
    pub fn new(uuid_file: impl Into<PathBuf>, truck_file: impl Into<PathBuf>) -> Self {
        FileIdentityStore {
            uuid_file: uuid_file.into(),
            truck_file: truck_file.into(),
        }
    }
}

fn read_first_line(path: &Path) -> Result<String> {
    let file = fs::File::open(path).map_err(|e| TelemetryError::persistence(path, e))?;
    let mut line = String::new();
    BufReader::new(file)
        .read_line(&mut line)
        .map_err(|e| TelemetryError::persistence(path, e))?;
    Ok(line.trim_end().to_string())
}

impl IdentityStore for FileIdentityStore {
    fn load_uuid(&self) -> Result<String> {
        read_first_line(&self.uuid_file)
    }

    fn load_truck(&self) -> Result<String> {
        read_first_line(&self.truck_file)
    }

    fn store_truck(&self, truck: &str) -> Result<()> {
        fs::write(&self.truck_file, truck)
            .map_err(|e| TelemetryError::persistence(&self.truck_file, e))
    }
}
