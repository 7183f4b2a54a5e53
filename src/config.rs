use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use telemetry::locate::LocateSettings;
use telemetry::report::ScriptConverter;
use telemetry::state::Thresholds;

/// Environment variable that points to the configuration file.
pub const CONFIG_ENV: &str = "TRUCK_TRACKER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "/etc/truck-tracker.toml";

/// # Explanation
/// The configuration of the tracker. Every section falls back to the values of the deployed
/// tracker, so an empty (or missing) file is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub log_file: PathBuf,
    pub pid_file: PathBuf,
    pub gps: GpsConfig,
    pub identity: IdentityConfig,
    pub converter: ConverterConfig,
    pub cloud: CloudConfig,
    pub commands: CommandConfig,
    pub thresholds: Thresholds,
    pub locate: LocateSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_secs: u64,
    /// Replays a recorded nmea log instead of opening the serial port.
    pub replay_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub uuid_file: PathBuf,
    pub truck_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub command: String,
    pub timeout_secs: u64,
    pub settle_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub host: String,
    pub port: u16,
    pub device_key: String,
    pub listen_addr: String,
    pub locate_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub allowed: Vec<String>,
    pub tail_dirs: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_string(),
            log_file: PathBuf::from("/var/log/gpsd.log"),
            pid_file: PathBuf::from("/tmp/daemon-py-gpsd.pid"),
            gps: GpsConfig::default(),
            identity: IdentityConfig::default(),
            converter: ConverterConfig::default(),
            cloud: CloudConfig::default(),
            commands: CommandConfig::default(),
            thresholds: Thresholds::default(),
            locate: LocateSettings::default(),
        }
    }
}

impl Default for GpsConfig {
    fn default() -> Self {
        GpsConfig {
            port: "/dev/ttyAMA0".to_string(),
            baud_rate: 9600,
            read_timeout_secs: 5,
            replay_file: None,
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig {
            uuid_file: PathBuf::from("/etc/cl-lcr-uuid"),
            truck_file: PathBuf::from("/etc/cl-lcr-truck"),
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        ConverterConfig {
            input_file: PathBuf::from("/root/gps.in"),
            output_file: PathBuf::from("/root/gps.out"),
            command: "/usr/local/bin/node /root/cl-lcr-daemon/gpsd/convert.js".to_string(),
            timeout_secs: 10,
            settle_secs: 2,
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        CloudConfig {
            host: "cloudsocket.hologram.io".to_string(),
            port: 9999,
            device_key: String::new(),
            listen_addr: "0.0.0.0:4010".to_string(),
            locate_url: None,
        }
    }
}

impl ConverterConfig {
    pub fn to_converter(&self) -> ScriptConverter {
        ScriptConverter {
            input_file: self.input_file.clone(),
            output_file: self.output_file.clone(),
            command: self.command.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            settle_delay: Duration::from_secs(self.settle_secs),
        }
    }
}

impl Config {
    /// # Explanation
    /// Loads the configuration from the file named by TRUCK_TRACKER_CONFIG (or the default path).
    /// A missing file is not an error, the defaults are used instead.
    pub fn load() -> Result<Config, Box<dyn Error>> {
        let path = std::env::var(CONFIG_ENV).unwrap_or(DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(Path::new(&path))
    }

    pub fn from_file(path: &Path) -> Result<Config, Box<dyn Error>> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| format!("{}: {}", path.display(), e).into())
    }

    pub fn from_toml(content: &str) -> Result<Config, toml::de::Error> {
        toml::from_str(content)
    }
}
