use std::fs;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::PathBuf;
use std::process::{Child, Command};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sensors::coordinates::{GeoCoord, Haversine};

use crate::duty::DutyCycleScheduler;
use crate::error::{Result, TelemetryError};
use crate::filter::moved_km;
use crate::state::{ReportState, Thresholds};
use crate::transport::{OutboundMessage, Transport, GPS_ACK_TIMEOUT, TOPIC_GPS};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Why a position is being reported.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReportReason {
    /// The vehicle moved further than the move threshold.
    Moved,
    /// Nothing moved but the maximum report interval elapsed.
    Heartbeat,
    /// The position was explicitly requested (remote command, missing fix or stale fix).
    Located,
}

/// # Explanation
/// The payload converter turns a coordinate pair into the backend's wire payload.
pub trait PayloadConverter: Send {
    fn convert(&self, position: GeoCoord) -> Result<String>;
}

/// # Explanation
/// Runs an external conversion script. The script reads `"<lat>:<lon>"` from the input file and
/// writes a single line payload to the output file. The exit of the script is the completion
/// signal; if the process cannot be observed the converter falls back to a fixed settle delay.
#[derive(Debug, Clone)]
pub struct ScriptConverter {
    pub input_file: PathBuf,
    pub output_file: PathBuf,
    pub command: String,
    pub timeout: Duration,
    pub settle_delay: Duration,
}

impl ScriptConverter {
    fn run_script(&self) -> Result<()> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .spawn()
            .map_err(|e| {
                TelemetryError::Conversion(format!("cannot start '{}': {}", self.command, e))
            })?;
        self.wait_for(child)
    }

    fn wait_for(&self, mut child: Child) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(()),
                Ok(Some(status)) => {
                    return Err(TelemetryError::Conversion(format!(
                        "'{}' exited with {}",
                        self.command, status
                    )))
                }
                Ok(None) if Instant::now() >= deadline => {
                    child.kill().unwrap_or(());
                    child.wait().map(|_| ()).unwrap_or(());
                    return Err(TelemetryError::Conversion(format!(
                        "'{}' did not finish within {:?}",
                        self.command, self.timeout
                    )));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    log::warn!(
                        "Cannot observe the converter ({}), waiting {:?} instead",
                        e,
                        self.settle_delay
                    );
                    thread::sleep(self.settle_delay);
                    return Ok(());
                }
            }
        }
    }

    fn read_payload(&self) -> Result<String> {
        let file = fs::File::open(&self.output_file).map_err(|e| {
            TelemetryError::Conversion(format!("cannot open {}: {}", self.output_file.display(), e))
        })?;
        let mut line = String::new();
        BufReader::new(file)
            .read_line(&mut line)
            .map_err(|e| TelemetryError::Conversion(e.to_string()))?;

        let payload = line.trim_end().to_string();
        if payload.is_empty() {
            Err(TelemetryError::Conversion(format!(
                "{} is empty",
                self.output_file.display()
            )))
        } else {
            Ok(payload)
        }
    }
}

impl PayloadConverter for ScriptConverter {
    fn convert(&self, position: GeoCoord) -> Result<String> {
        match fs::remove_file(&self.output_file) {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                log::warn!("Cannot remove stale {}: {}", self.output_file.display(), e)
            }
            _ => {}
        }
        fs::write(&self.input_file, position.to_exchange_string())
            .map_err(|e| TelemetryError::persistence(&self.input_file, e))?;

        self.run_script()?;
        self.read_payload()
    }
}

/// # Explanation
/// The report encoder re-evaluates a report right before it is sent. The check runs against the
/// state the decision was taken on, with a fresh multiplier and a fresh distance, and a report that
/// no longer qualifies is dropped. Explicitly located positions are never dropped.
pub struct ReportEncoder {
    thresholds: Thresholds,
    scheduler: DutyCycleScheduler,
    distance: Haversine,
    converter: Box<dyn PayloadConverter>,
    transport: Arc<dyn Transport>,
}

impl ReportEncoder {
    pub fn new(
        thresholds: Thresholds,
        scheduler: DutyCycleScheduler,
        converter: Box<dyn PayloadConverter>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        ReportEncoder {
            thresholds,
            scheduler,
            distance: Haversine::new(),
            converter,
            transport,
        }
    }

    pub fn still_due(&self, state: &ReportState, position: GeoCoord) -> Result<bool> {
        let multiplier = self.scheduler.multiplier();
        let elapsed = state.elapsed_secs(self.scheduler.now());
        let moved = moved_km(&self.distance, state.last_reported(), position)?;

        Ok(moved > self.thresholds.move_threshold_km
            || elapsed > self.thresholds.max_report_interval(multiplier))
    }

    /// Returns None if the report was dropped by the re-check.
    pub fn encode(
        &self,
        state: &ReportState,
        position: GeoCoord,
        reason: ReportReason,
    ) -> Result<Option<OutboundMessage>> {
        position.validate()?;
        if reason != ReportReason::Located && !self.still_due(state, position)? {
            log::debug!("Dropping {:?} report of {:?}, no longer due", reason, position);
            return Ok(None);
        }

        let payload = self.converter.convert(position)?;
        Ok(Some(OutboundMessage::new(TOPIC_GPS, payload, GPS_ACK_TIMEOUT)))
    }

    /// Encodes and transmits. Returns whether a message went out.
    pub fn report(
        &self,
        state: &ReportState,
        position: GeoCoord,
        reason: ReportReason,
    ) -> Result<bool> {
        match self.encode(state, position, reason)? {
            Some(message) => {
                self.transport.send(&message)?;
                log::info!("Reported {:?} ({:?})", position, reason);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
