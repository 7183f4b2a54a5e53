use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sensors::coordinates::GeoCoord;
use serde::{Deserialize, Serialize};

use crate::duty::DutyCycleScheduler;
use crate::error::{Result, TelemetryError};
use crate::report::{ReportEncoder, ReportReason};
use crate::state::ReportState;
use crate::transport::Transport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocateSettings {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl Default for LocateSettings {
    fn default() -> Self {
        LocateSettings {
            attempts: 10,
            interval_ms: 1000,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LocateOutcome {
    /// The cached reference position was reported again.
    Cached(GeoCoord),
    /// The network delivered a new reference position.
    Located(GeoCoord),
}

/// # Explanation
/// Network locate obtains a position without the serial gps feed. Unless forced, an already known
/// reference position is reported as is. Otherwise the network is polled a bounded number of times.
pub struct NetworkLocate {
    settings: LocateSettings,
    scheduler: DutyCycleScheduler,
    transport: Arc<dyn Transport>,
}

impl NetworkLocate {
    pub fn new(
        settings: LocateSettings,
        scheduler: DutyCycleScheduler,
        transport: Arc<dyn Transport>,
    ) -> Self {
        NetworkLocate {
            settings,
            scheduler,
            transport,
        }
    }

    pub fn locate(
        &self,
        state: &mut ReportState,
        forced: bool,
        encoder: &ReportEncoder,
    ) -> Result<LocateOutcome> {
        if !forced {
            if let Some(cached) = state.last_reported() {
                state.touch(self.scheduler.now());
                encoder.report(state, cached, ReportReason::Located)?;
                return Ok(LocateOutcome::Cached(cached));
            }
        }

        let position = self.poll()?;
        state.commit(position, self.scheduler.now());
        encoder.report(state, position, ReportReason::Located)?;
        Ok(LocateOutcome::Located(position))
    }

    /// # Explanation
    /// Asks the network for a location until it delivers a valid one, at most `attempts` times.
    pub fn poll(&self) -> Result<GeoCoord> {
        let interval = Duration::from_millis(self.settings.interval_ms);
        for attempt in 1..=self.settings.attempts {
            match self.transport.network_location() {
                Some(position) if position.validate().is_ok() => {
                    log::info!("Network location {:?} after {} attempt(s)", position, attempt);
                    return Ok(position);
                }
                Some(position) => log::warn!("Ignoring invalid network location {:?}", position),
                None => log::debug!("No network location (attempt {})", attempt),
            }
            if attempt < self.settings.attempts {
                thread::sleep(interval);
            }
        }

        Err(TelemetryError::LocateTimeout {
            attempts: self.settings.attempts,
        })
    }
}
