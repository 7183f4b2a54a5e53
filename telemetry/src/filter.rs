use sensors::coordinates::{GeoCoord, GeoDistance, Haversine};
use sensors::gps::GpsReading;

use crate::duty::DutyCycleScheduler;
use crate::error::{log_error, Result};
use crate::locate::NetworkLocate;
use crate::report::{ReportEncoder, ReportReason};
use crate::state::{ReportState, Thresholds};

/// # Explanation
/// The distance between the reference position and a new fix in kilometers. Without a reference
/// position every valid fix counts as infinitely far away, so the first fix is always reported.
pub fn moved_km<D: GeoDistance>(
    distance: &D,
    reference: Option<GeoCoord>,
    position: GeoCoord,
) -> Result<f64> {
    match reference {
        Some(reference) => Ok(distance.distance_km(reference, position)?),
        None => {
            position.validate()?;
            Ok(f64::INFINITY)
        }
    }
}

/// The outcome of evaluating one reading.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Decision {
    Idle,
    Report {
        position: GeoCoord,
        reason: ReportReason,
    },
    ForceLocate,
}

/// # Explanation
/// The position filter is the debounce state machine of the agent. For every reading it decides
/// whether a report is due now, whether the missing fix has to be replaced with a network fix, or
/// whether nothing happens. The minimum report interval is a hard floor: distance alone never
/// triggers a report before it elapsed.
pub struct PositionFilter {
    thresholds: Thresholds,
    scheduler: DutyCycleScheduler,
    distance: Haversine,
}

impl PositionFilter {
    pub fn new(thresholds: Thresholds, scheduler: DutyCycleScheduler) -> Self {
        PositionFilter {
            thresholds,
            scheduler,
            distance: Haversine::new(),
        }
    }

    pub fn decide(&self, state: &ReportState, reading: GpsReading) -> Result<Decision> {
        let multiplier = self.scheduler.multiplier();
        let elapsed = state.elapsed_secs(self.scheduler.now());

        let position = match reading {
            GpsReading::Other => return Ok(Decision::Idle),
            GpsReading::NoFix => {
                return if elapsed > self.thresholds.no_fix_timeout(multiplier) {
                    Ok(Decision::ForceLocate)
                } else {
                    Ok(Decision::Idle)
                }
            }
            GpsReading::Fix(position) => position,
        };

        if elapsed <= self.thresholds.min_report_interval(multiplier) {
            return Ok(Decision::Idle);
        }

        let moved = moved_km(&self.distance, state.last_reported(), position)?;
        let decision = if moved > self.thresholds.move_threshold_km {
            Decision::Report {
                position,
                reason: ReportReason::Moved,
            }
        } else if elapsed > self.thresholds.max_report_interval(multiplier) {
            Decision::Report {
                position,
                reason: ReportReason::Heartbeat,
            }
        } else {
            Decision::Idle
        };

        log::trace!(
            "elapsed {:.1}s, moved {:.3}km, multiplier {} -> {:?}",
            elapsed,
            moved,
            multiplier,
            decision
        );
        Ok(decision)
    }

    /// # Explanation
    /// Decides and carries out the decision. The state is committed before the report is sent, the
    /// encoder re-checks against the state as it was when the decision was taken. Errors are
    /// logged and end the evaluation of this reading, they never reach the sampling loop.
    pub fn evaluate(
        &self,
        state: &mut ReportState,
        reading: GpsReading,
        encoder: &ReportEncoder,
        locator: &NetworkLocate,
    ) -> Decision {
        let decision = match self.decide(state, reading) {
            Ok(decision) => decision,
            Err(e) => {
                log_error("evaluating gps reading", &e);
                return Decision::Idle;
            }
        };

        let now = self.scheduler.now();
        match decision {
            Decision::Idle => {}
            Decision::ForceLocate => {
                log::info!("No fix for too long, requesting a network location");
                state.touch(now);
                if let Err(e) = locator.locate(state, true, encoder) {
                    log_error("forced locate", &e);
                }
            }
            Decision::Report { position, reason } => {
                let decided_on = state.clone();
                match reason {
                    ReportReason::Moved => state.commit(position, now),
                    ReportReason::Heartbeat | ReportReason::Located => state.touch(now),
                }
                encoder
                    .report(&decided_on, position, reason)
                    .map(|_| ())
                    .unwrap_or_else(|e| log_error("position report", &e));
            }
        }

        decision
    }
}
