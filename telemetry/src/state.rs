use chrono::{DateTime, Duration, Local};
use sensors::coordinates::GeoCoord;
use serde::{Deserialize, Serialize};

/// On startup the timer is backdated so that the first fix only has to wait a short settle time.
pub const STARTUP_BACKDATE_SECS: i64 = 200;

/// # Explanation
/// The timing and distance thresholds of the reporting policy. All intervals are in seconds at the
/// daytime rate and get multiplied with the duty cycle multiplier before they are compared.
///
/// The move threshold is 0.50 km. Older documentation of the tracker talks about 0.75 miles, the
/// deployed behavior is 0.50 km.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_report_interval: u64,
    pub max_report_interval: u64,
    pub stale_fix_interval: u64,
    pub no_fix_timeout: u64,
    pub move_threshold_km: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            min_report_interval: 118,
            max_report_interval: 880,
            stale_fix_interval: 1200,
            no_fix_timeout: 230,
            move_threshold_km: 0.50,
        }
    }
}

impl Thresholds {
    pub fn min_report_interval(&self, multiplier: u32) -> f64 {
        scale(self.min_report_interval, multiplier)
    }

    pub fn max_report_interval(&self, multiplier: u32) -> f64 {
        scale(self.max_report_interval, multiplier)
    }

    pub fn stale_fix_interval(&self, multiplier: u32) -> f64 {
        scale(self.stale_fix_interval, multiplier)
    }

    pub fn no_fix_timeout(&self, multiplier: u32) -> f64 {
        scale(self.no_fix_timeout, multiplier)
    }
}

fn scale(secs: u64, multiplier: u32) -> f64 {
    (secs * multiplier as u64) as f64
}

/// # Explanation
/// The report state is the reference point of the reporting policy: where the last report was
/// taken and when the last action (report or locate) happened. The position is only ever changed
/// together with the timer.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportState {
    last_reported: Option<GeoCoord>,
    last_action: DateTime<Local>,
}

impl ReportState {
    pub fn new(now: DateTime<Local>) -> Self {
        ReportState {
            last_reported: None,
            last_action: now - Duration::seconds(STARTUP_BACKDATE_SECS),
        }
    }

    pub fn with(last_reported: Option<GeoCoord>, last_action: DateTime<Local>) -> Self {
        ReportState {
            last_reported,
            last_action,
        }
    }

    pub fn last_reported(&self) -> Option<GeoCoord> {
        self.last_reported
    }

    pub fn last_action(&self) -> DateTime<Local> {
        self.last_action
    }

    /// Seconds since the last action, with millisecond resolution.
    pub fn elapsed_secs(&self, now: DateTime<Local>) -> f64 {
        (now - self.last_action).num_milliseconds() as f64 / 1000.0
    }

    /// A new reference position was reported.
    pub fn commit(&mut self, position: GeoCoord, now: DateTime<Local>) {
        self.last_reported = Some(position);
        self.last_action = now;
    }

    /// Restart the timer and keep the reference position.
    pub fn touch(&mut self, now: DateTime<Local>) {
        self.last_action = now;
    }
}
