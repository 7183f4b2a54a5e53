use std::sync::Arc;

use chrono::{DateTime, Local, Timelike};

use crate::clock::Clock;

pub const DAY_MULTIPLIER: u32 = 1;
pub const NIGHT_MULTIPLIER: u32 = 4;

/// First and last hour (both inclusive) that count as daytime.
const DAY_START_HOUR: u32 = 8;
const DAY_END_HOUR: u32 = 18;

pub fn multiplier_for_hour(hour: u32) -> u32 {
    if hour > DAY_END_HOUR || hour < DAY_START_HOUR {
        NIGHT_MULTIPLIER
    } else {
        DAY_MULTIPLIER
    }
}

/// # Explanation
/// The duty cycle scheduler stretches every timing threshold at night. The multiplier is derived
/// from the clock on every call, so a change of the hour takes effect with the next evaluation.
#[derive(Clone)]
pub struct DutyCycleScheduler {
    clock: Arc<dyn Clock>,
}

impl DutyCycleScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        DutyCycleScheduler { clock }
    }

    pub fn now(&self) -> DateTime<Local> {
        self.clock.now()
    }

    pub fn multiplier(&self) -> u32 {
        multiplier_for_hour(self.clock.now().hour())
    }
}
