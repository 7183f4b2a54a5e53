use crate::gps::{GpsReading, GpsReceiver};

pub mod coordinates;
pub mod gps;

/// # Explanation
/// A position sensor yields one reading per blocking read. The agent only depends on this trait,
/// so a replayed nmea log works as well as the serial receiver.
pub trait PositionSensor: Iterator<Item = GpsReading> {}

impl PositionSensor for GpsReceiver {}

/// # Explanation
/// Replays previously recorded nmea lines (one reading per line).
pub struct ReplaySensor<I: Iterator<Item = String>> {
    lines: I,
}

impl<I: Iterator<Item = String>> ReplaySensor<I> {
    pub fn new(lines: I) -> Self {
        Self { lines }
    }
}

impl<I: Iterator<Item = String>> Iterator for ReplaySensor<I> {
    type Item = GpsReading;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next().map(|line| GpsReading::from_line(&line))
    }
}

impl<I: Iterator<Item = String>> PositionSensor for ReplaySensor<I> {}
