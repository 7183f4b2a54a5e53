#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use sensors::coordinates::GeoCoord;
use telemetry::transport::{OutboundMessage, Transport};
use telemetry::Result;
use truck_tracker::config::Config;

pub const FIX: &str = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
pub const NO_FIX: &str = "$GPGGA,,,,,,0,00,99.99,,,,,,*48";

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub location_calls: AtomicU32,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn location_calls(&self) -> u32 {
        self.location_calls.load(Ordering::SeqCst)
    }
}

impl Transport for RecordingTransport {
    fn send(&self, message: &OutboundMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn network_location(&self) -> Option<GeoCoord> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        None
    }
}

/// # Explanation
/// A configuration whose files all live in `dir`. The converter copies the input file to the
/// output file, so the payload is the `<lat>:<lon>` exchange string itself.
pub fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.identity.uuid_file = dir.join("uuid");
    config.identity.truck_file = dir.join("truck");
    config.converter.input_file = dir.join("gps.in");
    config.converter.output_file = dir.join("gps.out");
    config.converter.command = format!(
        "cp {} {}",
        config.converter.input_file.display(),
        config.converter.output_file.display()
    );
    config.locate.interval_ms = 0;

    fs::write(&config.identity.uuid_file, "3f2504e0-4f89-11d3-9a0c-0305e82c3301\n").unwrap();
    fs::write(&config.identity.truck_file, "T-1\n").unwrap();
    config
}
