#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Local, TimeZone};
use sensors::coordinates::{GeoCoord, EARTH_RADIUS_KM};
use telemetry::clock::{Clock, ManualClock};
use telemetry::command::shell::CommandRunner;
use telemetry::command::tail::{last_lines, Tailer};
use telemetry::identity::IdentityStore;
use telemetry::locate::LocateSettings;
use telemetry::report::PayloadConverter;
use telemetry::state::Thresholds;
use telemetry::transport::{OutboundMessage, Transport};
use telemetry::{Agent, Collaborators, Result, TelemetryError};

pub const ORIGIN: GeoCoord = GeoCoord {
    lon: -81.6944,
    lat: 41.4993,
};

/// A point `km` kilometers north of `from`.
pub fn north_of(from: GeoCoord, km: f64) -> GeoCoord {
    GeoCoord::new(from.lon, from.lat + (km / EARTH_RADIUS_KM).to_degrees())
}

#[derive(Default)]
pub struct MockTransport {
    pub sent: Mutex<Vec<OutboundMessage>>,
    pub locations: Mutex<VecDeque<Option<GeoCoord>>>,
    pub location_calls: AtomicU32,
    pub fail_sends: AtomicBool,
}

impl MockTransport {
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn queue_locations(&self, locations: &[Option<GeoCoord>]) {
        self.locations.lock().unwrap().extend(locations.iter().copied());
    }
}

impl Transport for MockTransport {
    fn send(&self, message: &OutboundMessage) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TelemetryError::transmission(&message.topic, "no ack"));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn network_location(&self) -> Option<GeoCoord> {
        self.location_calls.fetch_add(1, Ordering::SeqCst);
        self.locations.lock().unwrap().pop_front().flatten()
    }
}

/// Formats the payload as `payload:<lat>:<lon>`.
pub struct EchoConverter;

impl PayloadConverter for EchoConverter {
    fn convert(&self, position: GeoCoord) -> Result<String> {
        Ok(format!("payload:{}", position.to_exchange_string()))
    }
}

pub fn payload(position: GeoCoord) -> String {
    format!("payload:{}", position.to_exchange_string())
}

#[derive(Clone, Default)]
pub struct RecordingRunner {
    pub commands: Arc<Mutex<Vec<String>>>,
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &str) -> Result<()> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok(())
    }
}

/// Serves in-memory files by their literal path.
#[derive(Clone, Default)]
pub struct FixtureTailer {
    pub files: HashMap<String, String>,
}

impl Tailer for FixtureTailer {
    fn tail(&self, path: &str, lines: usize) -> Result<String> {
        let content = self
            .files
            .get(path)
            .ok_or_else(|| TelemetryError::CommandExec(format!("{} not found", path)))?;
        last_lines(Cursor::new(content.as_bytes()), lines)
            .map_err(|e| TelemetryError::CommandExec(e.to_string()))
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    pub uuid: String,
    pub truck: Arc<Mutex<String>>,
}

impl IdentityStore for MemoryStore {
    fn load_uuid(&self) -> Result<String> {
        Ok(self.uuid.clone())
    }

    fn load_truck(&self) -> Result<String> {
        Ok(self.truck.lock().unwrap().clone())
    }

    fn store_truck(&self, truck: &str) -> Result<()> {
        *self.truck.lock().unwrap() = truck.to_string();
        Ok(())
    }
}

pub struct Harness {
    pub agent: Agent,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<MockTransport>,
    pub commands: Arc<Mutex<Vec<String>>>,
}

pub struct HarnessBuilder {
    hour: u32,
    tailer: FixtureTailer,
    store: Option<Box<dyn IdentityStore>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        HarnessBuilder {
            hour: 12,
            tailer: FixtureTailer::default(),
            store: None,
        }
    }

    pub fn hour(mut self, hour: u32) -> Self {
        self.hour = hour;
        self
    }

    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.tailer.files.insert(path.to_string(), content.to_string());
        self
    }

    pub fn store(mut self, store: Box<dyn IdentityStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Harness {
        let clock = Arc::new(ManualClock::new(
            Local.with_ymd_and_hms(2024, 5, 14, self.hour, 0, 0).unwrap(),
        ));
        let transport = Arc::new(MockTransport::default());
        let runner = RecordingRunner::default();
        let commands = runner.commands.clone();
        let store = self.store.unwrap_or_else(|| {
            Box::new(MemoryStore {
                uuid: "0000-test".to_string(),
                truck: Arc::new(Mutex::new("T-1".to_string())),
            })
        });

        let agent = Agent::new(
            Thresholds::default(),
            LocateSettings {
                attempts: 10,
                interval_ms: 0,
            },
            Collaborators {
                clock: clock.clone(),
                transport: transport.clone(),
                converter: Box::new(EchoConverter),
                runner: Box::new(runner),
                tailer: Box::new(self.tailer),
                store,
            },
        )
        .unwrap();

        Harness {
            agent,
            clock,
            transport,
            commands,
        }
    }
}

impl Harness {
    pub fn clock_now(&self) -> chrono::DateTime<Local> {
        self.clock.now()
    }
}
