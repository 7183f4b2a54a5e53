use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use sensors::gps::GpsReading;
use sensors::PositionSensor;
use telemetry::filter::Decision;
use telemetry::Agent;

/// How long the worker waits for an event before it runs the watchdog.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// One unit of work for the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Reading(GpsReading),
    Message(Vec<u8>),
}

/// # Explanation
/// Reads the position sensor on its own thread and forwards every reading to the worker. The thread
/// ends when the sensor is exhausted or the worker is gone.
pub struct SensorReader;

impl SensorReader {
    pub fn run<S>(sensor: S, events: Sender<Event>) -> JoinHandle<()>
    where
        S: PositionSensor + Send + 'static,
    {
        std::thread::spawn(move || {
            for reading in sensor {
                if events.send(Event::Reading(reading)).is_err() {
                    break;
                }
            }
            log::info!("The position sensor stopped.");
        })
    }
}

/// # Explanation
/// The worker is the only owner of the agent. Readings and inbound messages arrive on one channel
/// and are applied strictly one after the other. If no event arrives within the idle timeout the
/// stale fix watchdog runs, so a silent receiver still leads to reports.
pub struct Worker {
    agent: Agent,
    events: Receiver<Event>,
    idle_timeout: Duration,
}

impl Worker {
    pub fn new(agent: Agent, events: Receiver<Event>) -> Self {
        Worker {
            agent,
            events,
            idle_timeout: IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Runs until every sender of the channel is dropped and returns the agent.
    pub fn run(mut self) -> Agent {
        loop {
            match self.events.recv_timeout(self.idle_timeout) {
                Ok(event) => self.handle(event),
                Err(RecvTimeoutError::Timeout) => {
                    self.agent.on_idle();
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        log::info!("All event sources are closed, the worker stops.");
        self.agent
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Reading(reading) => match self.agent.on_reading(reading) {
                Decision::Idle => {}
                decision => log::debug!("{:?}", decision),
            },
            Event::Message(raw) => self.agent.on_message(&raw),
        }
    }
}
