//! The tracker daemon: configuration, the cloud transport, the event worker and the lifecycle of
//! the process.

use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use sensors::gps::GpsReceiver;
use sensors::ReplaySensor;
use telemetry::clock::{Clock, SystemClock};
use telemetry::command::shell::ShellRunner;
use telemetry::command::tail::DirectoryTailer;
use telemetry::identity::FileIdentityStore;
use telemetry::transport::Transport;
use telemetry::{Agent, Collaborators};

use crate::cloud::{CloudTransport, InboundListener};
use crate::config::Config;
use crate::worker::{SensorReader, Worker};

pub mod cloud;
pub mod config;
pub mod lifecycle;
pub mod utils;
pub mod worker;

/// # Explanation
/// Wires the configured collaborators into an agent. The transport and the clock are passed in so
/// the same wiring runs against the real cloud and in tests.
pub fn build_agent(
    config: &Config,
    clock: Arc<dyn Clock>,
    transport: Arc<dyn Transport>,
) -> telemetry::Result<Agent> {
    Agent::new(
        config.thresholds.clone(),
        config.locate.clone(),
        Collaborators {
            clock,
            transport,
            converter: Box::new(config.converter.to_converter()),
            runner: Box::new(ShellRunner::new(config.commands.allowed.clone())),
            tailer: Box::new(DirectoryTailer::new(config.commands.tail_dirs.clone())),
            store: Box::new(FileIdentityStore::new(
                &config.identity.uuid_file,
                &config.identity.truck_file,
            )),
        },
    )
}

/// # Explanation
/// Runs the daemon until every event source is closed. The gps receiver (or the replayed nmea log)
/// and the inbound listener run on their own threads and feed the worker, which owns the agent.
pub fn run_daemon(config: &Config) -> Result<(), Box<dyn Error>> {
    let transport = Arc::new(CloudTransport::new(config.cloud.clone())?);
    let agent = build_agent(config, Arc::new(SystemClock), transport)?;

    let (sender, receiver) = mpsc::channel();
    match &config.gps.replay_file {
        Some(path) => {
            log::info!("Replaying nmea log {}", path.display());
            let lines = BufReader::new(File::open(path)?).lines().map_while(Result::ok);
            SensorReader::run(ReplaySensor::new(lines), sender.clone());
        }
        None => {
            let receiver = GpsReceiver::new(
                &config.gps.port,
                config.gps.baud_rate,
                Duration::from_secs(config.gps.read_timeout_secs),
            )?;
            SensorReader::run(receiver, sender.clone());
        }
    }
    InboundListener::run(config.cloud.listen_addr.clone(), sender);

    Worker::new(agent, receiver).run();
    Ok(())
}
