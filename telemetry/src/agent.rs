use std::sync::Arc;

use sensors::gps::GpsReading;

use crate::clock::Clock;
use crate::command::router::{CommandRouter, Dispatch};
use crate::command::shell::CommandRunner;
use crate::command::tail::Tailer;
use crate::duty::DutyCycleScheduler;
use crate::error::{log_error, Result};
use crate::filter::{Decision, PositionFilter};
use crate::identity::{Identity, IdentityStore};
use crate::locate::{LocateOutcome, LocateSettings, NetworkLocate};
use crate::report::{PayloadConverter, ReportEncoder};
use crate::state::{ReportState, Thresholds};
use crate::transport::Transport;

/// The collaborators the agent talks to.
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub transport: Arc<dyn Transport>,
    pub converter: Box<dyn PayloadConverter>,
    pub runner: Box<dyn CommandRunner>,
    pub tailer: Box<dyn Tailer>,
    pub store: Box<dyn IdentityStore>,
}

/// # Explanation
/// The agent owns the whole mutable state of the tracker (report state and identity) together with
/// the components that act on it. It is driven by exactly one thread: gps readings and inbound
/// messages are both handed to it one after the other, so no two paths ever touch the state at
/// the same time.
pub struct Agent {
    state: ReportState,
    identity: Identity,
    thresholds: Thresholds,
    scheduler: DutyCycleScheduler,
    filter: PositionFilter,
    encoder: ReportEncoder,
    locator: NetworkLocate,
    router: CommandRouter,
    transport: Arc<dyn Transport>,
}

impl Agent {
    /// Fails if the identity cannot be read from its store.
    pub fn new(
        thresholds: Thresholds,
        locate_settings: LocateSettings,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let Collaborators {
            clock,
            transport,
            converter,
            runner,
            tailer,
            store,
        } = collaborators;

        let identity = store.load()?;
        log::info!(
            "Tracker {} starts as truck '{}'",
            identity.uuid,
            identity.truck
        );

        let scheduler = DutyCycleScheduler::new(clock);
        Ok(Agent {
            state: ReportState::new(scheduler.now()),
            identity,
            filter: PositionFilter::new(thresholds.clone(), scheduler.clone()),
            encoder: ReportEncoder::new(
                thresholds.clone(),
                scheduler.clone(),
                converter,
                transport.clone(),
            ),
            locator: NetworkLocate::new(locate_settings, scheduler.clone(), transport.clone()),
            router: CommandRouter::new(runner, tailer, store),
            thresholds,
            scheduler,
            transport,
        })
    }

    pub fn state(&self) -> &ReportState {
        &self.state
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Feeds one reading of the gps receiver. Reads without a GGA sentence run the watchdog.
    pub fn on_reading(&mut self, reading: GpsReading) -> Decision {
        if !reading.is_sample() {
            self.on_idle();
            return Decision::Idle;
        }
        self.filter
            .evaluate(&mut self.state, reading, &self.encoder, &self.locator)
    }

    /// # Explanation
    /// The stale fix watchdog. If neither a report nor a locate happened for the stale fix interval
    /// a locate is triggered (which reports the cached position if there is one). Returns whether
    /// the watchdog fired.
    pub fn on_idle(&mut self) -> bool {
        let now = self.scheduler.now();
        let limit = self
            .thresholds
            .stale_fix_interval(self.scheduler.multiplier());
        if self.state.elapsed_secs(now) <= limit {
            return false;
        }

        log::info!("No report for more than {}s, locating", limit);
        self.state.touch(now);
        self.locate(false);
        true
    }

    /// Handles one raw inbound message. Every failure is logged and dropped.
    pub fn on_message(&mut self, raw: &[u8]) {
        match self.router.route(raw, &mut self.identity) {
            Ok(Dispatch::Locate { forced }) => {
                self.locate(forced);
            }
            Ok(Dispatch::Reply(reply)) => self
                .transport
                .send(&reply)
                .unwrap_or_else(|e| log_error("command reply", &e)),
            Ok(Dispatch::Done) => {}
            Err(e) => log_error("inbound message", &e),
        }
    }

    fn locate(&mut self, forced: bool) -> Option<LocateOutcome> {
        self.locator
            .locate(&mut self.state, forced, &self.encoder)
            .map_err(|e| log_error("locate", &e))
            .ok()
    }
}
