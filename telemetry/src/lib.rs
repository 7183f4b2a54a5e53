//! The reporting policy and the remote command protocol of the tracker.

pub mod agent;
pub mod clock;
pub mod command;
pub mod duty;
pub mod error;
pub mod filter;
pub mod identity;
pub mod locate;
pub mod report;
pub mod state;
pub mod transport;

pub use agent::{Agent, Collaborators};
pub use error::{Result, TelemetryError};
