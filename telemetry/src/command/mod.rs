//! Inbound remote commands: framing and compression (`codec`), dispatch (`router`) and the
//! allow-listed collaborators the commands act on (`shell`, `tail`).

pub mod codec;
pub mod router;
pub mod shell;
pub mod tail;

pub use router::{CommandRouter, Dispatch, Topic};
