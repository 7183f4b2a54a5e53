use crate::command::codec::{self, CommandMessage};
use crate::command::shell::CommandRunner;
use crate::command::tail::Tailer;
use crate::error::{log_error, Result, TelemetryError};
use crate::identity::{Identity, IdentityStore};
use crate::transport::{OutboundMessage, TAIL_ACK_TIMEOUT, TOPIC_TAIL, TRUCK_ACK_TIMEOUT};

/// Content of a tail reply when the file could not be read.
pub const TAIL_ERROR: &str = "error";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Topic {
    Gps,
    Gpsd,
    Cmd,
    Tail,
    Truck,
}

impl Topic {
    pub fn parse(topic: &str) -> Option<Topic> {
        match topic {
            "gps" => Some(Topic::Gps),
            "gpsd" => Some(Topic::Gpsd),
            "cmd" => Some(Topic::Cmd),
            "tail" => Some(Topic::Tail),
            "truck" => Some(Topic::Truck),
            _ => None,
        }
    }
}

/// # Explanation
/// What the agent has to do after a message was routed. Locating needs the report state, which
/// is owned by the agent, so the router hands that back instead of doing it itself.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Locate { forced: bool },
    Reply(OutboundMessage),
    Done,
}

/// # Explanation
/// The command router decodes inbound messages and dispatches them on their topic. Unknown topics
/// are ignored. Replies are framed with the delimiter, compressed and base64 encoded.
pub struct CommandRouter {
    runner: Box<dyn CommandRunner>,
    tailer: Box<dyn Tailer>,
    store: Box<dyn IdentityStore>,
}

impl CommandRouter {
    pub fn new(
        runner: Box<dyn CommandRunner>,
        tailer: Box<dyn Tailer>,
        store: Box<dyn IdentityStore>,
    ) -> Self {
        CommandRouter {
            runner,
            tailer,
            store,
        }
    }

    pub fn route(&self, raw: &[u8], identity: &mut Identity) -> Result<Dispatch> {
        let message = codec::decode(raw)?;
        log::debug!("Received command {:?}", message);

        let topic = match Topic::parse(message.topic()) {
            Some(topic) => topic,
            None => {
                log::debug!("Ignoring unknown topic '{}'", message.topic());
                return Ok(Dispatch::Done);
            }
        };

        match topic {
            Topic::Gps => Ok(Dispatch::Locate { forced: false }),
            Topic::Gpsd => Ok(Dispatch::Locate { forced: true }),
            Topic::Cmd => {
                let command = message.require(1, "command")?;
                self.runner.run(command)?;
                Ok(Dispatch::Done)
            }
            Topic::Tail => self.tail(&message).map(Dispatch::Reply),
            Topic::Truck => self.truck(&message, identity).map(Dispatch::Reply),
        }
    }

    fn tail(&self, message: &CommandMessage) -> Result<OutboundMessage> {
        let count = message.require(1, "line count")?;
        let path = message.require(2, "path")?;

        let content = count
            .trim()
            .parse::<usize>()
            .map_err(|e| {
                TelemetryError::CommandExec(format!("invalid line count {:?}: {}", count, e))
            })
            .and_then(|lines| self.tailer.tail(path, lines))
            .unwrap_or_else(|e| {
                log_error("tail", &e);
                TAIL_ERROR.to_string()
            });

        let framed = codec::frame(&["tail", path, &content]);
        Ok(OutboundMessage::new(
            TOPIC_TAIL,
            codec::encode_reply(&framed),
            TAIL_ACK_TIMEOUT,
        ))
    }

    /// # Explanation
    /// `get` reloads the identifier from storage, `set` persists a new one. Any other sub command
    /// only replies with the current identifier. The reply goes out on the tail topic, which is
    /// where the backend expects it.
    fn truck(&self, message: &CommandMessage, identity: &mut Identity) -> Result<OutboundMessage> {
        match message.require(1, "sub command")? {
            "get" => identity.truck = self.store.load_truck()?,
            "set" => {
                let truck = message.require(2, "identifier")?;
                if truck.trim().is_empty() {
                    return Err(TelemetryError::CommandParse(
                        "the truck identifier must not be empty".to_string(),
                    ));
                }
                self.store.store_truck(truck)?;
                log::info!("Truck identifier changed from '{}' to '{}'", identity.truck, truck);
                identity.truck = truck.to_string();
            }
            other => log::debug!("Unknown truck sub command '{}'", other),
        }

        let framed = codec::frame(&["truck", &identity.truck]);
        Ok(OutboundMessage::new(
            TOPIC_TAIL,
            codec::encode_reply(&framed),
            TRUCK_ACK_TIMEOUT,
        ))
    }
}
