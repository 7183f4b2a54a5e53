use std::time::Duration;

use sensors::coordinates::GeoCoord;

use crate::error::Result;

pub const TOPIC_GPS: &str = "gps";
pub const TOPIC_TAIL: &str = "tail";

pub const GPS_ACK_TIMEOUT: Duration = Duration::from_secs(20);
pub const TAIL_ACK_TIMEOUT: Duration = Duration::from_secs(200);
pub const TRUCK_ACK_TIMEOUT: Duration = Duration::from_secs(20);

/// # Explanation
/// A message for the backend: the body is sent on one topic and the transport waits at most
/// `ack_timeout` for the acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub body: String,
    pub ack_timeout: Duration,
}

impl OutboundMessage {
    pub fn new(topic: &str, body: impl Into<String>, ack_timeout: Duration) -> Self {
        OutboundMessage {
            topic: topic.to_string(),
            body: body.into(),
            ack_timeout,
        }
    }
}

/// # Explanation
/// The cellular link. Sending blocks until the message was acknowledged or the timeout elapsed.
/// `network_location` asks the network for a position fix once and returns None if it has none.
pub trait Transport: Send + Sync {
    fn send(&self, message: &OutboundMessage) -> Result<()>;

    fn network_location(&self) -> Option<GeoCoord>;
}
