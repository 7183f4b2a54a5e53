use std::error::Error;
use std::io::ErrorKind;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::BytesMut;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;

use sensors::coordinates::GeoCoord;
use telemetry::transport::{OutboundMessage, Transport};
use telemetry::{Result, TelemetryError};

use crate::config::CloudConfig;
use crate::worker::Event;

const LOCATE_TIMEOUT: Duration = Duration::from_secs(1);
const INBOUND_TIMEOUT: Duration = Duration::from_secs(30);
/// Inbound messages are short commands, anything larger is dropped.
const MAX_INBOUND_BYTES: usize = 64 * 1024;

/// # Explanation
/// The envelope of one outbound message. `k` is the device key, `d` the data and `t` the topics.
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    k: &'a str,
    d: &'a str,
    t: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct NetworkFix {
    latitude: f64,
    longitude: f64,
}

/// # Explanation
/// The transport of the cellular cloud. Every message is sent over its own tcp connection as a json
/// envelope, the cloud answers with an ack (a json array whose first element is the status code, 0
/// meaning success). The network location is fetched over http, if a locate url is configured.
///
/// The agent is synchronous, so the transport owns a tokio runtime and blocks on it.
pub struct CloudTransport {
    settings: CloudConfig,
    runtime: Runtime,
    client: Client,
}

impl CloudTransport {
    pub fn new(settings: CloudConfig) -> std::io::Result<Self> {
        Ok(CloudTransport {
            settings,
            runtime: Runtime::new()?,
            client: Client::new(),
        })
    }

    async fn exchange(addr: String, envelope: String) -> std::io::Result<String> {
        let mut stream = TcpStream::connect(&addr).await?;
        stream.write_all(envelope.as_bytes()).await?;
        stream.shutdown().await?;

        let mut response = String::new();
        stream.read_to_string(&mut response).await?;
        Ok(response)
    }

    async fn fetch_location(client: &Client, url: &str) -> reqwest::Result<NetworkFix> {
        client
            .get(url)
            .timeout(LOCATE_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json::<NetworkFix>()
            .await
    }
}

impl Transport for CloudTransport {
    fn send(&self, message: &OutboundMessage) -> Result<()> {
        let envelope = serde_json::to_string(&Envelope {
            k: &self.settings.device_key,
            d: &message.body,
            t: [message.topic.as_str()],
        })
        .map_err(|e| TelemetryError::transmission(&message.topic, e))?;
        let addr = format!("{}:{}", self.settings.host, self.settings.port);

        let response = self
            .runtime
            .block_on(async {
                tokio::time::timeout(message.ack_timeout, Self::exchange(addr, envelope)).await
            })
            .map_err(|_| {
                TelemetryError::transmission(
                    &message.topic,
                    format!("no ack within {:?}", message.ack_timeout),
                )
            })?
            .map_err(|e| TelemetryError::transmission(&message.topic, e))?;

        parse_ack(&response)
            .map_err(|reason| TelemetryError::transmission(&message.topic, reason))?;
        log::debug!("Sent {} bytes on topic '{}'", message.body.len(), message.topic);
        Ok(())
    }

    fn network_location(&self) -> Option<GeoCoord> {
        let url = self.settings.locate_url.as_deref()?;
        match self
            .runtime
            .block_on(Self::fetch_location(&self.client, url))
        {
            Ok(fix) => Some(GeoCoord::new(fix.longitude, fix.latitude)),
            Err(e) => {
                log::debug!("No network location: {}", e);
                None
            }
        }
    }
}

/// # Explanation
/// Checks the ack of the cloud. The ack is a json array of status codes, e.g. `[0,0]`.
pub fn parse_ack(response: &str) -> std::result::Result<(), String> {
    let codes: Vec<i64> = serde_json::from_str(response.trim())
        .map_err(|e| format!("invalid ack {:?}: {}", response, e))?;
    match codes.first() {
        Some(0) => Ok(()),
        Some(code) => Err(format!("the cloud rejected the message with code {}", code)),
        None => Err("empty ack".to_string()),
    }
}

/// # Explanation
/// The inbound listener accepts connections of the cloud on its own thread. Every connection
/// carries one message; the raw bytes are handed to the worker as an event.
pub struct InboundListener;

impl InboundListener {
    pub fn run(listen_addr: String, events: Sender<Event>) -> JoinHandle<()> {
        std::thread::spawn(move || match Runtime::new() {
            Ok(runtime) => runtime.block_on(async move {
                Self::accept_messages(&listen_addr, events)
                    .await
                    .unwrap_or_else(|error| log::error!("Inbound listener error: {}", error))
            }),
            Err(error) => log::error!("Cannot start the inbound listener: {}", error),
        })
    }

    async fn accept_messages(
        listen_addr: &str,
        events: Sender<Event>,
    ) -> std::result::Result<(), Box<dyn Error>> {
        let listener = TcpListener::bind(listen_addr).await?;
        log::info!("Listening for inbound messages on {}", listen_addr);

        loop {
            let (stream, peer) = listener.accept().await?;
            let read = tokio::time::timeout(INBOUND_TIMEOUT, Self::read_message(stream));
            let message = match read.await {
                Ok(Ok(message)) => message,
                Ok(Err(e)) => {
                    log::warn!("Reading the message of {} failed: {}", peer, e);
                    continue;
                }
                Err(_) => {
                    log::warn!("The message of {} timed out", peer);
                    continue;
                }
            };

            if message.is_empty() {
                continue;
            }
            log::debug!("Received {} bytes from {}", message.len(), peer);
            if events.send(Event::Message(message.to_vec())).is_err() {
                // the worker is gone
                return Ok(());
            }
        }
    }

    /// # Explanation
    /// Reads one message until the peer closes the connection. A message above the size limit is
    /// an error, a cut off command must never be executed.
    async fn read_message<R: AsyncRead + Unpin>(mut stream: R) -> std::io::Result<BytesMut> {
        let mut buffer = BytesMut::with_capacity(1024);
        while stream.read_buf(&mut buffer).await? != 0 {
            if buffer.len() > MAX_INBOUND_BYTES {
                return Err(std::io::Error::new(
                    ErrorKind::InvalidData,
                    format!("message exceeds {} bytes, dropped", MAX_INBOUND_BYTES),
                ));
            }
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ack() {
        assert!(parse_ack("[0,0]").is_ok());
        assert!(parse_ack("[0,0]\r\n").is_ok());
        assert!(parse_ack("[1,0]").is_err());
        assert!(parse_ack("[]").is_err());
        assert!(parse_ack("garbage").is_err());
    }

    #[test]
    fn test_read_message() {
        let runtime = Runtime::new().unwrap();

        let message = runtime
            .block_on(InboundListener::read_message(&b"truck:get"[..]))
            .unwrap();
        assert_eq!(&message[..], b"truck:get");

        let oversized = vec![b'x'; MAX_INBOUND_BYTES + 1];
        let error = runtime
            .block_on(InboundListener::read_message(&oversized[..]))
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidData);

        let at_limit = vec![b'x'; MAX_INBOUND_BYTES];
        let message = runtime
            .block_on(InboundListener::read_message(&at_limit[..]))
            .unwrap();
        assert_eq!(message.len(), MAX_INBOUND_BYTES);
    }

    #[test]
    fn test_envelope() {
        let envelope = serde_json::to_string(&Envelope {
            k: "key",
            d: "payload",
            t: ["gps"],
        })
        .unwrap();
        assert_eq!(envelope, r#"{"k":"key","d":"payload","t":["gps"]}"#);
    }

    #[test]
    fn test_send_and_ack() {
        let runtime = Runtime::new().unwrap();
        let listener = runtime
            .block_on(TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = runtime.spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = String::new();
            stream.read_to_string(&mut request).await.unwrap();
            stream.write_all(b"[0,0]").await.unwrap();
            request
        });

        let transport = CloudTransport::new(CloudConfig {
            host: "127.0.0.1".to_string(),
            port,
            device_key: "key".to_string(),
            ..CloudConfig::default()
        })
        .unwrap();
        let message = OutboundMessage::new("gps", "payload", Duration::from_secs(5));
        transport.send(&message).unwrap();

        let request = runtime.block_on(server).unwrap();
        assert_eq!(request, r#"{"k":"key","d":"payload","t":["gps"]}"#);
    }

    #[test]
    fn test_missing_ack_is_a_transmission_error() {
        let runtime = Runtime::new().unwrap();
        let listener = runtime
            .block_on(TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        // accepts the connection but never answers
        let server = runtime.spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            drop(stream);
        });

        let transport = CloudTransport::new(CloudConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..CloudConfig::default()
        })
        .unwrap();
        let message = OutboundMessage::new("tail", "payload", Duration::from_millis(200));

        let error = transport.send(&message).unwrap_err();
        assert_eq!(error.kind(), "TransmissionError");
        server.abort();
    }

    #[test]
    fn test_no_locate_url_means_no_network_fix() {
        let transport = CloudTransport::new(CloudConfig::default()).unwrap();
        assert_eq!(transport.network_location(), None);
    }
}
