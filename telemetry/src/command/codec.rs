use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::decompress_to_vec_zlib_with_limit;

use crate::error::{Result, TelemetryError};

pub const DELIMITER: char = ':';

/// zlib level of the reply compression.
pub const COMPRESSION_LEVEL: u8 = 9;

/// Upper bound for an inflated inbound command.
const MAX_INFLATED_SIZE: usize = 64 * 1024;

/// # Explanation
/// A decoded command: the payload split on the delimiter. The first part is the topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    parts: Vec<String>,
}

impl CommandMessage {
    pub fn parse(payload: &str) -> Result<Self> {
        if !payload.contains(DELIMITER) {
            return Err(TelemetryError::CommandParse(format!(
                "no '{}' in {:?}",
                DELIMITER, payload
            )));
        }
        Ok(CommandMessage {
            parts: payload.split(DELIMITER).map(str::to_string).collect(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.parts[0]
    }

    pub fn arg(&self, index: usize) -> Option<&str> {
        self.parts.get(index).map(String::as_str)
    }

    /// Like `arg` but a missing argument is a parse error.
    pub fn require(&self, index: usize, name: &str) -> Result<&str> {
        self.arg(index).ok_or_else(|| {
            TelemetryError::CommandParse(format!(
                "'{}' is missing the {} argument",
                self.topic(),
                name
            ))
        })
    }
}

/// # Explanation
/// Decodes a raw inbound payload. A payload that already contains the delimiter is plaintext,
/// anything else has to be a zlib stream that inflates to a delimited payload.
pub fn decode(raw: &[u8]) -> Result<CommandMessage> {
    if let Ok(text) = std::str::from_utf8(raw) {
        if text.contains(DELIMITER) {
            return CommandMessage::parse(text.trim_end_matches(['\r', '\n']));
        }
    }

    let inflated = decompress_to_vec_zlib_with_limit(raw, MAX_INFLATED_SIZE).map_err(|e| {
        TelemetryError::CommandParse(format!("neither plaintext nor zlib ({:?})", e.status))
    })?;
    let text = String::from_utf8(inflated)
        .map_err(|_| TelemetryError::CommandParse("inflated payload is not utf-8".to_string()))?;
    CommandMessage::parse(&text)
}

/// Frames the parts of a reply with the delimiter.
pub fn frame(parts: &[&str]) -> String {
    parts.join(&DELIMITER.to_string())
}

/// zlib (level 9) and then standard base64.
pub fn encode_reply(framed: &str) -> String {
    STANDARD.encode(compress_to_vec_zlib(framed.as_bytes(), COMPRESSION_LEVEL))
}

/// The inverse of `encode_reply`, as the backend applies it.
pub fn decode_reply(encoded: &str) -> Result<String> {
    let compressed = STANDARD
        .decode(encoded.trim())
        .map_err(|e| TelemetryError::CommandParse(format!("invalid base64: {}", e)))?;
    let inflated = decompress_to_vec_zlib_with_limit(&compressed, MAX_INFLATED_SIZE)
        .map_err(|e| {
            TelemetryError::CommandParse(format!("invalid zlib stream ({:?})", e.status))
        })?;
    String::from_utf8(inflated)
        .map_err(|_| TelemetryError::CommandParse("reply is not utf-8".to_string()))
}
