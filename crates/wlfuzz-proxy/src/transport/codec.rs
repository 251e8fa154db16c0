//! Decode-once codec for capture lines.
//!
//! One message per line: `<millis> <S|C> <hex payload>`, where `millis` is the
//! offset from the start of the capture. Blank lines and `#` comments carry no
//! message.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use wlfuzz_core::{
    error::{Result, WlFuzzError},
    protocol::{decode_message, Connection, Direction, Message},
};

#[derive(Debug)]
pub struct CaptureEntry {
    /// Offset from the start of the capture.
    pub at: Duration,
    pub msg: Message,
}

pub fn decode_line(line: &str, connection: &Arc<Connection>) -> Result<Option<CaptureEntry>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let (Some(at), Some(dir), Some(payload), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(WlFuzzError::ProtocolFormat(format!(
            "capture line needs 3 fields: {line}"
        )));
    };

    let at: u64 = at
        .parse()
        .map_err(|e| WlFuzzError::ProtocolFormat(format!("bad capture offset {at}: {e}")))?;
    let direction = match dir {
        "S" => Direction::FromServer,
        "C" => Direction::FromClient,
        other => {
            return Err(WlFuzzError::ProtocolFormat(format!(
                "bad capture direction {other}"
            )))
        }
    };
    let raw = hex::decode(payload)
        .map_err(|e| WlFuzzError::ProtocolFormat(format!("bad capture payload: {e}")))?;

    let msg = decode_message(direction, Arc::clone(connection), Bytes::from(raw))?;
    Ok(Some(CaptureEntry {
        at: Duration::from_millis(at),
        msg,
    }))
}

/// Inverse of `decode_line`.
pub fn encode_line(at: Duration, direction: Direction, bytes: &[u8]) -> String {
    format!("{} {} {}", at.as_millis(), direction.tag(), hex::encode(bytes))
}
