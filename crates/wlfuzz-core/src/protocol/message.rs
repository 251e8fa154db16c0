//! Message envelope and raw wire decoding.
//!
//! Layout of one message, in host byte order:
//! - word 0: target object id
//! - word 1: `size << 16 | opcode`, where `size` is the total byte length
//! - words 2..: opcode-specific arguments
//!
//! Parsing rules:
//! - Never index raw buffers, always use `Buf` and `remaining()` checks.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, WlFuzzError};

/// Object id + header word.
pub const HEADER_BYTES: usize = 8;

/// Index of the first argument word.
pub const FIRST_ARG: usize = 2;

/// Which peer produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    FromServer,
    FromClient,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::FromServer => "server",
            Direction::FromClient => "client",
        }
    }

    /// Single-letter tag used in capture files.
    pub fn tag(self) -> char {
        match self {
            Direction::FromServer => 'S',
            Direction::FromClient => 'C',
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The proxied connection a message belongs to.
///
/// Shared by every envelope on the connection; envelopes never own it.
#[derive(Debug)]
pub struct Connection {
    id: u64,
    program: Option<String>,
}

impl Connection {
    pub fn new(id: u64, program: Option<String>) -> Self {
        Self { id, program }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Program name of the client peer, when known.
    pub fn program(&self) -> Option<&str> {
        self.program.as_deref()
    }
}

/// One decoded protocol message.
///
/// Direction and connection are fixed at creation; only the payload words can
/// be rewritten by passes.
#[derive(Debug, Clone)]
pub struct Message {
    direction: Direction,
    connection: Arc<Connection>,
    words: Vec<u32>,
}

impl Message {
    /// Build from payload words without validation.
    ///
    /// Use `check_format` before trusting the header of a message built this
    /// way.
    pub fn from_words(direction: Direction, connection: Arc<Connection>, words: Vec<u32>) -> Self {
        Self {
            direction,
            connection,
            words,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Target object id (word 0).
    pub fn object_id(&self) -> u32 {
        self.words.first().copied().unwrap_or(0)
    }

    pub fn opcode(&self) -> u16 {
        (self.header() & 0xffff) as u16
    }

    /// Byte length claimed by the header.
    pub fn declared_len(&self) -> usize {
        (self.header() >> 16) as usize
    }

    /// Physical byte length of the payload.
    pub fn byte_len(&self) -> usize {
        self.words.len() * 4
    }

    fn header(&self) -> u32 {
        self.words.get(1).copied().unwrap_or(0)
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Argument words (everything after the header).
    pub fn args(&self) -> &[u32] {
        self.words.get(FIRST_ARG..).unwrap_or(&[])
    }

    pub fn word(&self, index: usize) -> Option<u32> {
        self.words.get(index).copied()
    }

    /// Overwrite one payload word in place.
    pub fn set_word(&mut self, index: usize, value: u32) -> Result<()> {
        let len = self.words.len();
        let slot = self.words.get_mut(index).ok_or_else(|| {
            WlFuzzError::ProtocolFormat(format!("word index {index} out of bounds (len {len})"))
        })?;
        *slot = value;
        Ok(())
    }

    /// Verify the header against the physical payload.
    pub fn check_format(&self) -> Result<()> {
        if self.words.len() < FIRST_ARG {
            return Err(WlFuzzError::ProtocolFormat(format!(
                "message too short: {} bytes",
                self.byte_len()
            )));
        }
        if self.declared_len() != self.byte_len() {
            return Err(WlFuzzError::ProtocolFormat(format!(
                "size field {} does not match payload length {}",
                self.declared_len(),
                self.byte_len()
            )));
        }
        Ok(())
    }

    /// Encode back into wire bytes.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.byte_len());
        for w in &self.words {
            out.put_u32_ne(*w);
        }
        out.freeze()
    }
}

/// Decode one complete message from raw wire bytes.
pub fn decode_message(
    direction: Direction,
    connection: Arc<Connection>,
    mut buf: Bytes,
) -> Result<Message> {
    let total = buf.remaining();
    if total < HEADER_BYTES {
        return Err(WlFuzzError::ProtocolFormat(format!(
            "message too short: {total} bytes"
        )));
    }
    if total % 4 != 0 {
        return Err(WlFuzzError::ProtocolFormat(format!(
            "message length {total} is not word aligned"
        )));
    }

    let mut words = Vec::with_capacity(total / 4);
    while buf.remaining() >= 4 {
        words.push(buf.get_u32_ne());
    }

    let msg = Message::from_words(direction, connection, words);
    msg.check_format()?;
    Ok(msg)
}
