//! Argument encoding helpers.

use std::sync::Arc;

use crate::error::{Result, WlFuzzError};
use crate::protocol::message::{Connection, Direction, Message, HEADER_BYTES};

/// Signed 24.8 fixed-point number, as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixed(i32);

impl Fixed {
    pub fn from_raw(raw: i32) -> Self {
        Fixed(raw)
    }

    pub fn from_int(v: i32) -> Self {
        Fixed(v << 8)
    }

    /// Scale a normalized coordinate by `extent`, keeping the integer part.
    ///
    /// Out-of-range input is clamped to `[0, 1]`.
    pub fn from_normalized(v: f64, extent: u32) -> Self {
        let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        // largest integer that survives the 24.8 shift
        let max = f64::from(i32::MAX >> 8);
        let scaled = (v * f64::from(extent)).trunc().min(max) as i32;
        Fixed::from_int(scaled)
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / 256.0
    }
}

/// Builds one message from typed arguments and fills in the size field.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    object: u32,
    opcode: u16,
    args: Vec<u32>,
}

impl MessageBuilder {
    pub fn new(object: u32, opcode: u16) -> Self {
        Self {
            object,
            opcode,
            args: Vec::new(),
        }
    }

    pub fn uint(mut self, v: u32) -> Self {
        self.args.push(v);
        self
    }

    pub fn int(mut self, v: i32) -> Self {
        self.args.push(v as u32);
        self
    }

    pub fn fixed(mut self, v: Fixed) -> Self {
        self.args.push(v.raw() as u32);
        self
    }

    pub fn object(self, id: u32) -> Self {
        self.uint(id)
    }

    pub fn new_id(self, id: u32) -> Self {
        self.uint(id)
    }

    /// Length-prefixed, NUL-terminated, padded to a word boundary.
    pub fn string(mut self, s: &str) -> Self {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.args.push(bytes.len() as u32);
        self.push_padded(&bytes);
        self
    }

    /// Length-prefixed byte array, padded to a word boundary.
    pub fn array(mut self, data: &[u8]) -> Self {
        self.args.push(data.len() as u32);
        self.push_padded(data);
        self
    }

    fn push_padded(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(4) {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.args.push(u32::from_ne_bytes(word));
        }
    }

    pub fn build(self, direction: Direction, connection: Arc<Connection>) -> Result<Message> {
        let size = HEADER_BYTES + self.args.len() * 4;
        if size > usize::from(u16::MAX) {
            return Err(WlFuzzError::ProtocolFormat(format!(
                "message of {size} bytes does not fit the size field"
            )));
        }
        let mut words = Vec::with_capacity(2 + self.args.len());
        words.push(self.object);
        words.push(((size as u32) << 16) | u32::from(self.opcode));
        words.extend(self.args);
        Ok(Message::from_words(direction, connection, words))
    }
}

/// Sequential reader over argument words.
pub struct ArgReader<'a> {
    args: &'a [u32],
    pos: usize,
}

impl<'a> ArgReader<'a> {
    pub fn new(args: &'a [u32]) -> Self {
        Self { args, pos: 0 }
    }

    pub fn uint(&mut self) -> Option<u32> {
        let v = self.args.get(self.pos).copied()?;
        self.pos += 1;
        Some(v)
    }

    pub fn int(&mut self) -> Option<i32> {
        self.uint().map(|v| v as i32)
    }

    /// Read a string argument; `None` on truncation or invalid UTF-8.
    pub fn string(&mut self) -> Option<String> {
        let len = self.uint()? as usize;
        if len == 0 {
            return Some(String::new());
        }
        let nwords = len.div_ceil(4);
        let words = self.args.get(self.pos..self.pos + nwords)?;
        self.pos += nwords;

        let mut bytes: Vec<u8> = words.iter().flat_map(|w| w.to_ne_bytes()).collect();
        bytes.truncate(len);
        if bytes.last() == Some(&0) {
            bytes.pop();
        }
        String::from_utf8(bytes).ok()
    }

    /// Index of the next unread argument.
    pub fn position(&self) -> usize {
        self.pos
    }
}
