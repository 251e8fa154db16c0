use std::io::{self, Write};
use std::time::Instant;

use wlfuzz_core::protocol::{Connection, Direction};

use super::codec::encode_line;
use super::Transport;

/// Writes every message as a capture line, stamped relative to `origin`.
///
/// One instance per direction: the client-facing sink carries
/// `Direction::FromServer` lines.
pub struct TraceTransport<W: Write> {
    out: W,
    direction: Direction,
    origin: Instant,
}

impl<W: Write> TraceTransport<W> {
    pub fn new(out: W, direction: Direction, origin: Instant) -> Self {
        Self {
            out,
            direction,
            origin,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Transport for TraceTransport<W> {
    fn write(&mut self, _connection: &Connection, bytes: &[u8]) -> io::Result<()> {
        let line = encode_line(self.origin.elapsed(), self.direction, bytes);
        writeln!(self.out, "{line}")
    }

    fn flush(&mut self, _connection: &Connection) -> io::Result<()> {
        self.out.flush()
    }
}
