//! Transport seam.
//!
//! The proxy core never opens or closes connections. It is handed an
//! already-connected `Transport` and only writes whole messages to it.

pub mod codec;
pub mod trace;

use std::io;

use wlfuzz_core::protocol::Connection;

pub use codec::{decode_line, CaptureEntry};
pub use trace::TraceTransport;

pub trait Transport {
    fn write(&mut self, connection: &Connection, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self, connection: &Connection) -> io::Result<()>;
}
