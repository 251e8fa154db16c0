//! Wire protocol primitives.
//!
//! - `message`: the envelope (direction + connection + 32-bit payload words)
//!   and the panic-free decoder for raw wire bytes.
//! - `wire`: builders and readers for argument words (uint/int/fixed/string),
//!   used by the proxy to synthesize and inspect messages.
//!
//! All parsers are panic-free: malformed input is reported as `WlFuzzError`
//! instead of indexing raw buffers.

pub mod message;
pub mod wire;

pub use message::{decode_message, Connection, Direction, Message};
pub use wire::{ArgReader, Fixed, MessageBuilder};
