//! Schema resolver seam.
//!
//! Passes never interpret field layout on their own: they ask a `Resolver`
//! which interface a message's target object implements. `None` means the
//! object is unknown and the message must be passed through untouched.

pub mod object_map;
pub mod tables;

use wlfuzz_core::protocol::Message;

pub use object_map::ObjectMap;

/// Interface and method a message addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'a> {
    pub interface: &'a str,
    /// `None` when the opcode is outside the known method table.
    pub method: Option<&'static str>,
}

pub trait Resolver {
    fn resolve(&self, msg: &Message) -> Option<Resolved<'_>>;

    /// Called by the router after the pass chain has seen `msg`, so creations
    /// and destructions become visible to later messages.
    fn observe(&mut self, _msg: &Message) {}
}
