//! wlfuzz proxy library entry.
//!
//! This crate wires the pass pipeline, the correlation tracker and input
//! synthesizer (`fuzz`), the interactive breakpoint controller, and the
//! collaborator seams (resolver, formatter, transport) into one proxy stack.
//! It is consumed by the binary (`main.rs`) and by integration tests.

pub mod app;
pub mod cancel;
pub mod config;
pub mod format;
pub mod fuzz;
pub mod interactive;
pub mod obs;
pub mod pipeline;
pub mod resolve;
pub mod session;
pub mod transport;
