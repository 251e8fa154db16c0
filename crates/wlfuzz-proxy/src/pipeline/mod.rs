//! Pass pipeline.
//!
//! Re-exports the pass contract and the router so downstream consumers can
//! depend on this module directly.

pub mod pass;
pub mod router;
pub mod trace_pass;

pub use pass::{IdleContext, Pass, PassContext, Verdict};
pub use router::Router;
pub use trace_pass::TracePass;
