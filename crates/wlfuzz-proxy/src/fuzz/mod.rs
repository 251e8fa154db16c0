//! Fuzzing pass: serial/callback correlation plus input synthesis.
//!
//! - `tracker`: keeps the client's view of serials and callbacks consistent.
//! - `schedule`: scripted or seeded streams of input events.
//! - `synth`: readiness gating and emission of synthetic server events.
//! - `pass`: the `Pass` tying the three to one connection.

pub mod options;
pub mod pass;
pub mod ring;
pub mod schedule;
pub mod synth;
pub mod tracker;

pub use options::{FuzzOptions, Mode};
pub use pass::FuzzPass;
pub use ring::{SyncRing, SYNC_RING_CAPACITY};
pub use schedule::{EventKind, EventSource, ProceduralSource, ScheduledEvent, ScriptSource};
pub use synth::{SynthState, Synthesizer, SETTLE_DELAY};
pub use tracker::{ClockBaseline, Discovered, Tracker};
