//! Cooperative break signal.
//!
//! SIGINT does not preempt anything: the handler only raises a shared flag
//! that the interactive pass checks before handling each message.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use wlfuzz_core::error::{Result, WlFuzzError};

/// Shared "break at the next message" flag.
///
/// Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct BreakSignal {
    raised: Arc<AtomicBool>,
}

impl BreakSignal {
    pub fn new() -> Self {
        Self {
            raised: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was set.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::SeqCst)
    }

    /// Route SIGINT (Ctrl-C) into this flag for the rest of the process.
    pub fn install_sigint(&self) -> Result<()> {
        let signal = self.clone();
        ctrlc::set_handler(move || signal.raise())
            .map_err(|e| WlFuzzError::Configuration(format!("install SIGINT handler: {e}")))
    }
}
