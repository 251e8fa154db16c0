use std::time::Instant;

use wlfuzz_core::error::Result;
use wlfuzz_core::protocol::Message;

use crate::resolve::{Resolved, Resolver};
use crate::transport::Transport;

/// Outcome of one pass handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the message to the next pass.
    Continue,
    /// No further pass sees this message.
    StopChain,
}

/// Per-message state a handler can read and flag.
pub struct PassContext<'a> {
    resolver: &'a dyn Resolver,
    now: Instant,
    skip_forward: bool,
    exit: bool,
}

impl<'a> PassContext<'a> {
    pub fn new(resolver: &'a dyn Resolver, now: Instant, exit: bool) -> Self {
        Self {
            resolver,
            now,
            skip_forward: false,
            exit,
        }
    }

    /// Monotonic time sampled once for this message.
    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn resolve(&self, msg: &Message) -> Option<Resolved<'a>> {
        let resolver: &'a dyn Resolver = self.resolver;
        resolver.resolve(msg)
    }

    /// Suppress physical forwarding of the current message.
    pub fn skip_forward(&mut self) {
        self.skip_forward = true;
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_forward
    }

    /// Ask the session driver to stop after this message.
    pub fn request_exit(&mut self) {
        self.exit = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit
    }
}

/// State handed to idle hooks.
pub struct IdleContext<'a> {
    now: Instant,
    transport: &'a mut dyn Transport,
    exit: bool,
}

impl<'a> IdleContext<'a> {
    pub fn new(now: Instant, transport: &'a mut dyn Transport, exit: bool) -> Self {
        Self {
            now,
            transport,
            exit,
        }
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    /// Client-facing transport. Messages written here bypass the pipeline.
    pub fn transport(&mut self) -> &mut dyn Transport {
        &mut *self.transport
    }

    pub fn request_exit(&mut self) {
        self.exit = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit
    }
}

/// One stage of the interception pipeline.
///
/// Lifecycle: `init` once with the pass arguments, handlers zero or more
/// times on the router's single thread, `finalize` exactly once.
pub trait Pass {
    fn name(&self) -> &'static str;

    fn init(&mut self, args: &[String]) -> Result<()>;

    fn handle_server(&mut self, ctx: &mut PassContext<'_>, msg: &mut Message) -> Verdict;

    fn handle_client(&mut self, ctx: &mut PassContext<'_>, msg: &mut Message) -> Verdict;

    /// Called once per idle opportunity (no message pending).
    fn idle(&mut self, _ctx: &mut IdleContext<'_>) {}

    fn usage(&self) -> &'static str;

    fn finalize(&mut self) {}

    /// A pinned pass always runs after every other pass.
    fn pinned_last(&self) -> bool {
        false
    }
}
