//! Ordered pass registry and per-message driver.

use std::sync::Arc;
use std::time::Instant;

use wlfuzz_core::error::{Result, WlFuzzError};
use wlfuzz_core::protocol::{Direction, Message};

use crate::obs::metrics::ProxyMetrics;
use crate::resolve::Resolver;
use crate::transport::Transport;

use super::pass::{IdleContext, Pass, PassContext, Verdict};

/// Owns the passes of one connection and drives each message through them.
pub struct Router {
    passes: Vec<Box<dyn Pass>>,
    pinned: Option<Box<dyn Pass>>,
    resolver: Box<dyn Resolver>,
    metrics: Arc<ProxyMetrics>,
    exit: bool,
    finalized: bool,
}

impl Router {
    pub fn new(resolver: Box<dyn Resolver>, metrics: Arc<ProxyMetrics>) -> Self {
        Self {
            passes: Vec::new(),
            pinned: None,
            resolver,
            metrics,
            exit: false,
            finalized: false,
        }
    }

    /// Initialize `pass` with `args` and append it to the chain.
    ///
    /// A failing `init` discards the pass; passes already registered are left
    /// as they were.
    pub fn register(&mut self, mut pass: Box<dyn Pass>, args: &[String]) -> Result<()> {
        let name = pass.name();
        if pass.pinned_last() && self.pinned.is_some() {
            return Err(WlFuzzError::Configuration(format!(
                "pass {name}: another pinned pass is already registered"
            )));
        }

        if let Err(e) = pass.init(args) {
            tracing::error!(pass = name, error = %e, "pass init failed");
            tracing::info!(pass = name, usage = pass.usage(), "usage");
            return Err(e);
        }

        tracing::debug!(pass = name, pinned = pass.pinned_last(), "pass registered");
        if pass.pinned_last() {
            self.pinned = Some(pass);
        } else {
            self.passes.push(pass);
        }
        Ok(())
    }

    /// Pass names in execution order.
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes
            .iter()
            .chain(self.pinned.iter())
            .map(|p| p.name())
            .collect()
    }

    pub fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }

    pub fn metrics(&self) -> Arc<ProxyMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn exit_requested(&self) -> bool {
        self.exit
    }

    pub fn request_exit(&mut self) {
        self.exit = true;
    }

    /// Run `msg` through the chain. Returns whether it should be forwarded.
    pub fn route(&mut self, msg: &mut Message, now: Instant) -> bool {
        let started = Instant::now();
        let direction = msg.direction();

        let mut ctx = PassContext::new(self.resolver.as_ref(), now, self.exit);
        for pass in self.passes.iter_mut().chain(self.pinned.iter_mut()) {
            let verdict = match direction {
                Direction::FromServer => pass.handle_server(&mut ctx, msg),
                Direction::FromClient => pass.handle_client(&mut ctx, msg),
            };
            if verdict == Verdict::StopChain {
                break;
            }
        }
        let forward = !ctx.is_skipped();
        let exit = ctx.exit_requested();

        self.exit = exit;
        self.resolver.observe(msg);

        let labels = [("direction", direction.as_str())];
        self.metrics.routed.inc(&labels);
        if !forward {
            self.metrics.dropped.inc(&labels);
        }
        self.metrics.route_duration.observe(&labels, started.elapsed());

        forward
    }

    /// Give every pass its idle opportunity.
    pub fn idle(&mut self, now: Instant, transport: &mut dyn Transport) {
        let mut ctx = IdleContext::new(now, transport, self.exit);
        for pass in self.passes.iter_mut().chain(self.pinned.iter_mut()) {
            pass.idle(&mut ctx);
        }
        self.exit = ctx.exit_requested();
    }

    /// Finalize every pass exactly once: the pinned pass first, then the rest
    /// in reverse registration order.
    pub fn shutdown(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;

        if let Some(pass) = self.pinned.as_mut() {
            tracing::debug!(pass = pass.name(), "finalizing pass");
            pass.finalize();
        }
        for pass in self.passes.iter_mut().rev() {
            tracing::debug!(pass = pass.name(), "finalizing pass");
            pass.finalize();
        }
        self.exit = true;
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.shutdown();
    }
}
