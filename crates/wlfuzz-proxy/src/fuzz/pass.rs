use std::fs;
use std::sync::Arc;
use std::time::Instant;

use wlfuzz_core::error::{Result, WlFuzzError};
use wlfuzz_core::protocol::Message;

use crate::obs::metrics::ProxyMetrics;
use crate::pipeline::{IdleContext, Pass, PassContext, Verdict};

use super::options::{FuzzOptions, Mode};
use super::schedule::{EventSource, ProceduralSource, ScriptSource};
use super::synth::{SynthState, Synthesizer};
use super::tracker::Tracker;

/// Consecutive write failures before they are reported as errors.
const WRITE_FAILURE_REPORT: u32 = 3;

const BLOCKED_INTERFACES: &[&str] = &["wl_pointer", "wl_keyboard"];

/// Tracks one connection's protocol state and injects synthetic input.
pub struct FuzzPass {
    metrics: Arc<ProxyMetrics>,
    options: Option<FuzzOptions>,
    tracker: Tracker,
    synth: Option<Synthesizer>,
    /// Whether the connection matches `program=`, decided on first message.
    applies: Option<bool>,
    write_failures: u32,
}

impl FuzzPass {
    pub fn new(metrics: Arc<ProxyMetrics>) -> Self {
        Self {
            tracker: Tracker::new(Instant::now(), Arc::clone(&metrics)),
            metrics,
            options: None,
            synth: None,
            applies: None,
            write_failures: 0,
        }
    }

    pub fn options(&self) -> Option<&FuzzOptions> {
        self.options.as_ref()
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn synth_state(&self) -> SynthState {
        self.synth
            .as_ref()
            .map(|s| s.state())
            .unwrap_or(SynthState::NotReady)
    }

    fn load_source(options: &FuzzOptions) -> Result<Box<dyn EventSource>> {
        match &options.mode {
            Mode::Procedural { seed } => {
                tracing::info!(seed, "procedural input");
                Ok(Box::new(ProceduralSource::new(
                    *seed,
                    options.delay_min,
                    options.delay_max,
                )))
            }
            Mode::Replay { script } => {
                let text = fs::read_to_string(script).map_err(|e| {
                    WlFuzzError::Configuration(format!(
                        "fuzz: cannot read script {}: {e}",
                        script.display()
                    ))
                })?;
                let source = ScriptSource::parse(&text);
                if source.remaining() == 0 {
                    tracing::warn!(script = %script.display(), "script has no events");
                }
                tracing::info!(script = %script.display(), events = source.remaining(), "replaying script");
                Ok(Box::new(source))
            }
        }
    }

    fn applies(&mut self, msg: &Message) -> bool {
        if let Some(applies) = self.applies {
            return applies;
        }
        let applies = match self.options.as_ref().and_then(|o| o.program.as_deref()) {
            None => true,
            Some(want) => msg.connection().program() == Some(want),
        };
        if !applies {
            tracing::info!(
                connection = msg.connection().id(),
                program = ?msg.connection().program(),
                "connection does not match program filter, fuzz pass inert"
            );
        }
        self.applies = Some(applies);
        applies
    }

    fn block_mode(&self) -> bool {
        self.options.as_ref().is_some_and(|o| o.block)
    }
}

impl Pass for FuzzPass {
    fn name(&self) -> &'static str {
        "fuzz"
    }

    fn init(&mut self, args: &[String]) -> Result<()> {
        let options = FuzzOptions::parse(args)?;
        let source = Self::load_source(&options)?;

        let mut synth = Synthesizer::new(
            source,
            options.program.clone(),
            options.verbose,
            Arc::clone(&self.metrics),
        );
        synth.arm();

        tracing::info!(
            block = options.block,
            verbose = options.verbose,
            program = ?options.program,
            "fuzz pass initialized"
        );
        self.synth = Some(synth);
        self.options = Some(options);
        Ok(())
    }

    fn handle_server(&mut self, ctx: &mut PassContext<'_>, msg: &mut Message) -> Verdict {
        if !self.applies(msg) {
            return Verdict::Continue;
        }
        if let Some(synth) = self.synth.as_mut() {
            synth.note_connection(msg.connection());
        }

        let resolved = ctx.resolve(msg);
        if self.block_mode() && resolved.is_some_and(|r| BLOCKED_INTERFACES.contains(&r.interface)) {
            ctx.skip_forward();
            return Verdict::Continue;
        }

        self.tracker.observe_server(resolved, msg, ctx.now());
        Verdict::Continue
    }

    fn handle_client(&mut self, ctx: &mut PassContext<'_>, msg: &mut Message) -> Verdict {
        if !self.applies(msg) {
            return Verdict::Continue;
        }
        let resolved = ctx.resolve(msg);
        self.tracker.observe_client(resolved, msg);

        if let Some(synth) = self.synth.as_mut() {
            synth.note_connection(msg.connection());
            synth.check_readiness(&self.tracker, ctx.now());
        }
        Verdict::Continue
    }

    fn idle(&mut self, ctx: &mut IdleContext<'_>) {
        let Some(synth) = self.synth.as_mut() else {
            return;
        };
        let now = ctx.now();
        synth.check_readiness(&self.tracker, now);

        match synth.tick(now, &mut self.tracker, ctx.transport()) {
            Ok(_) => self.write_failures = 0,
            Err(WlFuzzError::TransportWrite(e)) => {
                self.write_failures += 1;
                self.metrics.transport_errors.inc(&[("pass", "fuzz")]);
                if self.write_failures >= WRITE_FAILURE_REPORT {
                    tracing::error!(
                        error = %e,
                        failures = self.write_failures,
                        "synthesized input keeps failing to write"
                    );
                } else {
                    tracing::warn!(error = %e, "synthesized write failed, retrying next tick");
                }
            }
            Err(e) => tracing::warn!(error = %e, "synthesis skipped"),
        }
    }

    fn usage(&self) -> &'static str {
        "fuzz [block] [verbose] [program=<name>] [delay_min=<ms>] [delay_max=<ms>] <seed|script>"
    }

    fn finalize(&mut self) {
        tracing::debug!(
            serial = ?self.tracker.serial(),
            sync_pending = self.tracker.sync_pending(),
            format_errors = self.tracker.format_errors(),
            state = ?self.synth_state(),
            "fuzz pass finalized"
        );
    }
}
