use std::io::{self, BufRead, BufReader, Write};

use wlfuzz_core::error::{Result, WlFuzzError};
use wlfuzz_core::protocol::{Direction, Message};

use crate::cancel::BreakSignal;
use crate::format::Formatter;
use crate::pipeline::{Pass, PassContext, Verdict};

use super::commands::{run_command, CommandEnv, CommandOutcome};

/// Per-direction message counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    pub server_msg_no: u64,
    pub client_msg_no: u64,
}

pub struct InteractivePass {
    input: Box<dyn BufRead>,
    output: Box<dyn Write>,
    formatter: Box<dyn Formatter>,
    signal: BreakSignal,
    stop: bool,
    stats: Statistics,
}

impl InteractivePass {
    pub fn new(
        input: Box<dyn BufRead>,
        output: Box<dyn Write>,
        formatter: Box<dyn Formatter>,
        signal: BreakSignal,
    ) -> Self {
        Self {
            input,
            output,
            formatter,
            signal,
            stop: true,
            stats: Statistics::default(),
        }
    }

    /// Operator on stdin/stdout.
    pub fn stdio(formatter: Box<dyn Formatter>, signal: BreakSignal) -> Self {
        Self::new(
            Box::new(BufReader::new(io::stdin())),
            Box::new(io::stdout()),
            formatter,
            signal,
        )
    }

    pub fn stats(&self) -> Statistics {
        self.stats
    }

    fn query_user(&mut self, ctx: &mut PassContext<'_>, msg: &mut Message) {
        let mut line = String::new();
        loop {
            if ctx.exit_requested() {
                break;
            }
            if self.signal.take() {
                let _ = writeln!(self.output);
            }

            let _ = write!(self.output, "(wlfuzz) ");
            let _ = self.output.flush();

            line.clear();
            match self.input.read_line(&mut line) {
                Ok(0) => {
                    tracing::debug!("operator input closed, ending session");
                    ctx.request_exit();
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "reading operator input failed");
                    ctx.request_exit();
                    break;
                }
            }

            let mut env = CommandEnv {
                ctx: &mut *ctx,
                msg: &mut *msg,
                out: &mut *self.output,
                stats: self.stats,
                stop_next: false,
            };
            let outcome = run_command(&line, &mut env);
            let stop_next = env.stop_next;

            match outcome {
                CommandOutcome::EndQuery => {
                    self.stop = stop_next;
                    break;
                }
                CommandOutcome::ContinueQuery => continue,
                CommandOutcome::Unknown => {
                    let _ = writeln!(self.output, "Unknown command: {}", line.trim());
                }
            }
        }
    }

    fn process(&mut self, ctx: &mut PassContext<'_>, msg: &mut Message) -> Verdict {
        let no = match msg.direction() {
            Direction::FromServer => {
                self.stats.server_msg_no += 1;
                self.stats.server_msg_no
            }
            Direction::FromClient => {
                self.stats.client_msg_no += 1;
                self.stats.client_msg_no
            }
        };

        if self.signal.take() {
            self.stop = true;
        }

        self.formatter.display(msg, ctx.resolve(msg));

        if self.stop {
            self.stop = false;
            tracing::debug!(no, from = %msg.direction(), "stopped");
            let _ = writeln!(
                self.output,
                "Stopped at message no. {} from {}",
                no,
                msg.direction()
            );
            self.query_user(ctx, msg);
        }

        // terminal observer: nothing runs after this pass
        Verdict::StopChain
    }
}

impl Pass for InteractivePass {
    fn name(&self) -> &'static str {
        "interactive"
    }

    fn init(&mut self, args: &[String]) -> Result<()> {
        for arg in args {
            match arg.as_str() {
                "skip-first" => self.stop = false,
                other => {
                    return Err(WlFuzzError::Configuration(format!(
                        "interactive: unknown argument {other}"
                    )))
                }
            }
        }
        Ok(())
    }

    fn handle_server(&mut self, ctx: &mut PassContext<'_>, msg: &mut Message) -> Verdict {
        self.process(ctx, msg)
    }

    fn handle_client(&mut self, ctx: &mut PassContext<'_>, msg: &mut Message) -> Verdict {
        self.process(ctx, msg)
    }

    fn usage(&self) -> &'static str {
        "interactive [skip-first]: break on messages and wait for operator commands"
    }

    fn finalize(&mut self) {
        tracing::debug!(
            server = self.stats.server_msg_no,
            client = self.stats.client_msg_no,
            "interactive pass finalized"
        );
    }

    fn pinned_last(&self) -> bool {
        true
    }
}
