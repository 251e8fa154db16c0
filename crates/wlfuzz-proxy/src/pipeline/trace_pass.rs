use wlfuzz_core::error::{Result, WlFuzzError};
use wlfuzz_core::protocol::Message;

use crate::format::Formatter;

use super::pass::{Pass, PassContext, Verdict};

/// Displays every message and lets it through. Useful on its own for a plain
/// protocol trace, and in front of the interactive pass.
pub struct TracePass {
    formatter: Box<dyn Formatter>,
    only_server: bool,
    only_client: bool,
}

impl TracePass {
    pub fn new(formatter: Box<dyn Formatter>) -> Self {
        Self {
            formatter,
            only_server: false,
            only_client: false,
        }
    }

    fn show(&mut self, ctx: &PassContext<'_>, msg: &Message) {
        self.formatter.display(msg, ctx.resolve(msg));
    }
}

impl Pass for TracePass {
    fn name(&self) -> &'static str {
        "trace"
    }

    fn init(&mut self, args: &[String]) -> Result<()> {
        for arg in args {
            match arg.as_str() {
                "server" => self.only_server = true,
                "client" => self.only_client = true,
                other => {
                    return Err(WlFuzzError::Configuration(format!(
                        "trace: unknown argument {other}"
                    )))
                }
            }
        }
        if self.only_server && self.only_client {
            return Err(WlFuzzError::Configuration(
                "trace: server and client are mutually exclusive".into(),
            ));
        }
        Ok(())
    }

    fn handle_server(&mut self, ctx: &mut PassContext<'_>, msg: &mut Message) -> Verdict {
        if !self.only_client {
            self.show(ctx, msg);
        }
        Verdict::Continue
    }

    fn handle_client(&mut self, ctx: &mut PassContext<'_>, msg: &mut Message) -> Verdict {
        if !self.only_server {
            self.show(ctx, msg);
        }
        Verdict::Continue
    }

    fn usage(&self) -> &'static str {
        "trace [server|client]: print every message (optionally one direction only)"
    }
}
