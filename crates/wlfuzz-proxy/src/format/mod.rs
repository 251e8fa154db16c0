//! Human-readable message display.

use std::fmt::Write as _;
use std::io::Write;

use wlfuzz_core::protocol::Message;

use crate::resolve::Resolved;

pub trait Formatter {
    fn display(&mut self, msg: &Message, resolved: Option<Resolved<'_>>);
}

/// Render one message as `[server] wl_pointer@7.motion(1000, 25600, 12800)`.
pub fn describe(msg: &Message, resolved: Option<Resolved<'_>>) -> String {
    let mut out = String::new();
    let _ = write!(out, "[{}] ", msg.direction());
    match resolved {
        Some(r) => {
            let _ = write!(out, "{}@{}.", r.interface, msg.object_id());
            match r.method {
                Some(m) => out.push_str(m),
                None => {
                    let _ = write!(out, "opcode#{}", msg.opcode());
                }
            }
        }
        None => {
            let _ = write!(out, "unknown@{}.opcode#{}", msg.object_id(), msg.opcode());
        }
    }
    let args = msg
        .args()
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let _ = write!(out, "({args})");
    out
}

/// Writes one line per message to any sink (stdout by default).
pub struct PlainFormatter<W: Write> {
    out: W,
}

impl PlainFormatter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write> PlainFormatter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Formatter for PlainFormatter<W> {
    fn display(&mut self, msg: &Message, resolved: Option<Resolved<'_>>) {
        if let Err(e) = writeln!(self.out, "{}", describe(msg, resolved)) {
            tracing::warn!(error = %e, "formatter write failed");
        }
    }
}
