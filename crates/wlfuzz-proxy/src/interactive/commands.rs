use std::io::Write;

use wlfuzz_core::protocol::Message;

use crate::pipeline::PassContext;

use super::controller::Statistics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Leave the command loop and let the pipeline continue.
    EndQuery,
    /// Read another command.
    ContinueQuery,
    /// Not in the table.
    Unknown,
}

/// What a command can see and change while the pipeline is stopped.
pub struct CommandEnv<'a, 'b> {
    pub ctx: &'a mut PassContext<'b>,
    pub msg: &'a mut Message,
    pub out: &'a mut dyn Write,
    pub stats: Statistics,
    /// Break again on the next message after resuming.
    pub stop_next: bool,
}

pub struct Command {
    pub name: &'static str,
    pub short: &'static str,
    pub help: &'static str,
    run: fn(&mut CommandEnv<'_, '_>, &str) -> CommandOutcome,
}

pub const COMMANDS: &[Command] = &[
    Command {
        name: "continue",
        short: "c",
        help: "resume the pipeline",
        run: cmd_continue,
    },
    Command {
        name: "next",
        short: "n",
        help: "resume and stop at the next message",
        run: cmd_next,
    },
    Command {
        name: "drop",
        short: "d",
        help: "do not forward the current message, then resume",
        run: cmd_drop,
    },
    Command {
        name: "info",
        short: "i",
        help: "show message counters",
        run: cmd_info,
    },
    Command {
        name: "hex",
        short: "x",
        help: "dump the current message words",
        run: cmd_hex,
    },
    Command {
        name: "help",
        short: "h",
        help: "list commands",
        run: cmd_help,
    },
    Command {
        name: "quit",
        short: "q",
        help: "end the session",
        run: cmd_quit,
    },
];

/// Dispatch one line of operator input.
pub fn run_command(line: &str, env: &mut CommandEnv<'_, '_>) -> CommandOutcome {
    let line = line.trim();
    if line.is_empty() {
        return CommandOutcome::ContinueQuery;
    }
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match COMMANDS.iter().find(|c| c.name == word || c.short == word) {
        Some(cmd) => (cmd.run)(env, rest.trim()),
        None => CommandOutcome::Unknown,
    }
}

fn cmd_continue(_env: &mut CommandEnv<'_, '_>, _args: &str) -> CommandOutcome {
    CommandOutcome::EndQuery
}

fn cmd_next(env: &mut CommandEnv<'_, '_>, _args: &str) -> CommandOutcome {
    env.stop_next = true;
    CommandOutcome::EndQuery
}

fn cmd_drop(env: &mut CommandEnv<'_, '_>, _args: &str) -> CommandOutcome {
    env.ctx.skip_forward();
    CommandOutcome::EndQuery
}

fn cmd_info(env: &mut CommandEnv<'_, '_>, _args: &str) -> CommandOutcome {
    let _ = writeln!(
        env.out,
        "messages from server: {}, from client: {}",
        env.stats.server_msg_no, env.stats.client_msg_no
    );
    CommandOutcome::ContinueQuery
}

fn cmd_hex(env: &mut CommandEnv<'_, '_>, _args: &str) -> CommandOutcome {
    let words = env
        .msg
        .words()
        .iter()
        .map(|w| format!("{w:08x}"))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(env.out, "{words}");
    CommandOutcome::ContinueQuery
}

fn cmd_help(env: &mut CommandEnv<'_, '_>, _args: &str) -> CommandOutcome {
    for c in COMMANDS {
        let _ = writeln!(env.out, "{:<10} ({})  {}", c.name, c.short, c.help);
    }
    CommandOutcome::ContinueQuery
}

fn cmd_quit(env: &mut CommandEnv<'_, '_>, _args: &str) -> CommandOutcome {
    env.ctx.request_exit();
    CommandOutcome::EndQuery
}
