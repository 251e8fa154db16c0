//! Fuzz pass arguments.
//!
//! `[block] [verbose] [program=<name>] [delay_min=<ms>] [delay_max=<ms>] <seed|script>`

use std::path::PathBuf;
use std::time::Duration;

use wlfuzz_core::error::{Result, WlFuzzError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Seeded pseudo-random input.
    Procedural { seed: u64 },
    /// Replay of a script file.
    Replay { script: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzOptions {
    pub block: bool,
    pub verbose: bool,
    pub program: Option<String>,
    pub delay_min: Duration,
    pub delay_max: Duration,
    pub mode: Mode,
}

fn default_delay_min() -> Duration {
    Duration::from_millis(10)
}
fn default_delay_max() -> Duration {
    Duration::from_millis(1000)
}

fn parse_millis(key: &str, v: &str) -> Result<Duration> {
    v.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| WlFuzzError::Configuration(format!("fuzz: {key}={v}: {e}")))
}

impl FuzzOptions {
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut block = false;
        let mut verbose = false;
        let mut program = None;
        let mut delay_min = default_delay_min();
        let mut delay_max = default_delay_max();
        let mut positional: Option<&str> = None;

        for arg in args {
            match arg.split_once('=') {
                Some(("program", "")) => {
                    return Err(WlFuzzError::Configuration(
                        "fuzz: program= needs a name".into(),
                    ))
                }
                Some(("program", v)) => program = Some(v.to_string()),
                Some(("delay_min", v)) => delay_min = parse_millis("delay_min", v)?,
                Some(("delay_max", v)) => delay_max = parse_millis("delay_max", v)?,
                Some((key, _)) => {
                    return Err(WlFuzzError::Configuration(format!(
                        "fuzz: unknown option {key}"
                    )))
                }
                None => match arg.as_str() {
                    "block" => block = true,
                    "verbose" => verbose = true,
                    other => {
                        if let Some(prev) = positional.replace(other) {
                            return Err(WlFuzzError::Configuration(format!(
                                "fuzz: more than one seed/script given ({prev}, {other})"
                            )));
                        }
                    }
                },
            }
        }

        let positional = positional.ok_or_else(|| {
            WlFuzzError::Configuration("fuzz: missing random seed or script path".into())
        })?;
        let mode = match positional.parse::<u64>() {
            Ok(seed) => Mode::Procedural { seed },
            Err(_) => Mode::Replay {
                script: PathBuf::from(positional),
            },
        };

        let opts = Self {
            block,
            verbose,
            program,
            delay_min,
            delay_max,
            mode,
        };
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        if self.delay_min > self.delay_max {
            return Err(WlFuzzError::Configuration(
                "fuzz: delay_min must not exceed delay_max".into(),
            ));
        }
        Ok(())
    }
}
