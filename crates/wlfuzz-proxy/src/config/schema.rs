use serde::Deserialize;
use wlfuzz_core::error::{Result, WlFuzzError};

/// Pass names a config may refer to.
pub const KNOWN_PASSES: &[&str] = &["trace", "fuzz", "interactive"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    pub version: u32,

    pub session: SessionSection,

    #[serde(default)]
    pub passes: Vec<PassConfig>,
}

impl ProxyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(WlFuzzError::Configuration(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        if self.passes.is_empty() {
            return Err(WlFuzzError::Configuration("passes must not be empty".into()));
        }

        self.session.validate()?;
        for pass in &self.passes {
            pass.validate()?;
        }

        let pinned = self.passes.iter().filter(|p| p.name == "interactive").count();
        if pinned > 1 {
            return Err(WlFuzzError::Configuration(
                "interactive may be configured only once".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    /// Capture file replayed through the pipeline.
    pub capture: String,

    /// Where forwarded messages go; `-` is stdout.
    #[serde(default = "default_output")]
    pub output: String,

    /// Program name reported for the client connection.
    #[serde(default)]
    pub program: Option<String>,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Keep ticking this long after the capture ends.
    #[serde(default)]
    pub linger_ms: u64,
}

impl SessionSection {
    pub fn validate(&self) -> Result<()> {
        if self.capture.is_empty() {
            return Err(WlFuzzError::Configuration(
                "session.capture must not be empty".into(),
            ));
        }
        if self.output.is_empty() {
            return Err(WlFuzzError::Configuration(
                "session.output must not be empty".into(),
            ));
        }
        if !(1..=1000).contains(&self.tick_interval_ms) {
            return Err(WlFuzzError::Configuration(
                "session.tick_interval_ms must be between 1 and 1000".into(),
            ));
        }
        if self.linger_ms > 600000 {
            return Err(WlFuzzError::Configuration(
                "session.linger_ms must be at most 600000".into(),
            ));
        }
        Ok(())
    }
}

fn default_output() -> String {
    "-".into()
}
fn default_tick_interval_ms() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PassConfig {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl PassConfig {
    pub fn validate(&self) -> Result<()> {
        if !KNOWN_PASSES.contains(&self.name.as_str()) {
            return Err(WlFuzzError::Configuration(format!(
                "unknown pass {} (known: {})",
                self.name,
                KNOWN_PASSES.join(", ")
            )));
        }
        Ok(())
    }
}
