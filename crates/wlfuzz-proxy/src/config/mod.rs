//! Proxy config loader (strict parsing).

pub mod schema;

use std::fs;

use wlfuzz_core::error::{Result, WlFuzzError};

pub use schema::{PassConfig, ProxyConfig, SessionSection, KNOWN_PASSES};

pub fn load_from_file(path: &str) -> Result<ProxyConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| WlFuzzError::Configuration(format!("read config {path} failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ProxyConfig> {
    let cfg: ProxyConfig = serde_yaml::from_str(s)
        .map_err(|e| WlFuzzError::Configuration(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
