//! Startup wiring: config -> router with its passes.
//!
//! Errors are returned, never panicked on, so `main` can print a diagnostic
//! and exit cleanly.

use std::sync::Arc;

use wlfuzz_core::error::{Result, WlFuzzError};

use crate::cancel::BreakSignal;
use crate::config::ProxyConfig;
use crate::format::PlainFormatter;
use crate::fuzz::FuzzPass;
use crate::interactive::InteractivePass;
use crate::obs::metrics::ProxyMetrics;
use crate::pipeline::{Pass, Router, TracePass};
use crate::resolve::ObjectMap;

/// Construct an uninitialized pass by name.
pub fn make_pass(
    name: &str,
    metrics: &Arc<ProxyMetrics>,
    signal: &BreakSignal,
) -> Result<Box<dyn Pass>> {
    let pass: Box<dyn Pass> = match name {
        "trace" => Box::new(TracePass::new(Box::new(PlainFormatter::stdout()))),
        "fuzz" => Box::new(FuzzPass::new(Arc::clone(metrics))),
        "interactive" => Box::new(InteractivePass::stdio(
            Box::new(PlainFormatter::stdout()),
            signal.clone(),
        )),
        other => {
            return Err(WlFuzzError::Configuration(format!("unknown pass {other}")));
        }
    };
    Ok(pass)
}

/// Build the router for one connection and register every configured pass
/// in order.
pub fn build_router(
    cfg: &ProxyConfig,
    metrics: Arc<ProxyMetrics>,
    signal: &BreakSignal,
) -> Result<Router> {
    let mut router = Router::new(Box::new(ObjectMap::new()), Arc::clone(&metrics));
    for pc in &cfg.passes {
        let pass = make_pass(&pc.name, &metrics, signal)?;
        router.register(pass, &pc.args).map_err(|e| match e {
            e @ WlFuzzError::Configuration(_) => e,
            other => WlFuzzError::Configuration(format!("pass {} init failed: {other}", pc.name)),
        })?;
    }
    tracing::info!(passes = ?router.pass_names(), "pipeline ready");
    Ok(router)
}
