//! wlfuzz proxy
//!
//! Replays a recorded Wayland connection through the configured pass
//! pipeline (trace, fuzz, interactive).
//! - Config: first argument, `wlfuzz.yaml` by default
//! - Logging: `RUST_LOG` (tracing-subscriber env filter)
//! - Ctrl-C breaks into the interactive pass instead of killing the process

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use wlfuzz_proxy::{app, cancel::BreakSignal, config, obs::metrics::ProxyMetrics, session};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "wlfuzz.yaml".into());
    let cfg = match config::load_from_file(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "config load failed");
            return ExitCode::FAILURE;
        }
    };

    let signal = BreakSignal::new();
    if let Err(e) = signal.install_sigint() {
        tracing::warn!(error = %e, "running without Ctrl-C break support");
    }

    let metrics = Arc::new(ProxyMetrics::default());
    let mut router = match app::build_router(&cfg, metrics, &signal) {
        Ok(router) => router,
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "pipeline setup failed");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(config = %path, capture = %cfg.session.capture, "wlfuzz starting");
    match session::run(&cfg.session, &mut router).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "session failed");
            ExitCode::FAILURE
        }
    }
}
