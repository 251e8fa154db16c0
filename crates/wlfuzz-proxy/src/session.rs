//! Capture replay driver.
//!
//! Feeds a recorded connection through the router at its recorded pace and
//! gives the passes their idle tick in between. Forwarded messages, and
//! whatever the passes inject, are written back out as capture lines.

use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant as TokioInstant, MissedTickBehavior};
use wlfuzz_core::error::{Result, WlFuzzError};
use wlfuzz_core::protocol::{Connection, Direction};

use crate::config::SessionSection;
use crate::obs::metrics::ProxyMetrics;
use crate::pipeline::Router;
use crate::transport::{decode_line, CaptureEntry, TraceTransport, Transport};

/// Counters for one replay.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayStats {
    pub routed: u64,
    pub forwarded: u64,
    pub skipped_lines: u64,
}

/// Decode a whole capture. Malformed lines are skipped and counted.
pub fn load_capture(
    text: &str,
    connection: &Arc<Connection>,
    metrics: &ProxyMetrics,
) -> (Vec<CaptureEntry>, u64) {
    let mut entries = Vec::new();
    let mut skipped = 0;
    for (lineno, line) in text.lines().enumerate() {
        match decode_line(line, connection) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => {}
            Err(e) => {
                skipped += 1;
                metrics.protocol_errors.inc(&[("pass", "session")]);
                tracing::warn!(line = lineno + 1, error = %e, "skipping capture line");
            }
        }
    }
    (entries, skipped)
}

/// Replay `entries` through `router`.
///
/// Server messages that survive the pipeline go to `to_client`, client
/// messages to `to_server`. Passes inject through `to_client` during idle
/// ticks. After the last entry the session keeps ticking for `linger`.
pub async fn replay(
    router: &mut Router,
    entries: Vec<CaptureEntry>,
    to_client: &mut dyn Transport,
    to_server: &mut dyn Transport,
    tick: Duration,
    linger: Duration,
) -> ReplayStats {
    let metrics = router.metrics();
    let mut stats = ReplayStats::default();

    let start = TokioInstant::now();
    let mut ticker = time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut entries = entries.into_iter().peekable();
    let mut linger_until: Option<TokioInstant> = None;

    loop {
        if router.exit_requested() {
            tracing::info!("session end requested");
            break;
        }

        let due = match entries.peek() {
            Some(entry) => start + entry.at,
            None => {
                let until = *linger_until.get_or_insert_with(|| TokioInstant::now() + linger);
                if TokioInstant::now() >= until {
                    break;
                }
                until
            }
        };

        tokio::select! {
            biased;
            _ = time::sleep_until(due) => {
                let Some(mut entry) = entries.next() else { continue };
                stats.routed += 1;
                if !router.route(&mut entry.msg, std::time::Instant::now()) {
                    continue;
                }
                let (sink, side): (&mut dyn Transport, &str) = match entry.msg.direction() {
                    Direction::FromServer => (&mut *to_client, "client"),
                    Direction::FromClient => (&mut *to_server, "server"),
                };
                let conn = Arc::clone(entry.msg.connection());
                let written = sink
                    .write(&conn, &entry.msg.to_bytes())
                    .and_then(|_| sink.flush(&conn));
                match written {
                    Ok(()) => stats.forwarded += 1,
                    Err(e) => {
                        metrics.transport_errors.inc(&[("side", side)]);
                        tracing::warn!(side, error = %e, "forward failed");
                    }
                }
            }
            _ = ticker.tick() => {
                router.idle(std::time::Instant::now(), to_client);
            }
        }
    }
    stats
}

fn open_output(path: &str) -> Result<(Box<dyn Write>, Box<dyn Write>)> {
    if path == "-" {
        return Ok((Box::new(io::stdout()), Box::new(io::stdout())));
    }
    let file = File::create(path)
        .map_err(|e| WlFuzzError::Configuration(format!("create output {path} failed: {e}")))?;
    let other = file
        .try_clone()
        .map_err(|e| WlFuzzError::Configuration(format!("clone output {path} failed: {e}")))?;
    Ok((Box::new(file), Box::new(other)))
}

/// Run one session described by `cfg`.
///
/// Expects a single-threaded runtime: the interactive pass blocks it while
/// waiting for the operator, which pauses the whole pipeline.
pub async fn run(cfg: &SessionSection, router: &mut Router) -> Result<ReplayStats> {
    let text = std::fs::read_to_string(&cfg.capture).map_err(|e| {
        WlFuzzError::Configuration(format!("read capture {} failed: {e}", cfg.capture))
    })?;
    let connection = Arc::new(Connection::new(1, cfg.program.clone()));
    let metrics = router.metrics();
    let (entries, skipped) = load_capture(&text, &connection, &metrics);
    tracing::info!(capture = %cfg.capture, messages = entries.len(), skipped, "capture loaded");

    let (client_out, server_out) = open_output(&cfg.output)?;
    let origin = std::time::Instant::now();
    let mut to_client = TraceTransport::new(client_out, Direction::FromServer, origin);
    let mut to_server = TraceTransport::new(server_out, Direction::FromClient, origin);

    let mut stats = replay(
        router,
        entries,
        &mut to_client,
        &mut to_server,
        Duration::from_millis(cfg.tick_interval_ms),
        Duration::from_millis(cfg.linger_ms),
    )
    .await;
    stats.skipped_lines = skipped;

    router.shutdown();
    tracing::info!(
        routed = stats.routed,
        forwarded = stats.forwarded,
        skipped = stats.skipped_lines,
        "session finished"
    );
    tracing::info!("metrics\n{}", metrics.render());
    Ok(stats)
}
