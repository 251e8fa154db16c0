//! Label-keyed counters and histograms backed by `DashMap`.
//!
//! Label sets are stored as sorted key vectors, so `[("a", ..), ("b", ..)]` and
//! `[("b", ..), ("a", ..)]` address the same series. Histograms count whole
//! microseconds.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn render_labels(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Sum over every label set.
    pub fn total(&self) -> u64 {
        self.map.iter().map(|r| r.value().load(Ordering::Relaxed)).sum()
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        for entry in self.map.iter() {
            sample(out, name, &render_labels(entry.key()), None, entry.value().load(Ordering::Relaxed));
        }
    }
}

/// Upper bounds in microseconds. Routing one message is usually well under
/// a millisecond; the tail catches an operator sitting at the prompt.
const BUCKETS_MICROS: [u64; 8] = [1, 5, 25, 100, 500, 2_500, 100_000, 10_000_000];

#[derive(Default)]
struct Buckets {
    count: AtomicU64,
    sum: AtomicU64,
    le: [AtomicU64; BUCKETS_MICROS.len()],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, Buckets>,
}

/// One exposition line: `name{labels,le="x"} value`.
fn sample(out: &mut String, name: &str, labels: &str, le: Option<&str>, value: u64) {
    let labels = match (labels.is_empty(), le) {
        (_, None) => labels.to_string(),
        (true, Some(le)) => format!("le=\"{le}\""),
        (false, Some(le)) => format!("{labels},le=\"{le}\""),
    };
    let _ = writeln!(out, "{name}{{{labels}}} {value}");
}

impl HistogramVec {
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        let h = self.map.entry(label_key(labels)).or_default();
        h.count.fetch_add(1, Ordering::Relaxed);
        h.sum.fetch_add(micros, Ordering::Relaxed);
        // cumulative: every bucket at or above the value
        let first = BUCKETS_MICROS.partition_point(|&b| b < micros);
        for slot in &h.le[first..] {
            slot.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} histogram");
        let bucket_name = format!("{name}_bucket");
        for entry in self.map.iter() {
            let h = entry.value();
            let labels = render_labels(entry.key());
            for (bound, slot) in BUCKETS_MICROS.iter().zip(&h.le) {
                let le = bound.to_string();
                sample(out, &bucket_name, &labels, Some(&le), slot.load(Ordering::Relaxed));
            }
            let count = h.count.load(Ordering::Relaxed);
            sample(out, &bucket_name, &labels, Some("+Inf"), count);
            sample(out, &format!("{name}_sum"), &labels, None, h.sum.load(Ordering::Relaxed));
            sample(out, &format!("{name}_count"), &labels, None, count);
        }
    }
}

/// Metrics shared by the router and the passes of one session.
#[derive(Default)]
pub struct ProxyMetrics {
    pub routed: CounterVec,
    pub dropped: CounterVec,
    pub protocol_errors: CounterVec,
    pub sync_overflows: CounterVec,
    pub synthesized: CounterVec,
    pub transport_errors: CounterVec,
    pub route_duration: HistogramVec,
}

impl ProxyMetrics {
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.routed.render("wlfuzz_messages_routed_total", &mut out);
        self.dropped.render("wlfuzz_messages_dropped_total", &mut out);
        self.protocol_errors.render("wlfuzz_protocol_errors_total", &mut out);
        self.sync_overflows.render("wlfuzz_sync_overflows_total", &mut out);
        self.synthesized.render("wlfuzz_synthesized_total", &mut out);
        self.transport_errors.render("wlfuzz_transport_errors_total", &mut out);
        self.route_duration.render("wlfuzz_route_duration_micros", &mut out);
        out
    }
}
