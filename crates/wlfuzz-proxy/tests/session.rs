#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use wlfuzz_core::protocol::{Direction, Message};
use wlfuzz_proxy::cancel::BreakSignal;
use wlfuzz_proxy::fuzz::FuzzPass;
use wlfuzz_proxy::interactive::InteractivePass;
use wlfuzz_proxy::obs::metrics::ProxyMetrics;
use wlfuzz_proxy::pipeline::Router;
use wlfuzz_proxy::resolve::ObjectMap;
use wlfuzz_proxy::session::{load_capture, replay};
use wlfuzz_proxy::transport::codec::encode_line;
use wlfuzz_proxy::transport::{decode_line, TraceTransport, Transport};

use common::{
    client, conn, header, server, temp_file, RecordingTransport, SharedBuf, SharedFormatter,
};

const SURFACE: u32 = 12;
const POINTER: u32 = 13;
const KEYBOARD: u32 = 14;

fn line(at_ms: u64, msg: &Message) -> String {
    encode_line(Duration::from_millis(at_ms), msg.direction(), &msg.to_bytes())
}

fn capture(msgs: &[(u64, Message)]) -> String {
    msgs.iter()
        .map(|(at, m)| line(*at, m))
        .collect::<Vec<_>>()
        .join("\n")
}

fn objects() -> ObjectMap {
    let mut objects = ObjectMap::new();
    objects.insert(3, "wl_compositor");
    objects.insert(4, "wl_seat");
    objects.insert(5, "wl_shm_pool");
    objects
}

fn setup_capture() -> Vec<(u64, Message)> {
    vec![
        (0, client(3, 0, &[SURFACE])),
        (0, client(4, 0, &[POINTER])),
        (1, client(4, 1, &[KEYBOARD])),
        (1, client(5, 0, &[15, 0, 100, 100, 400, 0])),
        (2, client(SURFACE, 2, &[0, 0, 100, 100])),
        (2, client(SURFACE, 6, &[])),
        (3, server(POINTER, 2, &[1, 256, 256])),
        (3, server(1, 1, &[20])),
    ]
}

#[test]
fn capture_lines_decode_and_reencode() {
    let msg = server(POINTER, 2, &[1000, 25600, 12800]);
    let text = line(42, &msg);
    let entry = decode_line(&text, &conn()).unwrap().unwrap();
    assert_eq!(entry.at, Duration::from_millis(42));
    assert_eq!(entry.msg.words(), msg.words());
    assert!(text.starts_with("42 S "));

    assert!(decode_line("   ", &conn()).unwrap().is_none());
    assert!(decode_line("# note", &conn()).unwrap().is_none());
    for bad in ["1 S", "x S 00", "1 Q 0100000000000800", "1 S zz", "1 S 01000000"] {
        let err = decode_line(bad, &conn()).expect_err(bad);
        assert_eq!(err.code().as_str(), "PROTOCOL_FORMAT", "{bad}");
    }
}

#[test]
fn trace_transport_writes_capture_lines() {
    let buf = SharedBuf::default();
    let mut t = TraceTransport::new(buf.clone(), Direction::FromServer, Instant::now());
    let msg = server(POINTER, 5, &[]);
    t.write(&conn(), &msg.to_bytes()).unwrap();
    t.flush(&conn()).unwrap();

    let text = buf.text();
    let entry = decode_line(text.trim(), &conn()).unwrap().unwrap();
    assert_eq!(entry.msg.words(), &[POINTER, header(8, 5)]);
}

#[test]
fn load_capture_skips_bad_lines() {
    let metrics = ProxyMetrics::default();
    let mut text = capture(&setup_capture());
    text.push_str("\nnot a capture line\n# comment\n");
    let (entries, skipped) = load_capture(&text, &conn(), &metrics);
    assert_eq!(entries.len(), 8);
    assert_eq!(skipped, 1);
    assert_eq!(metrics.protocol_errors.get(&[("pass", "session")]), 1);
}

#[tokio::test]
async fn replay_forwards_by_direction_and_injects() {
    let script = temp_file("session.script", "ENTER 0,0.5,0.5\n");
    let metrics = Arc::new(ProxyMetrics::default());
    let mut router = Router::new(Box::new(objects()), Arc::clone(&metrics));
    router
        .register(
            Box::new(FuzzPass::new(Arc::clone(&metrics))),
            &["block".to_string(), script.to_str().unwrap().to_string()],
        )
        .unwrap();

    let (entries, _) = load_capture(&capture(&setup_capture()), &conn(), &metrics);
    let mut to_client = RecordingTransport::default();
    let mut to_server = RecordingTransport::default();
    let stats = replay(
        &mut router,
        entries,
        &mut to_client,
        &mut to_server,
        Duration::from_millis(2),
        Duration::from_millis(300),
    )
    .await;

    assert_eq!(stats.routed, 8);
    // pointer motion blocked, wl_display.delete_id forwarded
    assert_eq!(stats.forwarded, 7);
    assert_eq!(to_server.messages.len(), 6);

    let to_client_objects: Vec<u32> = to_client.messages.iter().map(|m| m[0]).collect();
    assert_eq!(to_client_objects, vec![1, POINTER, POINTER]);
    assert_eq!(to_client.messages[1][4], 50 << 8);
    assert_eq!(metrics.synthesized.get(&[("kind", "enter")]), 1);
}

#[tokio::test]
async fn replay_stops_when_operator_quits() {
    let metrics = Arc::new(ProxyMetrics::default());
    let mut router = Router::new(Box::new(objects()), Arc::clone(&metrics));
    let pass = InteractivePass::new(
        Box::new(Cursor::new(b"q\n".to_vec())),
        Box::new(SharedBuf::default()),
        Box::new(SharedFormatter::default()),
        BreakSignal::new(),
    );
    router.register(Box::new(pass), &[]).unwrap();

    let (entries, _) = load_capture(&capture(&setup_capture()), &conn(), &metrics);
    let mut to_client = RecordingTransport::default();
    let mut to_server = RecordingTransport::default();
    let stats = replay(
        &mut router,
        entries,
        &mut to_client,
        &mut to_server,
        Duration::from_millis(2),
        Duration::from_millis(0),
    )
    .await;

    assert_eq!(stats.routed, 1);
    assert_eq!(stats.forwarded, 1);
    assert!(router.exit_requested());
}
