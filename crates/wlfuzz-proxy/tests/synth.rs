#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use wlfuzz_core::protocol::Connection;
use wlfuzz_proxy::fuzz::{
    EventKind, ScriptSource, SynthState, Synthesizer, Tracker, SETTLE_DELAY,
};
use wlfuzz_proxy::obs::metrics::ProxyMetrics;

use common::{client, conn, header, iface, server, RecordingTransport, PROGRAM};

const SURFACE: u32 = 12;
const POINTER: u32 = 13;
const KEYBOARD: u32 = 14;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[derive(Clone, Copy, Debug)]
enum Step {
    Pointer,
    Keyboard,
    Draw,
}

fn apply(t: &mut Tracker, step: Step) {
    match step {
        Step::Pointer => t.observe_client(iface("wl_seat"), &mut client(4, 0, &[POINTER])),
        Step::Keyboard => t.observe_client(iface("wl_seat"), &mut client(4, 1, &[KEYBOARD])),
        Step::Draw => {
            t.observe_client(iface("wl_compositor"), &mut client(3, 0, &[SURFACE]));
            t.observe_client(
                iface("wl_shm_pool"),
                &mut client(5, 0, &[15, 0, 800, 600, 3200, 0]),
            );
            t.observe_client(iface("wl_surface"), &mut client(SURFACE, 2, &[0, 0, 800, 600]));
            t.observe_client(iface("wl_surface"), &mut client(SURFACE, 6, &[]));
        }
    }
}

struct Rig {
    tracker: Tracker,
    synth: Synthesizer,
    metrics: Arc<ProxyMetrics>,
    start: Instant,
}

fn rig(script: &str, program: Option<&str>) -> Rig {
    let metrics = Arc::new(ProxyMetrics::default());
    let start = Instant::now();
    let tracker = Tracker::new(start, Arc::clone(&metrics));
    let mut synth = Synthesizer::new(
        Box::new(ScriptSource::parse(script)),
        program.map(str::to_string),
        false,
        Arc::clone(&metrics),
    );
    synth.note_connection(&conn());
    synth.arm();
    Rig {
        tracker,
        synth,
        metrics,
        start,
    }
}

fn ready_rig(script: &str) -> Rig {
    let mut r = rig(script, None);
    for step in [Step::Pointer, Step::Keyboard, Step::Draw] {
        apply(&mut r.tracker, step);
    }
    r.synth.check_readiness(&r.tracker, r.start);
    assert_eq!(r.synth.state(), SynthState::Active);
    r
}

#[test]
fn readiness_needs_every_precondition_in_any_order() {
    let orders = [
        [Step::Pointer, Step::Keyboard, Step::Draw],
        [Step::Pointer, Step::Draw, Step::Keyboard],
        [Step::Keyboard, Step::Pointer, Step::Draw],
        [Step::Keyboard, Step::Draw, Step::Pointer],
        [Step::Draw, Step::Pointer, Step::Keyboard],
        [Step::Draw, Step::Keyboard, Step::Pointer],
    ];
    for order in orders {
        let mut r = rig("LEAVE 0\n", None);
        for (i, step) in order.iter().enumerate() {
            assert_eq!(r.synth.state(), SynthState::WaitingForReadiness, "{order:?}");
            apply(&mut r.tracker, *step);
            r.synth.check_readiness(&r.tracker, r.start);
            if i < 2 {
                assert_eq!(r.synth.state(), SynthState::WaitingForReadiness, "{order:?}");
            }
        }
        assert_eq!(r.synth.state(), SynthState::Active, "{order:?}");
        assert_eq!(r.synth.next_fire(), Some(r.start + SETTLE_DELAY));
    }
}

#[test]
fn unarmed_synthesizer_never_activates() {
    let metrics = Arc::new(ProxyMetrics::default());
    let now = Instant::now();
    let mut tracker = Tracker::new(now, Arc::clone(&metrics));
    let mut synth = Synthesizer::new(
        Box::new(ScriptSource::parse("LEAVE 0\n")),
        None,
        false,
        metrics,
    );
    for step in [Step::Pointer, Step::Keyboard, Step::Draw] {
        apply(&mut tracker, step);
    }
    synth.check_readiness(&tracker, now);
    assert_eq!(synth.state(), SynthState::NotReady);

    let mut out = RecordingTransport::default();
    assert_eq!(synth.tick(now + ms(500), &mut tracker, &mut out).unwrap(), None);
    assert!(out.messages.is_empty());
}

#[test]
fn program_filter_gates_readiness() {
    let mut other = rig("LEAVE 0\n", Some("someone-else"));
    let mut mine = rig("LEAVE 0\n", Some(PROGRAM));
    for step in [Step::Pointer, Step::Keyboard, Step::Draw] {
        apply(&mut other.tracker, step);
        apply(&mut mine.tracker, step);
    }
    other.synth.check_readiness(&other.tracker, other.start);
    mine.synth.check_readiness(&mine.tracker, mine.start);
    assert_eq!(other.synth.state(), SynthState::WaitingForReadiness);
    assert_eq!(mine.synth.state(), SynthState::Active);
}

#[test]
fn missing_program_name_never_matches_filter() {
    let metrics = Arc::new(ProxyMetrics::default());
    let now = Instant::now();
    let mut tracker = Tracker::new(now, Arc::clone(&metrics));
    let mut synth = Synthesizer::new(
        Box::new(ScriptSource::parse("LEAVE 0\n")),
        Some(PROGRAM.into()),
        false,
        metrics,
    );
    synth.note_connection(&Arc::new(Connection::new(2, None)));
    synth.arm();
    for step in [Step::Pointer, Step::Keyboard, Step::Draw] {
        apply(&mut tracker, step);
    }
    synth.check_readiness(&tracker, now);
    assert_eq!(synth.state(), SynthState::WaitingForReadiness);
}

#[test]
fn scripted_enter_and_key_press_release() {
    let mut r = ready_rig("ENTER 0,0.5,0.5\nKEY 0,100,30,1\nKEY 0,50,30,0\n");
    // the server already issued serial 41
    let mut kb_enter = server(KEYBOARD, 1, &[41, SURFACE, 0]);
    r.tracker.observe_server(iface("wl_keyboard"), &mut kb_enter, r.start);

    let mut out = RecordingTransport::default();
    let t0 = r.start;

    assert_eq!(r.synth.tick(t0, &mut r.tracker, &mut out).unwrap(), None);
    assert_eq!(
        r.synth.tick(t0 + ms(49), &mut r.tracker, &mut out).unwrap(),
        None
    );

    let fired = r.synth.tick(t0 + ms(50), &mut r.tracker, &mut out).unwrap();
    assert_eq!(fired, Some(EventKind::PointerEnter { x: 0.5, y: 0.5 }));
    assert_eq!(
        out.messages,
        vec![
            vec![POINTER, header(24, 0), 42, SURFACE, 400 << 8, 300 << 8],
            vec![POINTER, header(8, 5)],
        ]
    );

    assert_eq!(
        r.synth.tick(t0 + ms(149), &mut r.tracker, &mut out).unwrap(),
        None
    );
    r.synth.tick(t0 + ms(150), &mut r.tracker, &mut out).unwrap();
    r.synth.tick(t0 + ms(200), &mut r.tracker, &mut out).unwrap();

    assert_eq!(out.messages.len(), 4);
    assert_eq!(
        out.messages[2],
        vec![KEYBOARD, header(24, 3), 43, 150, 30, 1]
    );
    assert_eq!(
        out.messages[3],
        vec![KEYBOARD, header(24, 3), 44, 200, 30, 0]
    );
    assert_eq!(r.tracker.serial(), Some(44));
    assert_eq!(r.metrics.synthesized.get(&[("kind", "key")]), 2);
    assert_eq!(r.metrics.synthesized.get(&[("kind", "enter")]), 1);
}

#[test]
fn motion_carries_no_serial_and_maps_to_buffer_size() {
    let mut r = ready_rig("ENTER 0,0,0\nMOTION 0,1,1\nBUTTON 0,0,272,1\n");
    let mut out = RecordingTransport::default();
    let t = r.start + SETTLE_DELAY;

    for _ in 0..3 {
        r.synth.tick(t, &mut r.tracker, &mut out).unwrap();
    }
    assert_eq!(out.messages.len(), 6);
    assert_eq!(out.messages[0][2], 1, "first synthesized serial");
    assert_eq!(out.messages[2], vec![POINTER, header(20, 2), 50, 800 << 8, 600 << 8]);
    assert_eq!(out.messages[4], vec![POINTER, header(24, 3), 2, 50, 272, 1]);
    assert!(out.messages.iter().skip(1).step_by(2).all(|m| m[1] == header(8, 5)));
}

#[test]
fn failed_first_write_retries_same_event_and_serial() {
    let mut r = ready_rig("ENTER 0,0.5,0.5\n");
    let mut out = RecordingTransport::failing(&[0]);
    let t = r.start + SETTLE_DELAY;

    let err = r.synth.tick(t, &mut r.tracker, &mut out).expect_err("write fails");
    assert_eq!(err.code().as_str(), "TRANSPORT_WRITE");
    assert!(out.messages.is_empty());
    assert_eq!(r.tracker.serial(), None, "serial not consumed");

    let fired = r.synth.tick(t, &mut r.tracker, &mut out).unwrap();
    assert!(matches!(fired, Some(EventKind::PointerEnter { .. })));
    assert_eq!(out.messages[0][2], 1);
    assert_eq!(out.messages.len(), 2);
}

#[test]
fn unsent_frame_goes_out_before_anything_else() {
    let mut r = ready_rig("ENTER 0,0.5,0.5\nLEAVE 0\n");
    // enter succeeds, its frame fails
    let mut out = RecordingTransport::failing(&[1]);
    let t = r.start + SETTLE_DELAY;

    assert!(r.synth.tick(t, &mut r.tracker, &mut out).is_err());
    assert_eq!(out.messages.len(), 1);
    assert_eq!(r.tracker.serial(), Some(1), "enter was delivered");

    // next tick: the frame first, then the leave
    let fired = r.synth.tick(t, &mut r.tracker, &mut out).unwrap();
    assert_eq!(fired, Some(EventKind::PointerLeave));
    let opcodes: Vec<u32> = out.messages.iter().map(|m| m[1] & 0xffff).collect();
    assert_eq!(opcodes, vec![0, 5, 1, 5]);
    assert_eq!(out.messages[2][2], 2);
}

#[test]
fn exhausted_source_goes_quiet() {
    let mut r = ready_rig("LEAVE 0\n");
    let mut out = RecordingTransport::default();
    let t = r.start + SETTLE_DELAY;

    assert!(r.synth.tick(t, &mut r.tracker, &mut out).unwrap().is_some());
    for i in 1..5 {
        assert_eq!(r.synth.tick(t + ms(i * 100), &mut r.tracker, &mut out).unwrap(), None);
    }
    assert_eq!(out.messages.len(), 2);
}

#[test]
fn retried_frame_is_flushed_before_next_event_is_due() {
    let mut r = ready_rig("ENTER 0,0.5,0.5\nLEAVE 1000\n");
    let mut out = RecordingTransport::failing(&[1]);
    let t = r.start + SETTLE_DELAY;

    assert!(r.synth.tick(t, &mut r.tracker, &mut out).is_err());
    assert_eq!(out.flushes, 0);

    // leave is a second away; the frame must still reach the client now
    let fired = r.synth.tick(t + ms(1), &mut r.tracker, &mut out).unwrap();
    assert_eq!(fired, None);
    assert_eq!(out.messages.len(), 2);
    assert_eq!(out.messages[1], vec![POINTER, header(8, 5)]);
    assert!(out.flushes >= 1);
}
