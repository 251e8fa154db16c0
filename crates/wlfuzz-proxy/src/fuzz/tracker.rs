//! Serial, sync-callback and frame-callback correlation for one connection.
//!
//! The proxy injects server events the real server never sent, so the serial
//! space the client sees is no longer the server's. The tracker renumbers
//! every server serial from one counter (shared with the synthesizer), and
//! maps client acknowledgements back to the serial the server issued.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use wlfuzz_core::protocol::Message;

use crate::obs::metrics::ProxyMetrics;
use crate::resolve::Resolved;

use super::ring::SyncRing;

/// Server events carrying a serial: (interface, opcode, word index).
const SERVER_SERIALS: &[(&str, u16, usize)] = &[
    ("wl_pointer", 0, 2),  // enter
    ("wl_pointer", 1, 2),  // leave
    ("wl_pointer", 3, 2),  // button
    ("wl_keyboard", 1, 2), // enter
    ("wl_keyboard", 2, 2), // leave
    ("wl_keyboard", 3, 2), // key
    ("wl_keyboard", 4, 2), // modifiers
    ("wl_touch", 0, 2),    // down
    ("wl_touch", 1, 2),    // up
    ("xdg_wm_base", 0, 2), // ping
    ("xdg_surface", 0, 2), // configure
];

/// Client requests echoing a serial back: (interface, opcode, word index).
const CLIENT_SERIALS: &[(&str, u16, usize)] = &[
    ("wl_pointer", 0, 2),   // set_cursor
    ("xdg_wm_base", 3, 2),  // pong
    ("xdg_surface", 4, 2),  // ack_configure
    ("xdg_toplevel", 4, 3), // show_window_menu
    ("xdg_toplevel", 5, 3), // move
    ("xdg_toplevel", 6, 3), // resize
];

/// How many issued serials remember their server origin.
const ORIGIN_HISTORY: usize = 256;

const CALLBACK_DONE: u16 = 0;
const DISPLAY_SYNC: u16 = 0;
const COMPOSITOR_CREATE_SURFACE: u16 = 0;
const SURFACE_DAMAGE: u16 = 2;
const SURFACE_FRAME: u16 = 3;
const SURFACE_COMMIT: u16 = 6;
const SURFACE_DAMAGE_BUFFER: u16 = 9;
const SEAT_GET_POINTER: u16 = 0;
const SEAT_GET_KEYBOARD: u16 = 1;
const SHM_POOL_CREATE_BUFFER: u16 = 0;

fn lookup(table: &[(&str, u16, usize)], interface: &str, opcode: u16) -> Option<usize> {
    table
        .iter()
        .find(|(iface, op, _)| *iface == interface && *op == opcode)
        .map(|(_, _, idx)| *idx)
}

/// Object ids discovered from client requests. Each is set once.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Discovered {
    pub surface: Option<u32>,
    pub pointer: Option<u32>,
    pub keyboard: Option<u32>,
}

fn discover(slot: &mut Option<u32>, id: u32, what: &'static str) {
    match slot {
        None => {
            tracing::debug!(id, what, "discovered object");
            *slot = Some(id);
        }
        Some(existing) => {
            tracing::debug!(id, existing = *existing, what, "ignoring additional object");
        }
    }
}

/// Protocol time zero: `timestamp_at(anchor) == millis`.
#[derive(Debug, Clone, Copy)]
pub struct ClockBaseline {
    anchor: Instant,
    millis: u32,
}

impl ClockBaseline {
    pub fn new(anchor: Instant, millis: u32) -> Self {
        Self { anchor, millis }
    }

    /// Millisecond timestamp in the server's clock domain.
    pub fn timestamp_at(&self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.anchor).as_millis() as u32;
        self.millis.wrapping_add(elapsed)
    }
}

pub struct Tracker {
    serial: Option<u32>,
    origins: VecDeque<(u32, u32)>,
    sync_ring: SyncRing,
    frame_id: Option<u32>,
    clock: ClockBaseline,
    discovered: Discovered,
    damage_pending: bool,
    damaged_commit: bool,
    buffer_size: Option<(u32, u32)>,
    format_errors: u64,
    metrics: Arc<ProxyMetrics>,
}

impl Tracker {
    pub fn new(now: Instant, metrics: Arc<ProxyMetrics>) -> Self {
        Self {
            serial: None,
            origins: VecDeque::with_capacity(ORIGIN_HISTORY),
            sync_ring: SyncRing::new(),
            frame_id: None,
            clock: ClockBaseline::new(now, 0),
            discovered: Discovered::default(),
            damage_pending: false,
            damaged_commit: false,
            buffer_size: None,
            format_errors: 0,
            metrics,
        }
    }

    /// Most recently issued serial.
    pub fn serial(&self) -> Option<u32> {
        self.serial
    }

    /// The serial the next injected event would carry.
    pub fn peek_next_serial(&self) -> u32 {
        match self.serial {
            Some(n) => n.wrapping_add(1),
            None => 1,
        }
    }

    /// Record `serial` (from `peek_next_serial`) as issued.
    pub fn commit_serial(&mut self, serial: u32) {
        self.serial = Some(serial);
    }

    pub fn timestamp(&self, now: Instant) -> u32 {
        self.clock.timestamp_at(now)
    }

    pub fn clock(&self) -> ClockBaseline {
        self.clock
    }

    pub fn discovered(&self) -> Discovered {
        self.discovered
    }

    pub fn frame_id(&self) -> Option<u32> {
        self.frame_id
    }

    pub fn sync_pending(&self) -> usize {
        self.sync_ring.len()
    }

    pub fn sync_head(&self) -> Option<u32> {
        self.sync_ring.head()
    }

    /// At least one commit followed a damage request.
    pub fn has_damaged_commit(&self) -> bool {
        self.damaged_commit
    }

    /// Width and height of the most recent shm buffer.
    pub fn buffer_size(&self) -> Option<(u32, u32)> {
        self.buffer_size
    }

    pub fn format_errors(&self) -> u64 {
        self.format_errors
    }

    fn format_error(&mut self, msg: &Message, reason: &str) {
        self.format_errors += 1;
        self.metrics.protocol_errors.inc(&[("pass", "fuzz")]);
        tracing::warn!(
            object = msg.object_id(),
            opcode = msg.opcode(),
            direction = %msg.direction(),
            reason,
            "malformed message, passing through"
        );
    }

    fn remember(&mut self, issued: u32, original: u32) {
        if self.origins.len() == ORIGIN_HISTORY {
            self.origins.pop_front();
        }
        self.origins.push_back((issued, original));
    }

    fn origin_of(&self, issued: u32) -> Option<u32> {
        self.origins
            .iter()
            .rev()
            .find(|(i, _)| *i == issued)
            .map(|(_, o)| *o)
    }

    /// Apply the renumbering rule to the serial at `index`.
    fn renumber(&mut self, msg: &mut Message, index: usize) {
        let Some(observed) = msg.word(index) else {
            self.format_error(msg, "serial index out of bounds");
            return;
        };
        match self.serial {
            None => {
                self.serial = Some(observed);
                self.remember(observed, observed);
            }
            Some(n) => {
                let next = n.wrapping_add(1);
                if msg.set_word(index, next).is_ok() {
                    self.serial = Some(next);
                    self.remember(next, observed);
                }
            }
        }
    }

    /// Observe (and possibly rewrite) a server-originated message.
    pub fn observe_server(&mut self, resolved: Option<Resolved<'_>>, msg: &mut Message, now: Instant) {
        if let Err(e) = msg.check_format() {
            self.format_error(msg, &e.to_string());
            return;
        }

        let object = msg.object_id();
        if msg.opcode() == CALLBACK_DONE && self.frame_id == Some(object) {
            self.frame_id = None;
            match msg.word(2) {
                Some(millis) => {
                    self.clock = ClockBaseline::new(now, millis);
                    tracing::trace!(callback = object, millis, "frame clock rebased");
                }
                None => self.format_error(msg, "frame done without timestamp"),
            }
            return;
        }
        if msg.opcode() == CALLBACK_DONE && self.sync_ring.head() == Some(object) {
            self.sync_ring.pop();
            self.renumber(msg, 2);
            return;
        }

        let Some(r) = resolved else { return };
        if let Some(index) = lookup(SERVER_SERIALS, r.interface, msg.opcode()) {
            self.renumber(msg, index);
        }
    }

    /// Observe (and possibly rewrite) a client-originated message.
    pub fn observe_client(&mut self, resolved: Option<Resolved<'_>>, msg: &mut Message) {
        if let Err(e) = msg.check_format() {
            self.format_error(msg, &e.to_string());
            return;
        }
        let Some(r) = resolved else { return };
        let interface = r.interface;
        let opcode = msg.opcode();

        if let Some(index) = lookup(CLIENT_SERIALS, interface, opcode) {
            match msg.word(index) {
                Some(seen) => {
                    if let Some(original) = self.origin_of(seen) {
                        if original != seen && msg.set_word(index, original).is_ok() {
                            tracing::trace!(seen, original, "serial translated back");
                        }
                    }
                }
                None => self.format_error(msg, "serial index out of bounds"),
            }
            return;
        }

        let new_id = msg.word(2);
        match (interface, opcode) {
            ("wl_display", DISPLAY_SYNC) => {
                let Some(id) = new_id else {
                    return self.format_error(msg, "sync without callback id");
                };
                if let Err(e) = self.sync_ring.push(id) {
                    self.metrics.sync_overflows.inc(&[("pass", "fuzz")]);
                    tracing::warn!(callback = id, error = %e, "sync callback not tracked");
                }
            }
            ("wl_surface", SURFACE_FRAME) => {
                let Some(id) = new_id else {
                    return self.format_error(msg, "frame without callback id");
                };
                if let Some(prev) = self.frame_id.replace(id) {
                    tracing::debug!(prev, id, "frame callback replaced before completion");
                }
            }
            ("wl_compositor", COMPOSITOR_CREATE_SURFACE) => {
                if let Some(id) = new_id {
                    discover(&mut self.discovered.surface, id, "surface");
                }
            }
            ("wl_seat", SEAT_GET_POINTER) => {
                if let Some(id) = new_id {
                    discover(&mut self.discovered.pointer, id, "pointer");
                }
            }
            ("wl_seat", SEAT_GET_KEYBOARD) => {
                if let Some(id) = new_id {
                    discover(&mut self.discovered.keyboard, id, "keyboard");
                }
            }
            ("wl_surface", SURFACE_DAMAGE) | ("wl_surface", SURFACE_DAMAGE_BUFFER) => {
                if self.discovered.surface == Some(msg.object_id()) {
                    self.damage_pending = true;
                }
            }
            ("wl_surface", SURFACE_COMMIT) => {
                if self.discovered.surface == Some(msg.object_id()) && self.damage_pending {
                    self.damage_pending = false;
                    if !self.damaged_commit {
                        tracing::debug!(surface = msg.object_id(), "first damaged commit");
                    }
                    self.damaged_commit = true;
                }
            }
            ("wl_shm_pool", SHM_POOL_CREATE_BUFFER) => {
                // new_id, offset, width, height, stride, format
                match (msg.word(4), msg.word(5)) {
                    (Some(w), Some(h)) => self.buffer_size = Some((w, h)),
                    _ => self.format_error(msg, "create_buffer without size"),
                }
            }
            _ => {}
        }
    }
}
