//! Time-driven input synthesizer.
//!
//! Waits until the client has a pointer, a keyboard and a drawn surface, then
//! turns scheduled events into server events written straight to the
//! client-facing transport. Serials come from the tracker's counter so the
//! client sees a single increasing sequence.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use wlfuzz_core::error::{Result, WlFuzzError};
use wlfuzz_core::protocol::{Connection, Direction, Fixed, Message, MessageBuilder};

use crate::obs::metrics::ProxyMetrics;
use crate::transport::Transport;

use super::schedule::{EventKind, EventSource, ScheduledEvent};
use super::tracker::Tracker;

/// Wait after readiness before the first event.
pub const SETTLE_DELAY: Duration = Duration::from_millis(50);

const POINTER_ENTER: u16 = 0;
const POINTER_LEAVE: u16 = 1;
const POINTER_MOTION: u16 = 2;
const POINTER_BUTTON: u16 = 3;
const POINTER_FRAME: u16 = 5;
const KEYBOARD_KEY: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthState {
    NotReady,
    WaitingForReadiness,
    Active,
}

pub struct Synthesizer {
    state: SynthState,
    source: Box<dyn EventSource>,
    program: Option<String>,
    verbose: bool,
    connection: Option<Arc<Connection>>,
    next_fire: Option<Instant>,
    /// Tail of a pointer action whose first message was already written.
    pending: VecDeque<Message>,
    exhausted: bool,
    metrics: Arc<ProxyMetrics>,
}

impl Synthesizer {
    pub fn new(
        source: Box<dyn EventSource>,
        program: Option<String>,
        verbose: bool,
        metrics: Arc<ProxyMetrics>,
    ) -> Self {
        Self {
            state: SynthState::NotReady,
            source,
            program,
            verbose,
            connection: None,
            next_fire: None,
            pending: VecDeque::new(),
            exhausted: false,
            metrics,
        }
    }

    pub fn state(&self) -> SynthState {
        self.state
    }

    pub fn next_fire(&self) -> Option<Instant> {
        self.next_fire
    }

    /// Start watching for readiness.
    pub fn arm(&mut self) {
        if self.state == SynthState::NotReady {
            self.state = SynthState::WaitingForReadiness;
        }
    }

    /// Bind to the connection synthesized messages are addressed on.
    pub fn note_connection(&mut self, connection: &Arc<Connection>) {
        if self.connection.is_none() {
            self.connection = Some(Arc::clone(connection));
        }
    }

    fn program_matches(&self) -> bool {
        match (&self.program, &self.connection) {
            (None, _) => true,
            (Some(want), Some(conn)) => conn.program() == Some(want.as_str()),
            (Some(_), None) => false,
        }
    }

    /// Move to `Active` once every precondition holds.
    pub fn check_readiness(&mut self, tracker: &Tracker, now: Instant) {
        if self.state != SynthState::WaitingForReadiness {
            return;
        }
        let ids = tracker.discovered();
        let ready = ids.pointer.is_some()
            && ids.keyboard.is_some()
            && tracker.has_damaged_commit()
            && self.program_matches();
        if !ready {
            return;
        }

        let first_delay = self.source.current().map(|e| e.delay).unwrap_or_default();
        self.state = SynthState::Active;
        self.next_fire = Some(now + SETTLE_DELAY + first_delay);
        tracing::info!(
            pointer = ?ids.pointer,
            keyboard = ?ids.keyboard,
            surface = ?ids.surface,
            "input synthesis active"
        );
    }

    /// Fire the current event if it is due. Returns the event fired, if any.
    ///
    /// A write failure of the first message leaves the event (and its serial)
    /// to be retried on the next tick. A failure after that leaves the rest of
    /// the action pending; it is written before anything else next time.
    pub fn tick(
        &mut self,
        now: Instant,
        tracker: &mut Tracker,
        transport: &mut dyn Transport,
    ) -> Result<Option<EventKind>> {
        if self.state != SynthState::Active {
            return Ok(None);
        }
        let Some(conn) = self.connection.clone() else {
            return Ok(None);
        };

        if !self.pending.is_empty() {
            self.flush_pending(&conn, transport)?;
            transport.flush(&conn)?;
        }
        if self.next_fire.is_some_and(|t| now < t) {
            return Ok(None);
        }

        let Some(event) = self.source.current() else {
            if !self.exhausted {
                self.exhausted = true;
                tracing::info!("event source exhausted, synthesis idle");
            }
            return Ok(None);
        };

        let serial = tracker.peek_next_serial();
        let mut messages = self.materialize(&event, &conn, tracker, serial, now)?.into_iter();
        let Some(first) = messages.next() else {
            return Err(WlFuzzError::Internal("event produced no message".into()));
        };

        self.write(&conn, transport, &first)?;
        if !matches!(event.kind, EventKind::PointerMove { .. }) {
            tracker.commit_serial(serial);
        }
        self.pending.extend(messages);

        self.source.advance();
        let next_delay = self.source.current().map(|e| e.delay).unwrap_or_default();
        self.next_fire = Some(now + next_delay);
        self.metrics.synthesized.inc(&[("kind", event.kind.label())]);

        self.flush_pending(&conn, transport)?;
        transport.flush(&conn)?;
        Ok(Some(event.kind))
    }

    fn write(&self, conn: &Connection, transport: &mut dyn Transport, msg: &Message) -> Result<()> {
        transport.write(conn, &msg.to_bytes())?;
        if self.verbose {
            tracing::info!(
                object = msg.object_id(),
                opcode = msg.opcode(),
                args = ?msg.args(),
                "synthesized"
            );
        }
        Ok(())
    }

    fn flush_pending(&mut self, conn: &Connection, transport: &mut dyn Transport) -> Result<()> {
        while let Some(msg) = self.pending.front() {
            self.write(conn, transport, msg)?;
            self.pending.pop_front();
        }
        Ok(())
    }

    /// Build the wire messages for one event.
    pub fn materialize(
        &self,
        event: &ScheduledEvent,
        conn: &Arc<Connection>,
        tracker: &Tracker,
        serial: u32,
        now: Instant,
    ) -> Result<Vec<Message>> {
        let ids = tracker.discovered();
        let time = tracker.timestamp(now);
        let (width, height) = tracker.buffer_size().unwrap_or((0, 0));
        let build = |b: MessageBuilder| b.build(Direction::FromServer, Arc::clone(conn));

        let pointer = || {
            ids.pointer
                .ok_or_else(|| WlFuzzError::Internal("no pointer discovered".into()))
        };
        let surface = || {
            ids.surface
                .ok_or_else(|| WlFuzzError::Internal("no surface discovered".into()))
        };

        let action = match event.kind {
            EventKind::Key { code, pressed } => {
                let keyboard = ids
                    .keyboard
                    .ok_or_else(|| WlFuzzError::Internal("no keyboard discovered".into()))?;
                let key = MessageBuilder::new(keyboard, KEYBOARD_KEY)
                    .uint(serial)
                    .uint(time)
                    .uint(code)
                    .uint(u32::from(pressed));
                return Ok(vec![build(key)?]);
            }
            EventKind::PointerEnter { x, y } => MessageBuilder::new(pointer()?, POINTER_ENTER)
                .uint(serial)
                .object(surface()?)
                .fixed(Fixed::from_normalized(x, width))
                .fixed(Fixed::from_normalized(y, height)),
            EventKind::PointerLeave => MessageBuilder::new(pointer()?, POINTER_LEAVE)
                .uint(serial)
                .object(surface()?),
            EventKind::PointerMove { x, y } => MessageBuilder::new(pointer()?, POINTER_MOTION)
                .uint(time)
                .fixed(Fixed::from_normalized(x, width))
                .fixed(Fixed::from_normalized(y, height)),
            EventKind::PointerButton { code, pressed } => {
                MessageBuilder::new(pointer()?, POINTER_BUTTON)
                    .uint(serial)
                    .uint(time)
                    .uint(code)
                    .uint(u32::from(pressed))
            }
        };

        // pointer events are batched: every action ends with wl_pointer.frame
        let frame = MessageBuilder::new(pointer()?, POINTER_FRAME);
        Ok(vec![build(action)?, build(frame)?])
    }
}
