//! Scheduled input events and their sources.
//!
//! Script lines look like `KEY 0,100,30,1`: a tag, then comma-separated
//! fields starting with an absolute millisecond timestamp.
//!
//! | tag      | fields                      |
//! |----------|-----------------------------|
//! | `KEY`    | `t,delay,code,pressed`      |
//! | `BUTTON` | `t,delay,code,pressed`      |
//! | `MOTION` | `t,x,y`                     |
//! | `ENTER`  | `t,x,y`                     |
//! | `LEAVE`  | `t`                         |
//!
//! An event waits `t - t_prev` (never negative) plus its explicit `delay`
//! after the previous one.

use std::collections::BTreeSet;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    Key { code: u32, pressed: bool },
    PointerEnter { x: f64, y: f64 },
    PointerLeave,
    PointerButton { code: u32, pressed: bool },
    PointerMove { x: f64, y: f64 },
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Key { .. } => "key",
            EventKind::PointerEnter { .. } => "enter",
            EventKind::PointerLeave => "leave",
            EventKind::PointerButton { .. } => "button",
            EventKind::PointerMove { .. } => "motion",
        }
    }

    pub fn is_pointer(&self) -> bool {
        !matches!(self, EventKind::Key { .. })
    }
}

/// One input event plus the wait after the previous event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    pub kind: EventKind,
    pub delay: Duration,
}

/// Where scheduled events come from.
///
/// `current` must keep returning the same event until `advance` is called,
/// so a failed emission can be retried.
pub trait EventSource {
    fn current(&mut self) -> Option<ScheduledEvent>;
    fn advance(&mut self);
}

// --------------------
// Replay
// --------------------

/// Finite sequence read from a script.
#[derive(Debug, Clone)]
pub struct ScriptSource {
    events: Vec<ScheduledEvent>,
    pos: usize,
}

impl ScriptSource {
    pub fn new(events: Vec<ScheduledEvent>) -> Self {
        Self { events, pos: 0 }
    }

    pub fn parse(text: &str) -> Self {
        Self::new(parse_script(text))
    }

    pub fn remaining(&self) -> usize {
        self.events.len().saturating_sub(self.pos)
    }
}

impl EventSource for ScriptSource {
    fn current(&mut self) -> Option<ScheduledEvent> {
        self.events.get(self.pos).copied()
    }

    fn advance(&mut self) {
        if self.pos < self.events.len() {
            self.pos += 1;
        }
    }
}

fn parse_pressed(s: &str) -> Result<bool, String> {
    match s {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(format!("pressed flag must be 0 or 1, got {other}")),
    }
}

fn parse_num<T: std::str::FromStr>(s: &str, what: &str) -> Result<T, String> {
    s.parse().map_err(|_| format!("bad {what}: {s}"))
}

fn parse_coord(s: &str) -> Result<f64, String> {
    let v: f64 = parse_num(s, "coordinate")?;
    if !(0.0..=1.0).contains(&v) {
        return Err(format!("coordinate {v} outside [0, 1]"));
    }
    Ok(v)
}

/// Parse one script line into (timestamp, explicit delay, event).
fn parse_line(line: &str) -> Result<(u64, u64, EventKind), String> {
    let (tag, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let fields: Vec<&str> = rest
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();

    let expect = |n: usize| -> Result<(), String> {
        if fields.len() == n {
            Ok(())
        } else {
            Err(format!("{tag} takes {n} fields, got {}", fields.len()))
        }
    };

    match tag {
        "KEY" | "BUTTON" => {
            expect(4)?;
            let t = parse_num(fields[0], "timestamp")?;
            let delay = parse_num(fields[1], "delay")?;
            let code = parse_num(fields[2], "code")?;
            let pressed = parse_pressed(fields[3])?;
            let kind = if tag == "KEY" {
                EventKind::Key { code, pressed }
            } else {
                EventKind::PointerButton { code, pressed }
            };
            Ok((t, delay, kind))
        }
        "MOTION" | "ENTER" => {
            expect(3)?;
            let t = parse_num(fields[0], "timestamp")?;
            let x = parse_coord(fields[1])?;
            let y = parse_coord(fields[2])?;
            let kind = if tag == "MOTION" {
                EventKind::PointerMove { x, y }
            } else {
                EventKind::PointerEnter { x, y }
            };
            Ok((t, 0, kind))
        }
        "LEAVE" => {
            expect(1)?;
            let t = parse_num(fields[0], "timestamp")?;
            Ok((t, 0, EventKind::PointerLeave))
        }
        other => Err(format!("unknown event tag {other}")),
    }
}

/// Parse a whole script. Malformed lines are skipped with a warning.
pub fn parse_script(text: &str) -> Vec<ScheduledEvent> {
    let mut events = Vec::new();
    let mut prev_t: Option<u64> = None;

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Ok((t, extra, kind)) => {
                let gap = prev_t.map(|p| t.saturating_sub(p)).unwrap_or(0);
                prev_t = Some(t);
                events.push(ScheduledEvent {
                    kind,
                    delay: Duration::from_millis(gap.saturating_add(extra)),
                });
            }
            Err(reason) => {
                tracing::warn!(line = lineno + 1, %reason, "skipping script line");
            }
        }
    }
    events
}

// --------------------
// Procedural
// --------------------

/// evdev codes of printable keys plus space, enter and backspace.
const KEY_CODES: &[u32] = &[
    2, 3, 4, 5, 6, 7, 8, 9, 10, 11, // 1..0
    14, // backspace
    16, 17, 18, 19, 20, 21, 22, 23, 24, 25, // q..p
    28, // enter
    30, 31, 32, 33, 34, 35, 36, 37, 38, // a..l
    44, 45, 46, 47, 48, 49, 50, // z..m
    57, // space
];

/// BTN_LEFT, BTN_RIGHT, BTN_MIDDLE.
const BUTTON_CODES: &[u32] = &[0x110, 0x111, 0x112];

/// Infinite seeded sequence that only produces protocol-legal input.
///
/// The generator tracks which keys and buttons are down and whether the
/// pointer is inside the surface; that state changes on `advance`, so a
/// retried event does not disturb it.
pub struct ProceduralSource {
    rng: ChaCha8Rng,
    delay_min: u64,
    delay_max: u64,
    next: Option<ScheduledEvent>,
    inside: bool,
    keys_down: BTreeSet<u32>,
    buttons_down: BTreeSet<u32>,
}

impl ProceduralSource {
    pub fn new(seed: u64, delay_min: Duration, delay_max: Duration) -> Self {
        let delay_min = delay_min.as_millis() as u64;
        let delay_max = (delay_max.as_millis() as u64).max(delay_min);
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            delay_min,
            delay_max,
            next: None,
            inside: false,
            keys_down: BTreeSet::new(),
            buttons_down: BTreeSet::new(),
        }
    }

    fn pick(&mut self, codes: &[u32]) -> u32 {
        codes[self.rng.gen_range(0..codes.len())]
    }

    fn generate(&mut self) -> ScheduledEvent {
        let kind = if !self.inside {
            EventKind::PointerEnter {
                x: self.rng.gen::<f64>(),
                y: self.rng.gen::<f64>(),
            }
        } else {
            match self.rng.gen_range(0..100u32) {
                0..=44 => EventKind::PointerMove {
                    x: self.rng.gen::<f64>(),
                    y: self.rng.gen::<f64>(),
                },
                45..=64 => {
                    let code = self.pick(BUTTON_CODES);
                    EventKind::PointerButton {
                        code,
                        pressed: !self.buttons_down.contains(&code),
                    }
                }
                65..=89 => {
                    let code = self.pick(KEY_CODES);
                    EventKind::Key {
                        code,
                        pressed: !self.keys_down.contains(&code),
                    }
                }
                _ if self.buttons_down.is_empty() => EventKind::PointerLeave,
                _ => EventKind::PointerMove {
                    x: self.rng.gen::<f64>(),
                    y: self.rng.gen::<f64>(),
                },
            }
        };
        let delay = Duration::from_millis(self.rng.gen_range(self.delay_min..=self.delay_max));
        ScheduledEvent { kind, delay }
    }

    fn apply(&mut self, kind: EventKind) {
        match kind {
            EventKind::PointerEnter { .. } => self.inside = true,
            EventKind::PointerLeave => self.inside = false,
            EventKind::PointerButton { code, pressed } => {
                if pressed {
                    self.buttons_down.insert(code);
                } else {
                    self.buttons_down.remove(&code);
                }
            }
            EventKind::Key { code, pressed } => {
                if pressed {
                    self.keys_down.insert(code);
                } else {
                    self.keys_down.remove(&code);
                }
            }
            EventKind::PointerMove { .. } => {}
        }
    }
}

impl EventSource for ProceduralSource {
    fn current(&mut self) -> Option<ScheduledEvent> {
        if self.next.is_none() {
            self.next = Some(self.generate());
        }
        self.next
    }

    fn advance(&mut self) {
        let ev = match self.next.take() {
            Some(ev) => ev,
            None => self.generate(),
        };
        self.apply(ev.kind);
    }
}
