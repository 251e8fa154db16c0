#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::sync::Arc;

use wlfuzz_core::protocol::{Connection, Direction, Message, MessageBuilder};
use wlfuzz_proxy::format::{describe, Formatter};
use wlfuzz_proxy::resolve::Resolved;
use wlfuzz_proxy::transport::Transport;

pub const PROGRAM: &str = "demo-client";

pub fn conn() -> Arc<Connection> {
    Arc::new(Connection::new(1, Some(PROGRAM.into())))
}

pub fn build(direction: Direction, object: u32, opcode: u16, args: &[u32]) -> Message {
    args.iter()
        .fold(MessageBuilder::new(object, opcode), |b, &a| b.uint(a))
        .build(direction, conn())
        .expect("message builds")
}

pub fn server(object: u32, opcode: u16, args: &[u32]) -> Message {
    build(Direction::FromServer, object, opcode, args)
}

pub fn client(object: u32, opcode: u16, args: &[u32]) -> Message {
    build(Direction::FromClient, object, opcode, args)
}

pub fn iface(interface: &'static str) -> Option<Resolved<'static>> {
    Some(Resolved {
        interface,
        method: None,
    })
}

pub fn header(size: u32, opcode: u32) -> u32 {
    (size << 16) | opcode
}

pub fn words_of(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_ne_bytes(c.try_into().unwrap()))
        .collect()
}

/// Records written messages as words; chosen write attempts fail.
#[derive(Default)]
pub struct RecordingTransport {
    pub messages: Vec<Vec<u32>>,
    /// Zero-based write attempts that fail with a broken pipe.
    pub fail_attempts: Vec<usize>,
    pub attempts: usize,
    pub flushes: usize,
}

impl RecordingTransport {
    pub fn failing(attempts: &[usize]) -> Self {
        Self {
            fail_attempts: attempts.to_vec(),
            ..Self::default()
        }
    }
}

impl Transport for RecordingTransport {
    fn write(&mut self, _connection: &Connection, bytes: &[u8]) -> io::Result<()> {
        let attempt = self.attempts;
        self.attempts += 1;
        if self.fail_attempts.contains(&attempt) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client gone"));
        }
        self.messages.push(words_of(bytes));
        Ok(())
    }

    fn flush(&mut self, _connection: &Connection) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

/// Formatter whose output the test can read back.
#[derive(Clone, Default)]
pub struct SharedFormatter {
    pub lines: Rc<RefCell<Vec<String>>>,
}

impl Formatter for SharedFormatter {
    fn display(&mut self, msg: &Message, resolved: Option<Resolved<'_>>) {
        self.lines.borrow_mut().push(describe(msg, resolved));
    }
}

/// Shared sink a test can read after handing a `Write` to a pass.
#[derive(Clone, Default)]
pub struct SharedBuf(pub Rc<RefCell<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Temp file unique to this test process.
pub fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("wlfuzz-{}-{name}", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}
