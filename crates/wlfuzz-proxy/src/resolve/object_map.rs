//! Object-id -> interface map built from observed traffic.
//!
//! Covers the core and xdg-shell constructors the tracker relies on. Objects
//! bound from the registry under interfaces outside the method tables are
//! still named; their methods resolve to `None`.

use std::borrow::Cow;
use std::collections::HashMap;

use wlfuzz_core::protocol::{ArgReader, Direction, Message};

use super::tables;
use super::{Resolved, Resolver};

/// The display singleton always lives at id 1.
pub const DISPLAY_ID: u32 = 1;

const REGISTRY_BIND: u16 = 0;
const DISPLAY_DELETE_ID: u16 = 1;

#[derive(Debug)]
pub struct ObjectMap {
    objects: HashMap<u32, Cow<'static, str>>,
}

impl Default for ObjectMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectMap {
    pub fn new() -> Self {
        let mut objects = HashMap::new();
        objects.insert(DISPLAY_ID, Cow::Borrowed("wl_display"));
        Self { objects }
    }

    /// Register an object explicitly (tests, or ids learned out of band).
    pub fn insert(&mut self, id: u32, interface: &str) {
        let name = match tables::interface_name(interface) {
            Some(s) => Cow::Borrowed(s),
            None => Cow::Owned(interface.to_string()),
        };
        self.objects.insert(id, name);
    }

    pub fn interface_of(&self, id: u32) -> Option<&str> {
        self.objects.get(&id).map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn observe_request(&mut self, interface: &str, msg: &Message) {
        if interface == "wl_registry" && msg.opcode() == REGISTRY_BIND {
            let mut args = ArgReader::new(msg.args());
            let bound = (|| {
                let _name = args.uint()?;
                let iface = args.string()?;
                let _version = args.uint()?;
                let id = args.uint()?;
                Some((id, iface))
            })();
            match bound {
                Some((id, iface)) => self.insert(id, &iface),
                None => tracing::debug!(object = msg.object_id(), "truncated wl_registry.bind"),
            }
            return;
        }

        if let Some((idx, created)) = tables::constructor(interface, msg.opcode()) {
            match msg.args().get(idx) {
                Some(&id) => {
                    self.objects.insert(id, Cow::Borrowed(created));
                }
                None => tracing::debug!(
                    interface,
                    opcode = msg.opcode(),
                    "constructor without new_id argument"
                ),
            }
        }
    }
}

impl Resolver for ObjectMap {
    fn resolve(&self, msg: &Message) -> Option<Resolved<'_>> {
        let interface = self.interface_of(msg.object_id())?;
        Some(Resolved {
            interface,
            method: tables::method_name(interface, msg.direction(), msg.opcode()),
        })
    }

    fn observe(&mut self, msg: &Message) {
        let Some(interface) = self.objects.get(&msg.object_id()).cloned() else {
            return;
        };
        match msg.direction() {
            Direction::FromClient => self.observe_request(&interface, msg),
            Direction::FromServer => {
                if interface == "wl_display" && msg.opcode() == DISPLAY_DELETE_ID {
                    if let Some(&id) = msg.args().first() {
                        self.objects.remove(&id);
                    }
                }
            }
        }
    }
}
