//! Static method tables for the interfaces the proxy understands.
//!
//! Index in each slice is the opcode.

use wlfuzz_core::protocol::Direction;

struct InterfaceDef {
    name: &'static str,
    requests: &'static [&'static str],
    events: &'static [&'static str],
}

const INTERFACES: &[InterfaceDef] = &[
    InterfaceDef {
        name: "wl_display",
        requests: &["sync", "get_registry"],
        events: &["error", "delete_id"],
    },
    InterfaceDef {
        name: "wl_registry",
        requests: &["bind"],
        events: &["global", "global_remove"],
    },
    InterfaceDef {
        name: "wl_callback",
        requests: &[],
        events: &["done"],
    },
    InterfaceDef {
        name: "wl_compositor",
        requests: &["create_surface", "create_region"],
        events: &[],
    },
    InterfaceDef {
        name: "wl_shm",
        requests: &["create_pool", "release"],
        events: &["format"],
    },
    InterfaceDef {
        name: "wl_shm_pool",
        requests: &["create_buffer", "destroy", "resize"],
        events: &[],
    },
    InterfaceDef {
        name: "wl_buffer",
        requests: &["destroy"],
        events: &["release"],
    },
    InterfaceDef {
        name: "wl_region",
        requests: &["destroy", "add", "subtract"],
        events: &[],
    },
    InterfaceDef {
        name: "wl_surface",
        requests: &[
            "destroy",
            "attach",
            "damage",
            "frame",
            "set_opaque_region",
            "set_input_region",
            "commit",
            "set_buffer_transform",
            "set_buffer_scale",
            "damage_buffer",
            "offset",
        ],
        events: &[
            "enter",
            "leave",
            "preferred_buffer_scale",
            "preferred_buffer_transform",
        ],
    },
    InterfaceDef {
        name: "wl_seat",
        requests: &["get_pointer", "get_keyboard", "get_touch", "release"],
        events: &["capabilities", "name"],
    },
    InterfaceDef {
        name: "wl_pointer",
        requests: &["set_cursor", "release"],
        events: &[
            "enter",
            "leave",
            "motion",
            "button",
            "axis",
            "frame",
            "axis_source",
            "axis_stop",
            "axis_discrete",
            "axis_value120",
            "axis_relative_direction",
        ],
    },
    InterfaceDef {
        name: "wl_keyboard",
        requests: &["release"],
        events: &["keymap", "enter", "leave", "key", "modifiers", "repeat_info"],
    },
    InterfaceDef {
        name: "xdg_wm_base",
        requests: &["destroy", "create_positioner", "get_xdg_surface", "pong"],
        events: &["ping"],
    },
    InterfaceDef {
        name: "xdg_surface",
        requests: &[
            "destroy",
            "get_toplevel",
            "get_popup",
            "set_window_geometry",
            "ack_configure",
        ],
        events: &["configure"],
    },
    InterfaceDef {
        name: "xdg_toplevel",
        requests: &[
            "destroy",
            "set_parent",
            "set_title",
            "set_app_id",
            "show_window_menu",
            "move",
            "resize",
            "set_max_size",
            "set_min_size",
            "set_maximized",
            "unset_maximized",
            "set_fullscreen",
            "unset_fullscreen",
            "set_minimized",
        ],
        events: &["configure", "close", "configure_bounds", "wm_capabilities"],
    },
];

/// Requests that create an object: (interface, opcode, new_id arg index, created interface).
///
/// `wl_registry.bind` is handled separately since the created interface is
/// carried as a string argument.
pub const CONSTRUCTORS: &[(&str, u16, usize, &str)] = &[
    ("wl_display", 0, 0, "wl_callback"),
    ("wl_display", 1, 0, "wl_registry"),
    ("wl_compositor", 0, 0, "wl_surface"),
    ("wl_compositor", 1, 0, "wl_region"),
    ("wl_surface", 3, 0, "wl_callback"),
    ("wl_seat", 0, 0, "wl_pointer"),
    ("wl_seat", 1, 0, "wl_keyboard"),
    ("wl_seat", 2, 0, "wl_touch"),
    ("wl_shm", 0, 0, "wl_shm_pool"),
    ("wl_shm_pool", 0, 0, "wl_buffer"),
    ("xdg_wm_base", 2, 0, "xdg_surface"),
    ("xdg_surface", 1, 0, "xdg_toplevel"),
];

/// Canonical `'static` spelling of a known interface name.
pub fn interface_name(name: &str) -> Option<&'static str> {
    INTERFACES.iter().find(|d| d.name == name).map(|d| d.name)
}

pub fn method_name(interface: &str, direction: Direction, opcode: u16) -> Option<&'static str> {
    let def = INTERFACES.iter().find(|d| d.name == interface)?;
    let table = match direction {
        Direction::FromClient => def.requests,
        Direction::FromServer => def.events,
    };
    table.get(usize::from(opcode)).copied()
}

pub fn constructor(interface: &str, opcode: u16) -> Option<(usize, &'static str)> {
    CONSTRUCTORS
        .iter()
        .find(|(iface, op, _, _)| *iface == interface && *op == opcode)
        .map(|(_, _, idx, created)| (*idx, *created))
}
