//! Character device elements: `<serial>`, `<console>`, `<channel>`.

use crate::binding::Binding;
use crate::entity::{Entity, Model, Slot};
use crate::error::Result;
use crate::value::AttrValue;

pub static SERIAL: Model = Model {
    name: "SerialXml",
    tag: "serial",
    slots: &[
        Slot {
            name: "type",
            binding: Binding::Attribute { path: ".", attr: "type", default: Some("pty") },
        },
        Slot {
            name: "target",
            binding: Binding::Map { path: "target" },
        },
    ],
    uncomparable: &[],
};

pub static CONSOLE: Model = Model {
    name: "ConsoleXml",
    tag: "console",
    slots: &[
        Slot {
            name: "type",
            binding: Binding::Attribute { path: ".", attr: "type", default: Some("pty") },
        },
        Slot {
            name: "target",
            binding: Binding::Map { path: "target" },
        },
    ],
    uncomparable: &[],
};

pub static CHANNEL: Model = Model {
    name: "ChannelXml",
    tag: "channel",
    slots: &[
        Slot {
            name: "type",
            binding: Binding::Attribute { path: ".", attr: "type", default: None },
        },
        Slot {
            name: "source",
            binding: Binding::Map { path: "source" },
        },
        Slot {
            name: "target",
            binding: Binding::Map { path: "target" },
        },
    ],
    uncomparable: &[],
};

/// A pty-backed serial port.
pub fn pty_serial(port: u32) -> Result<Entity> {
    let mut serial = SERIAL.new_entity();
    serial.set("type", "pty")?;
    serial.set("target", AttrValue::map([("port", port.to_string())]))?;
    Ok(serial)
}

/// The console paired with a serial port.
pub fn pty_console(port: u32) -> Result<Entity> {
    let mut console = CONSOLE.new_entity();
    console.set("type", "pty")?;
    console.set(
        "target",
        AttrValue::map([("type", "serial".to_string()), ("port", port.to_string())]),
    )?;
    Ok(console)
}

/// A virtio-serial channel for a guest agent, bound to a host-side Unix
/// socket.
pub fn agent_channel(socket_path: &str, target_name: &str) -> Result<Entity> {
    let mut channel = CHANNEL.new_entity();
    channel.set("type", "unix")?;
    channel.set(
        "source",
        AttrValue::map([("mode", "bind"), ("path", socket_path)]),
    )?;
    channel.set(
        "target",
        AttrValue::map([("type", "virtio"), ("name", target_name)]),
    )?;
    Ok(channel)
}
