//! Graphics server elements (`<graphics>`).

use crate::binding::{Binding, EntityListMarshal};
use crate::entity::{Entity, Model, Slot};
use crate::error::Result;
use crate::value::AttrValue;

/// `<listen>` sub-element: one bind address per entry.
pub static LISTEN: Model = Model {
    name: "GraphicsListenXml",
    tag: "listen",
    slots: &[
        Slot {
            name: "type",
            binding: Binding::Attribute { path: ".", attr: "type", default: Some("address") },
        },
        Slot {
            name: "address",
            binding: Binding::Attribute { path: ".", attr: "address", default: None },
        },
    ],
    uncomparable: &[],
};

static LISTENS: EntityListMarshal = EntityListMarshal { model: &LISTEN };

pub static MODEL: Model = Model {
    name: "GraphicsXml",
    tag: "graphics",
    slots: &[
        Slot {
            name: "type",
            binding: Binding::Attribute { path: ".", attr: "type", default: None },
        },
        Slot {
            name: "port",
            binding: Binding::Attribute { path: ".", attr: "port", default: Some("-1") },
        },
        Slot {
            name: "autoport",
            binding: Binding::Attribute { path: ".", attr: "autoport", default: Some("yes") },
        },
        Slot {
            name: "passwd",
            binding: Binding::Attribute { path: ".", attr: "passwd", default: None },
        },
        Slot {
            name: "listens",
            binding: Binding::List { path: ".", marshal: &LISTENS, polymorphic: false },
        },
    ],
    uncomparable: &[],
};

/// A VNC server listening on the given address; port -1 lets the
/// hypervisor auto-assign.
pub fn vnc(listen_addr: &str, passwd: Option<&str>) -> Result<Entity> {
    let mut graphics = MODEL.new_entity();
    graphics.set("type", "vnc")?;
    graphics.set("port", "-1")?;
    graphics.set("autoport", "yes")?;
    if let Some(passwd) = passwd {
        graphics.set("passwd", passwd)?;
    }

    let mut listen = LISTEN.new_entity();
    listen.set("type", "address")?;
    listen.set("address", listen_addr)?;
    graphics.set("listens", vec![AttrValue::Element(listen)])?;
    Ok(graphics)
}

/// A SPICE server with auto-assigned port.
pub fn spice() -> Result<Entity> {
    let mut graphics = MODEL.new_entity();
    graphics.set("type", "spice")?;
    graphics.set("autoport", "yes")?;
    Ok(graphics)
}
