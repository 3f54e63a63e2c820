//! Controller elements (`<controller>`).

use crate::binding::Binding;
use crate::entity::{Entity, Model, Slot};
use crate::error::Result;
use crate::value::AttrValue;

pub static MODEL: Model = Model {
    name: "ControllerXml",
    tag: "controller",
    slots: &[
        Slot {
            name: "type",
            binding: Binding::Attribute { path: ".", attr: "type", default: None },
        },
        Slot {
            name: "index",
            binding: Binding::Attribute { path: ".", attr: "index", default: None },
        },
        Slot {
            name: "model",
            binding: Binding::Attribute { path: ".", attr: "model", default: None },
        },
        Slot {
            name: "model_name",
            binding: Binding::Map { path: "model" },
        },
        Slot {
            name: "target",
            binding: Binding::Map { path: "target" },
        },
        Slot {
            name: "address",
            binding: Binding::Map { path: "address" },
        },
    ],
    uncomparable: &["address"],
};

/// A PCIe root port controller providing a hot-plug slot. Indices start
/// high to stay clear of the auto-generated controllers.
pub fn pcie_root_port(index: u32) -> Result<Entity> {
    let mut controller = MODEL.new_entity();
    controller.set("type", "pci")?;
    controller.set("index", index.to_string())?;
    controller.set("model", "pcie-root-port")?;
    controller.set("model_name", AttrValue::map([("name", "pcie-root-port")]))?;
    controller.set(
        "target",
        AttrValue::map([
            ("chassis", index.to_string()),
            ("port", format!("0x{:x}", index + 0x10)),
        ]),
    )?;
    Ok(controller)
}
