//! Network interface elements (`<interface>`).

use rand::Rng;

use crate::binding::Binding;
use crate::entity::{Entity, Model, Slot};
use crate::error::Result;
use crate::value::AttrValue;

/// `<virtualport>` sub-element used by Open vSwitch ports.
pub static VIRTUALPORT: Model = Model {
    name: "VirtualPortXml",
    tag: "virtualport",
    slots: &[
        Slot {
            name: "type",
            binding: Binding::Attribute { path: ".", attr: "type", default: None },
        },
        Slot {
            name: "parameters",
            binding: Binding::Map { path: "parameters" },
        },
    ],
    uncomparable: &[],
};

/// Slot table for `<interface>`. The PCI `address` is host-assigned and
/// excluded from comparison.
pub static MODEL: Model = Model {
    name: "InterfaceXml",
    tag: "interface",
    slots: &[
        Slot {
            name: "type",
            binding: Binding::Attribute { path: ".", attr: "type", default: Some("network") },
        },
        Slot {
            name: "mac",
            binding: Binding::Map { path: "mac" },
        },
        Slot {
            name: "source",
            binding: Binding::Map { path: "source" },
        },
        Slot {
            name: "model",
            binding: Binding::Map { path: "model" },
        },
        Slot {
            name: "target",
            binding: Binding::Map { path: "target" },
        },
        Slot {
            name: "virtualport",
            binding: Binding::Nest { path: "virtualport", model: &VIRTUALPORT },
        },
        Slot {
            name: "address",
            binding: Binding::Map { path: "address" },
        },
    ],
    uncomparable: &["address"],
};

/// Generate a MAC address in the QEMU/KVM locally administered range.
pub fn random_mac() -> String {
    let mut rng = rand::thread_rng();
    format!(
        "52:54:00:{:02x}:{:02x}:{:02x}",
        rng.gen::<u8>(),
        rng.gen::<u8>(),
        rng.gen::<u8>()
    )
}

/// A virtio NIC attached to a Linux bridge.
pub fn bridge(bridge_name: &str, mac: Option<&str>) -> Result<Entity> {
    let mut nic = MODEL.new_entity();
    nic.set("type", "bridge")?;
    let mac = mac.map(str::to_string).unwrap_or_else(random_mac);
    nic.set("mac", AttrValue::map([("address", mac.as_str())]))?;
    nic.set("source", AttrValue::map([("bridge", bridge_name)]))?;
    nic.set("model", AttrValue::map([("type", "virtio")]))?;
    Ok(nic)
}

/// A virtio NIC bound to an Open vSwitch integration bridge, carrying the
/// logical switch port id in its virtualport parameters.
pub fn ovs_port(ovs_bridge: &str, interface_id: &str, mac: Option<&str>) -> Result<Entity> {
    let mut nic = bridge(ovs_bridge, mac)?;

    let mut port = VIRTUALPORT.new_entity();
    port.set("type", "openvswitch")?;
    port.set("parameters", AttrValue::map([("interfaceid", interface_id)]))?;
    nic.set("virtualport", port)?;
    Ok(nic)
}
