//! Disk device elements (`<disk>`).

use std::collections::BTreeMap;

use crate::binding::Binding;
use crate::entity::{Entity, Model, Slot};
use crate::error::Result;
use crate::value::AttrValue;

/// Slot table for `<disk>`. The `address` slot is host-assigned and
/// excluded from comparison.
pub static MODEL: Model = Model {
    name: "DiskXml",
    tag: "disk",
    slots: &[
        Slot {
            name: "type",
            binding: Binding::Attribute { path: ".", attr: "type", default: Some("file") },
        },
        Slot {
            name: "device",
            binding: Binding::Attribute { path: ".", attr: "device", default: Some("disk") },
        },
        Slot {
            name: "driver",
            binding: Binding::Map { path: "driver" },
        },
        Slot {
            name: "source",
            binding: Binding::Map { path: "source" },
        },
        Slot {
            name: "target",
            binding: Binding::Map { path: "target" },
        },
        Slot {
            name: "boot",
            binding: Binding::Map { path: "boot" },
        },
        Slot {
            name: "readonly",
            binding: Binding::Map { path: "readonly" },
        },
        Slot {
            name: "address",
            binding: Binding::Map { path: "address" },
        },
    ],
    uncomparable: &["address"],
};

/// A file-backed disk on the virtio bus: qemu driver, qcow2 format,
/// cache disabled, native IO.
pub fn file_disk(path: &str, target_dev: &str) -> Result<Entity> {
    let mut disk = MODEL.new_entity();
    disk.set(
        "driver",
        AttrValue::map([
            ("name", "qemu"),
            ("type", "qcow2"),
            ("cache", "none"),
            ("io", "native"),
        ]),
    )?;
    disk.set("source", AttrValue::map([("file", path)]))?;
    disk.set("target", AttrValue::map([("dev", target_dev), ("bus", "virtio")]))?;
    Ok(disk)
}

/// A CD-ROM drive on the SATA bus, read-only, optionally loaded with an
/// ISO image.
pub fn cdrom(iso_path: Option<&str>, target_dev: &str) -> Result<Entity> {
    let mut disk = MODEL.new_entity();
    disk.set("device", "cdrom")?;
    disk.set("driver", AttrValue::map([("name", "qemu"), ("type", "raw")]))?;
    if let Some(path) = iso_path {
        disk.set("source", AttrValue::map([("file", path)]))?;
    }
    disk.set("target", AttrValue::map([("dev", target_dev), ("bus", "sata")]))?;
    disk.set("readonly", AttrValue::Map(BTreeMap::new()))?;
    Ok(disk)
}
