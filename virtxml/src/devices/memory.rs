//! Memory device elements: `<memory>` modules and the `<memballoon>`.

use crate::binding::{Binding, TextCoerce};
use crate::entity::{Entity, Model, Slot};
use crate::error::Result;

/// `<target>` of a memory module: size, unit and the guest NUMA node.
pub static TARGET: Model = Model {
    name: "MemoryTargetXml",
    tag: "target",
    slots: &[
        Slot {
            name: "size",
            binding: Binding::Text { path: "size", coerce: TextCoerce::Int, default: None },
        },
        Slot {
            name: "size_unit",
            binding: Binding::Attribute { path: "size", attr: "unit", default: None },
        },
        Slot {
            name: "node",
            binding: Binding::Text { path: "node", coerce: TextCoerce::Int, default: None },
        },
    ],
    uncomparable: &[],
};

/// Slot table for `<memory>` module devices (DIMM hot-plug).
pub static MODEL: Model = Model {
    name: "MemoryXml",
    tag: "memory",
    slots: &[
        Slot {
            name: "model",
            binding: Binding::Attribute { path: ".", attr: "model", default: None },
        },
        Slot {
            name: "target",
            binding: Binding::Nest { path: "target", model: &TARGET },
        },
        Slot {
            name: "address",
            binding: Binding::Map { path: "address" },
        },
    ],
    uncomparable: &["address"],
};

pub static MEMBALLOON: Model = Model {
    name: "MemballoonXml",
    tag: "memballoon",
    slots: &[
        Slot {
            name: "model",
            binding: Binding::Attribute { path: ".", attr: "model", default: Some("virtio") },
        },
        Slot {
            name: "stats_period",
            binding: Binding::Attribute { path: "stats", attr: "period", default: None },
        },
    ],
    uncomparable: &[],
};

/// A pluggable DIMM of `size_kib` KiB on the given guest NUMA node.
pub fn dimm(size_kib: i64, node: i64) -> Result<Entity> {
    let mut module = MODEL.new_entity();
    module.set("model", "dimm")?;

    let mut target = TARGET.new_entity();
    target.set("size", size_kib)?;
    target.set("size_unit", "KiB")?;
    target.set("node", node)?;
    module.set("target", target)?;
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{AttrMap, AttrValue, SetMode};

    #[test]
    fn test_dimm_xml() {
        let module = dimm(524288, 0).unwrap();
        let xml = module.to_xml();
        assert!(xml.contains("model=\"dimm\""));
        assert!(xml.contains("<size unit=\"KiB\">524288</size>"));
        assert!(xml.contains("<node>0</node>"));
    }

    /// The bulk-access scenario: structured set then structured get
    /// reproduces exactly the supplied payload.
    #[test]
    fn test_bulk_setup_and_fetch() {
        let mut module = MODEL.new_entity();
        module
            .setup_attrs(&AttrMap::from([
                ("model".to_string(), AttrValue::Text("dimm".into())),
                (
                    "target".to_string(),
                    AttrValue::nested(
                        SetMode::Replace,
                        [
                            ("size", AttrValue::Int(524288)),
                            ("size_unit", AttrValue::Text("KiB".into())),
                            ("node", AttrValue::Int(0)),
                        ],
                    ),
                ),
            ]))
            .unwrap();

        let fetched = module.fetch_attrs().unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched["model"], AttrValue::Text("dimm".into()));
        match &fetched["target"] {
            AttrValue::Nested(SetMode::Replace, fields) => {
                assert_eq!(fields.len(), 3);
                assert_eq!(fields["size"], AttrValue::Int(524288));
                assert_eq!(fields["size_unit"], AttrValue::Text("KiB".into()));
                assert_eq!(fields["node"], AttrValue::Int(0));
            }
            other => panic!("expected nested target, got {:?}", other),
        }
    }

    #[test]
    fn test_memballoon_default_model() {
        let balloon = MEMBALLOON.new_entity();
        assert_eq!(balloon.get("model").unwrap().as_text(), Some("virtio"));
    }
}
