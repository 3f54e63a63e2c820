//! The `<cpu>` section: mode, model and topology.

use crate::binding::{Binding, TextCoerce};
use crate::entity::{Entity, Model, Slot};
use crate::error::Result;
use crate::value::AttrValue;

pub static MODEL: Model = Model {
    name: "CpuXml",
    tag: "cpu",
    slots: &[
        Slot {
            name: "mode",
            binding: Binding::Attribute { path: ".", attr: "mode", default: None },
        },
        Slot {
            name: "match",
            binding: Binding::Attribute { path: ".", attr: "match", default: None },
        },
        Slot {
            name: "check",
            binding: Binding::Attribute { path: ".", attr: "check", default: None },
        },
        Slot {
            name: "migratable",
            binding: Binding::Attribute { path: ".", attr: "migratable", default: None },
        },
        Slot {
            name: "model",
            binding: Binding::Text { path: "model", coerce: TextCoerce::None, default: None },
        },
        Slot {
            name: "model_fallback",
            binding: Binding::Attribute { path: "model", attr: "fallback", default: None },
        },
        Slot {
            name: "topology",
            binding: Binding::Map { path: "topology" },
        },
    ],
    uncomparable: &[],
};

fn topology(sockets: u32, cores: u32, threads: u32) -> AttrValue {
    AttrValue::map([
        ("sockets", sockets.to_string()),
        ("cores", cores.to_string()),
        ("threads", threads.to_string()),
    ])
}

/// Full host CPU passthrough. Best performance, but the domain cannot be
/// live-migrated to hosts with a different CPU.
pub fn host_passthrough(sockets: u32, cores: u32, threads: u32) -> Result<Entity> {
    let mut cpu = MODEL.new_entity();
    cpu.set("mode", "host-passthrough")?;
    cpu.set("check", "none")?;
    cpu.set("migratable", "off")?;
    cpu.set("topology", topology(sockets, cores, threads))?;
    Ok(cpu)
}

/// Host CPU model with migration kept possible.
pub fn host_model(sockets: u32, cores: u32, threads: u32) -> Result<Entity> {
    let mut cpu = MODEL.new_entity();
    cpu.set("mode", "host-model")?;
    cpu.set("check", "partial")?;
    cpu.set("topology", topology(sockets, cores, threads))?;
    Ok(cpu)
}

/// A named CPU model (`qemu64`, `Skylake-Server`, ...).
pub fn custom(model: &str, sockets: u32, cores: u32, threads: u32) -> Result<Entity> {
    let mut cpu = MODEL.new_entity();
    cpu.set("mode", "custom")?;
    cpu.set("match", "exact")?;
    cpu.set("check", "partial")?;
    cpu.set("model", model)?;
    cpu.set("model_fallback", "allow")?;
    cpu.set("topology", topology(sockets, cores, threads))?;
    Ok(cpu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_passthrough_disables_migration() {
        let cpu = host_passthrough(1, 4, 1).unwrap();
        let xml = cpu.to_xml();
        assert!(xml.contains("mode=\"host-passthrough\""));
        assert!(xml.contains("check=\"none\""));
        assert!(xml.contains("migratable=\"off\""));
        assert!(xml.contains("cores=\"4\""));
    }

    #[test]
    fn test_custom_model_has_fallback() {
        let cpu = custom("Skylake-Server", 2, 8, 2).unwrap();
        let xml = cpu.to_xml();
        assert!(xml.contains("mode=\"custom\""));
        assert!(xml.contains("<model fallback=\"allow\">Skylake-Server</model>"));
        assert!(xml.contains("sockets=\"2\""));
    }
}
