//! The root `<domain>` element: identity, resources, lifecycle actions,
//! firmware/CPU/clock sections and the polymorphic device list.

pub mod clock;
pub mod cpu;
pub mod os;

use std::process::Command;

use tracing::debug;
use uuid::Uuid;

use crate::binding::{Binding, FlagListMarshal, TextCoerce};
use crate::entity::{Entity, Model, Slot};
use crate::error::{Result, VirtXmlError};
use crate::registry::{DeviceList, DEVICE_MARSHAL};
use crate::value::AttrValue;

static FEATURES: FlagListMarshal = FlagListMarshal;

pub static MODEL: Model = Model {
    name: "DomainXml",
    tag: "domain",
    slots: &[
        Slot {
            name: "type",
            binding: Binding::Attribute { path: ".", attr: "type", default: Some("kvm") },
        },
        Slot {
            name: "name",
            binding: Binding::Text { path: "name", coerce: TextCoerce::None, default: None },
        },
        Slot {
            name: "uuid",
            binding: Binding::Text { path: "uuid", coerce: TextCoerce::None, default: None },
        },
        Slot {
            name: "title",
            binding: Binding::Text { path: "title", coerce: TextCoerce::None, default: None },
        },
        Slot {
            name: "memory",
            binding: Binding::Text { path: "memory", coerce: TextCoerce::Int, default: None },
        },
        Slot {
            name: "memory_unit",
            binding: Binding::Attribute { path: "memory", attr: "unit", default: Some("KiB") },
        },
        Slot {
            name: "current_memory",
            binding: Binding::Text {
                path: "currentMemory",
                coerce: TextCoerce::Int,
                default: None,
            },
        },
        Slot {
            name: "vcpu",
            binding: Binding::Text { path: "vcpu", coerce: TextCoerce::Int, default: None },
        },
        Slot {
            name: "vcpu_placement",
            binding: Binding::Attribute { path: "vcpu", attr: "placement", default: Some("static") },
        },
        Slot {
            name: "os",
            binding: Binding::Nest { path: "os", model: &os::MODEL },
        },
        Slot {
            name: "cpu",
            binding: Binding::Nest { path: "cpu", model: &cpu::MODEL },
        },
        Slot {
            name: "clock",
            binding: Binding::Nest { path: "clock", model: &clock::MODEL },
        },
        Slot {
            name: "features",
            binding: Binding::List { path: "features", marshal: &FEATURES, polymorphic: false },
        },
        Slot {
            name: "on_poweroff",
            binding: Binding::Text {
                path: "on_poweroff",
                coerce: TextCoerce::None,
                default: None,
            },
        },
        Slot {
            name: "on_reboot",
            binding: Binding::Text { path: "on_reboot", coerce: TextCoerce::None, default: None },
        },
        Slot {
            name: "on_crash",
            binding: Binding::Text { path: "on_crash", coerce: TextCoerce::None, default: None },
        },
        Slot {
            name: "emulator",
            binding: Binding::Text {
                path: "devices/emulator",
                coerce: TextCoerce::None,
                default: None,
            },
        },
        Slot {
            name: "devices",
            binding: Binding::List { path: "devices", marshal: &DEVICE_MARSHAL, polymorphic: true },
        },
    ],
    uncomparable: &[],
};

/// A fresh KVM domain with the given name and a new UUID.
pub fn new(name: &str) -> Result<Entity> {
    let mut domain = MODEL.new_entity();
    domain.set("type", "kvm")?;
    domain.set("name", name)?;
    domain.set("uuid", Uuid::new_v4().to_string())?;
    Ok(domain)
}

/// The domain's devices as a catalog-checked collection.
pub fn devices(domain: &Entity) -> Result<DeviceList> {
    match domain.get_opt("devices")? {
        Some(value) => DeviceList::from_value(value),
        None => Ok(DeviceList::new()),
    }
}

/// Replace the domain's devices with the collection, in order.
pub fn set_devices(domain: &mut Entity, list: DeviceList) -> Result<()> {
    domain.set("devices", AttrValue::from(list))
}

/// Parse the configuration emitted on stdout by an external dump command
/// (e.g. `virsh dumpxml <name>`).
pub fn fetch_via(program: &str, args: &[&str]) -> Result<Entity> {
    debug!(program, "Fetching domain XML from external command");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| VirtXmlError::ExternalTool(format!("{program}: {err}")))?;
    if !output.status.success() {
        return Err(VirtXmlError::ExternalTool(format!(
            "{program} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    MODEL.parse(&String::from_utf8_lossy(&output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::{chardev, controller, disk, graphics, interface, memory, video};

    fn build_test_domain() -> Entity {
        let mut domain = new("test-vm").unwrap();
        domain.set("memory", 2097152i64).unwrap();
        domain.set("memory_unit", "KiB").unwrap();
        domain.set("vcpu", 4i64).unwrap();
        domain.set("vcpu_placement", "static").unwrap();
        domain.set("on_poweroff", "destroy").unwrap();
        domain.set("on_reboot", "restart").unwrap();
        domain.set("on_crash", "destroy").unwrap();
        domain.set("emulator", "/usr/bin/qemu-system-x86_64").unwrap();
        domain.set("os", os::bios(&["hd", "cdrom"]).unwrap()).unwrap();
        domain.set("cpu", cpu::host_model(1, 4, 1).unwrap()).unwrap();
        domain
            .set("clock", clock::utc("catchup", "delay", false).unwrap())
            .unwrap();
        domain
            .set(
                "features",
                vec![AttrValue::Text("acpi".into()), AttrValue::Text("apic".into())],
            )
            .unwrap();

        let mut list = DeviceList::new();
        list.push(disk::file_disk("/var/lib/vms/test.qcow2", "vda").unwrap())
            .unwrap();
        list.push(interface::bridge("virbr0", Some("52:54:00:12:34:56")).unwrap())
            .unwrap();
        list.push(controller::pcie_root_port(10).unwrap()).unwrap();
        list.push(chardev::pty_serial(0).unwrap()).unwrap();
        list.push(chardev::pty_console(0).unwrap()).unwrap();
        list.push(graphics::vnc("0.0.0.0", None).unwrap()).unwrap();
        list.push(video::primary("vga", 16384, 1).unwrap()).unwrap();
        list.push(memory::MEMBALLOON.new_entity()).unwrap();
        set_devices(&mut domain, list).unwrap();
        domain
    }

    #[test]
    fn test_basic_domain_xml() {
        let domain = build_test_domain();
        let xml = domain.to_xml();
        assert!(xml.contains("<name>test-vm</name>"));
        assert!(xml.contains("<memory unit=\"KiB\">2097152</memory>"));
        assert!(xml.contains("<vcpu placement=\"static\">4</vcpu>"));
        assert!(xml.contains("/var/lib/vms/test.qcow2"));
        assert!(xml.contains("<emulator>/usr/bin/qemu-system-x86_64</emulator>"));
        assert!(xml.contains("<acpi/>"));
        assert!(xml.contains("<on_poweroff>destroy</on_poweroff>"));
    }

    #[test]
    fn test_devices_roundtrip_in_order() {
        let domain = build_test_domain();
        let list = devices(&domain).unwrap();
        assert_eq!(list.len(), 8);

        let tags: Vec<&str> = list.iter().map(|d| d.tag()).collect();
        assert_eq!(
            tags,
            vec![
                "disk",
                "interface",
                "controller",
                "serial",
                "console",
                "graphics",
                "video",
                "memballoon",
            ]
        );
    }

    #[test]
    fn test_emulator_survives_device_replacement() {
        let mut domain = build_test_domain();
        // Re-setting the device list must not disturb <emulator>, which
        // shares the <devices> parent but belongs to a different binding.
        let mut list = DeviceList::new();
        list.push(disk::file_disk("/vm/solo.qcow2", "vda").unwrap())
            .unwrap();
        set_devices(&mut domain, list).unwrap();

        assert_eq!(
            domain.get("emulator").unwrap().as_text(),
            Some("/usr/bin/qemu-system-x86_64")
        );
        assert_eq!(devices(&domain).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_dumped_domain() {
        let source = build_test_domain();
        let xml = source.to_xml();

        let parsed = MODEL.parse(&xml).unwrap();
        assert_eq!(parsed.get("name").unwrap().as_text(), Some("test-vm"));
        assert_eq!(parsed.get("memory").unwrap().as_int(), Some(2097152));
        assert!(source.compare(&parsed).unwrap());
    }

    #[test]
    fn test_fetch_via_missing_command() {
        let err = fetch_via("virtxml-no-such-dump-command", &["dumpxml", "vm"]).unwrap_err();
        assert!(matches!(err, VirtXmlError::ExternalTool(_)));
    }

    #[test]
    fn test_fetch_via_failing_command() {
        let err = fetch_via("false", &[]).unwrap_err();
        assert!(matches!(err, VirtXmlError::ExternalTool(_)));
    }
}
