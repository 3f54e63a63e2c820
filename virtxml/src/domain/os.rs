//! The `<os>` section: firmware selection and boot order.

use crate::binding::{AttrListMarshal, Binding, TextCoerce};
use crate::entity::{Entity, Model, Slot};
use crate::error::Result;
use crate::value::AttrValue;

static BOOTS: AttrListMarshal = AttrListMarshal { tag: "boot" };

pub static MODEL: Model = Model {
    name: "OsXml",
    tag: "os",
    slots: &[
        Slot {
            name: "arch",
            binding: Binding::Attribute { path: "type", attr: "arch", default: Some("x86_64") },
        },
        Slot {
            name: "machine",
            binding: Binding::Attribute { path: "type", attr: "machine", default: Some("q35") },
        },
        Slot {
            name: "os_type",
            binding: Binding::Text { path: "type", coerce: TextCoerce::None, default: Some("hvm") },
        },
        Slot {
            name: "loader",
            binding: Binding::Text { path: "loader", coerce: TextCoerce::None, default: None },
        },
        Slot {
            name: "loader_readonly",
            binding: Binding::Attribute { path: "loader", attr: "readonly", default: None },
        },
        Slot {
            name: "loader_type",
            binding: Binding::Attribute { path: "loader", attr: "type", default: None },
        },
        Slot {
            name: "nvram",
            binding: Binding::Text { path: "nvram", coerce: TextCoerce::None, default: None },
        },
        Slot {
            name: "boots",
            binding: Binding::List { path: ".", marshal: &BOOTS, polymorphic: false },
        },
    ],
    uncomparable: &[],
};

/// BIOS firmware with an explicit boot device order (`hd`, `cdrom`,
/// `network`).
pub fn bios(boot_devs: &[&str]) -> Result<Entity> {
    let mut os = MODEL.new_entity();
    os.set("os_type", "hvm")?;
    os.set("arch", "x86_64")?;
    os.set("machine", "q35")?;
    os.set(
        "boots",
        boot_devs
            .iter()
            .map(|dev| AttrValue::map([("dev", *dev)]))
            .collect::<Vec<_>>(),
    )?;
    Ok(os)
}

/// UEFI firmware: read-only OVMF code flash plus per-domain NVRAM store.
pub fn uefi(vm_name: &str) -> Result<Entity> {
    let mut os = MODEL.new_entity();
    os.set("os_type", "hvm")?;
    os.set("arch", "x86_64")?;
    os.set("machine", "q35")?;
    os.set("loader", "/usr/share/OVMF/OVMF_CODE.fd")?;
    os.set("loader_readonly", "yes")?;
    os.set("loader_type", "pflash")?;
    os.set(
        "nvram",
        format!("/var/lib/libvirt/qemu/nvram/{vm_name}_VARS.fd"),
    )?;
    Ok(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bios_boot_order_is_preserved() {
        let os = bios(&["hd", "cdrom", "network"]).unwrap();
        let boots = os.get("boots").unwrap();
        let items = boots.as_list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_map().unwrap()["dev"], "hd");
        assert_eq!(items[1].as_map().unwrap()["dev"], "cdrom");
        assert_eq!(items[2].as_map().unwrap()["dev"], "network");
    }

    #[test]
    fn test_uefi_loader_and_nvram() {
        let os = uefi("uefi-vm").unwrap();
        let xml = os.to_xml();
        assert!(xml.contains("OVMF_CODE.fd"));
        assert!(xml.contains("readonly=\"yes\""));
        assert!(xml.contains("uefi-vm_VARS.fd"));
    }
}
