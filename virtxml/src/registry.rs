//! The device-tag catalog: a fixed, compile-time mapping from tag name to
//! the element model that interprets that tag's subtree.
//!
//! The catalog is closed; it is consulted by the polymorphic device-list
//! marshal when reading a domain's `<devices>` children, and by
//! [`DeviceList`] to reject insertions whose element type does not match
//! what the catalog resolves for their tag.

use crate::binding::Marshal;
use crate::devices::{chardev, controller, disk, graphics, interface, memory, video};
use crate::entity::{Entity, Model};
use crate::error::{Result, VirtXmlError};
use crate::tree::XmlNode;
use crate::value::AttrValue;

/// Tag name to element model, fixed at compile time.
pub static DEVICE_CATALOG: &[(&str, &Model)] = &[
    ("disk", &disk::MODEL),
    ("interface", &interface::MODEL),
    ("controller", &controller::MODEL),
    ("graphics", &graphics::MODEL),
    ("video", &video::MODEL),
    ("channel", &chardev::CHANNEL),
    ("serial", &chardev::SERIAL),
    ("console", &chardev::CONSOLE),
    ("memballoon", &memory::MEMBALLOON),
    ("memory", &memory::MODEL),
];

/// Resolve a device tag to its element model.
pub fn resolve(tag: &str) -> Result<&'static Model> {
    DEVICE_CATALOG
        .iter()
        .find(|(candidate, _)| *candidate == tag)
        .map(|(_, model)| *model)
        .ok_or_else(|| VirtXmlError::UnknownTag {
            tag: tag.to_string(),
            known: known_tags().join(", "),
        })
}

/// All tags in the catalog, in registration order.
pub fn known_tags() -> Vec<&'static str> {
    DEVICE_CATALOG.iter().map(|(tag, _)| *tag).collect()
}

/// Polymorphic marshal for a domain's `<devices>` children: the concrete
/// element type of each child is picked by catalog lookup on its tag.
pub struct DeviceListMarshal;

/// The shared marshal instance list bindings reference.
pub static DEVICE_MARSHAL: DeviceListMarshal = DeviceListMarshal;

impl Marshal for DeviceListMarshal {
    fn to_node(&self, value: &AttrValue, _index: usize, _owner: &Entity) -> Result<XmlNode> {
        match value {
            AttrValue::Element(device) => {
                let expected = resolve(device.tag())?;
                if !std::ptr::eq(expected, device.model()) {
                    return Err(VirtXmlError::shape(expected.name, device.model().name));
                }
                Ok(device.root().clone())
            }
            other => Err(VirtXmlError::shape("registered device element", other.kind())),
        }
    }

    fn from_node(
        &self,
        node: &XmlNode,
        _index: usize,
        _owner: &Entity,
    ) -> Result<Option<AttrValue>> {
        match resolve(&node.tag) {
            Ok(model) => Ok(Some(AttrValue::Element(Entity::from_node(
                model,
                node.clone(),
            )?))),
            // Children outside the catalog (e.g. <emulator>) belong to
            // other bindings sharing the <devices> parent.
            Err(VirtXmlError::UnknownTag { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Ordered, catalog-checked collection of domain devices.
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    devices: Vec<Entity>,
}

impl DeviceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a device, verifying its tag is in the catalog and its element
    /// type is exactly what the catalog resolves for that tag.
    pub fn push(&mut self, device: Entity) -> Result<()> {
        let expected = resolve(device.tag())?;
        if !std::ptr::eq(expected, device.model()) {
            return Err(VirtXmlError::shape(expected.name, device.model().name));
        }
        self.devices.push(device);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.devices.iter()
    }

    /// Devices with the given tag, in insertion order.
    pub fn by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Entity> {
        self.devices.iter().filter(move |d| d.tag() == tag)
    }

    /// Rebuild a list from a `devices` property value, re-checking every
    /// entry against the catalog.
    pub fn from_value(value: AttrValue) -> Result<Self> {
        let items = match value {
            AttrValue::List(items) => items,
            other => return Err(VirtXmlError::shape("list of device elements", other.kind())),
        };
        let mut list = Self::new();
        for item in items {
            match item {
                AttrValue::Element(device) => list.push(device)?,
                other => {
                    return Err(VirtXmlError::shape("device element", other.kind()));
                }
            }
        }
        Ok(list)
    }
}

impl From<DeviceList> for AttrValue {
    fn from(list: DeviceList) -> Self {
        AttrValue::List(list.devices.into_iter().map(AttrValue::Element).collect())
    }
}

impl IntoIterator for DeviceList {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.into_iter()
    }
}
