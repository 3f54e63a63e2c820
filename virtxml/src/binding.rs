//! Binding descriptors: the declarative rules mapping one named property of
//! an element object to one location and shape inside its backing tree.
//!
//! Each rule is a [`Binding`] variant; dispatch is an exhaustive match, so a
//! new kind cannot be added without handling get, set and delete for it.
//! List-shaped rules delegate per-child conversion to a [`Marshal`] pair,
//! which is how several list properties can share one parent node and
//! partition its children by tag.

use std::collections::BTreeMap;
use std::fmt;

use crate::entity::{Entity, Model};
use crate::error::{Result, VirtXmlError};
use crate::tree::XmlNode;
use crate::value::AttrValue;

/// Conversion applied to element text content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCoerce {
    /// Text passes through unchanged.
    None,
    /// Base-10 integer; blank text reads as 0 unless a default overrides.
    Int,
    /// The `yes`/`no` convention for booleans.
    YesNo,
}

impl TextCoerce {
    fn decode(self, raw: &str) -> Result<AttrValue> {
        match self {
            TextCoerce::None => Ok(AttrValue::Text(raw.to_string())),
            TextCoerce::Int => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Ok(AttrValue::Int(0));
                }
                trimmed
                    .parse::<i64>()
                    .map(AttrValue::Int)
                    .map_err(|_| VirtXmlError::shape("base-10 integer text", raw))
            }
            TextCoerce::YesNo => match raw {
                "yes" => Ok(AttrValue::Bool(true)),
                "no" => Ok(AttrValue::Bool(false)),
                other => Err(VirtXmlError::shape("'yes' or 'no'", other)),
            },
        }
    }

    fn encode(self, value: &AttrValue) -> Result<String> {
        match (self, value) {
            (TextCoerce::None, AttrValue::Text(s)) => Ok(s.clone()),
            (TextCoerce::None, AttrValue::Int(i)) => Ok(i.to_string()),
            (TextCoerce::Int, AttrValue::Int(i)) => Ok(i.to_string()),
            (TextCoerce::Int, AttrValue::Text(s)) => s
                .trim()
                .parse::<i64>()
                .map(|i| i.to_string())
                .map_err(|_| VirtXmlError::shape("base-10 integer", s.as_str())),
            (TextCoerce::YesNo, AttrValue::Bool(b)) => {
                Ok(if *b { "yes" } else { "no" }.to_string())
            }
            (TextCoerce::YesNo, AttrValue::Text(s)) if s == "yes" || s == "no" => Ok(s.clone()),
            (TextCoerce::None, other) => Err(VirtXmlError::shape("string", other.kind())),
            (TextCoerce::Int, other) => Err(VirtXmlError::shape("integer", other.kind())),
            (TextCoerce::YesNo, other) => Err(VirtXmlError::shape("boolean", other.kind())),
        }
    }
}

/// Per-child conversion pair for list-bound properties.
pub trait Marshal: Send + Sync {
    /// Convert one list item into a child node.
    fn to_node(&self, value: &AttrValue, index: usize, owner: &Entity) -> Result<XmlNode>;

    /// Convert one child node back into a list item. `None` excludes the
    /// child: it belongs to a sibling list property under the same parent.
    fn from_node(&self, node: &XmlNode, index: usize, owner: &Entity)
        -> Result<Option<AttrValue>>;
}

/// One property-to-tree binding rule.
///
/// Paths are slash-separated and relative to the element's root node; `"."`
/// names the root itself.
#[derive(Clone, Copy)]
pub enum Binding {
    /// One attribute on the node at `path`.
    Attribute {
        path: &'static str,
        attr: &'static str,
        default: Option<&'static str>,
    },
    /// The text content of the node at `path`.
    Text {
        path: &'static str,
        coerce: TextCoerce,
        default: Option<&'static str>,
    },
    /// The whole attribute set of the node at `path`, as a flat map.
    Map { path: &'static str },
    /// One child bound to a full sub-element of `model`.
    Nest {
        path: &'static str,
        model: &'static Model,
    },
    /// An ordered run of children directly under `path`.
    List {
        path: &'static str,
        marshal: &'static dyn Marshal,
        polymorphic: bool,
    },
    /// A name this element type deliberately withholds.
    Forbidden,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Attribute { path, attr, .. } => {
                write!(f, "Attribute({path}@{attr})")
            }
            Binding::Text { path, coerce, .. } => write!(f, "Text({path}, {coerce:?})"),
            Binding::Map { path } => write!(f, "Map({path})"),
            Binding::Nest { path, model } => write!(f, "Nest({path}, {})", model.name),
            Binding::List { path, polymorphic, .. } => {
                write!(f, "List({path}, polymorphic={polymorphic})")
            }
            Binding::Forbidden => write!(f, "Forbidden"),
        }
    }
}

impl Binding {
    pub(crate) fn get(&self, slot: &str, entity: &Entity) -> Result<AttrValue> {
        let root = entity.root();
        match self {
            Binding::Attribute { path, attr, default } => {
                match root.find(path).and_then(|n| n.attr(attr)).or(*default) {
                    Some(value) => Ok(AttrValue::Text(value.to_string())),
                    None => Err(not_found(entity, slot, path)),
                }
            }
            Binding::Text { path, coerce, default } => match root.find(path) {
                Some(node) => match node.text.as_deref().or(*default) {
                    Some(raw) => coerce.decode(raw),
                    None if *coerce == TextCoerce::Int => Ok(AttrValue::Int(0)),
                    None => Err(not_found(entity, slot, path)),
                },
                None => match default {
                    Some(raw) => coerce.decode(raw),
                    None => Err(not_found(entity, slot, path)),
                },
            },
            Binding::Map { path } => match root.find(path) {
                Some(node) => Ok(AttrValue::Map(node.attr_map())),
                None => Err(not_found(entity, slot, path)),
            },
            Binding::Nest { path, model } => match root.find(path) {
                Some(node) => Ok(AttrValue::Element(Entity::from_node(*model, node.clone())?)),
                None => Err(not_found(entity, slot, path)),
            },
            Binding::List { path, marshal, .. } => {
                let parent = root
                    .find(path)
                    .ok_or_else(|| not_found(entity, slot, path))?;
                let mut items = Vec::new();
                for (index, child) in parent.children.iter().enumerate() {
                    if let Some(item) = marshal.from_node(child, index, entity)? {
                        items.push(item);
                    }
                }
                Ok(AttrValue::List(items))
            }
            Binding::Forbidden => Err(forbidden(entity, slot)),
        }
    }

    pub(crate) fn set(&self, slot: &str, entity: &mut Entity, value: AttrValue) -> Result<()> {
        match self {
            Binding::Attribute { path, attr, .. } => {
                let text = match value {
                    AttrValue::Text(s) => s,
                    AttrValue::Int(i) => i.to_string(),
                    AttrValue::Bool(b) => if b { "yes" } else { "no" }.to_string(),
                    other => return Err(VirtXmlError::shape("string", other.kind())),
                };
                entity.root_mut().create_along(path).set_attr(*attr, text);
                Ok(())
            }
            Binding::Text { path, coerce, .. } => {
                let text = coerce.encode(&value)?;
                entity.root_mut().create_along(path).text = Some(text);
                Ok(())
            }
            Binding::Map { path } => {
                let map = coerce_flat_map(&value)
                    .ok_or_else(|| VirtXmlError::shape("attribute map", value.kind()))?;
                entity.root_mut().create_along(path).replace_attrs(&map);
                Ok(())
            }
            Binding::Nest { path, model } => {
                let sub = match value {
                    AttrValue::Element(e) => e,
                    other => return Err(VirtXmlError::shape(model.name, other.kind())),
                };
                if !std::ptr::eq(sub.model(), *model) {
                    return Err(VirtXmlError::shape(model.name, sub.model().name));
                }
                // Adopt the sub-element's tree: detach any existing child,
                // then re-point ownership under this element.
                let node = sub.into_root();
                let root = entity.root_mut();
                root.remove(path);
                root.create_along(parent_of(path)).push_child(node);
                Ok(())
            }
            Binding::List { path, marshal, .. } => {
                let items = match value {
                    AttrValue::List(items) => items,
                    other => return Err(VirtXmlError::shape("list", other.kind())),
                };
                let mut replacements = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    replacements.push(marshal.to_node(item, index, entity)?);
                }
                let owned = self.owned_children(entity)?;
                let parent = entity.root_mut().create_along(path);
                for index in owned.iter().rev() {
                    parent.children.remove(*index);
                }
                for node in replacements {
                    parent.push_child(node);
                }
                Ok(())
            }
            Binding::Forbidden => Err(forbidden(entity, slot)),
        }
    }

    pub(crate) fn delete(&self, slot: &str, entity: &mut Entity) -> Result<()> {
        match self {
            Binding::Attribute { path, attr, .. } => {
                // Only the attribute goes; the node survives.
                if let Some(node) = entity.root_mut().find_mut(path) {
                    node.remove_attr(attr);
                }
                Ok(())
            }
            Binding::Text { path, .. } | Binding::Map { path } | Binding::Nest { path, .. } => {
                entity.root_mut().remove(path);
                Ok(())
            }
            Binding::List { path, .. } => {
                let owned = self.owned_children(entity)?;
                if let Some(parent) = entity.root_mut().find_mut(path) {
                    for index in owned.iter().rev() {
                        parent.children.remove(*index);
                    }
                }
                Ok(())
            }
            Binding::Forbidden => Err(forbidden(entity, slot)),
        }
    }

    /// Indices of the children under a list binding's parent that this
    /// binding's marshal claims as its own.
    fn owned_children(&self, entity: &Entity) -> Result<Vec<usize>> {
        let Binding::List { path, marshal, .. } = self else {
            return Ok(Vec::new());
        };
        let mut owned = Vec::new();
        if let Some(parent) = entity.root().find(path) {
            for (index, child) in parent.children.iter().enumerate() {
                if marshal.from_node(child, index, entity)?.is_some() {
                    owned.push(index);
                }
            }
        }
        Ok(owned)
    }
}

fn not_found(entity: &Entity, slot: &str, path: &str) -> VirtXmlError {
    VirtXmlError::NotFound(format!(
        "{}.{} (at '{}')",
        entity.model().name,
        slot,
        path
    ))
}

fn forbidden(entity: &Entity, slot: &str) -> VirtXmlError {
    VirtXmlError::UnboundProperty(format!(
        "{}.{} is withheld by this element type",
        entity.model().name,
        slot
    ))
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Flatten a value into a string-to-string attribute map, stringifying
/// scalar fields of nested payloads. `None` when the shape does not fit.
pub(crate) fn coerce_flat_map(value: &AttrValue) -> Option<BTreeMap<String, String>> {
    match value {
        AttrValue::Map(map) => Some(map.clone()),
        AttrValue::Nested(_, fields) => {
            let mut map = BTreeMap::new();
            for (key, field) in fields {
                let text = match field {
                    AttrValue::Text(s) => s.clone(),
                    AttrValue::Int(i) => i.to_string(),
                    AttrValue::Bool(b) => if *b { "yes" } else { "no" }.to_string(),
                    _ => return None,
                };
                map.insert(key.clone(), text);
            }
            Some(map)
        }
        _ => None,
    }
}

// =============================================================================
// STOCK MARSHALS
// =============================================================================

/// Homogeneous list of flat attribute maps: each item is `<tag k='v' .../>`.
/// Children with a different tag are left to sibling bindings.
pub struct AttrListMarshal {
    pub tag: &'static str,
}

impl Marshal for AttrListMarshal {
    fn to_node(&self, value: &AttrValue, _index: usize, _owner: &Entity) -> Result<XmlNode> {
        let map = coerce_flat_map(value).ok_or_else(|| {
            VirtXmlError::shape(format!("attribute map for <{}>", self.tag), value.kind())
        })?;
        let mut node = XmlNode::new(self.tag);
        node.replace_attrs(&map);
        Ok(node)
    }

    fn from_node(
        &self,
        node: &XmlNode,
        _index: usize,
        _owner: &Entity,
    ) -> Result<Option<AttrValue>> {
        if node.tag == self.tag {
            Ok(Some(AttrValue::Map(node.attr_map())))
        } else {
            Ok(None)
        }
    }
}

/// List of bare flag elements: each item is the tag name itself
/// (`<acpi/>`, `<apic/>`, ...). Claims every child of the parent.
pub struct FlagListMarshal;

impl Marshal for FlagListMarshal {
    fn to_node(&self, value: &AttrValue, _index: usize, _owner: &Entity) -> Result<XmlNode> {
        match value {
            AttrValue::Text(name) => Ok(XmlNode::new(name.as_str())),
            other => Err(VirtXmlError::shape("flag name", other.kind())),
        }
    }

    fn from_node(
        &self,
        node: &XmlNode,
        _index: usize,
        _owner: &Entity,
    ) -> Result<Option<AttrValue>> {
        Ok(Some(AttrValue::Text(node.tag.clone())))
    }
}

/// Homogeneous list of sub-elements of one model. Items may be full
/// elements or nested payloads applied to a fresh element.
pub struct EntityListMarshal {
    pub model: &'static Model,
}

impl Marshal for EntityListMarshal {
    fn to_node(&self, value: &AttrValue, _index: usize, _owner: &Entity) -> Result<XmlNode> {
        match value {
            AttrValue::Element(e) => {
                if !std::ptr::eq(e.model(), self.model) {
                    return Err(VirtXmlError::shape(self.model.name, e.model().name));
                }
                Ok(e.root().clone())
            }
            AttrValue::Nested(_, fields) => {
                let mut e = self.model.new_entity();
                e.setup_attrs(fields)?;
                Ok(e.into_root())
            }
            other => Err(VirtXmlError::shape(self.model.name, other.kind())),
        }
    }

    fn from_node(
        &self,
        node: &XmlNode,
        _index: usize,
        _owner: &Entity,
    ) -> Result<Option<AttrValue>> {
        if node.tag == self.model.tag {
            Ok(Some(AttrValue::Element(Entity::from_node(
                self.model,
                node.clone(),
            )?)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Slot;
    use crate::value::SetMode;

    static CELLS: AttrListMarshal = AttrListMarshal { tag: "cell" };
    static FLAGS: FlagListMarshal = FlagListMarshal;
    static TARGETS: EntityListMarshal = EntityListMarshal { model: &TARGET };

    static TARGET: Model = Model {
        name: "TestTarget",
        tag: "target",
        slots: &[
            Slot {
                name: "dev",
                binding: Binding::Attribute { path: ".", attr: "dev", default: None },
            },
            Slot {
                name: "bus",
                binding: Binding::Attribute { path: ".", attr: "bus", default: Some("virtio") },
            },
        ],
        uncomparable: &[],
    };

    static DEVICE: Model = Model {
        name: "TestDevice",
        tag: "device",
        slots: &[
            Slot {
                name: "kind",
                binding: Binding::Attribute { path: ".", attr: "kind", default: Some("generic") },
            },
            Slot {
                name: "label",
                binding: Binding::Text {
                    path: "label",
                    coerce: TextCoerce::None,
                    default: None,
                },
            },
            Slot {
                name: "count",
                binding: Binding::Text { path: "count", coerce: TextCoerce::Int, default: None },
            },
            Slot {
                name: "enabled",
                binding: Binding::Text {
                    path: "enabled",
                    coerce: TextCoerce::YesNo,
                    default: None,
                },
            },
            Slot {
                name: "driver",
                binding: Binding::Map { path: "driver" },
            },
            Slot {
                name: "target",
                binding: Binding::Nest { path: "target", model: &TARGET },
            },
            Slot {
                name: "cells",
                binding: Binding::List { path: "layout", marshal: &CELLS, polymorphic: false },
            },
            Slot {
                name: "extra_targets",
                binding: Binding::List { path: "layout", marshal: &TARGETS, polymorphic: false },
            },
            Slot {
                name: "features",
                binding: Binding::List {
                    path: "features",
                    marshal: &FLAGS,
                    polymorphic: false,
                },
            },
            Slot { name: "secret", binding: Binding::Forbidden },
        ],
        uncomparable: &[],
    };

    #[test]
    fn test_attribute_roundtrip_and_default() {
        let mut e = DEVICE.new_entity();
        // Absent attribute falls back to the declared default.
        assert_eq!(e.get("kind").unwrap(), AttrValue::Text("generic".into()));

        e.set("kind", "disk").unwrap();
        assert_eq!(e.get("kind").unwrap(), AttrValue::Text("disk".into()));

        // Delete removes the attribute but leaves the node; the default
        // becomes visible again.
        e.del("kind").unwrap();
        assert_eq!(e.get("kind").unwrap(), AttrValue::Text("generic".into()));
    }

    #[test]
    fn test_text_roundtrip_creates_chain() {
        let mut e = DEVICE.new_entity();
        assert!(e.get("label").unwrap_err().is_not_found());

        e.set("label", "boot disk").unwrap();
        assert_eq!(e.get("label").unwrap(), AttrValue::Text("boot disk".into()));
        assert!(e.root().find("label").is_some());
    }

    #[test]
    fn test_int_coercion_blank_reads_zero() {
        let mut e = DEVICE.new_entity();
        e.set("count", 42i64).unwrap();
        assert_eq!(e.get("count").unwrap(), AttrValue::Int(42));

        // A present-but-empty element reads as 0.
        e.root_mut().find_mut("count").unwrap().text = None;
        assert_eq!(e.get("count").unwrap(), AttrValue::Int(0));

        assert!(e.set("count", true).is_err());
    }

    #[test]
    fn test_yes_no_coercion() {
        let mut e = DEVICE.new_entity();
        e.set("enabled", true).unwrap();
        assert_eq!(
            e.root().find("enabled").unwrap().text.as_deref(),
            Some("yes")
        );
        assert_eq!(e.get("enabled").unwrap(), AttrValue::Bool(true));

        e.set("enabled", false).unwrap();
        assert_eq!(e.get("enabled").unwrap(), AttrValue::Bool(false));

        assert!(e.set("enabled", 3i64).is_err());
    }

    #[test]
    fn test_map_set_replaces_never_merges() {
        let mut e = DEVICE.new_entity();
        e.set("driver", AttrValue::map([("name", "qemu"), ("type", "qcow2")]))
            .unwrap();
        e.set("driver", AttrValue::map([("cache", "none")])).unwrap();

        let driver = e.get("driver").unwrap();
        let map = driver.as_map().unwrap();
        assert_eq!(map.get("cache").map(String::as_str), Some("none"));
        assert!(!map.contains_key("name"));
    }

    #[test]
    fn test_nest_adopts_subtree_and_rejects_wrong_model() {
        let mut target = TARGET.new_entity();
        target.set("dev", "vda").unwrap();

        let mut e = DEVICE.new_entity();
        e.set("target", target).unwrap();
        let nested = e.get("target").unwrap();
        let sub = nested.as_element().unwrap();
        assert_eq!(sub.get("dev").unwrap(), AttrValue::Text("vda".into()));

        // A different element type is a shape mismatch.
        let wrong = DEVICE.new_entity();
        assert!(matches!(
            e.set("target", wrong),
            Err(VirtXmlError::Shape { .. })
        ));
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let mut e = DEVICE.new_entity();
        e.set(
            "cells",
            vec![
                AttrValue::map([("id", "0")]),
                AttrValue::map([("id", "1")]),
            ],
        )
        .unwrap();

        let cells = e.get("cells").unwrap();
        let items = cells.as_list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_map().unwrap()["id"], "0");
        assert_eq!(items[1].as_map().unwrap()["id"], "1");

        // Appending a third entry and re-setting keeps all three in order.
        let mut items = items.to_vec();
        items.push(AttrValue::map([("id", "2")]));
        e.set("cells", items).unwrap();
        let cells = e.get("cells").unwrap();
        let items = cells.as_list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].as_map().unwrap()["id"], "2");
    }

    #[test]
    fn test_sibling_lists_partition_one_parent() {
        let mut e = DEVICE.new_entity();
        e.set("cells", vec![AttrValue::map([("id", "0")])]).unwrap();

        let mut t = TARGET.new_entity();
        t.set("dev", "vda").unwrap();
        e.set("extra_targets", vec![AttrValue::Element(t)]).unwrap();

        // Both properties live under <layout>, partitioned by tag.
        assert_eq!(e.root().find("layout").unwrap().children.len(), 2);
        assert_eq!(e.get("cells").unwrap().as_list().unwrap().len(), 1);
        assert_eq!(e.get("extra_targets").unwrap().as_list().unwrap().len(), 1);

        // Re-setting one property does not disturb the sibling.
        e.set("cells", Vec::<AttrValue>::new()).unwrap();
        assert_eq!(e.get("cells").unwrap().as_list().unwrap().len(), 0);
        assert_eq!(e.get("extra_targets").unwrap().as_list().unwrap().len(), 1);
    }

    #[test]
    fn test_flag_list() {
        let mut e = DEVICE.new_entity();
        e.set(
            "features",
            vec![AttrValue::Text("acpi".into()), AttrValue::Text("apic".into())],
        )
        .unwrap();
        assert!(e.root().find("features/acpi").is_some());
        assert_eq!(
            e.get("features").unwrap(),
            AttrValue::List(vec![
                AttrValue::Text("acpi".into()),
                AttrValue::Text("apic".into()),
            ])
        );
    }

    #[test]
    fn test_entity_list_accepts_nested_payloads() {
        let mut e = DEVICE.new_entity();
        e.set(
            "extra_targets",
            vec![AttrValue::nested(
                SetMode::Replace,
                [("dev", AttrValue::Text("vdb".into()))],
            )],
        )
        .unwrap();

        let listed = e.get("extra_targets").unwrap();
        let first = listed.as_list().unwrap()[0].as_element().unwrap().clone();
        assert_eq!(first.get("dev").unwrap(), AttrValue::Text("vdb".into()));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut e = DEVICE.new_entity();
        e.set("label", "x").unwrap();
        e.del("label").unwrap();
        e.del("label").unwrap();
        assert!(e.get("label").unwrap_err().is_not_found());

        e.del("driver").unwrap();
        e.del("target").unwrap();
        e.del("cells").unwrap();
    }

    #[test]
    fn test_forbidden_always_fails() {
        let mut e = DEVICE.new_entity();
        assert!(matches!(
            e.get("secret"),
            Err(VirtXmlError::UnboundProperty(_))
        ));
        assert!(matches!(
            e.set("secret", "x"),
            Err(VirtXmlError::UnboundProperty(_))
        ));
        assert!(matches!(
            e.del("secret"),
            Err(VirtXmlError::UnboundProperty(_))
        ));
    }
}
