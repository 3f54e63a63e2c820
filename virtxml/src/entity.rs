//! Element objects: a fixed slot table plus exactly one owned backing tree.
//!
//! A [`Model`] is the static, class-level description of one element type:
//! its root tag and the binding rule for every named property. An
//! [`Entity`] is one instance, wrapping its own [`TreeStore`]. All reads
//! and writes go through the slot table; an undeclared name is a
//! programmer error, an absent target is the recoverable "optional field"
//! case.

use std::fmt;
use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binding::Binding;
use crate::error::{Result, VirtXmlError};
use crate::tree::{TreeStore, XmlNode};
use crate::value::{AttrMap, AttrValue, SetMode};

/// The stock schema validator, part of the libvirt toolchain.
pub const DEFAULT_VALIDATOR: &str = "virt-xml-validate";

/// One named property and its binding rule.
#[derive(Debug)]
pub struct Slot {
    pub name: &'static str,
    pub binding: Binding,
}

/// Static description of one element type.
///
/// Models are `static` items; element identity is model identity, so two
/// entities are comparable only when they share the same model.
#[derive(Debug)]
pub struct Model {
    /// Type name used in diagnostics.
    pub name: &'static str,
    /// Root tag of a freshly created element.
    pub tag: &'static str,
    /// The fixed slot table.
    pub slots: &'static [Slot],
    /// Slot names excluded from structural comparison (transient or
    /// host-assigned data).
    pub uncomparable: &'static [&'static str],
}

impl Model {
    /// Look up the binding rule for a property name.
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.slots
            .iter()
            .find(|slot| slot.name == name)
            .map(|slot| &slot.binding)
    }

    /// Create an entity over the minimal default tree `<tag/>`.
    pub fn new_entity(&'static self) -> Entity {
        Entity {
            model: self,
            tree: TreeStore::from_node(XmlNode::new(self.tag)),
        }
    }

    /// Parse literal markup into an entity. Malformed input is fatal: no
    /// entity is produced.
    pub fn parse(&'static self, xml: &str) -> Result<Entity> {
        self.wrap(TreeStore::parse_str(xml)?)
    }

    /// Parse a markup file into an entity.
    pub fn parse_file(&'static self, path: impl AsRef<Path>) -> Result<Entity> {
        self.wrap(TreeStore::parse_file(path)?)
    }

    fn wrap(&'static self, tree: TreeStore) -> Result<Entity> {
        if tree.root().tag != self.tag {
            return Err(VirtXmlError::shape(
                format!("<{}> element", self.tag),
                format!("<{}> element", tree.root().tag),
            ));
        }
        Ok(Entity { model: self, tree })
    }

    fn is_comparable(&self, slot: &Slot) -> bool {
        !matches!(slot.binding, Binding::Forbidden)
            && !self.uncomparable.contains(&slot.name)
    }
}

/// Outcome of running the external schema validator: exit status plus its
/// combined stdout/stderr, verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed: bool,
    pub output: String,
}

/// One bound element instance.
pub struct Entity {
    model: &'static Model,
    tree: TreeStore,
}

impl Entity {
    /// Wrap an already-built subtree, re-rooting an entity of `model` on it.
    pub fn from_node(model: &'static Model, node: XmlNode) -> Result<Self> {
        if node.tag != model.tag {
            return Err(VirtXmlError::shape(
                format!("<{}> element", model.tag),
                format!("<{}> element", node.tag),
            ));
        }
        Ok(Self {
            model,
            tree: TreeStore::from_node(node),
        })
    }

    /// The element type.
    pub fn model(&self) -> &'static Model {
        self.model
    }

    /// Root tag of the backing tree.
    pub fn tag(&self) -> &str {
        &self.tree.root().tag
    }

    /// The backing tree's top node.
    pub fn root(&self) -> &XmlNode {
        self.tree.root()
    }

    /// Mutable access to the backing tree's top node.
    pub fn root_mut(&mut self) -> &mut XmlNode {
        self.tree.root_mut()
    }

    /// Consume the entity, yielding its tree. This is how a nest setter
    /// adopts another entity's tree.
    pub fn into_root(self) -> XmlNode {
        self.tree.into_root()
    }

    /// Read one bound property.
    pub fn get(&self, name: &str) -> Result<AttrValue> {
        self.binding(name)?.get(name, self)
    }

    /// Read one bound property, mapping the absent case to `None`.
    pub fn get_opt(&self, name: &str) -> Result<Option<AttrValue>> {
        match self.get(name) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Write one bound property, creating missing intermediate nodes.
    pub fn set(&mut self, name: &str, value: impl Into<AttrValue>) -> Result<()> {
        self.binding(name)?.set(name, self, value.into())
    }

    /// Delete one bound property's target. Deleting an absent target is a
    /// no-op.
    pub fn del(&mut self, name: &str) -> Result<()> {
        self.binding(name)?.delete(name, self)
    }

    /// Bulk structured set.
    ///
    /// Scalar, map and list slots assign directly. A nest slot given a
    /// [`AttrValue::Nested`] payload recurses: [`SetMode::Replace`] (or no
    /// existing child) builds a fresh sub-element from the payload alone,
    /// [`SetMode::Merge`] overlays the payload onto the existing child,
    /// leaving unspecified keys untouched. An unknown property name is
    /// fatal and names the offending key.
    pub fn setup_attrs(&mut self, attrs: &AttrMap) -> Result<()> {
        debug!(model = self.model.name, keys = attrs.len(), "Applying bulk attributes");
        for (key, value) in attrs {
            let binding = *self.binding(key)?;
            match (binding, value) {
                (Binding::Nest { model, .. }, AttrValue::Nested(mode, fields)) => {
                    let mut sub = match (mode, self.get_opt(key)?) {
                        (SetMode::Merge, Some(AttrValue::Element(existing))) => existing,
                        _ => model.new_entity(),
                    };
                    sub.setup_attrs(fields)?;
                    self.set(key, sub)?;
                }
                _ => self.set(key, value.clone())?,
            }
        }
        Ok(())
    }

    /// Bulk structured set from a JSON object, the form external parameter
    /// mappings arrive in.
    pub fn setup_from_json(&mut self, value: &serde_json::Value) -> Result<()> {
        self.setup_attrs(&crate::value::attr_map_from_json(value)?)
    }

    /// Bulk structured get: the structural inverse of
    /// [`Entity::setup_attrs`].
    ///
    /// Every comparable slot is read; absent slots are omitted rather than
    /// reported as errors; nest values flatten to nested payloads with
    /// replace semantics, so feeding the result back reproduces the state.
    pub fn fetch_attrs(&self) -> Result<AttrMap> {
        let mut out = AttrMap::new();
        for slot in self.model.slots {
            if !self.model.is_comparable(slot) {
                continue;
            }
            match self.get(slot.name) {
                Ok(AttrValue::Element(sub)) => {
                    out.insert(
                        slot.name.to_string(),
                        AttrValue::Nested(SetMode::Replace, sub.fetch_attrs()?),
                    );
                }
                Ok(value) => {
                    out.insert(slot.name.to_string(), value);
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(out)
    }

    /// Structural comparison with absence tolerance.
    ///
    /// Entities of different models are simply unequal. Per comparable
    /// slot, an absent target on both sides is equal, absent on one side
    /// only is unequal, and element-valued or element-list-valued results
    /// recurse. Only genuine defects (an unbound property, a malformed
    /// document) escape as `Err`.
    pub fn compare(&self, other: &Entity) -> Result<bool> {
        if !std::ptr::eq(self.model, other.model) {
            return Ok(false);
        }
        for slot in self.model.slots {
            if !self.model.is_comparable(slot) {
                continue;
            }
            let mine = self.get_opt(slot.name)?;
            let theirs = other.get_opt(slot.name)?;
            let equal = match (&mine, &theirs) {
                (None, None) => true,
                (Some(a), Some(b)) => value_eq(a, b)?,
                _ => false,
            };
            if !equal {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Serialize the current tree.
    pub fn to_xml(&self) -> String {
        self.tree.to_xml()
    }

    /// Materialize the current tree into the entity's owned temp file.
    pub fn write(&mut self) -> Result<&Path> {
        self.tree.write()
    }

    /// Revert all in-memory mutation back to the originally parsed content.
    pub fn restore(&mut self) -> Result<()> {
        self.tree.restore()
    }

    /// Source file path, when the entity was parsed from one.
    pub fn source(&self) -> Option<&Path> {
        self.tree.source()
    }

    /// Run an external schema validator against the serialized tree.
    ///
    /// The temp-file path is appended to `args`. The validator's verdict is
    /// data, never an error; only failure to execute the tool at all is.
    /// The tree is not mutated regardless of outcome.
    pub fn validate_with(&mut self, program: &str, args: &[&str]) -> Result<ValidationReport> {
        let path = self.tree.write()?.to_path_buf();
        debug!(program, path = %path.display(), "Running schema validator");
        let output = Command::new(program)
            .args(args)
            .arg(&path)
            .output()
            .map_err(|err| VirtXmlError::ExternalTool(format!("{program}: {err}")))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(ValidationReport {
            passed: output.status.success(),
            output: text,
        })
    }

    /// Validate against the stock libvirt schema validator.
    pub fn validate(&mut self) -> Result<ValidationReport> {
        self.validate_with(DEFAULT_VALIDATOR, &[])
    }

    fn binding(&self, name: &str) -> Result<&'static Binding> {
        self.model.binding(name).ok_or_else(|| {
            VirtXmlError::UnboundProperty(format!("{}.{}", self.model.name, name))
        })
    }
}

fn value_eq(a: &AttrValue, b: &AttrValue) -> Result<bool> {
    match (a, b) {
        (AttrValue::Element(x), AttrValue::Element(y)) => x.compare(y),
        (AttrValue::List(xs), AttrValue::List(ys)) => {
            if xs.len() != ys.len() {
                return Ok(false);
            }
            for (x, y) in xs.iter().zip(ys) {
                if !value_eq(x, y)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        _ => Ok(a == b),
    }
}

/// Deep copy: a new entity of the same type over an independent backing
/// tree. No state, and no temp file, is shared with the original.
impl Clone for Entity {
    fn clone(&self) -> Self {
        Self {
            model: self.model,
            tree: TreeStore::from_node(self.tree.root().clone()),
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other).unwrap_or(false)
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("model", &self.model.name)
            .field("root", self.tree.root())
            .finish()
    }
}
