//! Structured values flowing through bound properties.
//!
//! [`AttrValue`] is the one currency every binding kind speaks: scalar text,
//! coerced integers and booleans, flat attribute maps, ordered lists, full
//! sub-elements, and nested bulk-update payloads. Raw parameter mappings
//! produced by external configuration tooling arrive as JSON and are
//! converted through [`AttrValue::from_json`].

use std::collections::BTreeMap;

use crate::entity::Entity;
use crate::error::{Result, VirtXmlError};

/// Bulk structured payload: property name to value.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// Policy for applying a nested bulk payload to an existing child element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetMode {
    /// Keep the existing child and overlay only the supplied keys.
    Merge,
    /// Discard the existing child and build a fresh one from the payload.
    Replace,
}

/// One value read from or written to a bound property.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Plain string content.
    Text(String),
    /// Integer content (base-10 element text).
    Int(i64),
    /// Boolean content (the `yes`/`no` convention).
    Bool(bool),
    /// Flat attribute map of one node.
    Map(BTreeMap<String, String>),
    /// Ordered sequence.
    List(Vec<AttrValue>),
    /// A full sub-element.
    Element(Entity),
    /// Nested bulk-update payload for a sub-element slot.
    Nested(SetMode, AttrMap),
}

impl AttrValue {
    /// Shape name used in mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            AttrValue::Text(_) => "string",
            AttrValue::Int(_) => "integer",
            AttrValue::Bool(_) => "boolean",
            AttrValue::Map(_) => "attribute map",
            AttrValue::List(_) => "list",
            AttrValue::Element(_) => "element",
            AttrValue::Nested(..) => "nested map",
        }
    }

    /// Build a flat attribute map value from string pairs.
    pub fn map<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        AttrValue::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a nested payload value from name/value pairs.
    pub fn nested<K>(mode: SetMode, pairs: impl IntoIterator<Item = (K, AttrValue)>) -> Self
    where
        K: Into<String>,
    {
        AttrValue::Nested(
            mode,
            pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )
    }

    /// The string content, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The integer content, if this is an integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The boolean content, if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The attribute map, if this is a map value.
    pub fn as_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            AttrValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// The items, if this is a list value.
    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// The sub-element, if this is an element value.
    pub fn as_element(&self) -> Option<&Entity> {
        match self {
            AttrValue::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Convert one JSON value into a bound value.
    ///
    /// Objects become [`AttrValue::Nested`] with [`SetMode::Merge`], the
    /// semantics external parameter mappings expect; callers wanting replace
    /// semantics say so explicitly in code.
    pub fn from_json(value: &serde_json::Value) -> Result<AttrValue> {
        use serde_json::Value;
        match value {
            Value::String(s) => Ok(AttrValue::Text(s.clone())),
            Value::Bool(b) => Ok(AttrValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(AttrValue::Int)
                .ok_or_else(|| VirtXmlError::shape("base-10 integer", n.to_string())),
            Value::Array(items) => Ok(AttrValue::List(
                items.iter().map(AttrValue::from_json).collect::<Result<_>>()?,
            )),
            Value::Object(fields) => Ok(AttrValue::Nested(
                SetMode::Merge,
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), AttrValue::from_json(v)?)))
                    .collect::<Result<_>>()?,
            )),
            Value::Null => Err(VirtXmlError::shape("non-null value", "null")),
        }
    }
}

/// Convert a whole JSON object into a bulk payload.
pub fn attr_map_from_json(value: &serde_json::Value) -> Result<AttrMap> {
    match AttrValue::from_json(value)? {
        AttrValue::Nested(_, map) => Ok(map),
        other => Err(VirtXmlError::shape("JSON object", other.kind())),
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        AttrValue::Int(i)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

impl From<BTreeMap<String, String>> for AttrValue {
    fn from(m: BTreeMap<String, String>) -> Self {
        AttrValue::Map(m)
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(items: Vec<AttrValue>) -> Self {
        AttrValue::List(items)
    }
}

impl From<Entity> for AttrValue {
    fn from(e: Entity) -> Self {
        AttrValue::Element(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_scalars() {
        assert_eq!(
            AttrValue::from_json(&json!("dimm")).unwrap(),
            AttrValue::Text("dimm".into())
        );
        assert_eq!(
            AttrValue::from_json(&json!(524288)).unwrap(),
            AttrValue::Int(524288)
        );
        assert_eq!(
            AttrValue::from_json(&json!(true)).unwrap(),
            AttrValue::Bool(true)
        );
    }

    #[test]
    fn test_json_objects_merge_by_default() {
        let value = AttrValue::from_json(&json!({"size": 1024, "unit": "KiB"})).unwrap();
        match value {
            AttrValue::Nested(SetMode::Merge, fields) => {
                assert_eq!(fields["size"], AttrValue::Int(1024));
                assert_eq!(fields["unit"], AttrValue::Text("KiB".into()));
            }
            other => panic!("expected nested payload, got {:?}", other),
        }
    }

    #[test]
    fn test_json_arrays_keep_order() {
        let value = AttrValue::from_json(&json!(["hd", "cdrom", "network"])).unwrap();
        let items = value.as_list().unwrap();
        assert_eq!(items[0], AttrValue::Text("hd".into()));
        assert_eq!(items[2], AttrValue::Text("network".into()));
    }

    #[test]
    fn test_json_rejects_floats_and_nulls() {
        assert!(AttrValue::from_json(&json!(1.5)).is_err());
        assert!(AttrValue::from_json(&json!(null)).is_err());
        assert!(attr_map_from_json(&json!([1, 2])).is_err());
    }
}
