//! Backing tree store for parsed domain XML.
//!
//! One [`TreeStore`] owns one parsed document: the root [`XmlNode`], the
//! originally parsed text (so edits can be rolled back), and at most one
//! temp-file materialization handed to external tools. Element objects wrap
//! exactly one store each; stores are never shared.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, VirtXmlError};

/// One node of the backing tree: a tag, an attribute set, optional text
/// content, and ordered children.
///
/// Attributes keep document order for faithful re-serialization, but order
/// is irrelevant for equality.
#[derive(Debug, Clone)]
pub struct XmlNode {
    /// Tag name.
    pub tag: String,
    /// Attribute name/value pairs in document order.
    pub attributes: Vec<(String, String)>,
    /// Text content, if any.
    pub text: Option<String>,
    /// Child nodes in document order.
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Create an empty node with the given tag.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Get an attribute value.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing any existing value.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Remove an attribute. Removing an absent attribute is a no-op.
    pub fn remove_attr(&mut self, name: &str) {
        self.attributes.retain(|(k, _)| k != name);
    }

    /// The attribute set as a flat map.
    pub fn attr_map(&self) -> BTreeMap<String, String> {
        self.attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replace the entire attribute set. Keys not present in `attrs` are
    /// dropped, never merged.
    pub fn replace_attrs(&mut self, attrs: &BTreeMap<String, String>) {
        self.attributes = attrs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
    }

    /// Append a child node.
    pub fn push_child(&mut self, child: XmlNode) {
        self.children.push(child);
    }

    /// Find the first node at a slash-separated path below this node.
    /// `"."` (or the empty path) names this node itself; at every level the
    /// first matching child wins.
    pub fn find(&self, path: &str) -> Option<&XmlNode> {
        let mut node = self;
        for seg in split_path(path) {
            node = node.children.iter().find(|c| c.tag == seg)?;
        }
        Some(node)
    }

    /// Mutable variant of [`XmlNode::find`].
    pub fn find_mut(&mut self, path: &str) -> Option<&mut XmlNode> {
        let mut node = self;
        for seg in split_path(path) {
            node = node.children.iter_mut().find(|c| c.tag == seg)?;
        }
        Some(node)
    }

    /// All nodes matching a path, in document order.
    pub fn find_all(&self, path: &str) -> Vec<&XmlNode> {
        fn walk<'a>(node: &'a XmlNode, segs: &[&str], out: &mut Vec<&'a XmlNode>) {
            match segs.split_first() {
                None => out.push(node),
                Some((first, rest)) => {
                    for child in node.children.iter().filter(|c| c.tag == *first) {
                        walk(child, rest, out);
                    }
                }
            }
        }
        let segs: Vec<&str> = split_path(path).collect();
        let mut out = Vec::new();
        walk(self, &segs, &mut out);
        out
    }

    /// Walk a path, creating every missing intermediate node, and return
    /// the final node.
    pub fn create_along(&mut self, path: &str) -> &mut XmlNode {
        let mut node = self;
        for seg in split_path(path) {
            let idx = match node.children.iter().position(|c| c.tag == seg) {
                Some(idx) => idx,
                None => {
                    node.children.push(XmlNode::new(seg));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[idx];
        }
        node
    }

    /// Detach the first node at `path` from its parent and return it.
    /// Returns `None` when the path does not resolve (including `"."`,
    /// since the root cannot be detached from itself).
    pub fn remove(&mut self, path: &str) -> Option<XmlNode> {
        let segs: Vec<&str> = split_path(path).collect();
        let (last, parents) = segs.split_last()?;
        let parent = if parents.is_empty() {
            self
        } else {
            self.find_mut(&parents.join("/"))?
        };
        let idx = parent.children.iter().position(|c| c.tag == *last)?;
        Some(parent.children.remove(idx))
    }
}

// Attribute order is a serialization detail, not document content.
impl PartialEq for XmlNode {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.text == other.text
            && self.attr_map() == other.attr_map()
            && self.children == other.children
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|seg| !seg.is_empty() && *seg != ".")
}

/// The backing tree an element object wraps: one root node plus provenance
/// and the optional temp-file materialization.
#[derive(Debug)]
pub struct TreeStore {
    root: XmlNode,
    /// Serialized form at parse time, used by [`TreeStore::restore`].
    original: String,
    /// Source file, when the tree was parsed from one.
    source: Option<PathBuf>,
    /// Owned temp file for external-tool consumption.
    scratch: Option<NamedTempFile>,
}

impl TreeStore {
    /// Parse literal markup text into a store.
    pub fn parse_str(xml: &str) -> Result<Self> {
        let root = parse_node(xml)?;
        Ok(Self {
            root,
            original: xml.to_string(),
            source: None,
            scratch: None,
        })
    }

    /// Parse a markup file into a store, keeping the path as provenance.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path)?;
        let root = parse_node(&xml)?;
        debug!(path = %path.display(), "Parsed XML file");
        Ok(Self {
            root,
            original: xml,
            source: Some(path.to_path_buf()),
            scratch: None,
        })
    }

    /// Wrap an already-built tree.
    pub fn from_node(root: XmlNode) -> Self {
        let original = serialize_node(&root);
        Self {
            root,
            original,
            source: None,
            scratch: None,
        }
    }

    /// The top node.
    pub fn root(&self) -> &XmlNode {
        &self.root
    }

    /// Mutable access to the top node.
    pub fn root_mut(&mut self) -> &mut XmlNode {
        &mut self.root
    }

    /// Consume the store, yielding the tree.
    pub fn into_root(self) -> XmlNode {
        self.root
    }

    /// Source file path, when parsed from one.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Serialize the current tree.
    pub fn to_xml(&self) -> String {
        serialize_node(&self.root)
    }

    /// Materialize the current tree into the owned temp file and return its
    /// path. Repeated calls rewrite the same file; the file is removed when
    /// the store is dropped.
    pub fn write(&mut self) -> Result<&Path> {
        let xml = serialize_node(&self.root);
        if self.scratch.is_none() {
            let file = tempfile::Builder::new()
                .prefix("virtxml-")
                .suffix(".xml")
                .tempfile()?;
            self.scratch = Some(file);
        }
        let scratch = self.scratch.as_mut().unwrap();
        let file = scratch.as_file_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(xml.as_bytes())?;
        file.flush()?;
        debug!(path = %scratch.path().display(), bytes = xml.len(), "Materialized XML");
        Ok(scratch.path())
    }

    /// Revert all in-memory mutation back to the originally parsed content.
    /// The temp file, if any, is left as last written.
    pub fn restore(&mut self) -> Result<()> {
        self.root = parse_node(&self.original)?;
        Ok(())
    }
}

/// Parse markup text into a node tree. Malformed input is fatal: no tree is
/// returned.
pub fn parse_node(xml: &str) -> Result<XmlNode> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                stack.push(node_from_start(&start)?);
            }
            Ok(Event::Empty(start)) => {
                let node = node_from_start(&start)?;
                attach(&mut stack, &mut root, node)?;
            }
            Ok(Event::End(_)) => {
                let node = stack.pop().ok_or_else(|| {
                    VirtXmlError::Parse("closing tag without matching opening tag".to_string())
                })?;
                attach(&mut stack, &mut root, node)?;
            }
            Ok(Event::Text(text)) => {
                let text = text
                    .unescape()
                    .map_err(|e| VirtXmlError::Parse(e.to_string()))?;
                append_text(&mut stack, &text);
            }
            Ok(Event::CData(data)) => {
                let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                append_text(&mut stack, &text);
            }
            // Declarations, comments, PIs and doctypes carry no bound data.
            Ok(Event::Decl(_)) | Ok(Event::Comment(_)) | Ok(Event::PI(_))
            | Ok(Event::DocType(_)) => {}
            Ok(Event::Eof) => break,
            Err(e) => return Err(VirtXmlError::Parse(e.to_string())),
        }
    }

    if !stack.is_empty() {
        return Err(VirtXmlError::Parse(format!(
            "unclosed element <{}>",
            stack[stack.len() - 1].tag
        )));
    }
    root.ok_or_else(|| VirtXmlError::Parse("document contains no element".to_string()))
}

fn node_from_start(start: &BytesStart<'_>) -> Result<XmlNode> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut node = XmlNode::new(tag);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| VirtXmlError::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| VirtXmlError::Parse(e.to_string()))?
            .into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

fn attach(stack: &mut Vec<XmlNode>, root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(node);
            Ok(())
        }
        None => Err(VirtXmlError::Parse(
            "multiple top-level elements".to_string(),
        )),
    }
}

fn append_text(stack: &mut [XmlNode], text: &str) {
    if let Some(parent) = stack.last_mut() {
        match parent.text.as_mut() {
            Some(existing) => existing.push_str(text),
            None => parent.text = Some(text.to_string()),
        }
    }
}

/// Serialize a node tree with two-space indentation, the layout libvirt
/// tooling emits.
pub fn serialize_node(node: &XmlNode) -> String {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    // Writing into a Vec cannot fail.
    let _ = write_node(&mut writer, node);
    let mut out = String::from_utf8_lossy(&writer.into_inner()).into_owned();
    out.push('\n');
    out
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> quick_xml::Result<()> {
    let mut start = BytesStart::new(node.tag.as_str());
    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.text.is_none() && node.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(text) = &node.text {
        writer.write_event(Event::Text(BytesText::new(text)))?;
    }
    for child in &node.children {
        write_node(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(node.tag.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<domain type='kvm'>
  <name>test-vm</name>
  <memory unit='KiB'>2097152</memory>
  <devices>
    <disk type='file'><target dev='vda' bus='virtio'/></disk>
    <disk type='file'><target dev='vdb' bus='virtio'/></disk>
    <interface type='bridge'><source bridge='virbr0'/></interface>
  </devices>
</domain>"#;

    #[test]
    fn test_parse_basic_document() {
        let store = TreeStore::parse_str(SAMPLE).unwrap();
        let root = store.root();
        assert_eq!(root.tag, "domain");
        assert_eq!(root.attr("type"), Some("kvm"));
        assert_eq!(
            root.find("name").and_then(|n| n.text.as_deref()),
            Some("test-vm")
        );
        assert_eq!(
            root.find("devices/disk/target").and_then(|n| n.attr("dev")),
            Some("vda")
        );
    }

    #[test]
    fn test_parse_malformed_is_fatal() {
        assert!(matches!(
            TreeStore::parse_str("<domain><name>oops</domain>"),
            Err(VirtXmlError::Parse(_))
        ));
        assert!(matches!(
            TreeStore::parse_str("not xml at all"),
            Err(VirtXmlError::Parse(_))
        ));
        assert!(matches!(
            TreeStore::parse_str("<a/><b/>"),
            Err(VirtXmlError::Parse(_))
        ));
    }

    #[test]
    fn test_find_all_preserves_document_order() {
        let store = TreeStore::parse_str(SAMPLE).unwrap();
        let disks = store.root().find_all("devices/disk");
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].find("target").unwrap().attr("dev"), Some("vda"));
        assert_eq!(disks[1].find("target").unwrap().attr("dev"), Some("vdb"));
    }

    #[test]
    fn test_create_along_builds_missing_chain() {
        let mut node = XmlNode::new("domain");
        node.create_along("devices/graphics/listen")
            .set_attr("type", "address");
        assert_eq!(
            node.find("devices/graphics/listen").unwrap().attr("type"),
            Some("address")
        );
        // A second walk reuses the chain instead of duplicating it.
        node.create_along("devices/graphics");
        assert_eq!(node.find_all("devices/graphics").len(), 1);
    }

    #[test]
    fn test_remove_detaches_first_match() {
        let mut store = TreeStore::parse_str(SAMPLE).unwrap();
        let removed = store.root_mut().remove("devices/disk").unwrap();
        assert_eq!(removed.find("target").unwrap().attr("dev"), Some("vda"));
        assert_eq!(store.root().find_all("devices/disk").len(), 1);
        // Removing a path that no longer resolves is a no-op.
        assert!(store.root_mut().remove("devices/watchdog").is_none());
    }

    #[test]
    fn test_attribute_order_is_irrelevant_for_equality() {
        let a = parse_node("<disk type='file' device='disk'/>").unwrap();
        let b = parse_node("<disk device='disk' type='file'/>").unwrap();
        let c = parse_node("<disk device='cdrom' type='file'/>").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let store = TreeStore::parse_str(SAMPLE).unwrap();
        let xml = store.to_xml();
        let reparsed = parse_node(&xml).unwrap();
        assert_eq!(store.root(), &reparsed);
        assert!(xml.contains("<name>test-vm</name>"));
        assert!(xml.contains("<target dev=\"vda\" bus=\"virtio\"/>"));
    }

    #[test]
    fn test_escaped_content_roundtrips() {
        let node = parse_node("<name>a &amp; b &lt;c&gt;</name>").unwrap();
        assert_eq!(node.text.as_deref(), Some("a & b <c>"));
        let xml = serialize_node(&node);
        let again = parse_node(&xml).unwrap();
        assert_eq!(node, again);
    }

    #[test]
    fn test_restore_reverts_edits() {
        let mut store = TreeStore::parse_str(SAMPLE).unwrap();
        store.root_mut().set_attr("type", "qemu");
        store.root_mut().remove("devices");
        assert!(store.root().find("devices").is_none());

        store.restore().unwrap();
        assert_eq!(store.root().attr("type"), Some("kvm"));
        assert!(store.root().find("devices").is_some());
    }

    #[test]
    fn test_write_materializes_temp_file() {
        let mut store = TreeStore::parse_str("<domain><name>vm</name></domain>").unwrap();
        let path = store.write().unwrap().to_path_buf();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("<name>vm</name>"));

        // A later write after mutation rewrites the same file.
        store.root_mut().find_mut("name").unwrap().text = Some("renamed".to_string());
        let path2 = store.write().unwrap().to_path_buf();
        assert_eq!(path, path2);
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("renamed"));
        assert!(!contents.contains("<name>vm</name>"));
    }

    #[test]
    fn test_temp_file_removed_on_drop() {
        let path = {
            let mut store = TreeStore::parse_str("<domain/>").unwrap();
            store.write().unwrap().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_parse_file_keeps_provenance() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"<domain><name>fromfile</name></domain>").unwrap();
        tmp.flush().unwrap();

        let store = TreeStore::parse_file(tmp.path()).unwrap();
        assert_eq!(store.source(), Some(tmp.path()));
        assert_eq!(
            store.root().find("name").and_then(|n| n.text.as_deref()),
            Some("fromfile")
        );
    }
}
