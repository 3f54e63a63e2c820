//! # virtxml
//!
//! Declarative, bidirectional binding between libvirt-style domain XML and
//! typed element objects.
//!
//! The engine maps between an in-memory XML tree (tags, attributes, text,
//! ordered children) and element objects whose properties are declared as
//! binding rules. The per-device modules are pure configuration of that
//! engine: a slot table each, no new mechanism.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 Entity + Model               │
//! │  (get/set/del, equality, bulk setup/fetch)   │
//! └───────────────────────┬──────────────────────┘
//!                         │ slot table
//!         ┌───────────────┴───────────────┐
//!         ▼                               ▼
//! ┌───────────────────┐         ┌───────────────────┐
//! │     Binding       │         │     Registry      │
//! │ (5 descriptor     │         │ (tag -> element   │
//! │  kinds + marshal) │         │  model catalog)   │
//! └─────────┬─────────┘         └───────────────────┘
//!           ▼
//! ┌───────────────────┐
//! │    TreeStore      │
//! │ (parse/serialize/ │
//! │  temp-file interop)│
//! └───────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use virtxml::{domain, devices::disk, DeviceList};
//!
//! let mut vm = domain::new("my-vm").unwrap();
//! vm.set("memory", 2097152i64).unwrap();
//!
//! let mut devices = DeviceList::new();
//! devices.push(disk::file_disk("/var/lib/vms/my-vm.qcow2", "vda").unwrap()).unwrap();
//! domain::set_devices(&mut vm, devices).unwrap();
//!
//! let xml = vm.to_xml();
//! assert!(xml.contains("<name>my-vm</name>"));
//! ```

pub mod binding;
pub mod devices;
pub mod domain;
pub mod entity;
pub mod error;
pub mod registry;
pub mod tree;
pub mod value;

pub use binding::{AttrListMarshal, Binding, EntityListMarshal, FlagListMarshal, Marshal, TextCoerce};
pub use entity::{Entity, Model, Slot, ValidationReport, DEFAULT_VALIDATOR};
pub use error::{Result, VirtXmlError};
pub use registry::{resolve, known_tags, DeviceList, DEVICE_CATALOG};
pub use tree::{TreeStore, XmlNode};
pub use value::{attr_map_from_json, AttrMap, AttrValue, SetMode};
