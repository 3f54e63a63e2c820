//! Declarative element models for domain devices.
//!
//! Every module here is configuration of the binding engine, not new
//! mechanism: a slot table describing where each property lives in the
//! device's subtree, plus a few constructors for common shapes.

pub mod chardev;
pub mod controller;
pub mod disk;
pub mod graphics;
pub mod interface;
pub mod memory;
pub mod video;
