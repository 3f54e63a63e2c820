//! Error types for the XML binding layer.

use thiserror::Error;

/// Errors that can occur while binding element objects to domain XML.
#[derive(Error, Debug)]
pub enum VirtXmlError {
    /// Input markup could not be parsed; no object is produced.
    #[error("Failed to parse XML: {0}")]
    Parse(String),

    /// The target node or attribute of a bound property is currently absent.
    ///
    /// This is the recoverable "optional field" signal: bulk accessors and
    /// structural comparison catch it internally.
    #[error("Property target not found: {0}")]
    NotFound(String),

    /// Access to a property name with no binding on this element type.
    #[error("No such property: {0}")]
    UnboundProperty(String),

    /// A value of the wrong structural shape was passed to a setter,
    /// a marshal function, or a registry-checked device insertion.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    Shape {
        expected: String,
        actual: String,
    },

    /// A device tag with no entry in the catalog.
    #[error("Unknown device tag '{tag}', known tags: {known}")]
    UnknownTag {
        tag: String,
        known: String,
    },

    /// An external validator or dump command could not be executed at all.
    ///
    /// A validator reporting "invalid" is a normal [`ValidationReport`],
    /// not this error.
    ///
    /// [`ValidationReport`]: crate::entity::ValidationReport
    #[error("Failed to run external tool: {0}")]
    ExternalTool(String),

    /// Filesystem error while reading source XML or materializing a temp file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VirtXmlError {
    /// Build a [`VirtXmlError::Shape`] from expected/actual descriptions.
    pub fn shape(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        VirtXmlError::Shape {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// True for the recoverable "target currently absent" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, VirtXmlError::NotFound(_))
    }
}

/// Result type alias for binding operations.
pub type Result<T> = std::result::Result<T, VirtXmlError>;
