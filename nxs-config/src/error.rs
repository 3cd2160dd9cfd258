//! Error types for nxs-config.

use thiserror::Error;

/// Result type alias for document operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading, editing, merging or writing a document.
#[derive(Error, Debug)]
pub enum Error {
    /// XML parsing error.
    #[error("XML parse error: {0}")]
    Parse(String),

    /// Node operation error (stale handle, bad position, wrong node kind).
    #[error("Node error: {0}")]
    Node(String),

    /// Arena refused a structural edit.
    #[error("Tree error: {0}")]
    Tree(#[from] indextree::NodeError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML error from quick-xml.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Merge conflict.
    #[error(transparent)]
    Incompatible(#[from] IncompatibleNodeError),
}

/// A conflict found while merging sibling subtrees.
///
/// Paths are dotted `tag[:name]` segments from the top element down to the
/// offending node. The document is left partially merged when this is
/// returned and should be reloaded by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IncompatibleNodeError {
    /// Two candidate siblings carry the same attribute with different values.
    #[error("Incompatible element attributes {path}.{attribute}: \"{first}\" vs \"{second}\"")]
    Attributes {
        path: String,
        attribute: String,
        first: String,
        second: String,
    },

    /// Two `field` siblings carry different text values.
    #[error("Incompatible element values {path}: \"{first}\" vs \"{second}\"")]
    Values {
        path: String,
        first: String,
        second: String,
    },

    /// A child tag that the parent's grammar does not permit.
    #[error("Not allowed <{child}> in {path}")]
    NotAllowed { path: String, child: String },
}

impl Error {
    /// Returns the merge conflict, if this error is one.
    pub fn as_incompatible(&self) -> Option<&IncompatibleNodeError> {
        match self {
            Error::Incompatible(e) => Some(e),
            _ => None,
        }
    }
}

impl IncompatibleNodeError {
    /// Returns the ancestor path of the node the conflict was found at.
    pub fn path(&self) -> &str {
        match self {
            IncompatibleNodeError::Attributes { path, .. }
            | IncompatibleNodeError::Values { path, .. }
            | IncompatibleNodeError::NotAllowed { path, .. } => path,
        }
    }
}
