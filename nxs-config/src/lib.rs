//! nxs-config - NeXus instrument configuration documents
//!
//! This library holds the document core of a NeXus component designer:
//! an editable XML-like tree, a row/column model over it for tree views,
//! and a structural merger that consolidates duplicate definitions.
//!
//! # Overview
//!
//! - [`node`]: the [`Document`] arena of element and text nodes.
//! - [`model`]: the [`TreeModel`] facade addressing nodes by
//!   `(row, column, parent)` through a lazily populated wrapper cache.
//! - [`merge`]: the [`Merger`], folding same-named sibling subtrees under
//!   the `singles` and `allowed_children` rules of [`MergeRules`].
//! - [`xml`]: reading and writing documents as XML.
//!
//! # Example Use Case
//!
//! Two component files both declare `<group name="entry">` with a
//! `<field name="distance">` below it. After importing both into one
//! document, [`Merger::merge`] leaves a single group holding a single
//! field, or reports an [`IncompatibleNodeError`] if the two fields carry
//! different values.

pub mod constants;
pub mod error;
pub mod merge;
pub mod model;
pub mod node;
pub mod xml;

// Re-export commonly used types
pub use constants::*;
pub use error::{Error, IncompatibleNodeError, Result};
pub use merge::{MergeRules, MergeStats, Merger};
pub use model::{ItemFlags, ItemId, ItemTable, ModelEvent, ModelIndex, TreeItem, TreeModel};
pub use node::{Document, Element, NodeData, NodeId, NodeKind};
pub use xml::{
    parse_file, parse_str, print_to_string, print_to_string_pretty, XmlParser, XmlPrinter,
    XmlPrinterOptions,
};
