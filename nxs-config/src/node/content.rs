//! Content stored in each arena slot.
//!
//! A node is either the synthetic document node, an element (tag with ordered
//! attributes) or a run of text.

use indexmap::IndexMap;

use crate::constants::{DOCUMENT_NODE_NAME, NAME_ATTRIBUTE, TEXT_NODE_NAME, TYPE_ATTRIBUTE};

/// What goes in each arena slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub kind: NodeKind,
}

impl NodeData {
    pub fn new(kind: NodeKind) -> Self {
        NodeData { kind }
    }
}

/// Node types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Invisible top node; owns the document element.
    Document,
    /// Element with tag and attributes.
    Element(Element),
    /// Text content.
    Text(String),
}

impl NodeKind {
    /// Returns true if this is an element node.
    pub fn is_element(&self) -> bool {
        matches!(self, NodeKind::Element(_))
    }

    /// Returns true if this is a text node.
    pub fn is_text(&self) -> bool {
        matches!(self, NodeKind::Text(_))
    }

    /// Returns a reference to the element, if this is an element node.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Returns a mutable reference to the element, if this is an element node.
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            NodeKind::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the text, if this is a text node.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Tag name for elements, `#text` or `#document` otherwise.
    pub fn node_name(&self) -> &str {
        match self {
            NodeKind::Document => DOCUMENT_NODE_NAME,
            NodeKind::Element(e) => e.tag(),
            NodeKind::Text(_) => TEXT_NODE_NAME,
        }
    }
}

/// An element with a tag name and attributes kept in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: IndexMap<String, String>,
}

impl Element {
    /// Creates an element without attributes.
    pub fn new(tag: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            attributes: IndexMap::new(),
        }
    }

    /// Creates an element with the given attributes.
    pub fn with_attributes(tag: impl Into<String>, attributes: IndexMap<String, String>) -> Self {
        Element {
            tag: tag.into(),
            attributes,
        }
    }

    /// Returns the tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the attributes in insertion order.
    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    /// Returns a mutable reference to the attributes.
    pub fn attributes_mut(&mut self) -> &mut IndexMap<String, String> {
        &mut self.attributes
    }

    /// Returns the value of an attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Sets an attribute, keeping its position if it already exists.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Removes an attribute, preserving the order of the remaining ones.
    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.shift_remove(name)
    }

    /// The `name` attribute, or the empty string when absent.
    pub fn name(&self) -> &str {
        self.attribute(NAME_ATTRIBUTE).unwrap_or("")
    }

    /// The `type` attribute, if present.
    pub fn type_name(&self) -> Option<&str> {
        self.attribute(TYPE_ATTRIBUTE)
    }

    /// Path segment used in conflict messages: `tag` or `tag:name`.
    pub fn path_segment(&self) -> String {
        match self.attribute(NAME_ATTRIBUTE) {
            Some(name) => format!("{}:{}", self.tag, name),
            None => self.tag.clone(),
        }
    }

    /// Attributes rendered as space-separated `name="value"` pairs.
    pub fn attribute_string(&self) -> String {
        self.attributes
            .iter()
            .map(|(name, value)| format!("{}=\"{}\"", name, value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.attributes.is_empty() {
            write!(f, "{}", self.tag)
        } else {
            write!(f, "{} {{{}}}", self.tag, self.attribute_string())
        }
    }
}
