//! Document tree representation.
//!
//! All nodes of a document live in one `indextree` arena owned by
//! [`Document`]. Nodes are addressed by [`NodeId`] handles; a node does not
//! own its parent, and the order of a node's children is the row order used
//! by every other layer. Handles to removed nodes are detected through the
//! arena's generation stamp, so a discarded subtree can never be reached
//! again through an old handle.

mod content;

pub use content::{Element, NodeData, NodeKind};
pub use indextree::NodeId;

use indextree::Arena;

use crate::error::{Error, Result};

/// A mutable XML-like document.
#[derive(Debug, Clone)]
pub struct Document {
    arena: Arena<NodeData>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document holding only the synthetic document node.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeData::new(NodeKind::Document));
        Document { arena, root }
    }

    /// Returns the synthetic document node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the first element under the document node.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.kind(id).is_some_and(NodeKind::is_element))
    }

    /// Returns true if the handle refers to a live node of this document.
    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.get(id).is_some() && !id.is_removed(&self.arena)
    }

    /// Returns true if the node is live and attached below the document node.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(id) && id.ancestors(&self.arena).any(|a| a == self.root)
    }

    /// Creates a detached element node.
    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.arena
            .new_node(NodeData::new(NodeKind::Element(Element::new(tag))))
    }

    /// Creates a detached node of any kind.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        self.arena.new_node(NodeData::new(kind))
    }

    /// Creates a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.arena.new_node(NodeData::new(NodeKind::Text(text.into())))
    }

    /// Returns the node kind, or `None` for a stale handle.
    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        if !self.contains(id) {
            return None;
        }
        self.arena.get(id).map(|node| &node.get().kind)
    }

    /// Returns a mutable reference to the node kind.
    pub fn kind_mut(&mut self, id: NodeId) -> Option<&mut NodeKind> {
        if !self.contains(id) {
            return None;
        }
        self.arena.get_mut(id).map(|node| &mut node.get_mut().kind)
    }

    /// Returns the element behind a handle, if it is a live element.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.kind(id).and_then(NodeKind::as_element)
    }

    /// Returns the element behind a handle for mutation.
    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.kind_mut(id).and_then(NodeKind::as_element_mut)
    }

    /// Tag name of an element node.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::tag)
    }

    /// Value of an attribute on an element node.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| e.attribute(name))
    }

    /// Sets an attribute on an element node.
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        let element = self
            .element_mut(id)
            .ok_or_else(|| Error::Node(format!("{:?} is not an element", id)))?;
        element.set_attribute(name, value);
        Ok(())
    }

    /// Text payload of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.kind(id).and_then(NodeKind::as_text)
    }

    /// Concatenated text of the node's direct text children.
    pub fn direct_text(&self, id: NodeId) -> String {
        self.children(id).filter_map(|c| self.text(c)).collect()
    }

    /// Parent of a node, `None` for the document node or a detached node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        if !self.contains(id) {
            return None;
        }
        id.parent(&self.arena)
    }

    /// Iterates over the children of a node in row order.
    ///
    /// A stale handle yields no children.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let live = self.contains(id).then_some(id);
        live.into_iter().flat_map(move |id| id.children(&self.arena))
    }

    /// Returns the child at the given row.
    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).nth(index)
    }

    /// Returns the number of children.
    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).count()
    }

    /// Row of a node under its parent.
    pub fn position(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).position(|c| c == id)
    }

    /// Appends a node as the last child of `parent`.
    ///
    /// The node is detached from its previous parent first.
    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check_parent(parent)?;
        self.check_live(child)?;
        parent.checked_append(child, &mut self.arena)?;
        Ok(())
    }

    /// Inserts a node at `position` among the children of `parent`.
    ///
    /// `position` equal to the child count appends.
    pub fn insert(&mut self, parent: NodeId, position: usize, child: NodeId) -> Result<()> {
        self.check_parent(parent)?;
        self.check_live(child)?;
        if child == parent || parent.ancestors(&self.arena).any(|a| a == child) {
            return Err(Error::Node(format!("cannot insert {:?} below itself", child)));
        }
        // `position` is relative to the siblings left once `child` is detached.
        let mut count = self.child_count(parent);
        if self.parent(child) == Some(parent) {
            count -= 1;
        }
        if position > count {
            return Err(Error::Node(format!(
                "insert position {} out of range 0..={}",
                position, count
            )));
        }
        child.detach(&mut self.arena);
        match self.child(parent, position) {
            Some(sibling) => sibling.checked_insert_before(child, &mut self.arena)?,
            None => parent.checked_append(child, &mut self.arena)?,
        }
        Ok(())
    }

    /// Detaches a node from its parent. The node stays in the arena and may
    /// be inserted again.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        self.check_live(id)?;
        if id == self.root {
            return Err(Error::Node("cannot detach the document node".to_string()));
        }
        id.detach(&mut self.arena);
        Ok(())
    }

    /// Removes a node and its whole subtree from the arena.
    pub fn discard(&mut self, id: NodeId) -> Result<()> {
        self.check_live(id)?;
        if id == self.root {
            return Err(Error::Node("cannot discard the document node".to_string()));
        }
        id.remove_subtree(&mut self.arena);
        Ok(())
    }

    /// Deep-copies `source_node` of another document under `parent` and
    /// returns the handle of the copy.
    pub fn import(
        &mut self,
        source: &Document,
        source_node: NodeId,
        parent: NodeId,
    ) -> Result<NodeId> {
        let kind = source
            .kind(source_node)
            .ok_or_else(|| Error::Node(format!("{:?} is not a live node", source_node)))?;
        if matches!(kind, NodeKind::Document) {
            return Err(Error::Node("cannot import a document node".to_string()));
        }
        let copy = self.create_node(kind.clone());
        self.append(parent, copy)?;

        let mut stack = vec![(source_node, copy)];
        while let Some((from, to)) = stack.pop() {
            for child in source.children(from) {
                if let Some(kind) = source.kind(child) {
                    let new_child = self.create_node(kind.clone());
                    self.append(to, new_child)?;
                    stack.push((child, new_child));
                }
            }
        }
        Ok(copy)
    }

    /// Dotted `tag[:name]` path from the document element down to `id`.
    ///
    /// Text and document nodes contribute no segment.
    pub fn ancestor_path(&self, id: NodeId) -> String {
        if !self.contains(id) {
            return String::new();
        }
        let mut segments: Vec<String> = id
            .ancestors(&self.arena)
            .filter_map(|a| self.element(a).map(Element::path_segment))
            .collect();
        segments.reverse();
        segments.join(".")
    }

    /// Number of live nodes, including detached ones.
    pub fn node_count(&self) -> usize {
        self.arena.iter().filter(|n| !n.is_removed()).count()
    }

    /// A parent must be live and must not be a text node.
    fn check_parent(&self, id: NodeId) -> Result<()> {
        match self.kind(id) {
            None => Err(Error::Node(format!("{:?} is not a live node", id))),
            Some(NodeKind::Text(_)) => Err(Error::Node(format!(
                "text node {:?} cannot have children",
                id
            ))),
            Some(_) => Ok(()),
        }
    }

    fn check_live(&self, id: NodeId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(Error::Node(format!("{:?} is not a live node", id)))
        }
    }
}
