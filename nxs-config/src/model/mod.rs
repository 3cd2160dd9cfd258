//! Row/column addressing over a document.
//!
//! [`TreeModel`] presents a [`Document`] as rows of three columns (name,
//! type or attributes, value). Rows are backed by lazily materialized
//! wrappers kept in an [`ItemTable`]; structural edits go through
//! [`TreeModel::insert_item`], [`TreeModel::remove_item`] and
//! [`TreeModel::append_item`], which edit the document and the wrapper cache
//! together and notify subscribers.
//!
//! Bounds violations are never errors: they yield an invalid [`ModelIndex`],
//! an empty string or `false`.

mod item;

pub use item::{ItemId, ItemTable, TreeItem};

use bitflags::bitflags;
use tracing::{debug, warn};

use crate::constants::{
    ATTRIBUTE_COLUMN, COLUMN_COUNT, NAME_ATTRIBUTE, NAME_COLUMN, VALUE_COLUMN,
};
use crate::error::Result;
use crate::merge::{MergeStats, Merger};
use crate::node::{Document, NodeId, NodeKind};

bitflags! {
    /// Interaction flags of a model cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ItemFlags: u8 {
        /// No interaction.
        const NONE = 0;
        /// The cell can be selected.
        const SELECTABLE = 1;
        /// The cell is enabled.
        const ENABLED = 2;
    }
}

/// Address of one cell: a row under a parent, a column, and the wrapper
/// backing the row.
///
/// All three columns of a row share the same wrapper. The default value is
/// the invalid index, which stands for the (never displayed) root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ModelIndex {
    row: usize,
    column: usize,
    item: Option<ItemId>,
}

impl ModelIndex {
    /// The invalid index.
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Returns true if the index addresses a row.
    pub fn is_valid(&self) -> bool {
        self.item.is_some()
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// The wrapper backing the row.
    pub fn item(&self) -> Option<ItemId> {
        self.item
    }

    /// The cell of the same row at another column, without bounds checks.
    pub fn at_column(&self, column: usize) -> ModelIndex {
        ModelIndex { column, ..*self }
    }
}

/// Change notification sent to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// Rows `first..=last` were inserted under `parent`.
    RowsInserted {
        parent: ModelIndex,
        first: usize,
        last: usize,
    },
    /// Rows `first..=last` were removed from under `parent`.
    RowsRemoved {
        parent: ModelIndex,
        first: usize,
        last: usize,
    },
    /// Cell contents in the rectangle changed.
    DataChanged {
        top_left: ModelIndex,
        bottom_right: ModelIndex,
    },
    /// Header sections `first..=last` changed.
    HeaderChanged { first: usize, last: usize },
    /// Every index is stale.
    Reset,
}

type Observer = Box<dyn FnMut(&ModelEvent)>;

/// Addressable facade over a document.
pub struct TreeModel {
    document: Document,
    items: ItemTable,
    attribute_view: bool,
    observers: Vec<Observer>,
}

impl std::fmt::Debug for TreeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeModel")
            .field("document", &self.document)
            .field("items", &self.items)
            .field("attribute_view", &self.attribute_view)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl TreeModel {
    /// Creates a model over `document`; no row wrapper is built yet.
    pub fn new(document: Document) -> Self {
        let items = ItemTable::new(document.root());
        TreeModel {
            document,
            items,
            attribute_view: false,
            observers: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access to the document.
    ///
    /// Creating detached nodes or editing attributes and text is safe.
    /// Structural edits made here bypass the wrapper cache and must be
    /// followed by [`TreeModel::reset`].
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// The wrapper table.
    pub fn items(&self) -> &ItemTable {
        &self.items
    }

    pub fn attribute_view(&self) -> bool {
        self.attribute_view
    }

    /// Switches column 1 between the `type` attribute and all attributes.
    pub fn set_attribute_view(&mut self, enabled: bool) {
        if self.attribute_view == enabled {
            return;
        }
        self.attribute_view = enabled;
        self.emit(ModelEvent::HeaderChanged {
            first: ATTRIBUTE_COLUMN,
            last: ATTRIBUTE_COLUMN,
        });
    }

    /// Registers a change observer.
    pub fn subscribe(&mut self, observer: impl FnMut(&ModelEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Drops every wrapper and notifies subscribers that all indices are
    /// stale.
    pub fn reset(&mut self) {
        self.items.clear();
        self.emit(ModelEvent::Reset);
    }

    /// Index of the cell at `row`/`column` under `parent`.
    ///
    /// Invalid if `column` is not one of the three columns, if `parent` does
    /// not address a row, or if `row` is past the parent's children.
    pub fn index(&mut self, row: usize, column: usize, parent: ModelIndex) -> ModelIndex {
        if column >= COLUMN_COUNT || parent.column >= COLUMN_COUNT {
            return ModelIndex::invalid();
        }
        let Some(parent_item) = self.item_for(parent) else {
            return ModelIndex::invalid();
        };
        match self.items.child(&self.document, parent_item, row) {
            Some(item) => ModelIndex {
                row,
                column,
                item: Some(item),
            },
            None => ModelIndex::invalid(),
        }
    }

    /// Index of the parent row, at column 0.
    ///
    /// Invalid for top-level rows (their parent is the root), for invalid
    /// indices and for indices outside the three columns.
    pub fn parent(&self, child: ModelIndex) -> ModelIndex {
        if child.column >= COLUMN_COUNT {
            return ModelIndex::invalid();
        }
        let Some(parent_item) = child
            .item
            .and_then(|item| self.items.get(item))
            .and_then(TreeItem::parent)
        else {
            return ModelIndex::invalid();
        };
        if parent_item == self.items.root() {
            return ModelIndex::invalid();
        }
        ModelIndex {
            row: self.items.child_number(parent_item),
            column: 0,
            item: Some(parent_item),
        }
    }

    /// Number of children of the node behind `parent`.
    ///
    /// An index past the last column reports 1 row. Callers rely on that
    /// value even though such an index addresses nothing.
    pub fn row_count(&self, parent: ModelIndex) -> usize {
        if parent.column >= COLUMN_COUNT {
            return 1;
        }
        self.node(parent)
            .map(|node| self.document.child_count(node))
            .unwrap_or(0)
    }

    pub fn column_count(&self, _parent: ModelIndex) -> usize {
        COLUMN_COUNT
    }

    pub fn has_children(&self, parent: ModelIndex) -> bool {
        parent.column < COLUMN_COUNT && self.row_count(parent) > 0
    }

    /// The node behind an index; the document node for the invalid index.
    pub fn node(&self, index: ModelIndex) -> Option<NodeId> {
        self.item_for(index)
            .and_then(|item| self.items.get(item))
            .map(TreeItem::node)
    }

    /// Re-derives the column-0 index of an attached node.
    ///
    /// Returns the invalid index for the document node and for nodes that
    /// are not attached to the document.
    pub fn index_of_node(&mut self, node: NodeId) -> ModelIndex {
        if !self.document.is_attached(node) {
            return ModelIndex::invalid();
        }
        let mut rows = Vec::new();
        let mut current = node;
        while let Some(parent) = self.document.parent(current) {
            match self.document.position(current) {
                Some(row) => rows.push(row),
                None => return ModelIndex::invalid(),
            }
            current = parent;
        }

        let mut index = ModelIndex::invalid();
        for row in rows.into_iter().rev() {
            index = self.index(row, NAME_COLUMN, index);
            if !index.is_valid() {
                break;
            }
        }
        index
    }

    /// Display text of a cell.
    ///
    /// Column 0 shows `tag: name` (or just the tag), column 1 the `type`
    /// attribute or, in attribute view, every attribute as `name="value"`,
    /// and column 2 the text of text rows with newlines flattened.
    pub fn data(&self, index: ModelIndex) -> String {
        if !index.is_valid() || index.column >= COLUMN_COUNT {
            return String::new();
        }
        let Some(kind) = self.node(index).and_then(|n| self.document.kind(n)) else {
            return String::new();
        };

        match (kind, index.column) {
            (NodeKind::Element(element), NAME_COLUMN) => {
                match element.attribute(NAME_ATTRIBUTE) {
                    Some(name) => format!("{}: {}", element.tag(), name),
                    None => element.tag().to_string(),
                }
            }
            (NodeKind::Element(element), ATTRIBUTE_COLUMN) => {
                if self.attribute_view {
                    element.attribute_string()
                } else {
                    element.type_name().unwrap_or_default().to_string()
                }
            }
            (NodeKind::Text(text), VALUE_COLUMN) => text.replace('\n', " "),
            (other, NAME_COLUMN) => other.node_name().to_string(),
            _ => String::new(),
        }
    }

    /// Header title of a column.
    pub fn header_data(&self, section: usize) -> Option<&'static str> {
        match section {
            NAME_COLUMN => Some("Name"),
            ATTRIBUTE_COLUMN if self.attribute_view => Some("Attributes"),
            ATTRIBUTE_COLUMN => Some("Type"),
            VALUE_COLUMN => Some("Value"),
            _ => None,
        }
    }

    pub fn flags(&self, index: ModelIndex) -> ItemFlags {
        if index.is_valid() && index.column < COLUMN_COUNT && self.node(index).is_some() {
            ItemFlags::ENABLED | ItemFlags::SELECTABLE
        } else {
            ItemFlags::NONE
        }
    }

    /// Inserts a detached node as row `position` under `parent`.
    ///
    /// Returns false without touching the document if `parent` does not
    /// address a row or the root, if `position` is out of range, or if the
    /// node is attached elsewhere. Returns false after the document edit if
    /// the wrapper cache refuses the rows; the caller then undoes the
    /// insertion.
    pub fn insert_item(&mut self, position: usize, node: NodeId, parent: ModelIndex) -> bool {
        let Some((parent_item, parent_node)) = self.target(parent) else {
            warn!(position, "insert rejected: invalid parent index");
            return false;
        };
        if self.document.parent(node).is_some() {
            warn!(position, "insert rejected: node is still attached");
            return false;
        }
        if let Err(e) = self.document.insert(parent_node, position, node) {
            warn!(position, error = %e, "insert rejected");
            return false;
        }
        if !self
            .items
            .insert_children(&self.document, parent_item, position, 1)
        {
            warn!(position, "wrapper cache refused inserted row");
            return false;
        }

        debug!(position, "row inserted");
        self.emit(ModelEvent::RowsInserted {
            parent,
            first: position,
            last: position,
        });
        true
    }

    /// Appends a detached node as the last row under `parent`.
    pub fn append_item(&mut self, node: NodeId, parent: ModelIndex) -> bool {
        let Some((_, parent_node)) = self.target(parent) else {
            warn!("append rejected: invalid parent index");
            return false;
        };
        let position = self.document.child_count(parent_node);
        self.insert_item(position, node, parent)
    }

    /// Removes row `position` under `parent`.
    pub fn remove_item(&mut self, position: usize, parent: ModelIndex) -> bool {
        self.take_item(position, parent).is_some()
    }

    /// Removes row `position` under `parent` and returns its node.
    ///
    /// The node is detached, not destroyed, so an undo step can insert it
    /// again. Wrappers of the removed subtree are released.
    pub fn take_item(&mut self, position: usize, parent: ModelIndex) -> Option<NodeId> {
        let Some((parent_item, parent_node)) = self.target(parent) else {
            warn!(position, "remove rejected: invalid parent index");
            return None;
        };
        let node = self.document.child(parent_node, position)?;
        if !self
            .items
            .remove_children(&self.document, parent_item, position, 1)
        {
            warn!(position, "wrapper cache refused row removal");
            return None;
        }
        if let Err(e) = self.document.detach(node) {
            warn!(position, error = %e, "detach failed, resetting model");
            self.reset();
            return None;
        }

        debug!(position, "row removed");
        self.emit(ModelEvent::RowsRemoved {
            parent,
            first: position,
            last: position,
        });
        Some(node)
    }

    /// Announces that cells in the rectangle changed value.
    pub fn emit_data_changed(&mut self, top_left: ModelIndex, bottom_right: ModelIndex) {
        self.emit(ModelEvent::DataChanged {
            top_left,
            bottom_right,
        });
    }

    /// Consolidates duplicate siblings of the owned document.
    ///
    /// The wrapper cache is rebuilt afterwards, also on error, since a failed
    /// merge may leave the document partially merged.
    pub fn merge(&mut self, merger: &Merger) -> Result<MergeStats> {
        let result = merger.merge(&mut self.document);
        self.reset();
        result
    }

    fn item_for(&self, index: ModelIndex) -> Option<ItemId> {
        match index.item {
            Some(item) => self.items.contains(item).then_some(item),
            None => Some(self.items.root()),
        }
    }

    fn target(&self, parent: ModelIndex) -> Option<(ItemId, NodeId)> {
        if parent.column >= COLUMN_COUNT {
            return None;
        }
        let item = self.item_for(parent)?;
        let node = self.items.get(item)?.node();
        // Text rows hold a value, never children.
        if self.document.text(node).is_some() {
            return None;
        }
        Some((item, node))
    }

    fn emit(&mut self, event: ModelEvent) {
        for observer in &mut self.observers {
            observer(&event);
        }
    }
}
