//! Lazily materialized row wrappers.
//!
//! Every [`TreeItem`] observes one document node and remembers the wrapper of
//! its parent. Wrappers live in an [`ItemTable`] and are addressed by
//! generation-checked [`ItemId`] handles, so a wrapper released by a
//! structural edit can never be reached through a handle that outlived it.
//!
//! A wrapper's child cache is always a contiguous prefix of its node's
//! children: `cache[i]` wraps `children[i]` for every cached `i`.

use tracing::trace;

use crate::node::{Document, NodeId};

/// Handle of a wrapper in an [`ItemTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId {
    index: u32,
    generation: u32,
}

/// Wrapper giving a document node a row position under its parent.
#[derive(Debug, Clone)]
pub struct TreeItem {
    node: NodeId,
    parent: Option<ItemId>,
    children: Vec<ItemId>,
}

impl TreeItem {
    /// The observed document node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The enclosing wrapper, `None` for the root wrapper.
    pub fn parent(&self) -> Option<ItemId> {
        self.parent
    }

    /// The materialized prefix of child wrappers.
    pub fn cached_children(&self) -> &[ItemId] {
        &self.children
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    item: Option<TreeItem>,
}

/// Table owning all wrappers of one model.
#[derive(Debug)]
pub struct ItemTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: ItemId,
}

impl ItemTable {
    /// Creates a table whose root wrapper observes `root_node`.
    pub fn new(root_node: NodeId) -> Self {
        let mut table = ItemTable {
            slots: Vec::new(),
            free: Vec::new(),
            root: ItemId {
                index: 0,
                generation: 0,
            },
        };
        table.root = table.alloc(root_node, None);
        table
    }

    /// Releases every wrapper and starts over with a fresh root wrapper.
    ///
    /// Handles issued before the call never become valid again.
    pub fn clear(&mut self) {
        let Some(root_node) = self.get(self.root).map(TreeItem::node) else {
            return;
        };
        self.release(self.root);
        self.root = self.alloc(root_node, None);
    }

    /// The root wrapper.
    pub fn root(&self) -> ItemId {
        self.root
    }

    /// Looks up a wrapper; `None` once it has been released.
    pub fn get(&self, id: ItemId) -> Option<&TreeItem> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.item.as_ref())
    }

    /// Returns true if the handle refers to a live wrapper.
    pub fn contains(&self, id: ItemId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live wrappers, the root included.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.item.is_some()).count()
    }

    /// Always false: the root wrapper is never released.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row of this wrapper among its parent's materialized children.
    ///
    /// Returns 0 for the root wrapper, or if the parent's cache does not hold
    /// this wrapper.
    pub fn child_number(&self, id: ItemId) -> usize {
        self.get(id)
            .and_then(|item| item.parent)
            .and_then(|parent| self.get(parent))
            .and_then(|parent| parent.children.iter().position(|&c| c == id))
            .unwrap_or(0)
    }

    /// Returns the wrapper of child row `i`, materializing the cache up to
    /// and including `i` on first access.
    ///
    /// Returns `None` without touching the cache when `i` is outside the
    /// node's child range.
    pub fn child(&mut self, document: &Document, id: ItemId, i: usize) -> Option<ItemId> {
        let item = self.get(id)?;
        if let Some(&existing) = item.children.get(i) {
            return Some(existing);
        }
        let node = item.node;
        let cached = item.children.len();
        if i >= document.child_count(node) {
            return None;
        }
        let missing: Vec<NodeId> = document
            .children(node)
            .skip(cached)
            .take(i - cached + 1)
            .collect();

        trace!(from = cached, to = i, "materializing child wrappers");
        let wrappers: Vec<ItemId> = missing
            .into_iter()
            .map(|child| self.alloc(child, Some(id)))
            .collect();
        let item = self.get_mut(id)?;
        item.children.extend(wrappers);
        item.children.get(i).copied()
    }

    /// Wraps `count` node children starting at `position`.
    ///
    /// The caller must already have inserted the nodes into the document.
    /// Fails without effect unless `position + count` is within the node's
    /// child count. Rows past the materialized prefix are left to lazy
    /// materialization.
    pub fn insert_children(
        &mut self,
        document: &Document,
        id: ItemId,
        position: usize,
        count: usize,
    ) -> bool {
        let Some(item) = self.get(id) else {
            return false;
        };
        let node = item.node;
        let cached = item.children.len();
        let Some(end) = position.checked_add(count) else {
            return false;
        };
        if end > document.child_count(node) {
            return false;
        }
        if position > cached {
            return true;
        }

        let inserted: Vec<NodeId> = document.children(node).skip(position).take(count).collect();
        let wrappers: Vec<ItemId> = inserted
            .into_iter()
            .map(|child| self.alloc(child, Some(id)))
            .collect();
        match self.get_mut(id) {
            Some(item) => {
                item.children.splice(position..position, wrappers);
                true
            }
            None => false,
        }
    }

    /// Drops the wrappers of `count` rows starting at `position`.
    ///
    /// Only the cache is touched; the caller removes the document nodes. The
    /// range must lie within the node's children or within the cache, so the
    /// call is valid both before and after the caller's node removal. Fails
    /// without effect otherwise.
    pub fn remove_children(
        &mut self,
        document: &Document,
        id: ItemId,
        position: usize,
        count: usize,
    ) -> bool {
        let Some(item) = self.get(id) else {
            return false;
        };
        let bound = document.child_count(item.node).max(item.children.len());
        let Some(end) = position.checked_add(count) else {
            return false;
        };
        if end > bound {
            return false;
        }

        let removed: Vec<ItemId> = match self.get_mut(id) {
            Some(item) if position < item.children.len() => {
                let end = end.min(item.children.len());
                item.children.drain(position..end).collect()
            }
            _ => Vec::new(),
        };
        for wrapper in removed {
            self.release(wrapper);
        }
        true
    }

    /// Returns true if every cached wrapper below `id` observes the node at
    /// its row.
    pub fn is_aligned(&self, document: &Document, id: ItemId) -> bool {
        let Some(item) = self.get(id) else {
            return false;
        };
        let nodes: Vec<NodeId> = document
            .children(item.node)
            .take(item.children.len())
            .collect();
        nodes.len() == item.children.len()
            && item.children.iter().zip(&nodes).all(|(&child, &node)| {
                self.get(child).is_some_and(|c| c.node == node) && self.is_aligned(document, child)
            })
    }

    fn get_mut(&mut self, id: ItemId) -> Option<&mut TreeItem> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.item.as_mut())
    }

    fn alloc(&mut self, node: NodeId, parent: Option<ItemId>) -> ItemId {
        let item = TreeItem {
            node,
            parent,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.item = Some(item);
                ItemId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    item: Some(item),
                });
                ItemId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    /// Releases a wrapper and everything cached below it.
    fn release(&mut self, id: ItemId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(slot) = self
                .slots
                .get_mut(id.index as usize)
                .filter(|slot| slot.generation == id.generation)
            else {
                continue;
            };
            if let Some(item) = slot.item.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
                stack.extend(item.children);
            }
        }
    }
}
