//! Node and entry types for the arena-backed B+ tree.
//!
//! Leaves and internal nodes are distinct variants: a leaf owns entries and
//! sits in the doubly-linked leaf chain, an internal node owns only separator
//! keys and child ids. Parent, prev and next are plain ids with no ownership.

use crate::types::NodeId;

/// A key with every value inserted under it, oldest first.
///
/// An entry is only ever created with one value, so `values` is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: f64,
    pub values: Vec<String>,
}

impl Entry {
    /// Create an entry holding a single value
    pub fn new(key: f64, value: String) -> Self {
        Self {
            key,
            values: vec![value],
        }
    }
}

/// Anything that sorts by an `f64` key
pub trait Keyed {
    fn key(&self) -> f64;
}

impl Keyed for f64 {
    fn key(&self) -> f64 {
        *self
    }
}

impl Keyed for Entry {
    fn key(&self) -> f64 {
        self.key
    }
}

/// Index of the first item whose key is strictly greater than `key`.
///
/// Returns 0 when `key` sorts before every item and `items.len()` when it is
/// greater than or equal to the last one. The same position is the insertion
/// point in a leaf and the child to descend into in an internal node, so a key
/// equal to a separator routes to the right child.
pub fn locate<T: Keyed>(key: f64, items: &[T]) -> usize {
    items.partition_point(|item| item.key() <= key)
}

/// Bottom-level node holding entries
#[derive(Debug, Clone, Default)]
pub struct LeafNode {
    pub entries: Vec<Entry>,
    pub parent: Option<NodeId>,
    pub prev: Option<NodeId>,
    pub next: Option<NodeId>,
}

impl LeafNode {
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    /// Insert a value, appending to an existing entry for the same key.
    ///
    /// Returns true when a new entry was created.
    pub fn insert(&mut self, key: f64, value: String) -> bool {
        let idx = locate(key, &self.entries);
        if idx > 0 && self.entries[idx - 1].key == key {
            self.entries[idx - 1].values.push(value);
            return false;
        }
        self.entries.insert(idx, Entry::new(key, value));
        true
    }

    /// Values stored under `key`, scanning until a greater key is seen
    pub fn find(&self, key: f64) -> Option<&[String]> {
        for entry in &self.entries {
            if entry.key == key {
                return Some(&entry.values);
            }
            if entry.key > key {
                break;
            }
        }
        None
    }
}

/// Routing node holding separators and children.
///
/// `children.len() == keys.len() + 1` at rest.
#[derive(Debug, Clone, Default)]
pub struct InternalNode {
    pub keys: Vec<f64>,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

impl InternalNode {
    /// Child subtree that would hold `key`
    pub fn child_for(&self, key: f64) -> NodeId {
        self.children[locate(key, &self.keys)]
    }
}

/// A tree node
#[derive(Debug, Clone)]
pub enum Node {
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Leaf(leaf) => leaf.parent,
            Node::Internal(internal) => internal.parent,
        }
    }

    pub fn set_parent(&mut self, parent: Option<NodeId>) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Internal(internal) => internal.parent = parent,
        }
    }

    /// Number of entries (leaf) or separators (internal)
    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.entries.len(),
            Node::Internal(internal) => internal.keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First entry key or first separator.
    ///
    /// For an internal node this is not the subtree minimum, but it lies on
    /// the same side of any ancestor separator, which is all a split needs.
    pub fn first_key(&self) -> Option<f64> {
        match self {
            Node::Leaf(leaf) => leaf.entries.first().map(|e| e.key),
            Node::Internal(internal) => internal.keys.first().copied(),
        }
    }
}
