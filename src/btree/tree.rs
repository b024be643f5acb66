//! B+ tree core implementation.
//!
//! This module provides the main BPlusTree struct with operations for:
//! - insert: Appends a value under a key, splitting nodes on overflow
//! - lookup: Point lookups returning every value under a key
//! - range_lookup: Inclusive range queries over the leaf chain
//!
//! Nodes live in an arena and refer to each other by [`NodeId`]. Child ids
//! are the owning edges; parent and prev/next ids are back edges only.

use super::cursor::Range;
use super::node::{locate, Entry, InternalNode, LeafNode, Node};
use crate::error::{Result, TreeError};
use crate::types::{NodeId, TreeConfig};
use serde::Serialize;
use tracing::{debug, trace};

/// Separator and new right sibling produced by a split, waiting to be merged
/// into the parent of the node that split
#[derive(Debug, Clone, Copy)]
struct Split {
    /// Least key of the right sibling's subtree
    separator: f64,
    right: NodeId,
}

/// Tree statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeStats {
    pub order: usize,
    pub height: usize,
    pub node_count: usize,
    pub leaf_count: usize,
    /// Distinct keys
    pub key_count: usize,
    /// Values across all keys
    pub value_count: usize,
}

/// An in-memory B+ tree keyed by `f64`
///
/// Must be initialized with an order before use, either through
/// [`BPlusTree::new`] or [`BPlusTree::initialize`] on a default tree.
#[derive(Debug, Default)]
pub struct BPlusTree {
    /// Entries per node that trigger a split (None until initialized)
    order: Option<usize>,
    /// Node arena; ids index into it
    nodes: Vec<Node>,
    /// Root node (None while empty)
    root: Option<NodeId>,
    key_count: usize,
    value_count: usize,
}

impl BPlusTree {
    /// Create an empty tree with the given order
    pub fn new(order: usize) -> Result<Self> {
        let mut tree = Self::default();
        tree.initialize(order)?;
        Ok(tree)
    }

    /// Create an empty tree from a config
    pub fn with_config(config: TreeConfig) -> Result<Self> {
        Self::new(config.order)
    }

    /// Fix the order and clear the tree
    pub fn initialize(&mut self, order: usize) -> Result<()> {
        TreeConfig::new(order)?;
        *self = Self {
            order: Some(order),
            ..Self::default()
        };
        debug!(order, "tree initialized");
        Ok(())
    }

    /// The order, or `Uninitialized`
    pub fn order(&self) -> Result<usize> {
        self.order.ok_or(TreeError::Uninitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.order.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Get the root node ID
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.key_count
    }

    /// Number of values across all keys
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Get the height of the tree (0 when empty)
    pub fn height(&self) -> usize {
        let Some(mut current) = self.root else {
            return 0;
        };
        let mut height = 1;
        while let Node::Internal(internal) = self.node(current) {
            current = internal.children[0];
            height += 1;
        }
        height
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            order: self.order.unwrap_or(0),
            height: self.height(),
            node_count: self.nodes.len(),
            leaf_count: self.nodes.iter().filter(|n| n.is_leaf()).count(),
            key_count: self.key_count,
            value_count: self.value_count,
        }
    }

    /// Insert a value under `key`
    ///
    /// A key that is already present keeps its entry; the value is appended
    /// to that entry's list and the shape of the tree does not change.
    pub fn insert(&mut self, key: f64, value: impl Into<String>) -> Result<()> {
        let order = self.order()?;
        check_key(key)?;
        let value = value.into();
        self.value_count += 1;

        let Some(root) = self.root else {
            let id = self.alloc(Node::Leaf(LeafNode::new(vec![Entry::new(key, value)])));
            self.root = Some(id);
            self.key_count += 1;
            return Ok(());
        };

        // A root leaf below order - 1 cannot reach order on this insert
        if let Node::Leaf(leaf) = &mut self.nodes[root.index()] {
            if leaf.entries.len() < order - 1 {
                if leaf.insert(key, value) {
                    self.key_count += 1;
                }
                return Ok(());
            }
        }

        let leaf_id = self.find_leaf(root, key);
        let leaf = self.leaf_mut(leaf_id);
        let created = leaf.insert(key, value);
        let overflow = leaf.entries.len() >= order;
        if created {
            self.key_count += 1;
        }
        if overflow {
            self.split_leaf(leaf_id, order);
        }
        Ok(())
    }

    /// Every value inserted under `key`, in insertion order
    ///
    /// Returns `None` when the key was never inserted; a found key always has
    /// at least one value.
    pub fn lookup(&self, key: f64) -> Result<Option<&[String]>> {
        self.order()?;
        check_key(key)?;
        let Some(root) = self.root else {
            return Ok(None);
        };
        Ok(self.leaf(self.find_leaf(root, key)).find(key))
    }

    /// Lazy scan of every entry with `key1 <= key <= key2`
    ///
    /// Empty when `key1 > key2` or the tree is empty.
    pub fn range(&self, key1: f64, key2: f64) -> Result<Range<'_>> {
        self.order()?;
        check_key(key1)?;
        check_key(key2)?;
        let start = match self.root {
            Some(root) if key1 <= key2 => Some(self.find_leaf(root, key1)),
            _ => None,
        };
        Ok(Range::new(self, start, key1, key2))
    }

    /// Every entry with `key1 <= key <= key2`, ascending, one item per key
    pub fn range_lookup(&self, key1: f64, key2: f64) -> Result<Vec<(f64, &[String])>> {
        Ok(self.range(key1, key2)?.collect())
    }

    /// Every entry in key order, walking the leaf chain
    pub fn entries(&self) -> Range<'_> {
        Range::new(
            self,
            self.leftmost_leaf(),
            f64::NEG_INFINITY,
            f64::INFINITY,
        )
    }

    /// Debug lookup - traces the descent through the tree
    pub fn debug_lookup(&self, key: f64) -> Vec<String> {
        let mut trace = Vec::new();
        let Some(root) = self.root else {
            trace.push("Tree is empty".to_string());
            return trace;
        };

        trace.push(format!("Searching for key: {key:?}"));
        trace.push(format!("Root node: {}, Height: {}", root, self.height()));

        let mut current = root;
        loop {
            match self.node(current) {
                Node::Internal(internal) => {
                    trace.push(format!("  Node {current}: internal, keys={:?}", internal.keys));
                    let idx = locate(key, &internal.keys);
                    current = internal.children[idx];
                    trace.push(format!("  -> Descending to child {idx} (node {current})"));
                }
                Node::Leaf(leaf) => {
                    let keys: Vec<f64> = leaf.entries.iter().map(|e| e.key).collect();
                    trace.push(format!("  Node {current}: leaf, keys={keys:?}"));
                    match leaf.find(key) {
                        Some(values) => trace.push(format!("  FOUND {} value(s)", values.len())),
                        None => trace.push("  NOT FOUND in leaf".to_string()),
                    }
                    return trace;
                }
            }
        }
    }

    /// Check every structural invariant
    ///
    /// Keys ascend within each node, separators equal the least key of their
    /// right subtree, occupancy stays within bounds, all leaves share one depth,
    /// parent ids match the child slots, and the leaf chain visits every leaf
    /// once in key order with consistent prev links.
    pub fn validate(&self) -> Result<()> {
        let order = self.order()?;
        let Some(root) = self.root else {
            if self.key_count != 0 || self.value_count != 0 {
                return Err(TreeError::corruption("empty tree with non-zero counts"));
            }
            return Ok(());
        };
        if let Some(parent) = self.node(root).parent() {
            return Err(TreeError::corruption(format!(
                "root {root} has parent {parent}"
            )));
        }

        let mut check = Validation {
            order,
            root,
            leaf_depth: None,
            leaves: Vec::new(),
        };
        self.validate_node(root, None, None, 1, &mut check)?;
        self.validate_leaf_chain(&check.leaves)?;

        let mut keys = 0;
        let mut values = 0;
        for &leaf in &check.leaves {
            for entry in &self.leaf(leaf).entries {
                keys += 1;
                values += entry.values.len();
            }
        }
        if keys != self.key_count || values != self.value_count {
            return Err(TreeError::corruption(format!(
                "counted {keys} keys / {values} values, tracked {} / {}",
                self.key_count, self.value_count
            )));
        }
        Ok(())
    }

    /// Validate the subtree at `id`, returning its least key
    fn validate_node(
        &self,
        id: NodeId,
        lower: Option<f64>,
        upper: Option<f64>,
        depth: usize,
        check: &mut Validation,
    ) -> Result<f64> {
        let node = self.node(id);
        if node.is_empty() {
            return Err(TreeError::corruption(format!("node {id} is empty")));
        }
        if node.len() >= check.order {
            return Err(TreeError::corruption(format!(
                "node {id} holds {} with order {}",
                node.len(),
                check.order
            )));
        }

        match node {
            Node::Leaf(leaf) => {
                if id != check.root && leaf.entries.len() < check.order / 2 {
                    return Err(TreeError::corruption(format!("leaf {id} underflows")));
                }
                if leaf.entries.windows(2).any(|w| w[0].key >= w[1].key) {
                    return Err(TreeError::corruption(format!("leaf {id} keys not ascending")));
                }
                for entry in &leaf.entries {
                    if entry.values.is_empty() {
                        return Err(TreeError::corruption(format!(
                            "key {:?} in leaf {id} has no values",
                            entry.key
                        )));
                    }
                    if lower.is_some_and(|l| entry.key < l) || upper.is_some_and(|u| entry.key >= u) {
                        return Err(TreeError::corruption(format!(
                            "key {:?} in leaf {id} outside its parent's range",
                            entry.key
                        )));
                    }
                }
                match check.leaf_depth {
                    Some(d) if d != depth => {
                        return Err(TreeError::corruption(format!(
                            "leaf {id} at depth {depth}, expected {d}"
                        )));
                    }
                    _ => check.leaf_depth = Some(depth),
                }
                check.leaves.push(id);
                Ok(leaf.entries[0].key)
            }
            Node::Internal(internal) => {
                if id != check.root && internal.keys.len() < check.order.div_ceil(2) - 1 {
                    return Err(TreeError::corruption(format!("internal node {id} underflows")));
                }
                if internal.keys.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(TreeError::corruption(format!(
                        "internal node {id} keys not ascending"
                    )));
                }
                if internal.children.len() != internal.keys.len() + 1 {
                    return Err(TreeError::corruption(format!(
                        "internal node {id} has {} keys and {} children",
                        internal.keys.len(),
                        internal.children.len()
                    )));
                }

                let mut least = None;
                for (i, &child) in internal.children.iter().enumerate() {
                    if self.node(child).parent() != Some(id) {
                        return Err(TreeError::corruption(format!(
                            "child {child} of {id} points at parent {:?}",
                            self.node(child).parent()
                        )));
                    }
                    let child_lower = if i == 0 { lower } else { Some(internal.keys[i - 1]) };
                    let child_upper = internal.keys.get(i).copied().or(upper);
                    let child_least =
                        self.validate_node(child, child_lower, child_upper, depth + 1, check)?;
                    if i > 0 && child_least != internal.keys[i - 1] {
                        return Err(TreeError::corruption(format!(
                            "separator {:?} in {id} is not the least key {child_least:?} of its right subtree",
                            internal.keys[i - 1]
                        )));
                    }
                    least.get_or_insert(child_least);
                }
                least.ok_or_else(|| TreeError::corruption(format!("internal node {id} has no children")))
            }
        }
    }

    /// Walk the chain from the leftmost leaf and compare with the in-order leaves
    fn validate_leaf_chain(&self, leaves: &[NodeId]) -> Result<()> {
        let mut walked = Vec::with_capacity(leaves.len());
        let mut prev = None;
        let mut current = leaves.first().copied();

        while let Some(id) = current {
            if walked.len() > leaves.len() {
                return Err(TreeError::corruption("leaf chain does not terminate"));
            }
            let Node::Leaf(leaf) = self.node(id) else {
                return Err(TreeError::corruption(format!("leaf chain reaches internal node {id}")));
            };
            if leaf.prev != prev {
                return Err(TreeError::corruption(format!(
                    "leaf {id} prev is {:?}, expected {prev:?}",
                    leaf.prev
                )));
            }
            walked.push(id);
            prev = Some(id);
            current = leaf.next;
        }

        if walked != leaves {
            return Err(TreeError::corruption(format!(
                "leaf chain {walked:?} differs from tree order {leaves:?}"
            )));
        }
        Ok(())
    }

    // =========================
    // Arena access
    // =========================

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn leaf(&self, id: NodeId) -> &LeafNode {
        match self.node(id) {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => unreachable!("node {id} is not a leaf"),
        }
    }

    fn leaf_mut(&mut self, id: NodeId) -> &mut LeafNode {
        match self.node_mut(id) {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => unreachable!("node {id} is not a leaf"),
        }
    }

    fn internal(&self, id: NodeId) -> &InternalNode {
        match self.node(id) {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => unreachable!("node {id} is not internal"),
        }
    }

    fn internal_mut(&mut self, id: NodeId) -> &mut InternalNode {
        match self.node_mut(id) {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => unreachable!("node {id} is not internal"),
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Descend from `from` to the leaf whose range holds `key`
    fn find_leaf(&self, from: NodeId, key: f64) -> NodeId {
        let mut current = from;
        while let Node::Internal(internal) = self.node(current) {
            current = internal.child_for(key);
        }
        current
    }

    pub(crate) fn leftmost_leaf(&self) -> Option<NodeId> {
        let mut current = self.root?;
        while let Node::Internal(internal) = self.node(current) {
            current = internal.children[0];
        }
        Some(current)
    }

    // =========================
    // Splitting
    // =========================

    /// Split a leaf holding `order` entries at `order / 2`
    ///
    /// The left half stays in place; the right half moves to a new leaf whose
    /// first key is copied up as the separator.
    fn split_leaf(&mut self, leaf_id: NodeId, order: usize) {
        let mid = order / 2;
        let leaf = self.leaf_mut(leaf_id);
        let right_entries = leaf.entries.split_off(mid);
        let parent = leaf.parent;
        let separator = right_entries[0].key;

        let right = self.alloc(Node::Leaf(LeafNode::new(right_entries)));
        trace!(leaf = %leaf_id, %right, separator, "leaf split");

        self.propagate(parent, leaf_id, Split { separator, right }, true, order);
    }

    /// Hand a split to the ancestor of the node that produced it
    ///
    /// With no ancestor the split node was the root and the fragment becomes
    /// the new root. Otherwise the fragment is merged into the ancestor, which
    /// is split in turn if that brings it to `order` separators.
    fn propagate(
        &mut self,
        ancestor: Option<NodeId>,
        previous: NodeId,
        split: Split,
        from_leaf: bool,
        order: usize,
    ) {
        let Some(ancestor) = ancestor else {
            self.grow_root(previous, split, from_leaf);
            return;
        };

        self.merge_split(ancestor, split);
        if from_leaf {
            self.splice_leaf(previous, split.right);
        }

        if self.internal(ancestor).keys.len() >= order {
            self.split_internal(ancestor, order);
        }
    }

    /// Materialize `split` as the new root over `previous` and its sibling
    fn grow_root(&mut self, previous: NodeId, split: Split, from_leaf: bool) {
        let mut root = InternalNode {
            keys: vec![split.separator],
            children: vec![split.right],
            parent: None,
        };
        let slot = self
            .node(previous)
            .first_key()
            .map_or(0, |key| locate(key, &root.keys));
        root.children.insert(slot, previous);

        let root_id = self.alloc(Node::Internal(root));
        self.node_mut(previous).set_parent(Some(root_id));
        self.node_mut(split.right).set_parent(Some(root_id));
        if from_leaf {
            self.splice_leaf(previous, split.right);
        }

        self.root = Some(root_id);
        debug!(root = %root_id, height = self.height(), "root split");
    }

    /// Insert the fragment's separator and child into `ancestor`
    fn merge_split(&mut self, ancestor: NodeId, split: Split) {
        let internal = self.internal_mut(ancestor);
        let idx = locate(split.separator, &internal.keys);
        internal.keys.insert(idx, split.separator);
        internal.children.insert(idx + 1, split.right);
        self.node_mut(split.right).set_parent(Some(ancestor));
    }

    /// Link a freshly split-off leaf directly after the leaf it came from
    ///
    /// Covers the new leaf landing at the end of the chain as well as between
    /// two existing leaves, possibly under different parents.
    fn splice_leaf(&mut self, left: NodeId, right: NodeId) {
        let next = self.leaf(left).next;
        let new_leaf = self.leaf_mut(right);
        new_leaf.prev = Some(left);
        new_leaf.next = next;
        if let Some(next) = next {
            self.leaf_mut(next).prev = Some(right);
        }
        self.leaf_mut(left).next = Some(right);
    }

    /// Split an internal node holding `order` separators
    ///
    /// The separator at `ceil(order / 2) - 1` moves up; keys after it go to a
    /// new right sibling along with every child whose first key is at or above
    /// it, scanning from the right.
    fn split_internal(&mut self, node_id: NodeId, order: usize) {
        let mid = order.div_ceil(2) - 1;
        let (promoted, right_keys, parent) = {
            let internal = self.internal_mut(node_id);
            let right_keys = internal.keys.split_off(mid + 1);
            let promoted = internal.keys[mid];
            internal.keys.truncate(mid);
            (promoted, right_keys, internal.parent)
        };

        let first_right = {
            let children = &self.internal(node_id).children;
            let mut first_right = children.len();
            while first_right > 0
                && self
                    .node(children[first_right - 1])
                    .first_key()
                    .is_some_and(|key| key >= promoted)
            {
                first_right -= 1;
            }
            first_right
        };
        debug_assert_eq!(
            first_right,
            mid + 1,
            "child partition disagrees with promoted separator"
        );

        let right_children = self.internal_mut(node_id).children.split_off(first_right);
        let moved = right_children.len();
        let right = self.alloc(Node::Internal(InternalNode {
            keys: right_keys,
            children: right_children,
            parent: None,
        }));
        for i in 0..moved {
            let child = self.internal(right).children[i];
            self.node_mut(child).set_parent(Some(right));
        }
        trace!(node = %node_id, %right, promoted, "internal split");

        self.propagate(
            parent,
            node_id,
            Split {
                separator: promoted,
                right,
            },
            false,
            order,
        );
    }
}

/// Accumulated state while validating
struct Validation {
    order: usize,
    root: NodeId,
    leaf_depth: Option<usize>,
    /// Leaves in tree (in-order) order
    leaves: Vec<NodeId>,
}

fn check_key(key: f64) -> Result<()> {
    if key.is_nan() {
        return Err(TreeError::InvalidKey(key));
    }
    Ok(())
}
