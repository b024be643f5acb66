//! B+ tree implementation.
//!
//! This module provides an in-memory B+ tree that supports:
//! - Insertions (insert), appending to existing keys
//! - Point lookups (lookup)
//! - Inclusive range scans over the linked leaf level
//! - Read-only level-order dumps and JSON export

mod cursor;
mod node;
mod traversal;
mod tree;

pub use cursor::Range;
pub use node::{locate, Entry, InternalNode, Keyed, LeafNode, Node};
pub use traversal::{format_key, LevelOrder, NodeSnapshot, SnapshotKind, TreeNode};
pub use tree::{BPlusTree, TreeStats};
