//! Read-only traversals for printing and exporting the tree.

use super::node::{Entry, Node};
use super::tree::BPlusTree;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write;

/// Render a key the way `java.lang.Double::toString` does
///
/// Magnitudes in `[1e-3, 1e7)` print as plain decimals with at least one
/// fractional digit (`10.0`, `-3.91`, `0.02`). Everything else uses the
/// shortest mantissa followed by `E<exp>` (`1.0E7`, `1.2345678E7`, `1.0E-4`).
pub fn format_key(key: f64) -> String {
    if key.is_infinite() {
        return if key > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = key.abs();
    if key.is_nan() || magnitude == 0.0 || (1e-3..1e7).contains(&magnitude) {
        return format!("{key:?}");
    }

    let scientific = format!("{key:e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    if mantissa.contains('.') {
        format!("{mantissa}E{exponent}")
    } else {
        format!("{mantissa}.0E{exponent}")
    }
}

/// Contents of one node at the time it was visited
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot<'a> {
    /// 1 for the root
    pub level: usize,
    pub id: NodeId,
    pub kind: SnapshotKind<'a>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotKind<'a> {
    Leaf { entries: &'a [Entry] },
    Internal { keys: &'a [f64] },
}

/// Lazy level-order walk yielding one snapshot per node
pub struct LevelOrder<'a> {
    tree: &'a BPlusTree,
    queue: VecDeque<(usize, NodeId)>,
}

impl<'a> Iterator for LevelOrder<'a> {
    type Item = NodeSnapshot<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        let (level, id) = self.queue.pop_front()?;
        let kind = match tree.node(id) {
            Node::Leaf(leaf) => SnapshotKind::Leaf {
                entries: &leaf.entries,
            },
            Node::Internal(internal) => {
                self.queue
                    .extend(internal.children.iter().map(|&child| (level + 1, child)));
                SnapshotKind::Internal {
                    keys: &internal.keys,
                }
            }
        };
        Some(NodeSnapshot { level, id, kind })
    }
}

/// Node type for visualization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub node_id: u32,
    pub is_leaf: bool,
    /// Entry keys (leaf) or separators (internal)
    pub keys: Vec<f64>,
    /// Value lists aligned with `keys` (only for leaf nodes)
    pub values: Vec<Vec<String>>,
    /// Child nodes (only for internal nodes)
    pub children: Vec<TreeNode>,
}

impl BPlusTree {
    /// Walk every node breadth-first from the root
    pub fn level_order(&self) -> LevelOrder<'_> {
        LevelOrder {
            tree: self,
            queue: self.root().map(|root| (1, root)).into_iter().collect(),
        }
    }

    /// Print internal levels breadth-first, then the leaf level by walking
    /// the leaf chain
    ///
    /// Each entry prints as `key:(v1,v2);` (separators with empty parens) and
    /// each node ends with `||`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let Some(first_leaf) = self.leftmost_leaf() else {
            return out;
        };

        let mut level = 0;
        for snapshot in self.level_order() {
            let SnapshotKind::Internal { keys } = snapshot.kind else {
                break;
            };
            if snapshot.level != level {
                if level != 0 {
                    out.push('\n');
                }
                level = snapshot.level;
                let _ = writeln!(out, "Level {level}");
            }
            for &key in keys {
                let _ = write!(out, "{}:();", format_key(key));
            }
            out.push_str("||");
        }

        if level != 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "Level {}", level + 1);
        let mut current = Some(first_leaf);
        while let Some(id) = current {
            let leaf = self.leaf(id);
            for entry in &leaf.entries {
                let _ = write!(out, "{}:({});", format_key(entry.key), entry.values.join(","));
            }
            out.push_str("||");
            current = leaf.next;
        }
        out.push('\n');
        out
    }

    /// Export the tree structure for visualization
    pub fn export(&self) -> Option<TreeNode> {
        self.root().map(|root| self.export_node(root))
    }

    fn export_node(&self, id: NodeId) -> TreeNode {
        match self.node(id) {
            Node::Leaf(leaf) => TreeNode {
                node_id: id.value(),
                is_leaf: true,
                keys: leaf.entries.iter().map(|e| e.key).collect(),
                values: leaf.entries.iter().map(|e| e.values.clone()).collect(),
                children: Vec::new(),
            },
            Node::Internal(internal) => TreeNode {
                node_id: id.value(),
                is_leaf: false,
                keys: internal.keys.clone(),
                values: Vec::new(),
                children: internal
                    .children
                    .iter()
                    .map(|&child| self.export_node(child))
                    .collect(),
            },
        }
    }
}
