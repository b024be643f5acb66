//! # treesearch
//!
//! An in-memory B+ tree keyed by `f64`, where every key collects the values
//! inserted under it and the leaf level is a doubly-linked chain for range
//! scans.
//!
//! ## Architecture
//!
//! - **B+ Tree Layer** (`btree`): Arena of nodes, split propagation, point
//!   lookup, leaf-chain range cursor, and read-only dumps
//! - **Script Layer** (`script`): `Insert(key,value)` / `Search(key)` /
//!   `Search(key1,key2)` command files and their output format
//! - **Index** (this module): A lock-guarded handle for sharing one tree
//!
//! ## Usage
//!
//! ```rust
//! use treesearch::{Index, TreeConfig};
//!
//! let index = Index::new(TreeConfig::new(4)?)?;
//!
//! index.insert(3.55, "A")?;
//! index.insert(3.55, "B")?;
//! index.insert(-3.91, "C")?;
//!
//! assert_eq!(index.lookup(3.55)?, Some(vec!["A".to_string(), "B".to_string()]));
//! assert_eq!(index.lookup(999.0)?, None);
//!
//! let range = index.range_lookup(-5.0, 5.0)?;
//! assert_eq!(range.len(), 2);
//! # Ok::<(), treesearch::TreeError>(())
//! ```

pub mod btree;
pub mod error;
pub mod script;
pub mod types;

pub use error::{Result, TreeError};
pub use types::{NodeId, TreeConfig, DEFAULT_ORDER, MIN_ORDER};

// Re-export main public API
pub use btree::{BPlusTree, TreeNode, TreeStats};
pub use script::{run_script, Command, ScriptSummary};

use parking_lot::RwLock;

/// Shared handle to one tree
///
/// Splits rewrite parent, child and sibling links across several nodes, so
/// inserts take the write lock and run one at a time; lookups share the read
/// lock and never observe a half-finished split.
pub struct Index {
    tree: RwLock<BPlusTree>,
    config: TreeConfig,
}

impl Index {
    /// Create an empty index
    pub fn new(config: TreeConfig) -> Result<Self> {
        let tree = BPlusTree::with_config(config)?;
        Ok(Self {
            tree: RwLock::new(tree),
            config,
        })
    }

    /// Wrap an existing tree
    pub fn from_tree(tree: BPlusTree) -> Result<Self> {
        let config = TreeConfig::new(tree.order()?)?;
        Ok(Self {
            tree: RwLock::new(tree),
            config,
        })
    }

    /// Get the tree configuration
    pub fn config(&self) -> TreeConfig {
        self.config
    }

    /// Append a value under a key
    pub fn insert(&self, key: f64, value: impl Into<String>) -> Result<()> {
        let mut tree = self.tree.write();
        tree.insert(key, value)
    }

    /// Get every value under a key
    ///
    /// Returns `None` if the key was never inserted.
    pub fn lookup(&self, key: f64) -> Result<Option<Vec<String>>> {
        let tree = self.tree.read();
        Ok(tree.lookup(key)?.map(<[String]>::to_vec))
    }

    /// Get every entry with `key1 <= key <= key2` in key order
    pub fn range_lookup(&self, key1: f64, key2: f64) -> Result<Vec<(f64, Vec<String>)>> {
        let tree = self.tree.read();
        Ok(tree
            .range(key1, key2)?
            .map(|(key, values)| (key, values.to_vec()))
            .collect())
    }

    /// Run one parsed command, returning the output line for searches
    pub fn execute(&self, command: &Command) -> Result<Option<String>> {
        match command {
            Command::Insert { key, value } => {
                self.insert(*key, value.as_str())?;
                Ok(None)
            }
            Command::Search { key } => {
                let tree = self.tree.read();
                Ok(Some(script::format_values(tree.lookup(*key)?)))
            }
            Command::SearchRange { from, to } => {
                let tree = self.tree.read();
                Ok(Some(script::format_range(&tree.range_lookup(*from, *to)?)))
            }
        }
    }

    /// Get statistics about the tree
    pub fn stats(&self) -> TreeStats {
        self.tree.read().stats()
    }

    /// Export the tree structure for visualization
    pub fn export_tree(&self) -> Option<TreeNode> {
        self.tree.read().export()
    }

    /// Level-by-level text dump
    pub fn render(&self) -> String {
        self.tree.read().render()
    }

    /// Check all structural invariants
    pub fn validate(&self) -> Result<()> {
        self.tree.read().validate()
    }

    /// Take the tree back out of the index
    pub fn into_inner(self) -> BPlusTree {
        self.tree.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_operations() -> Result<()> {
        let index = Index::new(TreeConfig::default())?;

        index.insert(1.0, "one")?;
        assert_eq!(index.lookup(1.0)?, Some(vec!["one".to_string()]));

        // Appends rather than overwrites
        index.insert(1.0, "uno")?;
        assert_eq!(
            index.lookup(1.0)?,
            Some(vec!["one".to_string(), "uno".to_string()])
        );

        // Non-existent key
        assert_eq!(index.lookup(2.0)?, None);
        index.validate()?;
        Ok(())
    }

    #[test]
    fn test_range_scan() -> Result<()> {
        let index = Index::new(TreeConfig::new(3)?)?;
        for (k, v) in [(4.0, "d"), (1.0, "a"), (3.0, "c"), (2.0, "b")] {
            index.insert(k, v)?;
        }

        let all = index.range_lookup(f64::NEG_INFINITY, f64::INFINITY)?;
        assert_eq!(all.len(), 4);

        let range = index.range_lookup(2.0, 3.0)?;
        assert_eq!(
            range,
            vec![(2.0, vec!["b".to_string()]), (3.0, vec!["c".to_string()])]
        );
        Ok(())
    }

    #[test]
    fn test_execute_commands() -> Result<()> {
        let index = Index::new(TreeConfig::new(4)?)?;
        let insert: Command = "Insert(2.5,x)".parse().map_err(TreeError::corruption)?;
        assert_eq!(index.execute(&insert)?, None);
        assert_eq!(index.execute(&Command::Search { key: 2.5 })?, Some("x".to_string()));
        assert_eq!(
            index.execute(&Command::SearchRange { from: 0.0, to: 1.0 })?,
            Some("Null".to_string())
        );
        assert_eq!(
            index.execute(&Command::SearchRange { from: 0.0, to: 5.0 })?,
            Some("(2.5,x)".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_from_tree_requires_initialized() -> Result<()> {
        assert!(matches!(
            Index::from_tree(BPlusTree::default()),
            Err(TreeError::Uninitialized)
        ));
        let index = Index::from_tree(BPlusTree::new(5)?)?;
        assert_eq!(index.config().order, 5);
        Ok(())
    }

    #[test]
    fn test_concurrent_readers_after_serialized_inserts() -> Result<()> {
        let index = Arc::new(Index::new(TreeConfig::new(5)?)?);

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let index = Arc::clone(&index);
                thread::spawn(move || -> Result<()> {
                    for i in 0..50 {
                        index.insert((i * 4 + t) as f64, format!("t{t}-{i}"))?;
                    }
                    Ok(())
                })
            })
            .collect();
        for writer in writers {
            writer.join().map_err(|_| TreeError::corruption("writer panicked"))??;
        }

        index.validate()?;
        let stats = index.stats();
        assert_eq!(stats.key_count, 200);

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let index = Arc::clone(&index);
                thread::spawn(move || -> Result<usize> {
                    Ok(index.range_lookup(0.0, 199.0)?.len())
                })
            })
            .collect();
        for reader in readers {
            let count = reader.join().map_err(|_| TreeError::corruption("reader panicked"))??;
            assert_eq!(count, 200);
        }
        Ok(())
    }
}
