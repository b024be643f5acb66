//! Leaf-chain cursor for range iteration.
//!
//! The cursor starts at the leaf a descent for the lower bound lands on and
//! then follows `next` links, so a scan never climbs back up the tree.

use super::tree::BPlusTree;
use crate::types::NodeId;

/// Iterator over entries with `start <= key <= end`, ascending
pub struct Range<'a> {
    tree: &'a BPlusTree,
    /// Leaf being scanned (None once exhausted)
    leaf: Option<NodeId>,
    /// Next entry slot within `leaf`
    slot: usize,
    start: f64,
    end: f64,
}

impl<'a> Range<'a> {
    pub(crate) fn new(tree: &'a BPlusTree, leaf: Option<NodeId>, start: f64, end: f64) -> Self {
        Self {
            tree,
            leaf,
            slot: 0,
            start,
            end,
        }
    }

    /// Check if the cursor can still yield entries
    pub fn is_valid(&self) -> bool {
        self.leaf.is_some()
    }
}

impl<'a> Iterator for Range<'a> {
    type Item = (f64, &'a [String]);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        while let Some(id) = self.leaf {
            let leaf = tree.leaf(id);
            while let Some(entry) = leaf.entries.get(self.slot) {
                self.slot += 1;
                if entry.key > self.end {
                    self.leaf = None;
                    return None;
                }
                if entry.key >= self.start {
                    return Some((entry.key, entry.values.as_slice()));
                }
            }
            // Need to move to next leaf
            self.leaf = leaf.next;
            self.slot = 0;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Result;
    use crate::BPlusTree;

    #[test]
    fn test_cursor_crosses_leaves() -> Result<()> {
        let mut tree = BPlusTree::new(3)?;
        for k in 0..30 {
            tree.insert(k as f64, format!("v{k}"))?;
        }
        assert!(tree.stats().leaf_count > 10);

        let keys: Vec<f64> = tree.range(4.5, 21.0)?.map(|(k, _)| k).collect();
        let expected: Vec<f64> = (5..=21).map(|k| k as f64).collect();
        assert_eq!(keys, expected);
        Ok(())
    }

    #[test]
    fn test_cursor_stops_past_end() -> Result<()> {
        let mut tree = BPlusTree::new(4)?;
        for k in 0..12 {
            tree.insert(k as f64, "x")?;
        }
        let mut range = tree.range(2.0, 3.0)?;
        assert!(range.is_valid());
        assert_eq!(range.next().map(|(k, _)| k), Some(2.0));
        assert_eq!(range.next().map(|(k, _)| k), Some(3.0));
        assert_eq!(range.next(), None);
        assert!(!range.is_valid());
        assert_eq!(range.next(), None);
        Ok(())
    }

    #[test]
    fn test_cursor_inverted_bounds_is_empty() -> Result<()> {
        let mut tree = BPlusTree::new(4)?;
        tree.insert(1.0, "a")?;
        let mut range = tree.range(2.0, 1.0)?;
        assert!(!range.is_valid());
        assert_eq!(range.next(), None);
        Ok(())
    }

    #[test]
    fn test_entries_walks_whole_chain() -> Result<()> {
        let mut tree = BPlusTree::new(3)?;
        let keys = [5.0, -2.0, 8.5, 0.0, 3.25, -7.0, 11.0, 4.0];
        for k in keys {
            tree.insert(k, "v")?;
        }
        let mut sorted = keys.to_vec();
        sorted.sort_by(f64::total_cmp);
        let walked: Vec<f64> = tree.entries().map(|(k, _)| k).collect();
        assert_eq!(walked, sorted);
        Ok(())
    }
}
