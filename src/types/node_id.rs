//! Node identifier type.

use std::fmt;

/// Stable handle to a node slot in the tree's arena.
///
/// Ids are handed out in allocation order and never reused; the tree has no
/// deletion, so a slot stays valid for the lifetime of the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a new node ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw node ID value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Arena slot for this id
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }

    /// Id for arena slot `index`
    ///
    /// Panics if the slot does not fit in a `u32`; the arena never grows
    /// past that many nodes.
    pub(crate) fn from_index(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(id) => Self(id),
            Err(_) => panic!("node arena overflow at slot {index}"),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<NodeId> for u32 {
    fn from(id: NodeId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_basics() {
        let id = NodeId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(id.index(), 42);
        assert_eq!(u32::from(id), 42);
        assert_eq!(NodeId::from(7), NodeId(7));
    }

    #[test]
    fn test_node_id_from_index() {
        assert_eq!(NodeId::from_index(0), NodeId(0));
        assert_eq!(NodeId::from_index(u32::MAX as usize), NodeId(u32::MAX));
        assert_eq!(NodeId::from_index(9).index(), 9);
    }

    #[test]
    #[should_panic(expected = "node arena overflow")]
    fn test_node_id_from_index_overflow() {
        NodeId::from_index(u32::MAX as usize + 1);
    }

    #[test]
    fn test_node_id_display() {
        assert_eq!(format!("{}", NodeId::new(42)), "42");
    }
}
