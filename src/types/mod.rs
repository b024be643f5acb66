//! Common types used throughout the tree.

mod node_id;

pub use node_id::NodeId;

use crate::error::{Result, TreeError};
use serde::{Deserialize, Serialize};

/// Smallest order that still splits into two non-empty halves at every level
pub const MIN_ORDER: usize = 3;

/// Default order (small enough to keep dumps readable)
pub const DEFAULT_ORDER: usize = 4;

/// Tree configuration
///
/// `order` is the number of entries (leaf) or separators (internal) at which a
/// node splits, so a node holds at most `order - 1` between operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeConfig {
    /// Entries per node that trigger a split
    pub order: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            order: DEFAULT_ORDER,
        }
    }
}

impl TreeConfig {
    /// Create a validated config
    pub fn new(order: usize) -> Result<Self> {
        let config = Self { order };
        config.validate()?;
        Ok(config)
    }

    /// Check that the order supports splitting
    pub fn validate(&self) -> Result<()> {
        if self.order < MIN_ORDER {
            return Err(TreeError::InvalidOrder {
                order: self.order,
                min: MIN_ORDER,
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON config such as `{"order": 5}`
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_small_order() {
        assert!(matches!(
            TreeConfig::new(2),
            Err(TreeError::InvalidOrder { order: 2, min: MIN_ORDER })
        ));
        assert!(TreeConfig::new(0).is_err());
        assert_eq!(TreeConfig::new(3).map(|c| c.order).ok(), Some(3));
    }

    #[test]
    fn test_config_default() {
        assert_eq!(TreeConfig::default().order, DEFAULT_ORDER);
        assert!(TreeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_from_json() -> Result<()> {
        let config = TreeConfig::from_json(r#"{"order": 7}"#)?;
        assert_eq!(config.order, 7);

        assert!(matches!(
            TreeConfig::from_json(r#"{"order": 1}"#),
            Err(TreeError::InvalidOrder { .. })
        ));
        assert!(matches!(
            TreeConfig::from_json("not json"),
            Err(TreeError::Json(_))
        ));
        Ok(())
    }
}
