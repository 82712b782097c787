//! Groups partition a ranking's order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub const DEFAULT_GROUP_NAME: &str = "Default";
pub const DEFAULT_GROUP_COLOR: &str = "gray";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
    pub color: String,
}

impl Group {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP_NAME, DEFAULT_GROUP_COLOR)
    }
}

/// A group together with the sorted row indices that belong to it.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedGroup {
    pub group: Group,
    pub order: Arc<[usize]>,
}

impl OrderedGroup {
    pub fn new(group: Group, order: impl Into<Arc<[usize]>>) -> Self {
        Self {
            group,
            order: order.into(),
        }
    }

    /// The single default group holding `order`.
    pub fn ungrouped(order: impl Into<Arc<[usize]>>) -> Self {
        Self::new(Group::default(), order)
    }
}

/// Concatenate group orders into one ranking order.
pub fn joined_order(groups: &[OrderedGroup]) -> Vec<usize> {
    groups.iter().flat_map(|g| g.order.iter().copied()).collect()
}
