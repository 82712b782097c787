//! Rankings: an ordered set of top-level columns, a sort criterion and the
//! materialized row order.
//!
//! The structure of a ranking is edited through the
//! [`ColumnTree`](crate::tree::ColumnTree); this type holds its state.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::column::ColumnId;
use crate::event::EventDispatcher;
use crate::group::OrderedGroup;

new_key_type! {
    /// Arena handle of a ranking.
    pub struct RankingId;
}

/// The active sort column and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortCriteria {
    pub column: Option<ColumnId>,
    pub ascending: bool,
}

/// Captures the sort generation a sort request was started in.
///
/// A result is only applied if no newer sort was started since.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortTicket {
    pub ranking: RankingId,
    pub generation: u64,
}

/// Serialized sort criterion: the column id within the dump and the direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortCriteriaDump {
    #[serde(rename = "sortBy")]
    pub sort_by: String,
    pub asc: bool,
}

#[derive(Debug)]
pub struct Ranking {
    pub(crate) id: String,
    pub(crate) columns: Vec<ColumnId>,
    pub(crate) sort: SortCriteria,
    pub(crate) group_by: Option<ColumnId>,
    pub(crate) order: Arc<[usize]>,
    pub(crate) ranks: HashMap<usize, usize>,
    pub(crate) groups: Vec<OrderedGroup>,
    pub(crate) generation: u64,
    pub(crate) events: EventDispatcher,
}

impl Ranking {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            columns: Vec::new(),
            sort: SortCriteria::default(),
            group_by: None,
            order: Arc::from(Vec::new()),
            ranks: HashMap::new(),
            groups: Vec::new(),
            generation: 0,
            events: EventDispatcher::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn columns(&self) -> &[ColumnId] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn sort_criteria(&self) -> SortCriteria {
        self.sort
    }

    pub fn sort_column(&self) -> Option<ColumnId> {
        self.sort.column
    }

    pub fn is_ascending(&self) -> bool {
        self.sort.ascending
    }

    pub fn group_column(&self) -> Option<ColumnId> {
        self.group_by
    }

    /// Row indices in ranked order.
    pub fn order(&self) -> Arc<[usize]> {
        self.order.clone()
    }

    pub fn groups(&self) -> &[OrderedGroup] {
        &self.groups
    }

    /// Zero-based position of a row in the order, if it is ranked.
    pub fn rank_of(&self, row: usize) -> Option<usize> {
        self.ranks.get(&row).copied()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub(crate) fn next_ticket(&mut self, handle: RankingId) -> SortTicket {
        self.generation += 1;
        SortTicket {
            ranking: handle,
            generation: self.generation,
        }
    }

    /// Store a new order. Groups are kept alongside.
    pub(crate) fn set_groups(&mut self, groups: Vec<OrderedGroup>) -> Arc<[usize]> {
        let order: Arc<[usize]> = crate::group::joined_order(&groups).into();
        self.ranks = order.iter().enumerate().map(|(i, &row)| (row, i)).collect();
        self.order = order.clone();
        self.groups = groups;
        order
    }
}
