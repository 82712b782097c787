//! Row selection.
//!
//! Every operation is a no-op, firing nothing, when the requested state
//! already holds. Without multi-selection at most one row is selected.

use std::collections::BTreeSet;

use crate::column::{ColumnId, ColumnKind};
use crate::event::Event;

use super::base::ProviderCore;

impl ProviderCore {
    /// Selected row indices in ascending order.
    pub fn selection(&self) -> Vec<usize> {
        self.selection.read().iter().copied().collect()
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selection.read().contains(&index)
    }

    pub fn select(&mut self, index: usize) -> bool {
        self.replace_selection(|current, multi| {
            let mut next = if multi { current.clone() } else { BTreeSet::new() };
            next.insert(index);
            next
        })
    }

    /// Add rows to the selection. Without multi-selection only the last
    /// index is kept.
    pub fn select_all(&mut self, indices: &[usize]) -> bool {
        self.replace_selection(|current, multi| {
            if multi {
                let mut next = current.clone();
                next.extend(indices.iter().copied());
                next
            } else {
                match indices.last() {
                    Some(&last) => BTreeSet::from([last]),
                    None => current.clone(),
                }
            }
        })
    }

    /// Replace the selection.
    pub fn set_selection(&mut self, indices: &[usize]) -> bool {
        self.replace_selection(|_, multi| {
            if multi {
                indices.iter().copied().collect()
            } else {
                indices.last().copied().into_iter().collect()
            }
        })
    }

    /// Flip the membership of a row. Returns whether it is selected now.
    pub fn toggle_selection(&mut self, index: usize) -> bool {
        if self.is_selected(index) {
            self.deselect(index);
            false
        } else {
            self.select(index);
            true
        }
    }

    pub fn deselect(&mut self, index: usize) -> bool {
        self.replace_selection(|current, _| {
            let mut next = current.clone();
            next.remove(&index);
            next
        })
    }

    pub fn deselect_all(&mut self, indices: &[usize]) -> bool {
        self.replace_selection(|current, _| {
            let mut next = current.clone();
            for index in indices {
                next.remove(index);
            }
            next
        })
    }

    pub fn clear_selection(&mut self) -> bool {
        self.replace_selection(|_, _| BTreeSet::new())
    }

    /// Set a row's selection through a selection column, announcing it on
    /// the column as well.
    pub fn set_selected_via(&mut self, column: ColumnId, row: usize, selected: bool) -> bool {
        let is_selection = self
            .tree
            .column(column)
            .is_some_and(|c| matches!(c.kind(), ColumnKind::Selection));
        if !is_selection {
            return false;
        }
        let changed = if selected { self.select(row) } else { self.deselect(row) };
        if changed {
            self.tree.fire_select(column, row, selected);
        }
        changed
    }

    fn replace_selection<F>(&mut self, next: F) -> bool
    where
        F: FnOnce(&BTreeSet<usize>, bool) -> BTreeSet<usize>,
    {
        let multi = self.config().multi_selection;
        let selection = {
            let mut current = self.selection.write();
            let next = next(&*current, multi);
            if next == *current {
                return false;
            }
            *current = next;
            current.iter().copied().collect::<Vec<_>>()
        };
        tracing::trace!(selected = selection.len(), "selection changed");
        self.events().fire(&Event::SelectionChanged { selection });
        self.selection_columns_changed();
        true
    }
}
