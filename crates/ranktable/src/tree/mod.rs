//! The column arena.
//!
//! [`ColumnTree`] owns every column and ranking of a provider. Columns refer
//! to their owner through a non-owning [`Parent`] handle and containers hold
//! ordered child handles; [`ColumnTree::insert`] and [`ColumnTree::detach`]
//! are the only operations that change that relationship and keep both sides
//! consistent.
//!
//! Change notifications are fired synchronously. Events that bubble
//! (`dirty`, `dirtyHeader`, `dirtyValues`, `filterChanged`) are re-fired on
//! every ancestor up to the ranking, which derives `dirtyOrder` from them.

mod dump;
mod setters;
mod sorting;
mod structure;
mod values;

pub use dump::{ColumnDump, RankingDump, RestoreContext};

use slotmap::SlotMap;

use crate::column::{Column, ColumnDesc, ColumnId, ColumnKind, Parent};
use crate::event::{Event, EventKind};
use crate::ranking::{Ranking, RankingId};

#[derive(Debug, Default)]
pub struct ColumnTree {
    columns: SlotMap<ColumnId, Column>,
    rankings: SlotMap<RankingId, Ranking>,
}

impl ColumnTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a detached column to the arena.
    pub fn create(&mut self, id: impl Into<String>, desc: ColumnDesc, kind: ColumnKind) -> ColumnId {
        self.columns.insert(Column::new(id, desc, kind))
    }

    pub fn create_ranking(&mut self, id: impl Into<String>) -> RankingId {
        self.rankings.insert(Ranking::new(id))
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(id)
    }

    #[cfg(test)]
    pub(crate) fn column_mut(&mut self, id: ColumnId) -> Option<&mut Column> {
        self.columns.get_mut(id)
    }

    pub fn ranking(&self, id: RankingId) -> Option<&Ranking> {
        self.rankings.get(id)
    }

    pub(crate) fn ranking_mut(&mut self, id: RankingId) -> Option<&mut Ranking> {
        self.rankings.get_mut(id)
    }

    pub fn contains(&self, id: ColumnId) -> bool {
        self.columns.contains_key(id)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn ranking_count(&self) -> usize {
        self.rankings.len()
    }

    /// Direct children of a composite; empty for leaves.
    pub fn children(&self, id: ColumnId) -> &[ColumnId] {
        self.columns
            .get(id)
            .and_then(|c| c.kind.as_composite())
            .map_or(&[], |c| c.children())
    }

    /// The child list of a container.
    pub fn members(&self, parent: Parent) -> &[ColumnId] {
        match parent {
            Parent::Column(id) => self.children(id),
            Parent::Ranking(id) => self.rankings.get(id).map_or(&[], |r| r.columns()),
        }
    }

    /// `id` and every column below it, parents before children.
    pub fn descendants(&self, id: ColumnId) -> Vec<ColumnId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.columns.contains_key(current) {
                continue;
            }
            out.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        out
    }

    /// Every column of a ranking at any depth.
    pub fn ranking_columns(&self, ranking: RankingId) -> Vec<ColumnId> {
        self.members(Parent::Ranking(ranking))
            .iter()
            .flat_map(|&c| self.descendants(c))
            .collect()
    }

    /// Whether `ancestor` is `id` or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: ColumnId, id: ColumnId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = match self.columns.get(c).and_then(|col| col.parent) {
                Some(Parent::Column(p)) => Some(p),
                _ => None,
            };
        }
        false
    }

    /// The ranking a column belongs to, found by walking parent handles.
    pub fn find_ranker(&self, id: ColumnId) -> Option<RankingId> {
        let mut parent = self.columns.get(id)?.parent;
        loop {
            match parent? {
                Parent::Ranking(r) => return Some(r),
                Parent::Column(p) => parent = self.columns.get(p)?.parent,
            }
        }
    }

    /// Fully qualified id: the ranking id and every ancestor id joined by `_`.
    pub fn fqid(&self, id: ColumnId) -> Option<String> {
        let column = self.columns.get(id)?;
        let prefix = match column.parent {
            None => return Some(column.id.clone()),
            Some(Parent::Column(p)) => self.fqid(p)?,
            Some(Parent::Ranking(r)) => self.rankings.get(r)?.id.clone(),
        };
        Some(format!("{prefix}_{}", column.id))
    }

    /// Find a column by its short id.
    pub fn find_by_id(&self, id: &str) -> Option<ColumnId> {
        self.columns
            .iter()
            .find(|(_, c)| c.id == id)
            .map(|(handle, _)| handle)
    }

    pub fn find_by_fqid(&self, fqid: &str) -> Option<ColumnId> {
        self.columns
            .keys()
            .find(|&c| self.fqid(c).as_deref() == Some(fqid))
    }

    /// Fire on a column and bubble to its ancestors and ranking.
    pub(crate) fn emit(&self, id: ColumnId, event: Event) {
        let Some(column) = self.columns.get(id) else {
            return;
        };
        column.events.fire(&event);
        if !event.kind().bubbles() {
            return;
        }
        let mut path = vec![id];
        let mut parent = column.parent;
        while let Some(p) = parent {
            match p {
                Parent::Column(c) => {
                    let Some(ancestor) = self.columns.get(c) else {
                        return;
                    };
                    ancestor.events.fire(&event);
                    path.push(c);
                    parent = ancestor.parent;
                }
                Parent::Ranking(r) => {
                    self.ranking_receive(r, &event, &path);
                    return;
                }
            }
        }
    }

    pub(crate) fn emit_all(&self, id: ColumnId, events: impl IntoIterator<Item = Event>) {
        for event in events {
            self.emit(id, event);
        }
    }

    /// Fire on a ranking only.
    pub(crate) fn emit_ranking(&self, id: RankingId, events: impl IntoIterator<Item = Event>) {
        if let Some(ranking) = self.rankings.get(id) {
            for event in events {
                ranking.events.fire(&event);
            }
        }
    }

    /// Fire on a container, bubbling when it is a column.
    pub(crate) fn emit_parent(&self, parent: Parent, events: impl IntoIterator<Item = Event>) {
        match parent {
            Parent::Column(c) => self.emit_all(c, events),
            Parent::Ranking(r) => self.emit_ranking(r, events),
        }
    }

    /// A bubbled event reaching a ranking. Filter changes anywhere and value
    /// changes passing through the sort or group column invalidate the order.
    fn ranking_receive(&self, id: RankingId, event: &Event, path: &[ColumnId]) {
        let Some(ranking) = self.rankings.get(id) else {
            return;
        };
        ranking.events.fire(event);
        let affects_order = match event.kind() {
            EventKind::FilterChanged => true,
            EventKind::DirtyValues => path.iter().any(|c| {
                Some(*c) == ranking.sort.column || Some(*c) == ranking.group_by
            }),
            _ => false,
        };
        if affects_order {
            ranking.events.fire(&Event::DirtyOrder(id));
        }
    }

    /// Drop a detached column and its subtree, releasing their listeners.
    pub(crate) fn destroy(&mut self, id: ColumnId) {
        for c in self.descendants(id) {
            if let Some(column) = self.columns.remove(c) {
                column.events.off_all();
            }
        }
    }

    /// Drop a ranking with all its columns.
    pub fn destroy_ranking(&mut self, id: RankingId) -> bool {
        let Some(ranking) = self.rankings.remove(id) else {
            return false;
        };
        for c in ranking.columns {
            self.destroy(c);
        }
        ranking.events.off_all();
        true
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::column::ColumnDesc;

    pub fn leaf(tree: &mut ColumnTree, id: &str, desc: ColumnDesc) -> ColumnId {
        let kind = ColumnKind::from_desc(&desc).expect("known type");
        tree.create(id, desc, kind)
    }

    pub fn number(tree: &mut ColumnTree, id: &str, field: &str) -> ColumnId {
        leaf(tree, id, ColumnDesc::field("number", field).with_domain([0.0, 100.0]))
    }

    pub fn composite(tree: &mut ColumnTree, id: &str, ty: &str) -> ColumnId {
        leaf(tree, id, ColumnDesc::new(ty, id))
    }
}
