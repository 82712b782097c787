//! Sort criteria, grouping and applying computed orders.

use std::cmp::Ordering;

use crate::column::{ColumnId, DataRow, Parent};
use crate::event::{Event, Source};
use crate::group::OrderedGroup;
use crate::ranking::{RankingId, SortCriteria, SortTicket};

use super::ColumnTree;

impl ColumnTree {
    /// Default direction when sorting by a column: ascending for text,
    /// descending for everything else.
    pub fn default_ascending(&self, column: ColumnId) -> bool {
        self.columns
            .get(column)
            .is_some_and(|c| c.kind.is_string_like())
    }

    /// Set the sort criterion of a ranking. The column must belong to it.
    pub fn sort_by(&mut self, ranking: RankingId, column: Option<ColumnId>, ascending: bool) -> bool {
        if let Some(c) = column {
            if self.find_ranker(c) != Some(ranking) {
                return false;
            }
        }
        let new = SortCriteria { column, ascending };
        let old = match self.rankings.get_mut(ranking) {
            Some(r) if r.sort != new => std::mem::replace(&mut r.sort, new),
            _ => return false,
        };
        let source = Source::Ranking(ranking);
        self.emit_ranking(
            ranking,
            [
                Event::SortCriteriaChanged { ranking, old, new },
                Event::DirtyOrder(ranking),
                Event::DirtyHeader(source),
                Event::DirtyValues(source),
                Event::Dirty(source),
            ],
        );
        true
    }

    /// Sort the column's ranking by it.
    pub fn sort_by_me(&mut self, column: ColumnId, ascending: bool) -> bool {
        match self.find_ranker(column) {
            Some(r) => self.sort_by(r, Some(column), ascending),
            None => false,
        }
    }

    /// Flip the direction if `column` is the criterion, else sort by it
    /// with its default direction.
    pub fn toggle_sorting(&mut self, ranking: RankingId, column: ColumnId) -> bool {
        let Some(current) = self.rankings.get(ranking).map(|r| r.sort) else {
            return false;
        };
        if current.column == Some(column) {
            return self.sort_by(ranking, Some(column), !current.ascending);
        }
        let ascending = self.default_ascending(column);
        self.sort_by(ranking, Some(column), ascending)
    }

    pub fn toggle_my_sorting(&mut self, column: ColumnId) -> bool {
        match self.find_ranker(column) {
            Some(r) => self.toggle_sorting(r, column),
            None => false,
        }
    }

    /// Group the rows of a ranking by a column, or stop grouping.
    pub fn group_by(&mut self, ranking: RankingId, column: Option<ColumnId>) -> bool {
        if let Some(c) = column {
            if self.find_ranker(c) != Some(ranking) {
                return false;
            }
        }
        match self.rankings.get_mut(ranking) {
            Some(r) if r.group_by != column => r.group_by = column,
            _ => return false,
        }
        self.emit_ranking(
            ranking,
            [
                Event::GroupsChanged { ranking },
                Event::DirtyOrder(ranking),
                Event::DirtyValues(Source::Ranking(ranking)),
                Event::Dirty(Source::Ranking(ranking)),
            ],
        );
        true
    }

    /// The first data (non-support) top-level column of a ranking other than `except`.
    fn first_sortable(&self, ranking: RankingId, except: Option<ColumnId>) -> Option<ColumnId> {
        self.members(Parent::Ranking(ranking))
            .iter()
            .copied()
            .find(|&c| Some(c) != except && self.columns.get(c).is_some_and(|col| !col.is_support()))
    }

    pub(crate) fn auto_sort_on_insert(&mut self, ranking: RankingId, column: ColumnId) {
        let unsorted = self.rankings.get(ranking).is_some_and(|r| r.sort.column.is_none());
        let sortable = self.columns.get(column).is_some_and(|c| !c.is_support());
        if unsorted && sortable {
            let ascending = self.default_ascending(column);
            self.sort_by(ranking, Some(column), ascending);
        }
    }

    /// `removed` left `ranking`: drop it (or anything inside it) as sort or
    /// group criterion, falling back to the next sortable column.
    pub(crate) fn release_criteria(&mut self, ranking: RankingId, removed: ColumnId) {
        let Some(r) = self.rankings.get(ranking) else {
            return;
        };
        let (sort, group) = (r.sort.column, r.group_by);
        if sort.is_some_and(|s| self.is_ancestor(removed, s)) {
            let next = self.first_sortable(ranking, Some(removed));
            let ascending = next.is_some_and(|n| self.default_ascending(n));
            self.sort_by(ranking, next, ascending);
        }
        if group.is_some_and(|g| self.is_ancestor(removed, g)) {
            self.group_by(ranking, None);
        }
    }

    /// Compare two rows under a ranking's criterion, direction applied.
    /// Without a sort column every pair is equal.
    pub fn compare_rows(&self, ranking: RankingId, a: &DataRow<'_>, b: &DataRow<'_>) -> Ordering {
        let Some(sort) = self.rankings.get(ranking).map(|r| r.sort) else {
            return Ordering::Equal;
        };
        let Some(column) = sort.column else {
            return Ordering::Equal;
        };
        let ord = self.compare(column, a, b);
        if sort.ascending { ord } else { ord.reverse() }
    }

    /// Start a sort: any result of an earlier ticket becomes stale.
    pub fn begin_sort(&mut self, ranking: RankingId) -> Option<SortTicket> {
        self.rankings.get_mut(ranking).map(|r| r.next_ticket(ranking))
    }

    /// Install a computed order unless a newer sort was started since.
    pub fn apply_sort(&mut self, ticket: SortTicket, groups: Vec<OrderedGroup>) -> bool {
        let Some(ranking) = self.rankings.get_mut(ticket.ranking) else {
            return false;
        };
        if ranking.generation != ticket.generation {
            tracing::debug!(
                ranking = %ranking.id,
                stale = ticket.generation,
                current = ranking.generation,
                "discarding stale sort result"
            );
            return false;
        }
        let order = ranking.set_groups(groups);
        let id = ticket.ranking;
        let source = Source::Ranking(id);
        self.emit_ranking(
            id,
            [
                Event::OrderChanged { ranking: id, order },
                Event::GroupsChanged { ranking: id },
                Event::DirtyValues(source),
                Event::Dirty(source),
            ],
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::column::ColumnDesc;
    use crate::event::EventKind;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    #[test]
    fn test_first_data_column_becomes_criterion() {
        let mut tree = ColumnTree::new();
        let r = tree.create_ranking("r");
        let rank = leaf(&mut tree, "rank", ColumnDesc::new("rank", "Rank"));
        let name = leaf(&mut tree, "n", ColumnDesc::field("string", "name"));
        let a = number(&mut tree, "a", "a");
        tree.push(Parent::Ranking(r), rank);
        assert_eq!(tree.ranking(r).unwrap().sort_column(), None);
        tree.push(Parent::Ranking(r), name);
        tree.push(Parent::Ranking(r), a);
        let sort = tree.ranking(r).unwrap().sort_criteria();
        assert_eq!(sort.column, Some(name));
        assert!(sort.ascending);
    }

    #[test]
    fn test_removing_sort_column_picks_next() {
        let mut tree = ColumnTree::new();
        let r = tree.create_ranking("r");
        let a = number(&mut tree, "a", "a");
        let b = number(&mut tree, "b", "b");
        tree.push(Parent::Ranking(r), a);
        tree.push(Parent::Ranking(r), b);
        assert!(tree.remove(a));
        assert_eq!(tree.ranking(r).unwrap().sort_criteria(), SortCriteria { column: Some(b), ascending: false });
        assert!(tree.remove(b));
        assert_eq!(tree.ranking(r).unwrap().sort_column(), None);
    }

    #[test]
    fn test_toggle_sorting() {
        let mut tree = ColumnTree::new();
        let r = tree.create_ranking("r");
        let a = number(&mut tree, "a", "a");
        let b = number(&mut tree, "b", "b");
        tree.push(Parent::Ranking(r), a);
        tree.push(Parent::Ranking(r), b);
        assert!(tree.toggle_my_sorting(a));
        assert!(tree.ranking(r).unwrap().is_ascending());
        assert!(tree.toggle_sorting(r, b));
        assert_eq!(tree.ranking(r).unwrap().sort_criteria(), SortCriteria { column: Some(b), ascending: false });

        let loose = number(&mut tree, "c", "c");
        assert!(!tree.sort_by(r, Some(loose), true));
        assert!(!tree.sort_by_me(loose, true));
    }

    #[test]
    fn test_sort_by_is_idempotent_and_fires_dirty_order() {
        let mut tree = ColumnTree::new();
        let r = tree.create_ranking("r");
        let a = number(&mut tree, "a", "a");
        tree.push(Parent::Ranking(r), a);
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = hits.clone();
        tree.ranking(r).unwrap().events().on(&[EventKind::DirtyOrder], move |_| {
            sink.fetch_add(1, AtomicOrdering::SeqCst);
        });
        assert!(tree.sort_by(r, Some(a), true));
        assert!(!tree.sort_by(r, Some(a), true));
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_compare_rows_direction() {
        let mut tree = ColumnTree::new();
        let r = tree.create_ranking("r");
        let a = number(&mut tree, "a", "a");
        tree.push(Parent::Ranking(r), a);
        let (x, y) = (json!({"a": 1}), json!({"a": 2}));
        let (x, y) = (DataRow::new(&x, 0), DataRow::new(&y, 1));
        assert_eq!(tree.compare_rows(r, &x, &y), Ordering::Greater);
        tree.sort_by(r, Some(a), true);
        assert_eq!(tree.compare_rows(r, &x, &y), Ordering::Less);
    }

    #[test]
    fn test_stale_tickets_are_discarded() {
        let mut tree = ColumnTree::new();
        let r = tree.create_ranking("r");
        let first = tree.begin_sort(r).unwrap();
        let second = tree.begin_sort(r).unwrap();
        assert!(tree.apply_sort(second, vec![OrderedGroup::ungrouped(vec![2, 0, 1])]));
        assert!(!tree.apply_sort(first, vec![OrderedGroup::ungrouped(vec![0, 1, 2])]));
        assert_eq!(&*tree.ranking(r).unwrap().order(), &[2, 0, 1]);
    }
}
