//! Structural edits: inserting, moving and removing columns, and layout.

use crate::column::{ColumnId, FLAT_ALL_COLUMNS, FlatColumn, Parent};
use crate::event::{Event, Source};

use super::ColumnTree;

/// Width a stack falls back to once its last child is gone.
const EMPTY_STACK_WIDTH: f64 = crate::column::DEFAULT_WIDTH;

fn source(parent: Parent) -> Source {
    match parent {
        Parent::Column(c) => Source::Column(c),
        Parent::Ranking(r) => Source::Ranking(r),
    }
}

impl ColumnTree {
    /// Insert a detached column into a container at `index` (clamped).
    ///
    /// Returns `false` if the column is attached elsewhere, the parent is not
    /// a container, or the insert would create a cycle.
    pub fn insert(&mut self, parent: Parent, column: ColumnId, index: usize) -> bool {
        match self.columns.get(column) {
            Some(c) if c.parent.is_none() => {}
            _ => return false,
        }
        let index = match parent {
            Parent::Column(p) => {
                if self.is_ancestor(column, p) {
                    return false;
                }
                let Some(composite) = self.columns.get_mut(p).and_then(|c| c.kind.as_composite_mut())
                else {
                    return false;
                };
                let index = index.min(composite.children.len());
                composite.children.insert(index, column);
                index
            }
            Parent::Ranking(r) => {
                let Some(ranking) = self.rankings.get_mut(r) else {
                    return false;
                };
                let index = index.min(ranking.columns.len());
                ranking.columns.insert(index, column);
                index
            }
        };
        if let Some(c) = self.columns.get_mut(column) {
            c.parent = Some(parent);
        }
        if let Parent::Column(p) = parent {
            self.grow_stack(p, column);
        }

        let mut events = vec![Event::AddColumn {
            parent,
            column,
            index,
        }];
        events.extend(Event::dirty_triad(source(parent)));
        self.emit_parent(parent, events);

        if let Parent::Ranking(r) = parent {
            self.auto_sort_on_insert(r, column);
        }
        true
    }

    pub fn push(&mut self, parent: Parent, column: ColumnId) -> bool {
        let len = self.members(parent).len();
        self.insert(parent, column, len)
    }

    /// Insert into a stack so that the new child carries `weight` of the
    /// stack's current width.
    pub fn insert_with_weight(&mut self, stack: ColumnId, column: ColumnId, index: usize, weight: f64) -> bool {
        let Some(stack_col) = self.columns.get(stack) else {
            return false;
        };
        if !stack_col.kind.as_composite().is_some_and(|c| c.is_stack()) {
            return false;
        }
        if !weight.is_nan() && weight < 1.0 && !stack_col.kind.as_composite().is_some_and(|c| c.is_empty()) {
            let width = weight / (1.0 - weight) * stack_col.width;
            if let Some(c) = self.columns.get_mut(column) {
                c.width = width;
            }
        }
        self.insert(Parent::Column(stack), column, index)
    }

    /// Insert `column` right after `reference` in the reference's container.
    pub fn insert_after(&mut self, column: ColumnId, reference: ColumnId) -> bool {
        let Some(parent) = self.columns.get(reference).and_then(|c| c.parent) else {
            return false;
        };
        let Some(index) = self.members(parent).iter().position(|&c| c == reference) else {
            return false;
        };
        self.insert(parent, column, index + 1)
    }

    /// Take a column out of its container without destroying it.
    ///
    /// Returns the former parent and index.
    pub fn detach(&mut self, column: ColumnId) -> Option<(Parent, usize)> {
        let parent = self.columns.get(column)?.parent?;
        let index = match parent {
            Parent::Column(p) => {
                let composite = self.columns.get_mut(p)?.kind.as_composite_mut()?;
                let index = composite.children.iter().position(|&c| c == column)?;
                composite.children.remove(index);
                index
            }
            Parent::Ranking(r) => {
                let ranking = self.rankings.get_mut(r)?;
                let index = ranking.columns.iter().position(|&c| c == column)?;
                ranking.columns.remove(index);
                index
            }
        };
        let width = self.columns.get(column).map_or(0.0, |c| c.width);
        if let Some(c) = self.columns.get_mut(column) {
            c.parent = None;
        }
        if let Parent::Column(p) = parent {
            self.shrink_stack(p, width);
        }

        let mut events = vec![Event::RemoveColumn {
            parent,
            column: Some(column),
            index: Some(index),
        }];
        events.extend(Event::dirty_triad(source(parent)));
        self.emit_parent(parent, events);

        if let Some(ranking) = match parent {
            Parent::Ranking(r) => Some(r),
            Parent::Column(p) => self.find_ranker(p),
        } {
            self.release_criteria(ranking, column);
        }
        Some((parent, index))
    }

    /// Detach and destroy a column with its subtree.
    pub fn remove(&mut self, column: ColumnId) -> bool {
        if self.detach(column).is_none() {
            return false;
        }
        self.destroy(column);
        true
    }

    /// Move an attached or detached column to a new position.
    pub fn move_to(&mut self, column: ColumnId, parent: Parent, index: usize) -> bool {
        if matches!(parent, Parent::Column(p) if self.is_ancestor(column, p)) {
            return false;
        }
        let index = match self.columns.get(column).and_then(|c| c.parent) {
            Some(old) if old == parent => {
                let current = self.members(parent).iter().position(|&c| c == column);
                match current {
                    Some(i) if i < index => index - 1,
                    _ => index,
                }
            }
            _ => index,
        };
        self.detach(column);
        self.insert(parent, column, index)
    }

    /// A stack adopts a new child: the first child defines the stack width,
    /// later ones widen it.
    fn grow_stack(&mut self, stack: ColumnId, child: ColumnId) {
        let child_width = self.columns.get(child).map_or(0.0, |c| c.width);
        let Some(col) = self.columns.get_mut(stack) else {
            return;
        };
        let Some(composite) = col.kind.as_composite() else {
            return;
        };
        if !composite.is_stack() {
            return;
        }
        col.width = if composite.len() == 1 {
            child_width
        } else {
            col.width + child_width
        };
    }

    fn shrink_stack(&mut self, stack: ColumnId, child_width: f64) {
        let Some(col) = self.columns.get_mut(stack) else {
            return;
        };
        let Some(composite) = col.kind.as_composite() else {
            return;
        };
        if !composite.is_stack() {
            return;
        }
        col.width = if composite.is_empty() {
            EMPTY_STACK_WIDTH
        } else {
            (col.width - child_width).max(0.0)
        };
    }

    /// Lay out a column and its descendants.
    ///
    /// Appends `{column, offset, width}` entries for visible columns down to
    /// `levels` below `column` ([`FLAT_ALL_COLUMNS`] for all levels, hidden
    /// columns included) and returns the width taken. Stacks and nested
    /// columns lay their children out side by side with `padding` between
    /// them; other composites overlay their children at their own offset.
    pub fn flatten(&self, column: ColumnId, out: &mut Vec<FlatColumn>, offset: f64, levels: i32, padding: f64) -> f64 {
        let Some(col) = self.columns.get(column) else {
            return 0.0;
        };
        let all = levels <= FLAT_ALL_COLUMNS;
        let width = col.actual_width();
        let composite = match col.kind.as_composite() {
            Some(c) if !c.collapsed() => c,
            _ => {
                if all || !col.is_hidden() {
                    out.push(FlatColumn { column, offset, width });
                }
                return width;
            }
        };

        let mut own = None;
        if levels == 0 || all {
            own = Some(out.len());
            out.push(FlatColumn { column, offset, width });
            if levels == 0 {
                return width;
            }
        }
        let next = if all { levels } else { levels - 1 };

        if !composite.op().is_multi_level() {
            for &child in composite.children() {
                self.flatten(child, out, offset, next, padding);
            }
            return width;
        }
        if composite.is_empty() {
            return width;
        }
        let mut acc = offset;
        for &child in composite.children() {
            let hidden = self.columns.get(child).is_none_or(|c| c.is_hidden());
            if hidden && !all {
                continue;
            }
            let child_width = self.flatten(child, out, acc, next, padding);
            acc += child_width + padding;
        }
        let total = (acc - offset - padding).max(0.0);
        if let Some(i) = own {
            out[i].width = total;
        }
        total
    }

    /// Lay out the top-level columns of a ranking side by side.
    pub fn flatten_ranking(
        &self,
        ranking: crate::ranking::RankingId,
        out: &mut Vec<FlatColumn>,
        offset: f64,
        levels: i32,
        padding: f64,
    ) -> f64 {
        let all = levels <= FLAT_ALL_COLUMNS;
        let mut acc = offset;
        for &c in self.members(Parent::Ranking(ranking)) {
            let hidden = self.columns.get(c).is_none_or(|col| col.is_hidden());
            if hidden && !all {
                continue;
            }
            acc += self.flatten(c, out, acc, levels, padding) + padding;
        }
        (acc - offset - padding).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn stack_of_two(tree: &mut ColumnTree) -> (ColumnId, ColumnId, ColumnId) {
        let stack = composite(tree, "s", "stack");
        let a = number(tree, "a", "a");
        let b = number(tree, "b", "b");
        assert!(tree.push(Parent::Column(stack), a));
        assert!(tree.push(Parent::Column(stack), b));
        (stack, a, b)
    }

    fn width(tree: &ColumnTree, c: ColumnId) -> f64 {
        tree.column(c).unwrap().width()
    }

    #[test]
    fn test_stack_width_follows_children() {
        let mut tree = ColumnTree::new();
        let (stack, a, b) = stack_of_two(&mut tree);
        assert_eq!(width(&tree, stack), 200.0);

        let c = number(&mut tree, "c", "c");
        assert!(tree.insert_with_weight(stack, c, 2, 0.5));
        assert_eq!(width(&tree, c), 200.0);
        assert_eq!(width(&tree, stack), 400.0);

        assert!(tree.remove(a));
        assert_eq!(width(&tree, stack), 300.0);
        assert!(tree.remove(b));
        assert!(tree.remove(c));
        assert_eq!(width(&tree, stack), EMPTY_STACK_WIDTH);
    }

    #[test]
    fn test_insert_rejects_attached_and_cycles() {
        let mut tree = ColumnTree::new();
        let (stack, a, _) = stack_of_two(&mut tree);
        let other = composite(&mut tree, "o", "max");
        assert!(!tree.insert(Parent::Column(other), a, 0));
        assert!(!tree.insert(Parent::Column(a), other, 0));

        assert!(tree.insert(Parent::Column(other), stack, 0));
        assert!(!tree.move_to(other, Parent::Column(stack), 0));
    }

    #[test]
    fn test_insert_after_and_move() {
        let mut tree = ColumnTree::new();
        let r = tree.create_ranking("r");
        let a = number(&mut tree, "a", "a");
        let b = number(&mut tree, "b", "b");
        let c = number(&mut tree, "c", "c");
        tree.push(Parent::Ranking(r), a);
        tree.push(Parent::Ranking(r), b);
        assert!(tree.insert_after(c, a));
        assert_eq!(tree.members(Parent::Ranking(r)), &[a, c, b]);

        assert!(tree.move_to(a, Parent::Ranking(r), 3));
        assert_eq!(tree.members(Parent::Ranking(r)), &[c, b, a]);
        assert_eq!(tree.detach(b), Some((Parent::Ranking(r), 1)));
        assert_eq!(tree.column(b).unwrap().parent(), None);
        assert!(tree.contains(b));
        assert_eq!(tree.detach(b), None);
    }

    #[test]
    fn test_flatten_stack_and_overlay() {
        let mut tree = ColumnTree::new();
        let (stack, a, b) = stack_of_two(&mut tree);
        let mut out = Vec::new();
        let w = tree.flatten(stack, &mut out, 10.0, 1, 5.0);
        assert_eq!(w, 205.0);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], FlatColumn { column: a, offset: 10.0, width: 100.0 });
        assert_eq!(out[1].offset, 115.0);

        let mut all = Vec::new();
        tree.flatten(stack, &mut all, 0.0, FLAT_ALL_COLUMNS, 0.0);
        assert_eq!(all.iter().map(|f| f.column).collect::<Vec<_>>(), vec![stack, a, b]);
        assert_eq!(all[0].width, 200.0);

        let max = composite(&mut tree, "m", "max");
        let c = number(&mut tree, "c", "c");
        tree.push(Parent::Column(max), c);
        let mut overlay = Vec::new();
        tree.flatten(max, &mut overlay, 7.0, 1, 5.0);
        assert_eq!(overlay, vec![FlatColumn { column: c, offset: 7.0, width: 100.0 }]);
    }

    #[test]
    fn test_flatten_skips_hidden_unless_all() {
        let mut tree = ColumnTree::new();
        let (stack, a, _) = stack_of_two(&mut tree);
        tree.column_mut(a).unwrap().width = 0.0;
        let mut out = Vec::new();
        tree.flatten(stack, &mut out, 0.0, 1, 0.0);
        assert_eq!(out.len(), 1);
        let mut all = Vec::new();
        tree.flatten(stack, &mut all, 0.0, FLAT_ALL_COLUMNS, 0.0);
        assert_eq!(all.len(), 3);
    }
}
