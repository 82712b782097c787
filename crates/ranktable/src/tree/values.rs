//! Per-row evaluation: values, labels, colors, comparison, filtering, groups.

use std::cmp::Ordering;

use crate::column::composite::normalize_weights;
use crate::column::value::{compare_numbers, json_number};
use crate::column::{CellValue, ColumnId, ColumnKind, DataRow, Parent};
use crate::group::Group;
use crate::ranking::RankingId;

use super::ColumnTree;

impl ColumnTree {
    /// The typed value of a cell. Unknown columns are missing.
    pub fn value(&self, id: ColumnId, row: &DataRow<'_>) -> CellValue {
        let Some(col) = self.columns.get(id) else {
            return CellValue::Missing;
        };
        match &col.kind {
            ColumnKind::Dummy => CellValue::Missing,
            ColumnKind::Rank => self
                .rank(id, row.index)
                .map_or(CellValue::Missing, |r| CellValue::Number(r as f64)),
            ColumnKind::Selection => CellValue::Bool(self.is_selected(id, row)),
            ColumnKind::Annotate(a) => CellValue::Text(a.text(&col.raw(row), row.index)),
            ColumnKind::Composite(c) if c.op().is_number() => CellValue::Number(self.composite_number(id, row).0),
            ColumnKind::Composite(c) => CellValue::Text(
                c.children()
                    .iter()
                    .map(|&child| self.value(child, row).to_string())
                    .collect::<Vec<_>>()
                    .join(";"),
            ),
            kind => match kind.leaf() {
                Some(leaf) => leaf.value(&col.raw(row)),
                None => CellValue::Missing,
            },
        }
    }

    /// Numeric view of a cell: NaN when the column is not numeric.
    pub fn number(&self, id: ColumnId, row: &DataRow<'_>) -> f64 {
        self.value(id, row).as_number()
    }

    /// Unmapped number of a number column, with its missing value substituted.
    pub fn raw_number(&self, id: ColumnId, row: &DataRow<'_>) -> f64 {
        match self.columns.get(id).map(|c| (&c.kind, c)) {
            Some((ColumnKind::Number(n), col)) => n.raw_value(&col.raw(row)),
            Some((_, col)) => json_number(&col.raw(row)).unwrap_or(f64::NAN),
            None => f64::NAN,
        }
    }

    /// Display text of a cell.
    pub fn label(&self, id: ColumnId, row: &DataRow<'_>) -> String {
        let Some(col) = self.columns.get(id) else {
            return String::new();
        };
        match &col.kind {
            ColumnKind::Dummy => String::new(),
            ColumnKind::Rank => self.rank(id, row.index).map(|r| r.to_string()).unwrap_or_default(),
            ColumnKind::Selection => self.is_selected(id, row).to_string(),
            ColumnKind::Annotate(a) => a.text(&col.raw(row), row.index),
            ColumnKind::Composite(c) if c.op().is_number() => c.format(self.composite_number(id, row).0),
            ColumnKind::Composite(c) => c
                .children()
                .iter()
                .map(|&child| self.label(child, row))
                .collect::<Vec<_>>()
                .join(";"),
            kind => match kind.leaf() {
                Some(leaf) => leaf.label(&col.raw(row)),
                None => String::new(),
            },
        }
    }

    /// Cell color: per-value colors where the type has them, the color of
    /// the deciding child for min and max, the column color otherwise.
    pub fn color(&self, id: ColumnId, row: &DataRow<'_>) -> Option<String> {
        let col = self.columns.get(id)?;
        match &col.kind {
            ColumnKind::Composite(c) => {
                if let (_, Some(decider)) = self.composite_number(id, row) {
                    if let Some(&child) = c.children().get(decider) {
                        return self.color(child, row);
                    }
                }
                Some(col.color().to_string())
            }
            kind => kind
                .leaf()
                .and_then(|leaf| leaf.color(&col.raw(row)))
                .or_else(|| Some(col.color().to_string())),
        }
    }

    /// Compare two rows under a column.
    pub fn compare(&self, id: ColumnId, a: &DataRow<'_>, b: &DataRow<'_>) -> Ordering {
        let Some(col) = self.columns.get(id) else {
            return Ordering::Equal;
        };
        match &col.kind {
            ColumnKind::Dummy => Ordering::Equal,
            ColumnKind::Rank => compare_numbers(self.number(id, a), self.number(id, b)),
            ColumnKind::Selection => self.is_selected(id, a).cmp(&self.is_selected(id, b)),
            ColumnKind::Annotate(an) => crate::column::string::compare_strings(
                &an.text(&col.raw(a), a.index),
                &an.text(&col.raw(b), b.index),
            ),
            ColumnKind::Composite(c) if c.op().is_number() => {
                compare_numbers(self.composite_number(id, a).0, self.composite_number(id, b).0)
            }
            ColumnKind::Composite(c) => {
                for &child in c.children() {
                    match self.compare(child, a, b) {
                        Ordering::Equal => continue,
                        other => return other,
                    }
                }
                Ordering::Equal
            }
            kind => match kind.leaf() {
                Some(leaf) => leaf.compare(&col.raw(a), &col.raw(b)),
                None => Ordering::Equal,
            },
        }
    }

    /// Whether the column or any descendant has an active filter.
    pub fn is_filtered(&self, id: ColumnId) -> bool {
        let Some(col) = self.columns.get(id) else {
            return false;
        };
        match &col.kind {
            ColumnKind::Composite(c) => c.children().iter().any(|&child| self.is_filtered(child)),
            ColumnKind::Annotate(a) => a.string().filter().is_some(),
            kind => kind.filterable().is_some_and(|f| f.is_filtered()),
        }
    }

    /// Row predicate: composites accept a row iff every child does.
    pub fn accepts(&self, id: ColumnId, row: &DataRow<'_>) -> bool {
        let Some(col) = self.columns.get(id) else {
            return true;
        };
        match &col.kind {
            ColumnKind::Composite(c) => c.children().iter().all(|&child| self.accepts(child, row)),
            ColumnKind::Annotate(a) => a.accepts(&col.raw(row), row.index),
            kind => kind.filterable().is_none_or(|f| f.accepts(&col.raw(row))),
        }
    }

    /// Group of a row under a column; types without groups use the default group.
    pub fn group(&self, id: ColumnId, row: &DataRow<'_>) -> Group {
        self.columns
            .get(id)
            .and_then(|col| col.kind.leaf().and_then(|leaf| leaf.group(&col.raw(row))))
            .unwrap_or_default()
    }

    /// Normalized weights of a composite's children (their share of the
    /// summed child width).
    pub fn weights(&self, id: ColumnId) -> Vec<f64> {
        let widths: Vec<f64> = self
            .children(id)
            .iter()
            .map(|&c| self.columns.get(c).map_or(0.0, |col| col.width))
            .collect();
        normalize_weights(&widths)
    }

    pub fn ranking_is_filtered(&self, ranking: RankingId) -> bool {
        self.members(Parent::Ranking(ranking))
            .iter()
            .any(|&c| self.is_filtered(c))
    }

    /// A row passes a ranking iff it passes every top-level column.
    pub fn ranking_accepts(&self, ranking: RankingId, row: &DataRow<'_>) -> bool {
        self.members(Parent::Ranking(ranking))
            .iter()
            .all(|&c| self.accepts(c, row))
    }

    fn composite_number(&self, id: ColumnId, row: &DataRow<'_>) -> (f64, Option<usize>) {
        let Some(c) = self.columns.get(id).and_then(|col| col.kind.as_composite()) else {
            return (f64::NAN, None);
        };
        let values: Vec<f64> = c.children().iter().map(|&child| self.number(child, row)).collect();
        c.combine(&values, &self.weights(id))
    }

    /// One-based rank of a row in the column's ranking.
    fn rank(&self, id: ColumnId, row: usize) -> Option<usize> {
        let ranking = self.rankings.get(self.find_ranker(id)?)?;
        ranking.rank_of(row).map(|r| r + 1)
    }

    fn is_selected(&self, id: ColumnId, row: &DataRow<'_>) -> bool {
        self.columns
            .get(id)
            .is_some_and(|col| col.raw(row).as_bool().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::column::ColumnDesc;
    use crate::column::number::NumberFilter;
    use serde_json::json;

    fn rows() -> Vec<serde_json::Value> {
        vec![
            json!({"a": 10, "b": 90, "name": "x"}),
            json!({"a": 80, "b": 20, "name": "y"}),
            json!({"a": null, "b": 40, "name": "z"}),
        ]
    }

    #[test]
    fn test_stack_value_is_weighted() {
        let mut tree = ColumnTree::new();
        let stack = composite(&mut tree, "s", "stack");
        let a = number(&mut tree, "a", "a");
        let b = number(&mut tree, "b", "b");
        tree.push(Parent::Column(stack), a);
        tree.push(Parent::Column(stack), b);
        tree.column_mut(b).unwrap().width = 300.0;
        tree.column_mut(stack).unwrap().width = 400.0;

        let data = rows();
        let v = tree.number(stack, &DataRow::new(&data[0], 0));
        assert!((v - (0.1 * 0.25 + 0.9 * 0.75)).abs() < 1e-9);
        assert_eq!(tree.weights(stack), vec![0.25, 0.75]);
        assert_eq!(tree.label(stack, &DataRow::new(&data[0], 0)), "0.700");
    }

    #[test]
    fn test_max_color_follows_deciding_child() {
        let mut tree = ColumnTree::new();
        let max = composite(&mut tree, "m", "max");
        let mut desc_a = ColumnDesc::field("number", "a").with_domain([0.0, 100.0]);
        desc_a.color = Some("red".into());
        let mut desc_b = ColumnDesc::field("number", "b").with_domain([0.0, 100.0]);
        desc_b.color = Some("blue".into());
        let a = leaf(&mut tree, "a", desc_a);
        let b = leaf(&mut tree, "b", desc_b);
        tree.push(Parent::Column(max), a);
        tree.push(Parent::Column(max), b);

        let data = rows();
        assert_eq!(tree.color(max, &DataRow::new(&data[0], 0)).as_deref(), Some("blue"));
        assert_eq!(tree.color(max, &DataRow::new(&data[1], 1)).as_deref(), Some("red"));
    }

    #[test]
    fn test_nested_compares_lexicographically() {
        let mut tree = ColumnTree::new();
        let nested = composite(&mut tree, "n", "nested");
        let name = leaf(&mut tree, "name", ColumnDesc::field("string", "name"));
        let a = number(&mut tree, "a", "a");
        tree.push(Parent::Column(nested), name);
        tree.push(Parent::Column(nested), a);

        let x = json!({"name": "same", "a": 1});
        let y = json!({"name": "same", "a": 2});
        assert_eq!(
            tree.compare(nested, &DataRow::new(&x, 0), &DataRow::new(&y, 1)),
            Ordering::Less
        );
        assert_eq!(tree.label(nested, &DataRow::new(&x, 0)), "same;1.00");
    }

    #[test]
    fn test_composite_filter_is_conjunction() {
        let mut tree = ColumnTree::new();
        let stack = composite(&mut tree, "s", "stack");
        let a = number(&mut tree, "a", "a");
        let b = number(&mut tree, "b", "b");
        tree.push(Parent::Column(stack), a);
        tree.push(Parent::Column(stack), b);
        assert!(!tree.is_filtered(stack));

        if let ColumnKind::Number(n) = &mut tree.column_mut(a).unwrap().kind {
            n.set_filter(NumberFilter::between(50.0, f64::NAN));
        }
        assert!(tree.is_filtered(stack));
        let data = rows();
        assert!(!tree.accepts(stack, &DataRow::new(&data[0], 0)));
        assert!(tree.accepts(stack, &DataRow::new(&data[1], 1)));
    }

    #[test]
    fn test_missing_composite_value_uses_missing_value() {
        let mut tree = ColumnTree::new();
        let mean = leaf(&mut tree, "m", ColumnDesc::new("mean", "m"));
        let data = rows();
        assert_eq!(tree.number(mean, &DataRow::new(&data[0], 0)), 0.0);
    }
}
