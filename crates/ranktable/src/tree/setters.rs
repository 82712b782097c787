//! Column state changes. Every setter is a no-op returning `false` when the
//! new state equals the old one, and fires nothing in that case.

use crate::column::categorical::CategoricalFilter;
use crate::column::composite::{adapt_factor, distribute_weights};
use crate::column::date::DateFilter;
use crate::column::number::NumberFilter;
use crate::column::string::StringFilter;
use crate::column::{ColumnId, ColumnKind, ColumnMetaData, Parent};
use crate::event::{Event, Source};
use crate::mapping::MappingFunction;

use super::ColumnTree;

fn values_changed(id: ColumnId) -> [Event; 2] {
    [Event::DirtyValues(Source::Column(id)), Event::Dirty(Source::Column(id))]
}

fn filter_changed(id: ColumnId) -> [Event; 3] {
    [
        Event::FilterChanged { column: id },
        Event::DirtyValues(Source::Column(id)),
        Event::Dirty(Source::Column(id)),
    ]
}

impl ColumnTree {
    /// Change a column's width. Within a stack the siblings are rescaled so
    /// the stack keeps its width; setting a stack's width rescales its children.
    pub fn set_width(&mut self, id: ColumnId, width: f64) -> bool {
        let width = width.max(0.0);
        let Some(old) = self.columns.get(id).map(|c| c.width) else {
            return false;
        };
        if old == width {
            return false;
        }
        let is_stack = self.is_stack(id);
        self.set_width_silently(id, width);
        if is_stack && old > 0.0 {
            let factor = width / old;
            for child in self.children(id).to_vec() {
                let w = self.columns.get(child).map_or(0.0, |c| c.width);
                self.set_width_silently(child, w * factor);
            }
        }
        self.fire_width_changed(id, old, width);

        if let Some(Parent::Column(parent)) = self.columns.get(id).and_then(|c| c.parent) {
            if self.is_stack(parent) {
                self.adapt_width_change(parent, id, old, width);
            }
        }
        true
    }

    fn set_width_silently(&mut self, id: ColumnId, width: f64) {
        if let Some(c) = self.columns.get_mut(id) {
            c.width = width;
        }
    }

    fn fire_width_changed(&self, id: ColumnId, old: f64, new: f64) {
        let mut events = vec![Event::WidthChanged { column: id, old, new }];
        events.extend(Event::dirty_triad(Source::Column(id)));
        self.emit_all(id, events);
    }

    fn is_stack(&self, id: ColumnId) -> bool {
        self.columns
            .get(id)
            .and_then(|c| c.kind.as_composite())
            .is_some_and(|c| c.is_stack())
    }

    /// A stack child changed width from `old` to `new`: rescale the other
    /// children so the stack width stays constant.
    fn adapt_width_change(&mut self, stack: ColumnId, child: ColumnId, old: f64, new: f64) {
        let Some(full) = self.columns.get(stack).map(|c| c.width) else {
            return;
        };
        let old_weights = self.weights(stack);
        let others: Vec<ColumnId> = self.children(stack).iter().copied().filter(|&c| c != child).collect();
        let others_total: f64 = others
            .iter()
            .map(|&c| self.columns.get(c).map_or(0.0, |col| col.width))
            .sum();

        let factor = if full > 0.0 {
            adapt_factor(old / full, (new - old) / full)
        } else {
            None
        };
        match factor {
            // a child wider than the whole stack grows the stack instead
            Some(factor) if others_total > 0.0 && factor >= 0.0 => {
                for c in others {
                    let w = self.columns.get(c).map_or(0.0, |col| col.width);
                    self.set_width_silently(c, w * factor);
                }
            }
            _ => {
                let sum = others_total + new;
                self.set_width_silently(stack, sum);
            }
        }
        let new_weights = self.weights(stack);
        let mut events = vec![Event::WeightsChanged {
            column: stack,
            old: old_weights,
            new: new_weights,
        }];
        events.extend(Event::dirty_triad(Source::Column(stack)));
        self.emit_all(stack, events);
    }

    /// Set stack weights. See [`distribute_weights`] for how lists of a
    /// different length are handled.
    pub fn set_weights(&mut self, stack: ColumnId, weights: &[f64]) -> bool {
        if !self.is_stack(stack) {
            return false;
        }
        let Some(total) = self.columns.get(stack).map(|c| c.width) else {
            return false;
        };
        let children = self.children(stack).to_vec();
        let widths = distribute_weights(weights, children.len(), total);
        let unchanged = children.iter().zip(&widths).all(|(&c, &w)| {
            self.columns.get(c).is_some_and(|col| (col.width - w).abs() < 1e-9)
        });
        if unchanged {
            return false;
        }
        let old = self.weights(stack);
        for (c, w) in children.into_iter().zip(widths) {
            self.set_width_silently(c, w);
        }
        let new = self.weights(stack);
        let mut events = vec![Event::WeightsChanged { column: stack, old, new }];
        events.extend(Event::dirty_triad(Source::Column(stack)));
        self.emit_all(stack, events);
        true
    }

    pub fn set_compressed(&mut self, id: ColumnId, compressed: bool) -> bool {
        match self.columns.get_mut(id) {
            Some(c) if c.compressed != compressed => c.compressed = compressed,
            _ => return false,
        }
        let mut events = vec![Event::CompressChanged { column: id, compressed }];
        events.extend(Event::dirty_triad(Source::Column(id)));
        self.emit_all(id, events);
        true
    }

    pub fn set_collapsed(&mut self, id: ColumnId, collapsed: bool) -> bool {
        let changed = self
            .columns
            .get_mut(id)
            .and_then(|c| c.kind.as_composite_mut())
            .is_some_and(|c| c.set_collapsed(collapsed));
        if changed {
            let mut events = vec![Event::CollapseChanged { column: id, collapsed }];
            events.extend(Event::dirty_triad(Source::Column(id)));
            self.emit_all(id, events);
        }
        changed
    }

    pub fn set_metadata(&mut self, id: ColumnId, meta: ColumnMetaData) -> bool {
        let old = match self.columns.get_mut(id) {
            Some(c) if c.meta != meta => std::mem::replace(&mut c.meta, meta.clone()),
            _ => return false,
        };
        let mut events = Vec::new();
        if old.label != meta.label {
            events.push(Event::LabelChanged {
                column: id,
                old: old.clone(),
                new: meta.clone(),
            });
        }
        events.push(Event::MetaDataChanged { column: id, old, new: meta });
        events.push(Event::DirtyHeader(Source::Column(id)));
        events.push(Event::Dirty(Source::Column(id)));
        self.emit_all(id, events);
        true
    }

    pub fn set_label(&mut self, id: ColumnId, label: impl Into<String>) -> bool {
        let Some(mut meta) = self.columns.get(id).map(|c| c.meta.clone()) else {
            return false;
        };
        meta.label = label.into();
        self.set_metadata(id, meta)
    }

    /// Filter of a string, link or annotate column.
    pub fn set_string_filter(&mut self, id: ColumnId, filter: Option<StringFilter>) -> bool {
        self.change_filter(id, |kind| kind.as_string_mut().map(|s| s.set_filter(filter)))
    }

    pub fn set_number_filter(&mut self, id: ColumnId, filter: NumberFilter) -> bool {
        self.change_filter(id, |kind| match kind {
            ColumnKind::Number(n) => Some(n.set_filter(filter)),
            _ => None,
        })
    }

    pub fn set_boolean_filter(&mut self, id: ColumnId, filter: Option<bool>) -> bool {
        self.change_filter(id, |kind| match kind {
            ColumnKind::Boolean(b) => Some(b.set_filter(filter)),
            _ => None,
        })
    }

    pub fn set_date_filter(&mut self, id: ColumnId, filter: DateFilter) -> bool {
        self.change_filter(id, |kind| match kind {
            ColumnKind::Date(d) => Some(d.set_filter(filter)),
            _ => None,
        })
    }

    /// Filter of a categorical or ordinal column.
    pub fn set_categorical_filter(&mut self, id: ColumnId, filter: Option<CategoricalFilter>) -> bool {
        self.change_filter(id, |kind| match kind {
            ColumnKind::Categorical(c) => Some(c.set_filter(filter)),
            ColumnKind::Ordinal(c) => Some(c.set_filter(filter)),
            _ => None,
        })
    }

    fn change_filter(&mut self, id: ColumnId, apply: impl FnOnce(&mut ColumnKind) -> Option<bool>) -> bool {
        let changed = self
            .columns
            .get_mut(id)
            .and_then(|c| apply(&mut c.kind))
            .unwrap_or(false);
        if changed {
            self.emit_all(id, filter_changed(id));
        }
        changed
    }

    pub fn set_mapping(&mut self, id: ColumnId, mapping: MappingFunction) -> bool {
        self.change_mapping(id, |kind| match kind {
            ColumnKind::Number(n) => Some(n.set_mapping(mapping)),
            _ => None,
        })
    }

    /// Numbers of an ordinal column's categories.
    pub fn set_ordinal_mapping(&mut self, id: ColumnId, values: Vec<f64>) -> bool {
        self.change_mapping(id, |kind| match kind {
            ColumnKind::Ordinal(o) => Some(o.set_mapping(values)),
            _ => None,
        })
    }

    fn change_mapping(&mut self, id: ColumnId, apply: impl FnOnce(&mut ColumnKind) -> Option<bool>) -> bool {
        let changed = self
            .columns
            .get_mut(id)
            .and_then(|c| apply(&mut c.kind))
            .unwrap_or(false);
        if changed {
            let mut events = vec![Event::MappingChanged { column: id }];
            events.extend(Event::dirty_triad(Source::Column(id)));
            self.emit_all(id, events);
        }
        changed
    }

    /// Missing value of a number column or a numeric composite.
    pub fn set_missing_value(&mut self, id: ColumnId, value: f64) -> bool {
        let changed = match self.columns.get_mut(id).map(|c| &mut c.kind) {
            Some(ColumnKind::Number(n)) => n.set_missing_value(value),
            Some(ColumnKind::Composite(c)) => c.set_missing_value(value),
            _ => false,
        };
        if changed {
            self.emit_all(id, values_changed(id));
        }
        changed
    }

    pub fn set_script(&mut self, id: ColumnId, script: &str) -> bool {
        let old = self
            .columns
            .get_mut(id)
            .and_then(|c| c.kind.as_composite_mut())
            .and_then(|c| c.set_script(script));
        let Some(old) = old else {
            return false;
        };
        let mut events = vec![Event::ScriptChanged {
            column: id,
            old,
            new: script.to_string(),
        }];
        events.extend(Event::dirty_triad(Source::Column(id)));
        self.emit_all(id, events);
        true
    }

    pub fn set_link(&mut self, id: ColumnId, link: Option<String>) -> bool {
        let old = match self.columns.get_mut(id).map(|c| &mut c.kind) {
            Some(ColumnKind::Link(l)) => {
                let old = l.link().map(str::to_string);
                if !l.set_link(link.clone()) {
                    return false;
                }
                old
            }
            _ => return false,
        };
        let mut events = vec![Event::LinkChanged { column: id, old, new: link }];
        events.extend(values_changed(id));
        self.emit_all(id, events);
        true
    }

    /// Override the text of one row of an annotate column.
    pub fn set_annotation(&mut self, id: ColumnId, row: usize, text: impl Into<String>) -> bool {
        let changed = match self.columns.get_mut(id).map(|c| &mut c.kind) {
            Some(ColumnKind::Annotate(a)) => a.set_annotation(row, text.into()),
            _ => false,
        };
        if changed {
            let mut events = vec![Event::ValueChanged { column: id, row }];
            events.extend(values_changed(id));
            self.emit_all(id, events);
        }
        changed
    }

    /// Announce a selection change made through a selection column.
    pub(crate) fn fire_select(&self, id: ColumnId, row: usize, selected: bool) {
        let mut events = vec![Event::Select {
            column: id,
            row,
            selected,
        }];
        events.extend(values_changed(id));
        self.emit_all(id, events);
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::event::EventKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(tree: &ColumnTree, id: ColumnId, kinds: &[EventKind]) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = hits.clone();
        tree.column(id).unwrap().events().on(kinds, move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        hits
    }

    #[test]
    fn test_set_width_is_idempotent() {
        let mut tree = ColumnTree::new();
        let a = number(&mut tree, "a", "a");
        let hits = counter(&tree, a, &[EventKind::WidthChanged]);
        assert!(tree.set_width(a, 150.0));
        assert!(!tree.set_width(a, 150.0));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stack_child_width_rescales_siblings() {
        let mut tree = ColumnTree::new();
        let stack = composite(&mut tree, "s", "stack");
        let a = number(&mut tree, "a", "a");
        let b = number(&mut tree, "b", "b");
        let c = number(&mut tree, "c", "c");
        for col in [a, b, c] {
            tree.push(Parent::Column(stack), col);
        }
        let weights = counter(&tree, stack, &[EventKind::WeightsChanged]);

        assert!(tree.set_width(a, 200.0));
        let widths: Vec<f64> = [a, b, c].iter().map(|&x| tree.column(x).unwrap().width()).collect();
        assert_eq!(widths[0], 200.0);
        assert!((widths[1] - 50.0).abs() < 1e-9);
        assert!((widths.iter().sum::<f64>() - 300.0).abs() < 1e-9);
        assert_eq!(tree.column(stack).unwrap().width(), 300.0);
        assert_eq!(weights.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_single_child_stack_follows_child() {
        let mut tree = ColumnTree::new();
        let stack = composite(&mut tree, "s", "stack");
        let a = number(&mut tree, "a", "a");
        tree.push(Parent::Column(stack), a);
        tree.set_width(a, 40.0);
        assert_eq!(tree.column(stack).unwrap().width(), 40.0);
    }

    #[test]
    fn test_set_weights_and_stack_width() {
        let mut tree = ColumnTree::new();
        let stack = composite(&mut tree, "s", "stack");
        let a = number(&mut tree, "a", "a");
        let b = number(&mut tree, "b", "b");
        tree.push(Parent::Column(stack), a);
        tree.push(Parent::Column(stack), b);

        assert!(tree.set_weights(stack, &[0.25, 0.75]));
        assert!(!tree.set_weights(stack, &[0.25, 0.75]));
        assert_eq!(tree.weights(stack), vec![0.25, 0.75]);
        assert_eq!(tree.column(a).unwrap().width(), 50.0);

        assert!(tree.set_width(stack, 400.0));
        assert_eq!(tree.column(b).unwrap().width(), 300.0);
        assert_eq!(tree.weights(stack), vec![0.25, 0.75]);
    }

    #[test]
    fn test_metadata_fires_label_changed_only_on_label() {
        let mut tree = ColumnTree::new();
        let a = number(&mut tree, "a", "a");
        let labels = counter(&tree, a, &[EventKind::LabelChanged]);
        let meta = counter(&tree, a, &[EventKind::MetaDataChanged]);
        assert!(tree.set_label(a, "Alpha"));
        let mut m = tree.column(a).unwrap().metadata().clone();
        m.color = Some("red".into());
        assert!(tree.set_metadata(a, m.clone()));
        assert!(!tree.set_metadata(a, m));
        assert_eq!(labels.load(Ordering::SeqCst), 1);
        assert_eq!(meta.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_filters_fire_filter_changed() {
        let mut tree = ColumnTree::new();
        let a = number(&mut tree, "a", "a");
        let name = leaf(&mut tree, "n", crate::column::ColumnDesc::field("string", "name"));
        let filters = counter(&tree, a, &[EventKind::FilterChanged]);
        assert!(tree.set_number_filter(a, NumberFilter::between(1.0, 2.0)));
        assert!(!tree.set_number_filter(a, NumberFilter::between(1.0, 2.0)));
        assert!(!tree.set_boolean_filter(a, Some(true)));
        assert_eq!(filters.load(Ordering::SeqCst), 1);
        assert!(tree.set_string_filter(name, StringFilter::parse("abc")));
        assert!(tree.is_filtered(name));
    }

    #[test]
    fn test_script_and_annotation() {
        let mut tree = ColumnTree::new();
        let script = composite(&mut tree, "s", "script");
        assert!(tree.set_script(script, "min(values)"));
        assert!(!tree.set_script(script, "min(values)"));

        let note = leaf(&mut tree, "n", crate::column::ColumnDesc::field("annotate", "name"));
        let values = counter(&tree, note, &[EventKind::ValueChanged]);
        assert!(tree.set_annotation(note, 3, "hello"));
        assert!(!tree.set_annotation(note, 3, "hello"));
        assert_eq!(values.load(Ordering::SeqCst), 1);
    }
}
