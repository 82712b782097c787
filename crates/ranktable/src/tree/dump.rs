//! Dump and restore of columns and rankings.
//!
//! A dump stores each column's id, a reference to its description, its
//! layout and header metadata when they differ from the description, and
//! the type-specific state of its kind. Restoring creates fresh columns
//! through the type registry and assigns new ids; sort and group criteria
//! are resolved through the mapping from dumped to new ids.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::column::{ColumnDesc, ColumnId, ColumnKind, DescRef, Parent};
use crate::ranking::{RankingId, SortCriteriaDump};
use crate::registry::{ColumnTypeRegistry, IdGenerator};

use super::ColumnTree;

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDump {
    pub id: String,
    pub desc: DescRef,
    pub width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub compressed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ColumnDump>>,
    /// Type-specific state (filters, mappings, scripts, annotations...).
    #[serde(flatten)]
    pub state: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RankingDump {
    #[serde(default)]
    pub columns: Vec<ColumnDump>,
    #[serde(rename = "sortCriteria", default, skip_serializing_if = "Option::is_none")]
    pub sort_criteria: Option<SortCriteriaDump>,
    #[serde(rename = "groupBy", default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
}

/// Everything a restore needs besides the tree: how to turn a [`DescRef`]
/// back into a description, the type registry and the id generator.
pub struct RestoreContext<'a> {
    resolve: &'a dyn Fn(&DescRef) -> Option<ColumnDesc>,
    registry: &'a ColumnTypeRegistry,
    ids: &'a mut IdGenerator,
    remap: HashMap<String, ColumnId>,
}

impl<'a> RestoreContext<'a> {
    pub fn new(
        resolve: &'a dyn Fn(&DescRef) -> Option<ColumnDesc>,
        registry: &'a ColumnTypeRegistry,
        ids: &'a mut IdGenerator,
    ) -> Self {
        Self {
            resolve,
            registry,
            ids,
            remap: HashMap::new(),
        }
    }

    /// The column restored from the dumped id `old`.
    pub fn remapped(&self, old: &str) -> Option<ColumnId> {
        self.remap.get(old).copied()
    }
}

impl ColumnTree {
    pub fn dump_column(&self, id: ColumnId) -> Option<ColumnDump> {
        let col = self.columns.get(id)?;
        let desc = &col.desc;
        let mut state = Map::new();
        match &col.kind {
            ColumnKind::Composite(c) => c.dump_state(&mut state),
            kind => {
                if let Some(d) = kind.dumpable() {
                    d.dump_state(&mut state);
                }
            }
        }
        let children = match col.kind.as_composite() {
            Some(c) => Some(
                c.children()
                    .iter()
                    .filter_map(|&child| self.dump_column(child))
                    .collect(),
            ),
            None => None,
        };
        let description = desc.description.clone().unwrap_or_default();
        Some(ColumnDump {
            id: col.id.clone(),
            desc: DescRef::of(desc),
            width: col.width,
            label: (col.meta.label != desc.label).then(|| col.meta.label.clone()),
            color: col.meta.color.clone().filter(|c| Some(c) != desc.color.as_ref()),
            description: (col.meta.description != description).then(|| col.meta.description.clone()),
            compressed: col.compressed,
            children,
            state,
        })
    }

    /// Rebuild a detached column (and its subtree) from a dump. Columns whose
    /// description or type cannot be resolved are skipped with a warning.
    pub fn restore_column(&mut self, dump: &ColumnDump, ctx: &mut RestoreContext<'_>) -> Option<ColumnId> {
        let Some(desc) = (ctx.resolve)(&dump.desc) else {
            tracing::warn!(column = %dump.id, desc = ?dump.desc, "cannot resolve column description");
            return None;
        };
        let kind = ctx.registry.create(&desc)?;
        let new_id = ctx.ids.next_id("col");
        let id = self.create(new_id, desc, kind);
        ctx.remap.insert(dump.id.clone(), id);

        for child in dump.children.iter().flatten() {
            if let Some(c) = self.restore_column(child, ctx) {
                self.push(Parent::Column(id), c);
            }
        }

        let col = self.columns.get_mut(id)?;
        col.width = dump.width;
        col.compressed = dump.compressed;
        if let Some(label) = &dump.label {
            col.meta.label = label.clone();
        }
        if dump.color.is_some() {
            col.meta.color = dump.color.clone();
        }
        if let Some(description) = &dump.description {
            col.meta.description = description.clone();
        }
        match &mut col.kind {
            ColumnKind::Composite(c) => c.restore_state(&dump.state),
            kind => {
                if let Some(d) = kind.dumpable_mut() {
                    d.restore_state(&dump.state);
                }
            }
        }
        Some(id)
    }

    pub fn dump_ranking(&self, ranking: RankingId) -> Option<RankingDump> {
        let r = self.rankings.get(ranking)?;
        let dumped_id = |c: Option<ColumnId>| c.and_then(|c| self.columns.get(c)).map(|c| c.id.clone());
        Some(RankingDump {
            columns: r.columns.iter().filter_map(|&c| self.dump_column(c)).collect(),
            sort_criteria: dumped_id(r.sort.column).map(|sort_by| SortCriteriaDump {
                sort_by,
                asc: r.sort.ascending,
            }),
            group_by: dumped_id(r.group_by),
        })
    }

    /// Append the dumped columns to `ranking` and re-establish its sort and
    /// group criteria. Returns how many top-level columns were restored.
    pub fn restore_ranking(&mut self, ranking: RankingId, dump: &RankingDump, ctx: &mut RestoreContext<'_>) -> usize {
        let mut restored = 0;
        for column in &dump.columns {
            if let Some(c) = self.restore_column(column, ctx) {
                if self.push(Parent::Ranking(ranking), c) {
                    restored += 1;
                } else {
                    self.destroy(c);
                }
            }
        }
        if let Some(sort) = &dump.sort_criteria {
            match ctx.remapped(&sort.sort_by) {
                Some(c) => {
                    self.sort_by(ranking, Some(c), sort.asc);
                }
                None => tracing::warn!(sort_by = %sort.sort_by, "sort column missing from dump"),
            }
        }
        if let Some(group) = dump.group_by.as_deref().and_then(|g| ctx.remapped(g)) {
            self.group_by(ranking, Some(group));
        }
        restored
    }
}
