//! State shared by every provider.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::column::{ColumnDesc, ColumnId, ColumnKind, DescRef, Parent, is_support_type};
use crate::config::ProviderConfig;
use crate::event::{Event, EventDispatcher, EventKind, ListenerId, Source};
use crate::ranking::RankingId;
use crate::registry::{ColumnTypeRegistry, IdGenerator};
use crate::tree::{ColumnTree, RankingDump, RestoreContext};

use super::reorder::ReorderQueue;

/// Ranking events re-fired on the provider.
const FORWARDED: [EventKind; 6] = [
    EventKind::AddColumn,
    EventKind::RemoveColumn,
    EventKind::Dirty,
    EventKind::DirtyHeader,
    EventKind::DirtyValues,
    EventKind::OrderChanged,
];

/// Rankings, descriptions, selection and configuration of a provider.
#[derive(Debug)]
pub struct ProviderCore {
    pub(crate) tree: ColumnTree,
    rankings: Vec<RankingId>,
    descs: Vec<ColumnDesc>,
    /// The `rank`, `selection` and `actions` descriptions.
    builtins: [ColumnDesc; 3],
    registry: ColumnTypeRegistry,
    pub(crate) ids: IdGenerator,
    pub(crate) selection: Arc<RwLock<BTreeSet<usize>>>,
    config: ProviderConfig,
    events: EventDispatcher,
    pub(crate) reorder: Arc<Mutex<ReorderQueue>>,
    forwarders: HashMap<RankingId, ListenerId>,
}

impl ProviderCore {
    pub fn new(descs: Vec<ColumnDesc>, config: ProviderConfig) -> Self {
        let selection: Arc<RwLock<BTreeSet<usize>>> = Arc::default();
        let selected = selection.clone();
        let builtins = [
            ColumnDesc::new("rank", "Rank"),
            ColumnDesc::new("selection", "Selections")
                .with_accessor(move |row| Value::Bool(selected.read().contains(&row.index))),
            ColumnDesc::new("actions", "Actions"),
        ];
        Self {
            tree: ColumnTree::new(),
            rankings: Vec::new(),
            descs,
            builtins,
            registry: ColumnTypeRegistry::default(),
            ids: IdGenerator::new(),
            selection,
            config,
            events: EventDispatcher::new(),
            reorder: Arc::default(),
            forwarders: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn tree(&self) -> &ColumnTree {
        &self.tree
    }

    /// Mutable access to the columns and rankings. Changes that affect an
    /// order schedule a resort through the ranking events.
    pub fn tree_mut(&mut self) -> &mut ColumnTree {
        &mut self.tree
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn registry(&self) -> &ColumnTypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ColumnTypeRegistry {
        &mut self.registry
    }

    pub fn descs(&self) -> &[ColumnDesc] {
        &self.descs
    }

    pub fn push_desc(&mut self, desc: ColumnDesc) {
        let event = Event::AddDesc {
            column_type: desc.column_type.clone(),
            label: desc.label.clone(),
        };
        self.descs.push(desc);
        self.events.fire(&event);
    }

    /// The description bound to a data field.
    pub fn find_desc(&self, column: &str) -> Option<&ColumnDesc> {
        self.descs.iter().find(|d| d.column.as_deref() == Some(column))
    }

    /// The provider's description of a support type.
    pub fn builtin_desc(&self, column_type: &str) -> Option<&ColumnDesc> {
        self.builtins.iter().find(|d| d.column_type == column_type)
    }

    /// Turn a dumped description reference back into a description.
    /// Support types always resolve to the provider's own descriptions so
    /// their accessors are kept.
    pub fn resolve_desc(&self, desc: &DescRef) -> Option<ColumnDesc> {
        resolve(&self.descs, &self.builtins, desc)
    }

    pub fn rankings(&self) -> &[RankingId] {
        &self.rankings
    }

    pub fn ranking_by_id(&self, id: &str) -> Option<RankingId> {
        self.rankings
            .iter()
            .copied()
            .find(|&r| self.tree.ranking(r).is_some_and(|ranking| ranking.id() == id))
    }

    /// Create a detached column through the type registry.
    pub fn create(&mut self, desc: &ColumnDesc) -> Option<ColumnId> {
        let desc = match self.builtin_desc(&desc.column_type) {
            Some(builtin) if desc.accessor.is_none() => builtin.clone(),
            _ => desc.clone(),
        };
        let kind = self.registry.create(&desc)?;
        let id = self.ids.next_id("col");
        Some(self.tree.create(id, desc, kind))
    }

    /// Add a ranking holding only a rank column.
    pub fn push_ranking(&mut self) -> RankingId {
        self.insert_ranking(self.rankings.len())
    }

    pub fn insert_ranking(&mut self, index: usize) -> RankingId {
        let id = self.ids.next_id("rank");
        let ranking = self.tree.create_ranking(id);
        self.ensure_rank_column(ranking);
        self.attach_ranking(ranking, index);
        ranking
    }

    /// Make the ranking known to the provider: forward its events and
    /// schedule its first sort.
    pub(crate) fn attach_ranking(&mut self, ranking: RankingId, index: usize) {
        let index = index.min(self.rankings.len());
        self.rankings.insert(index, ranking);

        let events = self.events.clone();
        let queue = self.reorder.clone();
        let debounce = self.config.debounce;
        let global = self.config.filter_globally;
        let mut kinds = FORWARDED.to_vec();
        kinds.extend([EventKind::DirtyOrder, EventKind::FilterChanged]);
        if let Some(r) = self.tree.ranking(ranking) {
            let listener = r.events().on(&kinds, move |event| {
                match event {
                    Event::DirtyOrder(r) => queue.lock().schedule(*r, debounce),
                    Event::FilterChanged { .. } if global => queue.lock().schedule_all(debounce),
                    _ => {}
                }
                if FORWARDED.contains(&event.kind()) {
                    events.fire(event);
                }
            });
            self.forwarders.insert(ranking, listener);
        }
        self.reorder.lock().schedule(ranking, debounce);
        self.events.fire(&Event::AddRanking { ranking, index });
        tracing::debug!(ranking = ?ranking, index, "added ranking");
    }

    pub fn remove_ranking(&mut self, ranking: RankingId) -> bool {
        let Some(index) = self.rankings.iter().position(|&r| r == ranking) else {
            return false;
        };
        self.rankings.remove(index);
        if let (Some(listener), Some(r)) = (self.forwarders.remove(&ranking), self.tree.ranking(ranking)) {
            r.events().off(listener);
        }
        self.reorder.lock().cancel(ranking);
        self.tree.destroy_ranking(ranking);
        self.events.fire(&Event::RemoveRanking {
            ranking: Some(ranking),
        });
        true
    }

    pub fn clear_rankings(&mut self) {
        for ranking in std::mem::take(&mut self.rankings) {
            if let (Some(listener), Some(r)) = (self.forwarders.remove(&ranking), self.tree.ranking(ranking)) {
                r.events().off(listener);
            }
            self.reorder.lock().cancel(ranking);
            self.tree.destroy_ranking(ranking);
        }
        self.events.fire(&Event::RemoveRanking { ranking: None });
    }

    /// Append a new column built from `desc` to a ranking.
    pub fn push(&mut self, ranking: RankingId, desc: &ColumnDesc) -> Option<ColumnId> {
        let index = self.tree.ranking(ranking)?.len();
        self.insert(ranking, index, desc)
    }

    pub fn insert(&mut self, ranking: RankingId, index: usize, desc: &ColumnDesc) -> Option<ColumnId> {
        self.tree.ranking(ranking)?;
        let column = self.create(desc)?;
        if self.tree.insert(Parent::Ranking(ranking), column, index) {
            Some(column)
        } else {
            self.tree.destroy(column);
            None
        }
    }

    /// A ranking with a rank column, a selection column and one column per
    /// data description.
    pub fn derive_default(&mut self) -> RankingId {
        let ranking = self.push_ranking();
        let selection = self.builtins[1].clone();
        self.push(ranking, &selection);
        for desc in self.descs.clone() {
            if self.push(ranking, &desc).is_none() {
                tracing::warn!(column_type = %desc.column_type, label = %desc.label, "skipping column");
            }
        }
        ranking
    }

    /// Every ranking carries exactly one rank column; add it at the front
    /// when it is missing.
    pub(crate) fn ensure_rank_column(&mut self, ranking: RankingId) {
        let has_rank = self
            .tree
            .members(Parent::Ranking(ranking))
            .iter()
            .any(|&c| self.tree.column(c).is_some_and(|col| matches!(col.kind(), ColumnKind::Rank)));
        if has_rank {
            return;
        }
        let rank = self.builtins[0].clone();
        if let Some(column) = self.create(&rank) {
            self.tree.insert(Parent::Ranking(ranking), column, 0);
        }
    }

    /// Restore dumped columns into a ranking with fresh ids.
    pub(crate) fn restore_into(&mut self, ranking: RankingId, dump: &RankingDump) -> usize {
        let (descs, builtins) = (&self.descs, &self.builtins);
        let resolver = |desc: &DescRef| resolve(descs, builtins, desc);
        let mut ctx = RestoreContext::new(&resolver, &self.registry, &mut self.ids);
        self.tree.restore_ranking(ranking, dump, &mut ctx)
    }

    /// Mark a ranking for a resort after the debounce period.
    pub fn schedule_reorder(&self, ranking: RankingId) {
        self.reorder.lock().schedule(ranking, self.config.debounce);
    }

    pub fn schedule_reorder_all(&self) {
        self.reorder.lock().schedule_all(self.config.debounce);
    }

    pub fn is_reorder_pending(&self, ranking: RankingId) -> bool {
        self.reorder.lock().is_scheduled(ranking)
    }

    /// Tell every selection column that its values changed.
    pub(crate) fn selection_columns_changed(&self) {
        for &ranking in &self.rankings {
            for column in self.tree.ranking_columns(ranking) {
                if self.tree.column(column).is_some_and(|c| matches!(c.kind(), ColumnKind::Selection)) {
                    self.tree.emit_all(
                        column,
                        [Event::DirtyValues(Source::Column(column)), Event::Dirty(Source::Column(column))],
                    );
                }
            }
        }
    }
}

pub(crate) fn resolve(descs: &[ColumnDesc], builtins: &[ColumnDesc], desc: &DescRef) -> Option<ColumnDesc> {
    match desc {
        DescRef::Ref(key) => descs
            .iter()
            .find(|d| d.reference().as_deref() == Some(key.as_str()))
            .cloned(),
        DescRef::Inline(inline) if is_support_type(&inline.column_type) => builtins
            .iter()
            .find(|d| d.column_type == inline.column_type)
            .cloned(),
        DescRef::Inline(inline) => Some((**inline).clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn core() -> ProviderCore {
        ProviderCore::new(
            vec![
                ColumnDesc::field("string", "name"),
                ColumnDesc::field("number", "score").with_domain([0.0, 100.0]),
            ],
            ProviderConfig::default(),
        )
    }

    #[test]
    fn test_push_ranking_has_rank_column() {
        let mut core = core();
        let r = core.push_ranking();
        let columns = core.tree().ranking(r).unwrap().columns();
        assert_eq!(columns.len(), 1);
        assert_eq!(core.tree().column(columns[0]).unwrap().column_type(), "rank");
        assert_eq!(core.tree().ranking(r).unwrap().id(), "rank0");
        assert_eq!(core.ranking_by_id("rank0"), Some(r));
    }

    #[test]
    fn test_derive_default() {
        let mut core = core();
        let r = core.derive_default();
        let types: Vec<&str> = core
            .tree()
            .ranking(r)
            .unwrap()
            .columns()
            .iter()
            .map(|&c| core.tree().column(c).unwrap().column_type())
            .collect();
        assert_eq!(types, vec!["rank", "selection", "string", "number"]);
        let name = core.tree().ranking(r).unwrap().columns()[2];
        assert_eq!(core.tree().ranking(r).unwrap().sort_column(), Some(name));
    }

    #[test]
    fn test_ranking_events_are_forwarded() {
        let mut core = core();
        let hits = Arc::new(AtomicUsize::new(0));
        let sink = hits.clone();
        core.events().on(&[EventKind::AddColumn, EventKind::AddRanking], move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        let r = core.push_ranking();
        let desc = core.descs()[1].clone();
        core.push(r, &desc).unwrap();
        // one ranking, one column; the rank column is added before forwarding starts
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(core.is_reorder_pending(r));
    }

    #[test]
    fn test_remove_ranking() {
        let mut core = core();
        let r = core.derive_default();
        let count = core.tree().column_count();
        assert!(count > 0);
        assert!(core.remove_ranking(r));
        assert!(!core.remove_ranking(r));
        assert_eq!(core.tree().column_count(), 0);
        assert!(!core.is_reorder_pending(r));
    }

    #[test]
    fn test_resolve_keeps_selection_accessor() {
        let core = core();
        let inline = DescRef::Inline(Box::new(ColumnDesc::new("selection", "S")));
        assert!(core.resolve_desc(&inline).unwrap().accessor.is_some());
        assert_eq!(
            core.resolve_desc(&DescRef::Ref("number@score".into())).unwrap().label,
            "score"
        );
        assert!(core.resolve_desc(&DescRef::Ref("number@missing".into())).is_none());
    }
}
