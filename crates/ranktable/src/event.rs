//! Typed publish/subscribe for model change notifications.
//!
//! Every column, ranking and provider owns an [`EventDispatcher`]. Listeners
//! subscribe to a set of [`EventKind`]s and receive the matching [`Event`]
//! payloads synchronously, in subscription order, from within the call that
//! caused the change.
//!
//! ```
//! use ranktable::event::{Event, EventDispatcher, EventKind, Source};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let events = EventDispatcher::new();
//! let hits = Arc::new(AtomicUsize::new(0));
//! let counter = hits.clone();
//! let id = events.on(&[EventKind::Dirty], move |_| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! events.fire(&Event::Dirty(Source::Provider));
//! events.off(id);
//! events.fire(&Event::Dirty(Source::Provider));
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::column::{ColumnId, ColumnMetaData, Parent};
use crate::ranking::{RankingId, SortCriteria};

new_key_type! {
    /// Handle returned by [`EventDispatcher::on`], used to unsubscribe.
    pub struct ListenerId;
}

/// The closed set of notifications the model emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Dirty,
    DirtyHeader,
    DirtyValues,
    DirtyOrder,
    AddColumn,
    RemoveColumn,
    AddRanking,
    RemoveRanking,
    AddDesc,
    SelectionChanged,
    OrderChanged,
    GroupsChanged,
    SortCriteriaChanged,
    FilterChanged,
    WidthChanged,
    LabelChanged,
    MetaDataChanged,
    MappingChanged,
    WeightsChanged,
    CollapseChanged,
    CompressChanged,
    ScriptChanged,
    LinkChanged,
    ValueChanged,
    Select,
}

impl EventKind {
    /// The wire name of the event, as used by embedders keyed on strings.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Dirty => "dirty",
            EventKind::DirtyHeader => "dirtyHeader",
            EventKind::DirtyValues => "dirtyValues",
            EventKind::DirtyOrder => "dirtyOrder",
            EventKind::AddColumn => "addColumn",
            EventKind::RemoveColumn => "removeColumn",
            EventKind::AddRanking => "addRanking",
            EventKind::RemoveRanking => "removeRanking",
            EventKind::AddDesc => "addDesc",
            EventKind::SelectionChanged => "selectionChanged",
            EventKind::OrderChanged => "orderChanged",
            EventKind::GroupsChanged => "groupsChanged",
            EventKind::SortCriteriaChanged => "sortCriteriaChanged",
            EventKind::FilterChanged => "filterChanged",
            EventKind::WidthChanged => "widthChanged",
            EventKind::LabelChanged => "labelChanged",
            EventKind::MetaDataChanged => "metaDataChanged",
            EventKind::MappingChanged => "mappingChanged",
            EventKind::WeightsChanged => "weightsChanged",
            EventKind::CollapseChanged => "collapseChanged",
            EventKind::CompressChanged => "compressChanged",
            EventKind::ScriptChanged => "scriptChanged",
            EventKind::LinkChanged => "linkChanged",
            EventKind::ValueChanged => "valueChanged",
            EventKind::Select => "select",
        }
    }

    /// Kinds that a container re-emits when one of its children emits them.
    pub fn bubbles(self) -> bool {
        matches!(
            self,
            EventKind::Dirty
                | EventKind::DirtyHeader
                | EventKind::DirtyValues
                | EventKind::FilterChanged
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a generic dirty notification originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Column(ColumnId),
    Ranking(RankingId),
    Provider,
}

/// Event payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Dirty(Source),
    DirtyHeader(Source),
    DirtyValues(Source),
    DirtyOrder(RankingId),
    AddColumn {
        parent: Parent,
        column: ColumnId,
        index: usize,
    },
    /// `column` is `None` when a whole container was cleared.
    RemoveColumn {
        parent: Parent,
        column: Option<ColumnId>,
        index: Option<usize>,
    },
    AddRanking {
        ranking: RankingId,
        index: usize,
    },
    /// `ranking` is `None` when all rankings were cleared.
    RemoveRanking {
        ranking: Option<RankingId>,
    },
    AddDesc {
        column_type: String,
        label: String,
    },
    SelectionChanged {
        selection: Vec<usize>,
    },
    OrderChanged {
        ranking: RankingId,
        order: Arc<[usize]>,
    },
    GroupsChanged {
        ranking: RankingId,
    },
    SortCriteriaChanged {
        ranking: RankingId,
        old: SortCriteria,
        new: SortCriteria,
    },
    FilterChanged {
        column: ColumnId,
    },
    WidthChanged {
        column: ColumnId,
        old: f64,
        new: f64,
    },
    LabelChanged {
        column: ColumnId,
        old: ColumnMetaData,
        new: ColumnMetaData,
    },
    MetaDataChanged {
        column: ColumnId,
        old: ColumnMetaData,
        new: ColumnMetaData,
    },
    MappingChanged {
        column: ColumnId,
    },
    WeightsChanged {
        column: ColumnId,
        old: Vec<f64>,
        new: Vec<f64>,
    },
    CollapseChanged {
        column: ColumnId,
        collapsed: bool,
    },
    CompressChanged {
        column: ColumnId,
        compressed: bool,
    },
    ScriptChanged {
        column: ColumnId,
        old: String,
        new: String,
    },
    LinkChanged {
        column: ColumnId,
        old: Option<String>,
        new: Option<String>,
    },
    ValueChanged {
        column: ColumnId,
        row: usize,
    },
    Select {
        column: ColumnId,
        row: usize,
        selected: bool,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Dirty(_) => EventKind::Dirty,
            Event::DirtyHeader(_) => EventKind::DirtyHeader,
            Event::DirtyValues(_) => EventKind::DirtyValues,
            Event::DirtyOrder(_) => EventKind::DirtyOrder,
            Event::AddColumn { .. } => EventKind::AddColumn,
            Event::RemoveColumn { .. } => EventKind::RemoveColumn,
            Event::AddRanking { .. } => EventKind::AddRanking,
            Event::RemoveRanking { .. } => EventKind::RemoveRanking,
            Event::AddDesc { .. } => EventKind::AddDesc,
            Event::SelectionChanged { .. } => EventKind::SelectionChanged,
            Event::OrderChanged { .. } => EventKind::OrderChanged,
            Event::GroupsChanged { .. } => EventKind::GroupsChanged,
            Event::SortCriteriaChanged { .. } => EventKind::SortCriteriaChanged,
            Event::FilterChanged { .. } => EventKind::FilterChanged,
            Event::WidthChanged { .. } => EventKind::WidthChanged,
            Event::LabelChanged { .. } => EventKind::LabelChanged,
            Event::MetaDataChanged { .. } => EventKind::MetaDataChanged,
            Event::MappingChanged { .. } => EventKind::MappingChanged,
            Event::WeightsChanged { .. } => EventKind::WeightsChanged,
            Event::CollapseChanged { .. } => EventKind::CollapseChanged,
            Event::CompressChanged { .. } => EventKind::CompressChanged,
            Event::ScriptChanged { .. } => EventKind::ScriptChanged,
            Event::LinkChanged { .. } => EventKind::LinkChanged,
            Event::ValueChanged { .. } => EventKind::ValueChanged,
            Event::Select { .. } => EventKind::Select,
        }
    }

    /// The generic dirty triad fired after most state changes.
    pub fn dirty_triad(source: Source) -> [Event; 3] {
        [
            Event::DirtyHeader(source),
            Event::DirtyValues(source),
            Event::Dirty(source),
        ]
    }
}

type Slot = Arc<dyn Fn(&Event) + Send + Sync>;

struct Listener {
    kinds: Vec<EventKind>,
    slot: Slot,
}

#[derive(Default)]
struct Inner {
    listeners: Mutex<SlotMap<ListenerId, Listener>>,
    blocked: AtomicBool,
}

/// A multi-listener event channel.
///
/// Cloning yields another handle onto the same listener set, which is how
/// one dispatcher forwards into another.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    inner: Arc<Inner>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `slot` to every kind in `kinds`.
    pub fn on<F>(&self, kinds: &[EventKind], slot: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.listeners.lock().insert(Listener {
            kinds: kinds.to_vec(),
            slot: Arc::new(slot),
        })
    }

    /// Unsubscribe a listener. Returns `false` if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.listeners.lock().remove(id).is_some()
    }

    /// Drop every listener.
    pub fn off_all(&self) {
        self.inner.listeners.lock().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.inner
            .listeners
            .lock()
            .values()
            .any(|l| l.kinds.contains(&kind))
    }

    /// Suppress (or re-enable) delivery. Returns the previous state.
    pub fn set_blocked(&self, blocked: bool) -> bool {
        self.inner.blocked.swap(blocked, Ordering::SeqCst)
    }

    pub fn is_blocked(&self) -> bool {
        self.inner.blocked.load(Ordering::SeqCst)
    }

    /// Deliver `event` to every listener subscribed to its kind.
    pub fn fire(&self, event: &Event) {
        if self.is_blocked() {
            tracing::trace!(kind = %event.kind(), "dispatcher blocked, skipping fire");
            return;
        }
        let kind = event.kind();
        // Listeners may subscribe or unsubscribe while handling the event.
        let slots: Vec<Slot> = {
            let listeners = self.inner.listeners.lock();
            listeners
                .values()
                .filter(|l| l.kinds.contains(&kind))
                .map(|l| l.slot.clone())
                .collect()
        };
        tracing::trace!(%kind, listener_count = slots.len(), "firing event");
        for slot in slots {
            slot(event);
        }
    }

    pub fn fire_all(&self, events: &[Event]) {
        for event in events {
            self.fire(event);
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_count())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter(events: &EventDispatcher, kinds: &[EventKind]) -> (ListenerId, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let id = events.on(kinds, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        (id, hits)
    }

    #[test]
    fn test_fire_only_reaches_subscribed_kinds() {
        let events = EventDispatcher::new();
        let (_, dirty) = counter(&events, &[EventKind::Dirty]);
        let (_, both) = counter(&events, &[EventKind::Dirty, EventKind::DirtyHeader]);

        events.fire_all(&Event::dirty_triad(Source::Provider));

        assert_eq!(dirty.load(Ordering::SeqCst), 1);
        assert_eq!(both.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_off_and_off_all() {
        let events = EventDispatcher::new();
        let (a, hits_a) = counter(&events, &[EventKind::Dirty]);
        let (_, hits_b) = counter(&events, &[EventKind::Dirty]);

        assert!(events.off(a));
        assert!(!events.off(a));
        events.fire(&Event::Dirty(Source::Provider));
        assert_eq!(hits_a.load(Ordering::SeqCst), 0);
        assert_eq!(hits_b.load(Ordering::SeqCst), 1);

        events.off_all();
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn test_blocked_dispatcher_is_silent() {
        let events = EventDispatcher::new();
        let (_, hits) = counter(&events, &[EventKind::Dirty]);
        assert!(!events.set_blocked(true));
        events.fire(&Event::Dirty(Source::Provider));
        events.set_blocked(false);
        events.fire(&Event::Dirty(Source::Provider));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clone_forwards_into_shared_listeners() {
        let upstream = EventDispatcher::new();
        let downstream = EventDispatcher::new();
        let (_, hits) = counter(&upstream, &[EventKind::DirtyValues]);

        let target = upstream.clone();
        downstream.on(&[EventKind::DirtyValues], move |e| target.fire(e));
        downstream.fire(&Event::DirtyValues(Source::Provider));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listener_may_unsubscribe_itself() {
        let events = EventDispatcher::new();
        let slot_id = Arc::new(Mutex::new(None::<ListenerId>));
        let handle = events.clone();
        let own = slot_id.clone();
        let id = events.on(&[EventKind::Dirty], move |_| {
            if let Some(id) = *own.lock() {
                handle.off(id);
            }
        });
        *slot_id.lock() = Some(id);

        events.fire(&Event::Dirty(Source::Provider));
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn test_event_names_are_camel_case() {
        assert_eq!(EventKind::DirtyOrder.name(), "dirtyOrder");
        assert_eq!(EventKind::SortCriteriaChanged.to_string(), "sortCriteriaChanged");
        assert!(EventKind::FilterChanged.bubbles());
        assert!(!EventKind::WidthChanged.bubbles());
    }
}
