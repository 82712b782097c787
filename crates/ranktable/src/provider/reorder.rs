//! Debounced resort scheduling.
//!
//! Rankings that became dirty are queued with a deadline; every further
//! change inside the quiet period pushes the deadline back, so a burst of
//! mutations collapses into a single resort.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use crate::ranking::RankingId;

#[derive(Debug, Default)]
pub struct ReorderQueue {
    deadlines: HashMap<RankingId, Instant>,
    /// Deadline of a resort of every ranking (global filter changes).
    all: Option<Instant>,
}

impl ReorderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, ranking: RankingId, debounce: Duration) {
        let deadline = Instant::now() + debounce;
        tracing::debug!(?ranking, ?debounce, "scheduling resort");
        self.deadlines.insert(ranking, deadline);
    }

    pub fn schedule_all(&mut self, debounce: Duration) {
        tracing::debug!(?debounce, "scheduling resort of all rankings");
        self.all = Some(Instant::now() + debounce);
    }

    pub fn cancel(&mut self, ranking: RankingId) {
        self.deadlines.remove(&ranking);
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty() && self.all.is_none()
    }

    pub fn is_scheduled(&self, ranking: RankingId) -> bool {
        self.all.is_some() || self.deadlines.contains_key(&ranking)
    }

    /// The earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().copied().chain(self.all).min()
    }

    /// Remove and return the rankings due at `now`. `rankings` lists every
    /// live ranking, used when a resort of all of them is due.
    pub fn take_due(&mut self, now: Instant, rankings: &[RankingId]) -> Vec<RankingId> {
        if self.all.is_some_and(|d| d <= now) {
            self.all = None;
            self.deadlines.clear();
            return rankings.to_vec();
        }
        let due: Vec<RankingId> = rankings
            .iter()
            .copied()
            .filter(|r| self.deadlines.get(r).is_some_and(|&d| d <= now))
            .collect();
        for r in &due {
            self.deadlines.remove(r);
        }
        // deadlines of rankings that no longer exist never fire
        self.deadlines.retain(|r, _| rankings.contains(r));
        due
    }

    /// Remove and return everything pending, due or not.
    pub fn take_all(&mut self, rankings: &[RankingId]) -> Vec<RankingId> {
        let everything = self.all.take().is_some();
        let pending = std::mem::take(&mut self.deadlines);
        rankings
            .iter()
            .copied()
            .filter(|r| everything || pending.contains_key(r))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn handles(n: usize) -> Vec<RankingId> {
        let mut map: SlotMap<RankingId, ()> = SlotMap::with_key();
        (0..n).map(|_| map.insert(())).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_pushes_deadline_back() {
        let r = handles(2);
        let mut queue = ReorderQueue::new();
        queue.schedule(r[0], Duration::from_millis(100));
        tokio::time::advance(Duration::from_millis(60)).await;
        queue.schedule(r[0], Duration::from_millis(100));
        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(queue.take_due(Instant::now(), &r).is_empty());
        tokio::time::advance(Duration::from_millis(40)).await;
        assert_eq!(queue.take_due(Instant::now(), &r), vec![r[0]]);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_all() {
        let r = handles(3);
        let mut queue = ReorderQueue::new();
        queue.schedule(r[1], Duration::from_millis(10));
        queue.schedule_all(Duration::from_millis(100));
        assert!(queue.is_scheduled(r[2]));
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(queue.take_due(Instant::now(), &r), r);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_take_all_ignores_deadlines() {
        let r = handles(3);
        let mut queue = ReorderQueue::new();
        queue.schedule(r[2], Duration::from_secs(60));
        assert_eq!(queue.take_all(&r), vec![r[2]]);
        assert!(queue.is_empty());
    }
}
