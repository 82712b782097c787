//! Provider snapshots: dump, restore and ranking clones.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RankTableError, Result};
use crate::ranking::RankingId;
use crate::tree::RankingDump;

use super::base::ProviderCore;

/// The durable state of a provider.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderDump {
    /// Next unused id number; restored providers never reuse a lower one.
    pub uid: u64,
    #[serde(default)]
    pub selection: Vec<usize>,
    #[serde(default)]
    pub rankings: Vec<RankingDump>,
}

impl ProviderDump {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| RankTableError::io(parent, e))?;
            }
        }
        let file = File::create(path).map_err(|e| RankTableError::io(path, e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| RankTableError::io(path, e))?;
        let dump = serde_json::from_reader(BufReader::new(file))?;
        Ok(dump)
    }
}

impl ProviderCore {
    pub fn dump(&self) -> ProviderDump {
        ProviderDump {
            uid: self.ids.peek(),
            selection: self.selection(),
            rankings: self
                .rankings()
                .iter()
                .filter_map(|&r| self.tree.dump_ranking(r))
                .collect(),
        }
    }

    /// Replace all rankings and the selection by the dumped ones. Columns
    /// are recreated with fresh ids; every restored ranking gets a rank
    /// column if the dump has none.
    pub fn restore(&mut self, dump: &ProviderDump) -> Vec<RankingId> {
        self.clear_rankings();
        self.ids.advance_to(dump.uid);
        self.set_selection(&dump.selection);
        let mut restored = Vec::with_capacity(dump.rankings.len());
        for ranking_dump in &dump.rankings {
            let id = self.ids.next_id("rank");
            let ranking = self.tree.create_ranking(id);
            let columns = self.restore_into(ranking, ranking_dump);
            if columns < ranking_dump.columns.len() {
                tracing::warn!(
                    restored = columns,
                    dumped = ranking_dump.columns.len(),
                    "some columns could not be restored"
                );
            }
            self.ensure_rank_column(ranking);
            self.attach_ranking(ranking, restored.len());
            restored.push(ranking);
        }
        tracing::debug!(rankings = restored.len(), "restored provider dump");
        restored
    }

    /// Restore from an untyped JSON value.
    pub fn restore_json(&mut self, dump: serde_json::Value) -> Result<Vec<RankingId>> {
        let dump: ProviderDump = serde_json::from_value(dump)
            .map_err(|e| RankTableError::InvalidDump(e.to_string()))?;
        Ok(self.restore(&dump))
    }

    /// A copy of a ranking with fresh column ids, placed right after it.
    /// The copy starts with the source's criteria and current order.
    pub fn clone_ranking(&mut self, source: RankingId) -> Option<RankingId> {
        let dump = self.tree.dump_ranking(source)?;
        let groups = self.tree.ranking(source)?.groups().to_vec();
        let index = self.rankings().iter().position(|&r| r == source)? + 1;

        let id = self.ids.next_id("rank");
        let ranking = self.tree.create_ranking(id);
        self.restore_into(ranking, &dump);
        self.ensure_rank_column(ranking);
        if let Some(r) = self.tree.ranking_mut(ranking) {
            r.set_groups(groups);
        }
        self.attach_ranking(ranking, index);
        Some(ranking)
    }
}
