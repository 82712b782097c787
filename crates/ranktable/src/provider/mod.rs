//! Data providers: the data source plus sort, filter and selection
//! orchestration over a set of rankings.
//!
//! [`ProviderCore`] holds everything independent of where the rows live:
//! the column tree, rankings, descriptions, selection, configuration and
//! the resort queue. A [`DataProvider`] adds the data source. Sorting is
//! asynchronous for every provider, so [`LocalDataProvider`] and
//! [`RemoteDataProvider`] share the same contract.

mod base;
pub mod export;
pub mod http;
mod local;
mod persistence;
pub mod remote;
mod reorder;
mod selection;
pub mod stats;

pub use base::ProviderCore;
pub use local::{LocalDataProvider, derive_descs};
pub use persistence::ProviderDump;
pub use remote::{RemoteBackend, RemoteDataProvider, SearchRequest, SortRequest};
pub use reorder::ReorderQueue;
pub use stats::{CategoricalStats, Statistics};

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

use crate::column::ColumnId;
use crate::column::string::REGEX_PREFIX;
use crate::config::ExportOptions;
use crate::error::{RankTableError, Result};
use crate::group::{OrderedGroup, joined_order};
use crate::ranking::{RankingId, SortTicket};

/// A row delivered by [`DataProvider::fetch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchedRow {
    pub v: Value,
    #[serde(rename = "dataIndex")]
    pub data_index: usize,
}

/// A sort that was started but not yet applied.
pub struct PendingSort {
    pub ticket: SortTicket,
    pub result: BoxFuture<'static, Result<Vec<OrderedGroup>>>,
}

/// What [`DataProvider::search`] looks for in cell labels.
#[derive(Debug, Clone)]
pub enum SearchPattern {
    /// Case-insensitive substring.
    Text(String),
    Regex(Regex),
}

impl SearchPattern {
    /// Plain text, or a regular expression when prefixed with `REGEX:`.
    pub fn parse(query: &str) -> Result<Self> {
        match query.strip_prefix(REGEX_PREFIX) {
            Some(pattern) => Ok(SearchPattern::Regex(
                RegexBuilder::new(pattern).case_insensitive(true).build()?,
            )),
            None => Ok(SearchPattern::Text(query.to_lowercase())),
        }
    }

    pub fn matches(&self, label: &str) -> bool {
        match self {
            SearchPattern::Text(needle) => label.to_lowercase().contains(needle),
            SearchPattern::Regex(re) => re.is_match(label),
        }
    }

    /// The query string this pattern was parsed from.
    pub fn to_query(&self) -> String {
        match self {
            SearchPattern::Text(s) => s.clone(),
            SearchPattern::Regex(re) => format!("{REGEX_PREFIX}{}", re.as_str()),
        }
    }
}

#[async_trait]
pub trait DataProvider: Send + Sync {
    fn core(&self) -> &ProviderCore;

    fn core_mut(&mut self) -> &mut ProviderCore;

    /// Compute the grouped order of a ranking. The returned future owns
    /// everything it needs, so several sorts can be in flight at once.
    fn sort(&self, ranking: RankingId) -> BoxFuture<'static, Result<Vec<OrderedGroup>>>;

    /// The argsort of a ranking: its groups' orders concatenated.
    fn argsort(&self, ranking: RankingId) -> BoxFuture<'static, Result<Vec<usize>>> {
        self.sort(ranking)
            .map(|groups| groups.map(|g| joined_order(&g)))
            .boxed()
    }

    /// Resolve one row lazily.
    fn fetch_row(&self, index: usize) -> BoxFuture<'static, Result<Value>>;

    /// The rows at `indices`, in that order.
    async fn view(&self, indices: &[usize]) -> Result<Vec<Value>>;

    /// Raw values of a number column for editing its mapping.
    async fn mapping_sample(&self, column: ColumnId) -> Result<Vec<f64>>;

    /// Rows whose label in any of `columns` matches `pattern`.
    async fn search(&self, pattern: &SearchPattern, columns: &[ColumnId]) -> Result<Vec<usize>>;

    /// Per ranking, one lazily resolved row per index of its order.
    fn fetch(&self, orders: &[Vec<usize>]) -> Vec<Vec<BoxFuture<'static, Result<FetchedRow>>>> {
        orders
            .iter()
            .map(|order| {
                order
                    .iter()
                    .map(|&index| {
                        self.fetch_row(index)
                            .map(move |v| v.map(|v| FetchedRow { v, data_index: index }))
                            .boxed()
                    })
                    .collect()
            })
            .collect()
    }

    async fn selected_rows(&self) -> Result<Vec<Value>> {
        let selection = self.core().selection();
        self.view(&selection).await
    }

    /// Select every row matching `pattern` in any of `columns`.
    async fn search_select(&mut self, pattern: &SearchPattern, columns: &[ColumnId]) -> Result<bool> {
        let hits = self.search(pattern, columns).await?;
        Ok(self.core_mut().set_selection(&hits))
    }

    /// Start sorting a ranking. Starting invalidates every earlier
    /// pending sort of the same ranking.
    fn start_sort(&mut self, ranking: RankingId) -> Option<PendingSort> {
        let ticket = self.core_mut().tree.begin_sort(ranking)?;
        Some(PendingSort {
            ticket,
            result: self.sort(ranking),
        })
    }

    /// Apply a finished sort unless it was superseded.
    fn finish_sort(&mut self, ticket: SortTicket, groups: Vec<OrderedGroup>) -> bool {
        self.core_mut().tree.apply_sort(ticket, groups)
    }

    /// Sort a ranking now and apply the result.
    async fn reorder(&mut self, ranking: RankingId) -> Result<bool> {
        let pending = self
            .start_sort(ranking)
            .ok_or_else(|| RankTableError::UnknownRanking(format!("{ranking:?}")))?;
        let groups = pending.result.await?;
        Ok(self.finish_sort(pending.ticket, groups))
    }

    /// Wait out the debounce and resort every scheduled ranking, until
    /// nothing is scheduled anymore.
    async fn settle(&mut self) -> Result<()> {
        loop {
            let Some(deadline) = self.core().reorder.lock().next_deadline() else {
                return Ok(());
            };
            tokio::time::sleep_until(deadline).await;
            let due = {
                let core = self.core();
                core.reorder.lock().take_due(Instant::now(), core.rankings())
            };
            for ranking in due {
                self.reorder(ranking).await?;
            }
        }
    }

    /// Resort every scheduled ranking without waiting for the debounce.
    async fn flush(&mut self) -> Result<()> {
        let pending = {
            let core = self.core();
            core.reorder.lock().take_all(core.rankings())
        };
        for ranking in pending {
            self.reorder(ranking).await?;
        }
        Ok(())
    }

    /// Render the current order of a ranking as delimited text.
    async fn export_table(&self, ranking: RankingId, options: &ExportOptions) -> Result<String> {
        let order = self
            .core()
            .tree()
            .ranking(ranking)
            .ok_or_else(|| RankTableError::UnknownRanking(format!("{ranking:?}")))?
            .order();
        let rows = self.view(&order).await?;
        export::export_table(self.core().tree(), ranking, &order, &rows, options)
    }
}
