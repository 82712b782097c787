//! Provider whose rows live behind a backend.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::column::{ColumnDesc, ColumnId};
use crate::config::ProviderConfig;
use crate::error::{RankTableError, Result};
use crate::group::OrderedGroup;
use crate::ranking::RankingId;
use crate::tree::RankingDump;

use super::{DataProvider, ProviderCore, SearchPattern};

/// What a backend needs to sort one ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortRequest {
    pub ranking: RankingDump,
    pub filter_globally: bool,
    /// The other filtered rankings, when filters apply globally.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rankings: Vec<RankingDump>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Plain text, or a `REGEX:` prefixed pattern.
    pub query: String,
    /// Data fields to search in.
    pub columns: Vec<String>,
}

/// The server side of a [`RemoteDataProvider`].
#[async_trait]
pub trait RemoteBackend: Send + Sync + 'static {
    /// Filtered and sorted row indices.
    async fn sort(&self, request: &SortRequest) -> Result<Vec<usize>>;

    async fn view(&self, indices: &[usize]) -> Result<Vec<Value>>;

    async fn mapping_sample(&self, column: &str) -> Result<Vec<f64>>;

    async fn search(&self, request: &SearchRequest) -> Result<Vec<usize>>;
}

/// Rankings and selection are kept locally; sorting, row access and
/// search are delegated to the backend. Backend orders are not grouped.
pub struct RemoteDataProvider<B> {
    core: ProviderCore,
    backend: Arc<B>,
}

impl<B> fmt::Debug for RemoteDataProvider<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDataProvider")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<B: RemoteBackend> RemoteDataProvider<B> {
    pub fn new(backend: B, descs: Vec<ColumnDesc>) -> Self {
        Self::with_config(backend, descs, ProviderConfig::default())
    }

    pub fn with_config(backend: B, descs: Vec<ColumnDesc>, config: ProviderConfig) -> Self {
        Self {
            core: ProviderCore::new(descs, config),
            backend: Arc::new(backend),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn sort_request(&self, ranking: RankingId) -> Result<SortRequest> {
        let tree = self.core.tree();
        let dump = tree
            .dump_ranking(ranking)
            .ok_or_else(|| RankTableError::UnknownRanking(format!("{ranking:?}")))?;
        let filter_globally = self.core.config().filter_globally;
        let rankings = if filter_globally {
            self.core
                .rankings()
                .iter()
                .copied()
                .filter(|&r| r != ranking && tree.ranking_is_filtered(r))
                .filter_map(|r| tree.dump_ranking(r))
                .collect()
        } else {
            Vec::new()
        };
        Ok(SortRequest {
            ranking: dump,
            filter_globally,
            rankings,
        })
    }

    /// The data field a column reads from.
    fn field_of(&self, column: ColumnId) -> Result<String> {
        self.core
            .tree()
            .column(column)
            .and_then(|c| c.desc().column.clone())
            .ok_or_else(|| RankTableError::UnknownColumn(format!("{column:?}")))
    }
}

#[async_trait]
impl<B: RemoteBackend> DataProvider for RemoteDataProvider<B> {
    fn core(&self) -> &ProviderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProviderCore {
        &mut self.core
    }

    fn sort(&self, ranking: RankingId) -> BoxFuture<'static, Result<Vec<OrderedGroup>>> {
        let request = self.sort_request(ranking);
        let backend = self.backend.clone();
        async move {
            let request = request?;
            let order = backend.sort(&request).await?;
            tracing::debug!(rows = order.len(), "remote sort finished");
            Ok(vec![OrderedGroup::ungrouped(order)])
        }
        .boxed()
    }

    fn fetch_row(&self, index: usize) -> BoxFuture<'static, Result<Value>> {
        let backend = self.backend.clone();
        async move {
            backend
                .view(&[index])
                .await?
                .into_iter()
                .next()
                .ok_or(RankTableError::UnknownRow(index))
        }
        .boxed()
    }

    async fn view(&self, indices: &[usize]) -> Result<Vec<Value>> {
        self.backend.view(indices).await
    }

    async fn mapping_sample(&self, column: ColumnId) -> Result<Vec<f64>> {
        let field = self.field_of(column)?;
        self.backend.mapping_sample(&field).await
    }

    async fn search(&self, pattern: &SearchPattern, columns: &[ColumnId]) -> Result<Vec<usize>> {
        let request = SearchRequest {
            query: pattern.to_query(),
            columns: columns
                .iter()
                .map(|&c| self.field_of(c))
                .collect::<Result<Vec<_>>>()?,
        };
        self.backend.search(&request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::number::NumberFilter;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Answers with a fixed order and records the requests it saw.
    #[derive(Default)]
    struct MockBackend {
        order: Vec<usize>,
        requests: Mutex<Vec<SortRequest>>,
    }

    #[async_trait]
    impl RemoteBackend for MockBackend {
        async fn sort(&self, request: &SortRequest) -> Result<Vec<usize>> {
            self.requests.lock().push(request.clone());
            Ok(self.order.clone())
        }

        async fn view(&self, indices: &[usize]) -> Result<Vec<Value>> {
            Ok(indices.iter().map(|i| json!({"row": i})).collect())
        }

        async fn mapping_sample(&self, column: &str) -> Result<Vec<f64>> {
            Ok(if column == "score" { vec![1.0, 2.0] } else { Vec::new() })
        }

        async fn search(&self, request: &SearchRequest) -> Result<Vec<usize>> {
            Ok(if request.query == "x" { vec![4] } else { Vec::new() })
        }
    }

    fn provider(config: ProviderConfig) -> (RemoteDataProvider<MockBackend>, RankingId, ColumnId) {
        let backend = MockBackend {
            order: vec![2, 0, 1],
            ..Default::default()
        };
        let mut provider = RemoteDataProvider::with_config(
            backend,
            vec![ColumnDesc::field("number", "score").with_domain([0.0, 10.0])],
            config,
        );
        let desc = provider.core().descs()[0].clone();
        let r = provider.core_mut().push_ranking();
        let score = provider.core_mut().push(r, &desc).unwrap();
        (provider, r, score)
    }

    #[tokio::test]
    async fn test_sort_delegates_to_backend() {
        let (mut provider, r, _) = provider(ProviderConfig::default());
        assert!(provider.reorder(r).await.unwrap());
        let ranking = provider.core().tree().ranking(r).unwrap();
        assert_eq!(&*ranking.order(), &[2, 0, 1]);
        assert_eq!(ranking.groups().len(), 1);

        let requests = provider.backend().requests.lock();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].ranking.sort_criteria.is_some());
        assert!(requests[0].rankings.is_empty());
    }

    #[tokio::test]
    async fn test_global_filter_sends_other_rankings() {
        let (mut provider, first, score) = provider(ProviderConfig::default().with_filter_globally(true));
        let desc = provider.core().descs()[0].clone();
        let second = provider.core_mut().push_ranking();
        provider.core_mut().push(second, &desc).unwrap();
        provider
            .core_mut()
            .tree_mut()
            .set_number_filter(score, NumberFilter::between(1.0, f64::NAN));
        provider.reorder(second).await.unwrap();

        let requests = provider.backend().requests.lock();
        let last = requests.last().unwrap();
        assert!(last.filter_globally);
        assert_eq!(last.rankings.len(), 1);
        assert_eq!(
            last.rankings[0],
            provider.core().tree().dump_ranking(first).unwrap()
        );
    }

    #[tokio::test]
    async fn test_rows_and_search() {
        let (mut provider, _, score) = provider(ProviderConfig::default());
        assert_eq!(provider.fetch_row(3).await.unwrap(), json!({"row": 3}));
        assert_eq!(provider.mapping_sample(score).await.unwrap(), vec![1.0, 2.0]);
        assert!(
            provider
                .search_select(&SearchPattern::parse("X").unwrap(), &[score])
                .await
                .unwrap()
        );
        assert_eq!(provider.core().selection(), vec![4]);
        assert_eq!(provider.selected_rows().await.unwrap(), vec![json!({"row": 4})]);

        let fetched = provider.fetch(&[vec![1, 0]]);
        let first = futures::future::join_all(fetched.into_iter().next().unwrap()).await;
        assert_eq!(first[0].as_ref().unwrap().data_index, 1);
    }
}
