//! In-memory data provider.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::column::value::json_number;
use crate::column::{ColumnDesc, ColumnId, ColumnKind, DataRow};
use crate::config::ProviderConfig;
use crate::error::{RankTableError, Result};
use crate::group::{Group, OrderedGroup};
use crate::ranking::RankingId;

use super::stats::{self, CategoricalStats, Statistics};
use super::{DataProvider, ProviderCore, SearchPattern};

/// Most distinct values a text field may have to be derived as categorical.
const MAX_DERIVED_CATEGORIES: usize = 10;

/// Rows held in memory. Sorting runs synchronously and resolves at once.
#[derive(Debug)]
pub struct LocalDataProvider {
    core: ProviderCore,
    data: Arc<Vec<Value>>,
}

impl LocalDataProvider {
    pub fn new(data: Vec<Value>, descs: Vec<ColumnDesc>) -> Self {
        Self::with_config(data, descs, ProviderConfig::default())
    }

    /// Number descriptions without a domain get the `[min, max]` of their data.
    pub fn with_config(data: Vec<Value>, mut descs: Vec<ColumnDesc>, config: ProviderConfig) -> Self {
        for desc in descs.iter_mut() {
            if desc.column_type == "number" && desc.domain.is_none() && desc.map.is_none() {
                let values = data
                    .iter()
                    .enumerate()
                    .map(|(i, row)| json_number(&desc.read(&DataRow::new(row, i))).unwrap_or(f64::NAN));
                let domain = stats::domain_of(values).unwrap_or([0.0, 1.0]);
                tracing::debug!(column = ?desc.column, ?domain, "derived number domain");
                desc.domain = Some(domain.to_vec());
            }
        }
        Self {
            core: ProviderCore::new(descs, config),
            data: Arc::new(data),
        }
    }

    /// Build a provider whose descriptions are derived from the data.
    pub fn from_rows(data: Vec<Value>) -> Self {
        let descs = derive_descs(&data);
        Self::new(data, descs)
    }

    pub fn data(&self) -> &[Value] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace the rows and resort every ranking. The selection is kept as
    /// is; clearing it is up to the caller.
    pub async fn set_data(&mut self, data: Vec<Value>) -> Result<()> {
        self.data = Arc::new(data);
        self.reorder_all().await
    }

    pub async fn append_data(&mut self, rows: Vec<Value>) -> Result<()> {
        Arc::make_mut(&mut self.data).extend(rows);
        self.reorder_all().await
    }

    async fn reorder_all(&mut self) -> Result<()> {
        for ranking in self.core.rankings().to_vec() {
            self.reorder(ranking).await?;
        }
        Ok(())
    }

    fn rows(&self, indices: Option<&[usize]>) -> Vec<DataRow<'_>> {
        match indices {
            Some(indices) => indices
                .iter()
                .filter_map(|&i| self.data.get(i).map(|v| DataRow::new(v, i)))
                .collect(),
            None => self
                .data
                .iter()
                .enumerate()
                .map(|(i, v)| DataRow::new(v, i))
                .collect(),
        }
    }

    /// Header statistics of a number-like column over `indices` (all rows
    /// when `None`).
    pub fn stats(&self, column: ColumnId, indices: Option<&[usize]>) -> Option<Statistics> {
        let tree = self.core.tree();
        if !tree.column(column)?.kind().is_number_like() {
            return None;
        }
        let values: Vec<f64> = self
            .rows(indices)
            .iter()
            .map(|row| tree.number(column, row))
            .collect();
        Some(stats::compute(&values))
    }

    /// Row counts per category of a categorical or ordinal column.
    pub fn categorical_stats(&self, column: ColumnId, indices: Option<&[usize]>) -> Option<CategoricalStats> {
        let col = self.core.tree().column(column)?;
        let categories = match col.kind() {
            ColumnKind::Categorical(c) => c.categories(),
            ColumnKind::Ordinal(c) => c.categories(),
            _ => return None,
        };
        let values: Vec<Vec<String>> = self
            .rows(indices)
            .iter()
            .map(|row| categories.values(&col.raw(row)))
            .collect();
        Some(stats::categorical(
            categories.names(),
            values.iter().map(Vec::as_slice),
        ))
    }

    /// The rankings whose filters apply when sorting `ranking`.
    fn filtering_rankings(&self, ranking: RankingId) -> Vec<RankingId> {
        let tree = self.core.tree();
        if self.core.config().filter_globally {
            self.core
                .rankings()
                .iter()
                .copied()
                .filter(|&r| tree.ranking_is_filtered(r))
                .collect()
        } else if tree.ranking_is_filtered(ranking) {
            vec![ranking]
        } else {
            Vec::new()
        }
    }

    fn compute_groups(&self, ranking: RankingId) -> Result<Vec<OrderedGroup>> {
        let tree = self.core.tree();
        let r = tree
            .ranking(ranking)
            .ok_or_else(|| RankTableError::UnknownRanking(format!("{ranking:?}")))?;
        let started = Instant::now();

        let filters = self.filtering_rankings(ranking);
        let rows: Vec<DataRow<'_>> = self
            .rows(None)
            .into_iter()
            .filter(|row| filters.iter().all(|&f| tree.ranking_accepts(f, row)))
            .collect();
        let kept = rows.len();

        let mut buckets: BTreeMap<String, (Group, Vec<DataRow<'_>>)> = BTreeMap::new();
        match r.group_column() {
            Some(column) => {
                for row in rows {
                    let group = tree.group(column, &row);
                    buckets
                        .entry(group.name.clone())
                        .or_insert_with(|| (group, Vec::new()))
                        .1
                        .push(row);
                }
            }
            None => {
                buckets.insert(String::new(), (Group::default(), rows));
            }
        }

        let groups = buckets
            .into_values()
            .map(|(group, mut rows)| {
                rows.sort_by(|a, b| tree.compare_rows(ranking, a, b));
                OrderedGroup::new(group, rows.iter().map(|row| row.index).collect::<Vec<_>>())
            })
            .collect::<Vec<_>>();
        tracing::debug!(
            ranking = %r.id(),
            rows = self.data.len(),
            kept,
            groups = groups.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "sorted ranking"
        );
        Ok(groups)
    }
}

#[async_trait]
impl DataProvider for LocalDataProvider {
    fn core(&self) -> &ProviderCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ProviderCore {
        &mut self.core
    }

    fn sort(&self, ranking: RankingId) -> BoxFuture<'static, Result<Vec<OrderedGroup>>> {
        futures::future::ready(self.compute_groups(ranking)).boxed()
    }

    fn fetch_row(&self, index: usize) -> BoxFuture<'static, Result<Value>> {
        let data = self.data.clone();
        async move {
            data.get(index)
                .cloned()
                .ok_or(RankTableError::UnknownRow(index))
        }
        .boxed()
    }

    async fn view(&self, indices: &[usize]) -> Result<Vec<Value>> {
        Ok(indices
            .iter()
            .filter_map(|&i| self.data.get(i).cloned())
            .collect())
    }

    async fn mapping_sample(&self, column: ColumnId) -> Result<Vec<f64>> {
        let tree = self.core.tree();
        if !tree.contains(column) {
            return Err(RankTableError::UnknownColumn(format!("{column:?}")));
        }
        let values: Vec<f64> = self
            .rows(None)
            .iter()
            .map(|row| tree.raw_number(column, row))
            .filter(|v| !v.is_nan())
            .collect();
        let max = self.core.config().max_mapping_sample;
        if values.len() <= max {
            return Ok(values);
        }
        Ok(fastrand::choose_multiple(values, max))
    }

    async fn search(&self, pattern: &SearchPattern, columns: &[ColumnId]) -> Result<Vec<usize>> {
        let tree = self.core.tree();
        Ok(self
            .rows(None)
            .iter()
            .filter(|row| columns.iter().any(|&c| pattern.matches(&tree.label(c, row))))
            .map(|row| row.index)
            .collect())
    }
}

/// Guess column descriptions from the fields of the rows: numbers,
/// booleans, ISO dates, categorical text with few distinct values, and
/// free text otherwise.
pub fn derive_descs(data: &[Value]) -> Vec<ColumnDesc> {
    let mut fields: Vec<String> = Vec::new();
    for row in data {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !fields.contains(key) {
                    fields.push(key.clone());
                }
            }
        }
    }
    fields
        .into_iter()
        .map(|field| derive_desc(data, field))
        .collect()
}

fn derive_desc(data: &[Value], field: String) -> ColumnDesc {
    let values: Vec<&Value> = data
        .iter()
        .filter_map(|row| row.get(&field))
        .filter(|v| match v {
            Value::Null => false,
            Value::String(s) => !crate::column::value::is_missing_marker(s),
            _ => true,
        })
        .collect();
    if values.is_empty() {
        return ColumnDesc::field("string", field);
    }
    if values.iter().all(|v| v.is_boolean()) {
        return ColumnDesc::field("boolean", field);
    }
    if values.iter().all(|v| json_number(v).is_some()) {
        let domain = stats::domain_of(values.iter().filter_map(|v| json_number(v))).unwrap_or([0.0, 1.0]);
        return ColumnDesc::field("number", field).with_domain(domain);
    }
    let texts: Vec<&str> = values.iter().filter_map(|v| v.as_str()).collect();
    if texts.len() == values.len() {
        if texts.iter().all(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").is_ok()) {
            return ColumnDesc::field("date", field);
        }
        let distinct: BTreeSet<&str> = texts.iter().copied().collect();
        if distinct.len() <= MAX_DERIVED_CATEGORIES && distinct.len() * 2 < texts.len() {
            return ColumnDesc::field("categorical", field).with_categories(distinct);
        }
    }
    ColumnDesc::field("string", field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::number::NumberFilter;
    use serde_json::json;

    fn scores() -> Vec<Value> {
        vec![
            json!({"name": "a", "score": 10}),
            json!({"name": "b", "score": null}),
            json!({"name": "c", "score": 90}),
            json!({"name": "d", "score": 50}),
            json!({"name": "e", "score": 10}),
        ]
    }

    fn provider() -> (LocalDataProvider, RankingId, ColumnId) {
        let mut provider = LocalDataProvider::new(
            scores(),
            vec![
                ColumnDesc::field("string", "name"),
                ColumnDesc::field("number", "score").with_domain([0.0, 100.0]),
            ],
        );
        let r = provider.core_mut().push_ranking();
        let desc = provider.core().descs()[1].clone();
        let score = provider.core_mut().push(r, &desc).unwrap();
        (provider, r, score)
    }

    #[tokio::test]
    async fn test_missing_values_sort_first_ascending() {
        let (mut provider, r, score) = provider();
        provider.core_mut().tree_mut().sort_by(r, Some(score), true);
        assert_eq!(provider.argsort(r).await.unwrap(), vec![1, 0, 4, 3, 2]);

        provider.core_mut().tree_mut().sort_by(r, Some(score), false);
        assert_eq!(provider.argsort(r).await.unwrap(), vec![2, 3, 0, 4, 1]);
    }

    #[tokio::test]
    async fn test_filtered_rows_are_absent() {
        let (mut provider, r, score) = provider();
        provider
            .core_mut()
            .tree_mut()
            .set_number_filter(score, NumberFilter::between(20.0, f64::NAN));
        // missing cells pass unless the filter drops them
        assert_eq!(provider.argsort(r).await.unwrap(), vec![2, 3, 1]);
    }

    #[tokio::test]
    async fn test_global_filter_applies_to_every_ranking() {
        let mut provider = LocalDataProvider::with_config(
            scores(),
            vec![
                ColumnDesc::field("string", "name"),
                ColumnDesc::field("number", "score").with_domain([0.0, 100.0]),
            ],
            ProviderConfig::default().with_filter_globally(true),
        );
        let descs = provider.core().descs().to_vec();
        let first = provider.core_mut().push_ranking();
        let score = provider.core_mut().push(first, &descs[1]).unwrap();
        let second = provider.core_mut().push_ranking();
        provider.core_mut().push(second, &descs[0]).unwrap();
        provider
            .core_mut()
            .tree_mut()
            .set_number_filter(score, NumberFilter::between(50.0, f64::NAN));
        // sorted by name, ascending
        assert_eq!(provider.argsort(second).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_group_by_boolean() {
        let data = vec![
            json!({"v": 1, "ok": true}),
            json!({"v": 2, "ok": false}),
            json!({"v": 3, "ok": true}),
        ];
        let mut provider = LocalDataProvider::from_rows(data);
        let r = provider.core_mut().derive_default();
        let columns = provider.core().tree().ranking(r).unwrap().columns().to_vec();
        let of_type = |ty: &str| {
            columns
                .iter()
                .copied()
                .find(|&c| provider.core().tree().column(c).unwrap().column_type() == ty)
                .unwrap()
        };
        let (ok, v) = (of_type("boolean"), of_type("number"));
        provider.core_mut().tree_mut().sort_by(r, Some(v), false);
        provider.core_mut().tree_mut().group_by(r, Some(ok));
        assert!(provider.reorder(r).await.unwrap());

        let groups = provider.core().tree().ranking(r).unwrap().groups().to_vec();
        let names: Vec<&str> = groups.iter().map(|g| g.group.name.as_str()).collect();
        assert_eq!(names, vec!["False", "True"]);
        assert_eq!(&*groups[1].order, &[2, 0]);
        assert_eq!(&*provider.core().tree().ranking(r).unwrap().order(), &[1, 2, 0]);
    }

    #[tokio::test]
    async fn test_fetch_row_out_of_range() {
        let (provider, _, _) = provider();
        assert_eq!(provider.fetch_row(2).await.unwrap()["name"], "c");
        let err = provider.fetch_row(5).await.unwrap_err();
        assert!(matches!(err, RankTableError::UnknownRow(5)));
        assert_eq!(err.to_string(), "Unknown row: 5");
    }

    #[tokio::test]
    async fn test_domain_is_derived_from_data() {
        let provider = LocalDataProvider::new(scores(), vec![ColumnDesc::field("number", "score")]);
        assert_eq!(provider.core().descs()[0].domain, Some(vec![10.0, 90.0]));
    }

    #[tokio::test]
    async fn test_search_and_mapping_sample() {
        let (mut provider, r, score) = provider();
        let name_desc = provider.core().descs()[0].clone();
        let name = provider.core_mut().push(r, &name_desc).unwrap();
        let hits = provider.search(&SearchPattern::parse("REGEX:^[ae]$").unwrap(), &[name]).await.unwrap();
        assert_eq!(hits, vec![0, 4]);
        assert!(provider.search_select(&SearchPattern::parse("c").unwrap(), &[name]).await.unwrap());
        assert_eq!(provider.core().selection(), vec![2]);

        let sample = provider.mapping_sample(score).await.unwrap();
        assert_eq!(sample, vec![10.0, 0.0, 90.0, 50.0, 10.0]);
    }

    #[tokio::test]
    async fn test_set_data_keeps_selection() {
        let (mut provider, r, _) = provider();
        provider.core_mut().select(4);
        provider.set_data(scores()[..2].to_vec()).await.unwrap();
        assert_eq!(provider.core().selection(), vec![4]);
        assert_eq!(provider.core().tree().ranking(r).unwrap().order().len(), 2);
        provider.append_data(vec![json!({"name": "z", "score": 100})]).await.unwrap();
        assert_eq!(&*provider.core().tree().ranking(r).unwrap().order(), &[2, 0, 1]);
    }

    #[test]
    fn test_derive_descs() {
        let data = vec![
            json!({"n": 1, "b": true, "d": "2024-01-02", "c": "x", "s": "alpha"}),
            json!({"n": "2.5", "b": false, "d": "2024-03-04", "c": "x", "s": "beta"}),
            json!({"n": null, "b": true, "d": "2024-05-06", "c": "y", "s": "gamma"}),
            json!({"n": 4, "b": false, "d": "2024-07-08", "c": "x", "s": "delta"}),
            json!({"n": 5, "b": true, "d": "2024-09-10", "c": "y", "s": "eps"}),
        ];
        let descs = derive_descs(&data);
        let types: BTreeMap<String, String> = descs
            .iter()
            .map(|d| (d.column.clone().unwrap(), d.column_type.clone()))
            .collect();
        assert_eq!(types["n"], "number");
        assert_eq!(types["b"], "boolean");
        assert_eq!(types["d"], "date");
        assert_eq!(types["c"], "categorical");
        assert_eq!(types["s"], "string");
        let n = descs.iter().find(|d| d.column.as_deref() == Some("n")).unwrap();
        assert_eq!(n.domain, Some(vec![1.0, 5.0]));
    }
}
