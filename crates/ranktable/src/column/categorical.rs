//! Categorical columns and their numeric (ordinal) variant.

use std::cmp::Ordering;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::desc::{CategoryDesc, ColumnDesc, Combiner};
use super::value::{CellValue, compare_numbers, json_text};
use super::{Dumpable, Filterable, ValueKind};
use crate::group::Group;

pub const DEFAULT_SEPARATOR: &str = ";";

/// Value of an ordinal category without an explicit number.
pub const DEFAULT_CATEGORY_VALUE: f64 = 0.5;

/// The d3 category10 palette.
pub const CATEGORY10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

/// Known categories with their colors and optional display labels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Categories {
    names: Vec<String>,
    colors: Vec<String>,
    labels: IndexMap<String, String>,
    separator: String,
}

impl Categories {
    pub fn from_desc(desc: &ColumnDesc) -> Self {
        let mut names = Vec::new();
        let mut colors = Vec::new();
        let mut labels = IndexMap::new();
        for (i, cat) in desc.categories.iter().flatten().enumerate() {
            names.push(cat.name().to_string());
            let palette = CATEGORY10[i % CATEGORY10.len()].to_string();
            match cat {
                CategoryDesc::Name(_) => colors.push(palette),
                CategoryDesc::Detailed { name, label, color, .. } => {
                    if let Some(label) = label {
                        labels.insert(name.clone(), label.clone());
                    }
                    colors.push(color.clone().unwrap_or(palette));
                }
            }
        }
        Self {
            names,
            colors,
            labels,
            separator: desc
                .separator
                .clone()
                .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn colors(&self) -> &[String] {
        &self.colors
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn index_of(&self, category: &str) -> Option<usize> {
        self.names.iter().position(|n| n == category)
    }

    /// Color of a known category; unknown categories have none.
    pub fn color_of(&self, category: &str) -> Option<&str> {
        self.index_of(category)
            .and_then(|i| self.colors.get(i))
            .map(String::as_str)
    }

    pub fn label_of<'a>(&'a self, category: &'a str) -> &'a str {
        self.labels.get(category).map_or(category, String::as_str)
    }

    /// Display labels of all categories, in category order.
    pub fn category_labels(&self) -> Vec<&str> {
        self.names.iter().map(|n| self.label_of(n)).collect()
    }

    /// The categories of one cell, split on the separator.
    pub fn values(&self, raw: &Value) -> Vec<String> {
        let text = json_text(raw);
        if text.is_empty() {
            return Vec::new();
        }
        text.split(self.separator.as_str())
            .map(str::to_string)
            .collect()
    }

    pub fn labels(&self, raw: &Value) -> Vec<String> {
        self.values(raw)
            .iter()
            .map(|v| self.label_of(v).to_string())
            .collect()
    }

    pub fn label(&self, raw: &Value) -> String {
        if self.labels.is_empty() {
            return json_text(raw).into_owned();
        }
        self.labels(raw).join(&self.separator)
    }

    fn dump(&self, out: &mut Map<String, Value>, key: &str) {
        let mut colors = Map::new();
        colors.insert("domain".into(), serde_json::json!(self.names));
        colors.insert("range".into(), serde_json::json!(self.colors));
        colors.insert("separator".into(), Value::String(self.separator.clone()));
        out.insert(key.into(), Value::Object(colors));
        if !self.labels.is_empty() {
            let labels: Vec<Value> = self
                .labels
                .iter()
                .map(|(k, v)| serde_json::json!({"key": k, "value": v}))
                .collect();
            out.insert("labels".into(), Value::Array(labels));
        }
    }

    fn restore(&mut self, dump: &Map<String, Value>, key: &str) {
        if let Some(colors) = dump.get(key) {
            if let Some(domain) = string_list(colors.get("domain")) {
                self.names = domain;
            }
            if let Some(range) = string_list(colors.get("range")) {
                self.colors = range;
            }
            if let Some(sep) = colors.get("separator").and_then(Value::as_str) {
                self.separator = sep.to_string();
            }
        }
        if let Some(Value::Array(labels)) = dump.get("labels") {
            self.labels = labels
                .iter()
                .filter_map(|e| {
                    Some((
                        e.get("key")?.as_str()?.to_string(),
                        e.get("value")?.as_str()?.to_string(),
                    ))
                })
                .collect();
        }
    }
}

fn string_list(v: Option<&Value>) -> Option<Vec<String>> {
    v.and_then(|v| serde_json::from_value(v.clone()).ok())
}

/// Filter over the categories of a row. Every category of a row must pass.
#[derive(Debug, Clone)]
pub enum CategoricalFilter {
    /// Keep rows whose categories are all in this set.
    OneOf(Vec<String>),
    /// Case-insensitive substring on each category.
    Contains(String),
    Regex(Regex),
}

impl PartialEq for CategoricalFilter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CategoricalFilter::OneOf(a), CategoricalFilter::OneOf(b)) => a == b,
            (CategoricalFilter::Contains(a), CategoricalFilter::Contains(b)) => a == b,
            (CategoricalFilter::Regex(a), CategoricalFilter::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

/// Serialized shape of [`CategoricalFilter`].
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FilterDump {
    List(Vec<String>),
    Text(String),
}

impl CategoricalFilter {
    pub fn accepts(&self, values: &[String]) -> bool {
        values.iter().all(|v| match self {
            CategoricalFilter::OneOf(allowed) => allowed.is_empty() || allowed.contains(v),
            CategoricalFilter::Contains(needle) => {
                needle.is_empty() || v.to_lowercase().contains(&needle.to_lowercase())
            }
            CategoricalFilter::Regex(re) => re.is_match(v),
        })
    }

    fn to_dump(&self) -> Value {
        let dump = match self {
            CategoricalFilter::OneOf(list) => FilterDump::List(list.clone()),
            CategoricalFilter::Contains(s) => FilterDump::Text(s.clone()),
            CategoricalFilter::Regex(re) => {
                FilterDump::Text(format!("{}{}", super::string::REGEX_PREFIX, re.as_str()))
            }
        };
        serde_json::to_value(dump).unwrap_or(Value::Null)
    }

    fn from_dump(v: &Value) -> Option<Self> {
        match serde_json::from_value::<FilterDump>(v.clone()).ok()? {
            FilterDump::List(list) => Some(CategoricalFilter::OneOf(list)),
            FilterDump::Text(text) => match text.strip_prefix(super::string::REGEX_PREFIX) {
                Some(pattern) => Regex::new(pattern).ok().map(CategoricalFilter::Regex),
                None => Some(CategoricalFilter::Contains(text)),
            },
        }
    }
}

/// Lexicographic over the category lists, then shorter first.
fn compare_category_lists(a: &[String], b: &[String]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

#[derive(Debug, Clone)]
pub struct CategoricalColumn {
    categories: Categories,
    filter: Option<CategoricalFilter>,
}

impl CategoricalColumn {
    pub fn from_desc(desc: &ColumnDesc) -> Self {
        Self {
            categories: Categories::from_desc(desc),
            filter: None,
        }
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    pub fn filter(&self) -> Option<&CategoricalFilter> {
        self.filter.as_ref()
    }

    pub(crate) fn set_filter(&mut self, filter: Option<CategoricalFilter>) -> bool {
        if self.filter == filter {
            return false;
        }
        self.filter = filter;
        true
    }
}

impl ValueKind for CategoricalColumn {
    /// The first category of the cell.
    fn value(&self, raw: &Value) -> CellValue {
        self.categories
            .values(raw)
            .into_iter()
            .next()
            .map_or(CellValue::Missing, CellValue::Text)
    }

    fn label(&self, raw: &Value) -> String {
        self.categories.label(raw)
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        compare_category_lists(&self.categories.values(a), &self.categories.values(b))
    }

    fn color(&self, raw: &Value) -> Option<String> {
        let first = self.categories.values(raw).into_iter().next()?;
        self.categories.color_of(&first).map(str::to_string)
    }

    fn group(&self, raw: &Value) -> Option<Group> {
        category_group(&self.categories, raw)
    }
}

fn category_group(categories: &Categories, raw: &Value) -> Option<Group> {
    let first = categories.values(raw).into_iter().next()?;
    let color = categories.color_of(&first).unwrap_or("gray").to_string();
    Some(Group::new(categories.label_of(&first), color))
}

impl Filterable for CategoricalColumn {
    fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    fn accepts(&self, raw: &Value) -> bool {
        match &self.filter {
            None => true,
            Some(filter) => filter.accepts(&self.categories.values(raw)),
        }
    }
}

impl Dumpable for CategoricalColumn {
    fn dump_state(&self, out: &mut Map<String, Value>) {
        out.insert(
            "filter".into(),
            self.filter.as_ref().map_or(Value::Null, CategoricalFilter::to_dump),
        );
        self.categories.dump(out, "colors");
    }

    fn restore_state(&mut self, dump: &Map<String, Value>) {
        self.filter = dump.get("filter").and_then(CategoricalFilter::from_dump);
        self.categories.restore(dump, "colors");
    }
}

/// Categories mapped onto numbers; a multi-category cell is combined.
#[derive(Debug, Clone)]
pub struct OrdinalColumn {
    categories: Categories,
    values: Vec<f64>,
    combiner: Combiner,
    filter: Option<CategoricalFilter>,
}

impl OrdinalColumn {
    pub fn from_desc(desc: &ColumnDesc) -> Self {
        let categories = Categories::from_desc(desc);
        let values = desc
            .categories
            .iter()
            .flatten()
            .map(|c| match c {
                CategoryDesc::Detailed { value: Some(v), .. } => *v,
                _ => DEFAULT_CATEGORY_VALUE,
            })
            .collect();
        Self {
            categories,
            values,
            combiner: desc.combiner.unwrap_or_default(),
            filter: None,
        }
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    /// The number of each category, aligned with [`Categories::names`].
    pub fn mapping(&self) -> &[f64] {
        &self.values
    }

    pub(crate) fn set_mapping(&mut self, values: Vec<f64>) -> bool {
        if self.values == values {
            return false;
        }
        self.values = values;
        true
    }

    pub fn combiner(&self) -> Combiner {
        self.combiner
    }

    pub fn filter(&self) -> Option<&CategoricalFilter> {
        self.filter.as_ref()
    }

    pub(crate) fn set_filter(&mut self, filter: Option<CategoricalFilter>) -> bool {
        if self.filter == filter {
            return false;
        }
        self.filter = filter;
        true
    }

    fn value_of(&self, category: &str) -> f64 {
        self.categories
            .index_of(category)
            .and_then(|i| self.values.get(i))
            .copied()
            .unwrap_or(f64::NAN)
    }

    /// The numbers of every category of the cell (NaN for unknown ones).
    pub fn numbers(&self, raw: &Value) -> Vec<f64> {
        self.categories
            .values(raw)
            .iter()
            .map(|c| self.value_of(c))
            .collect()
    }

    /// Combined number of the cell; 0 when it has no categories.
    pub fn number(&self, raw: &Value) -> f64 {
        let numbers = self.numbers(raw);
        if numbers.is_empty() {
            return 0.0;
        }
        let known = numbers.iter().copied().filter(|v| !v.is_nan());
        match self.combiner {
            Combiner::Max => known.reduce(f64::max).unwrap_or(f64::NAN),
            Combiner::Min => known.reduce(f64::min).unwrap_or(f64::NAN),
            Combiner::Mean => numbers.iter().sum::<f64>() / numbers.len() as f64,
        }
    }
}

impl ValueKind for OrdinalColumn {
    fn value(&self, raw: &Value) -> CellValue {
        CellValue::Number(self.number(raw))
    }

    fn label(&self, raw: &Value) -> String {
        self.categories.label(raw)
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        compare_numbers(self.number(a), self.number(b))
    }

    /// Color of the category attaining the combined extremum, first wins ties.
    fn color(&self, raw: &Value) -> Option<String> {
        let cats = self.categories.values(raw);
        let mut best: Option<(usize, f64)> = None;
        for (i, cat) in cats.iter().enumerate() {
            let v = self.value_of(cat);
            let better = match (best, self.combiner) {
                (None, _) => true,
                (Some((_, b)), Combiner::Max) => v > b,
                (Some((_, b)), Combiner::Min) => v < b,
                (Some(_), Combiner::Mean) => false,
            };
            if better {
                best = Some((i, v));
            }
        }
        let (i, _) = best?;
        self.categories.color_of(&cats[i]).map(str::to_string)
    }

    fn group(&self, raw: &Value) -> Option<Group> {
        category_group(&self.categories, raw)
    }
}

impl Filterable for OrdinalColumn {
    fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    fn accepts(&self, raw: &Value) -> bool {
        match &self.filter {
            None => true,
            Some(filter) => filter.accepts(&self.categories.values(raw)),
        }
    }
}

impl Dumpable for OrdinalColumn {
    fn dump_state(&self, out: &mut Map<String, Value>) {
        out.insert(
            "filter".into(),
            self.filter.as_ref().map_or(Value::Null, CategoricalFilter::to_dump),
        );
        self.categories.dump(out, "colors");
        out.insert(
            "scale".into(),
            serde_json::json!({"domain": self.categories.names(), "range": self.values}),
        );
    }

    fn restore_state(&mut self, dump: &Map<String, Value>) {
        self.filter = dump.get("filter").and_then(CategoricalFilter::from_dump);
        self.categories.restore(dump, "colors");
        if let Some(range) = dump
            .get("scale")
            .and_then(|s| s.get("range"))
            .and_then(|r| serde_json::from_value::<Vec<f64>>(r.clone()).ok())
        {
            self.values = range;
        }
    }
}
