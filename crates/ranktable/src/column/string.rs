//! Text columns: plain strings, links and user annotations.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{Map, Value};

use super::desc::{Alignment, ColumnDesc};
use super::value::{CellValue, compare_text, json_text};
use super::{Dumpable, Filterable, ValueKind};

/// Filter value selecting rows with a non-empty string.
pub const FILTER_MISSING: &str = "__FILTER_MISSING";

/// Prefix marking a serialized regex filter.
pub const REGEX_PREFIX: &str = "REGEX:";

/// Default width of text columns.
pub const STRING_WIDTH: f64 = 200.0;

#[derive(Debug, Clone)]
pub enum StringFilter {
    /// Case-insensitive substring match.
    Contains(String),
    Regex(Regex),
    /// Drop rows with an empty value.
    NotMissing,
}

impl PartialEq for StringFilter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (StringFilter::Contains(a), StringFilter::Contains(b)) => a == b,
            (StringFilter::Regex(a), StringFilter::Regex(b)) => a.as_str() == b.as_str(),
            (StringFilter::NotMissing, StringFilter::NotMissing) => true,
            _ => false,
        }
    }
}

impl StringFilter {
    /// Parse the serialized form. An empty string means no filter.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        if s == FILTER_MISSING {
            return Some(StringFilter::NotMissing);
        }
        if let Some(pattern) = s.strip_prefix(REGEX_PREFIX) {
            return match Regex::new(pattern) {
                Ok(re) => Some(StringFilter::Regex(re)),
                Err(err) => {
                    tracing::warn!(%pattern, %err, "invalid regex filter, ignoring");
                    None
                }
            };
        }
        Some(StringFilter::Contains(s.to_string()))
    }

    pub fn to_dump(&self) -> String {
        match self {
            StringFilter::Contains(s) => s.clone(),
            StringFilter::Regex(re) => format!("{REGEX_PREFIX}{}", re.as_str()),
            StringFilter::NotMissing => FILTER_MISSING.to_string(),
        }
    }

    pub fn accepts(&self, value: &str) -> bool {
        match self {
            StringFilter::NotMissing => !value.is_empty(),
            StringFilter::Contains(needle) => value.to_lowercase().contains(&needle.to_lowercase()),
            StringFilter::Regex(re) => re.is_match(value),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StringColumn {
    alignment: Alignment,
    filter: Option<StringFilter>,
}

impl StringColumn {
    pub fn from_desc(desc: &ColumnDesc) -> Self {
        Self {
            alignment: desc.alignment.unwrap_or_default(),
            filter: None,
        }
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn filter(&self) -> Option<&StringFilter> {
        self.filter.as_ref()
    }

    pub(crate) fn set_filter(&mut self, filter: Option<StringFilter>) -> bool {
        if self.filter == filter {
            return false;
        }
        self.filter = filter;
        true
    }

    pub fn text(&self, raw: &Value) -> String {
        json_text(raw).into_owned()
    }
}

/// Empty strings sort after everything else.
pub fn compare_strings(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => compare_text(a, b),
    }
}

impl ValueKind for StringColumn {
    fn value(&self, raw: &Value) -> CellValue {
        CellValue::Text(self.text(raw))
    }

    fn label(&self, raw: &Value) -> String {
        self.text(raw)
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        compare_strings(&json_text(a), &json_text(b))
    }
}

impl Filterable for StringColumn {
    fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    fn accepts(&self, raw: &Value) -> bool {
        match &self.filter {
            None => true,
            Some(filter) => filter.accepts(&json_text(raw)),
        }
    }
}

impl Dumpable for StringColumn {
    fn dump_state(&self, out: &mut Map<String, Value>) {
        out.insert(
            "filter".into(),
            self.filter
                .as_ref()
                .map_or(Value::Null, |f| Value::String(f.to_dump())),
        );
        out.insert(
            "alignment".into(),
            serde_json::to_value(self.alignment).unwrap_or(Value::Null),
        );
    }

    fn restore_state(&mut self, dump: &Map<String, Value>) {
        self.filter = dump
            .get("filter")
            .and_then(Value::as_str)
            .and_then(StringFilter::parse);
        if let Some(alignment) = dump
            .get("alignment")
            .and_then(|a| serde_json::from_value(a.clone()).ok())
        {
            self.alignment = alignment;
        }
    }
}

/// A string column whose values are rendered as hyperlinks.
///
/// With a link pattern, `$1` is replaced by the cell value. Cells may also be
/// objects `{href, alt}` where `alt` is the visible label.
#[derive(Debug, Clone, Default)]
pub struct LinkColumn {
    string: StringColumn,
    link: Option<String>,
}

impl LinkColumn {
    pub fn from_desc(desc: &ColumnDesc) -> Self {
        Self {
            string: StringColumn::from_desc(desc),
            link: desc.link.clone(),
        }
    }

    pub fn string(&self) -> &StringColumn {
        &self.string
    }

    pub(crate) fn string_mut(&mut self) -> &mut StringColumn {
        &mut self.string
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub(crate) fn set_link(&mut self, link: Option<String>) -> bool {
        if self.link == link {
            return false;
        }
        self.link = link;
        true
    }

    /// The target URL for a cell.
    pub fn href(&self, raw: &Value) -> String {
        if let Some(href) = raw.get("href").and_then(Value::as_str) {
            return href.to_string();
        }
        let text = json_text(raw);
        match &self.link {
            Some(pattern) if !text.is_empty() => pattern.replace("$1", &text),
            _ => text.into_owned(),
        }
    }
}

impl ValueKind for LinkColumn {
    fn value(&self, raw: &Value) -> CellValue {
        CellValue::Text(self.href(raw))
    }

    fn label(&self, raw: &Value) -> String {
        if let Some(alt) = raw.get("alt").and_then(Value::as_str) {
            return alt.to_string();
        }
        self.string.text(raw)
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        compare_strings(&self.label(a), &self.label(b))
    }
}

impl Filterable for LinkColumn {
    fn is_filtered(&self) -> bool {
        self.string.is_filtered()
    }

    fn accepts(&self, raw: &Value) -> bool {
        match self.string.filter() {
            None => true,
            Some(filter) => filter.accepts(&self.label(raw)),
        }
    }
}

impl Dumpable for LinkColumn {
    fn dump_state(&self, out: &mut Map<String, Value>) {
        self.string.dump_state(out);
        if let Some(link) = &self.link {
            out.insert("link".into(), Value::String(link.clone()));
        }
    }

    fn restore_state(&mut self, dump: &Map<String, Value>) {
        self.string.restore_state(dump);
        if let Some(link) = dump.get("link").and_then(Value::as_str) {
            self.link = Some(link.to_string());
        }
    }
}

/// A string column whose values can be overridden per row.
#[derive(Debug, Clone, Default)]
pub struct AnnotateColumn {
    string: StringColumn,
    annotations: BTreeMap<usize, String>,
}

impl AnnotateColumn {
    pub fn from_desc(desc: &ColumnDesc) -> Self {
        Self {
            string: StringColumn::from_desc(desc),
            annotations: BTreeMap::new(),
        }
    }

    pub fn string(&self) -> &StringColumn {
        &self.string
    }

    pub(crate) fn string_mut(&mut self) -> &mut StringColumn {
        &mut self.string
    }

    pub fn annotation(&self, row: usize) -> Option<&str> {
        self.annotations.get(&row).map(String::as_str)
    }

    pub fn annotations(&self) -> &BTreeMap<usize, String> {
        &self.annotations
    }

    /// Returns `false` if the row already carries exactly this text.
    pub(crate) fn set_annotation(&mut self, row: usize, text: String) -> bool {
        if self.annotations.get(&row) == Some(&text) {
            return false;
        }
        self.annotations.insert(row, text);
        true
    }

    /// The annotated text of a row, falling back to the data.
    pub fn text(&self, raw: &Value, row: usize) -> String {
        match self.annotation(row) {
            Some(text) => text.to_string(),
            None => self.string.text(raw),
        }
    }

    /// Filters see the annotated text.
    pub fn accepts(&self, raw: &Value, row: usize) -> bool {
        match self.string.filter() {
            None => true,
            Some(filter) => filter.accepts(&self.text(raw, row)),
        }
    }
}

impl Dumpable for AnnotateColumn {
    fn dump_state(&self, out: &mut Map<String, Value>) {
        self.string.dump_state(out);
        let annotations: Map<String, Value> = self
            .annotations
            .iter()
            .map(|(row, text)| (row.to_string(), Value::String(text.clone())))
            .collect();
        out.insert("annotations".into(), Value::Object(annotations));
    }

    fn restore_state(&mut self, dump: &Map<String, Value>) {
        self.string.restore_state(dump);
        if let Some(Value::Object(annotations)) = dump.get("annotations") {
            self.annotations = annotations
                .iter()
                .filter_map(|(row, text)| {
                    Some((row.parse::<usize>().ok()?, text.as_str()?.to_string()))
                })
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_parse_variants() {
        assert_eq!(StringFilter::parse(""), None);
        assert_eq!(StringFilter::parse(FILTER_MISSING), Some(StringFilter::NotMissing));
        assert!(matches!(StringFilter::parse("REGEX:^a.c$"), Some(StringFilter::Regex(_))));
        assert_eq!(StringFilter::parse("REGEX:("), None);
        assert_eq!(
            StringFilter::parse("abc"),
            Some(StringFilter::Contains("abc".into()))
        );
    }

    #[test]
    fn test_filter_semantics() {
        assert!(StringFilter::Contains("LIN".into()).accepts("Berlin"));
        assert!(!StringFilter::Contains("x".into()).accepts("Berlin"));
        assert!(StringFilter::parse("REGEX:^B").unwrap().accepts("Berlin"));
        assert!(!StringFilter::NotMissing.accepts(""));
    }

    #[test]
    fn test_empty_strings_sort_last() {
        let col = StringColumn::default();
        assert_eq!(col.compare(&json!(""), &json!("a")), Ordering::Greater);
        assert_eq!(col.compare(&json!(null), &json!("")), Ordering::Equal);
        assert_eq!(col.compare(&json!("b"), &json!("A")), Ordering::Greater);
    }

    #[test]
    fn test_string_dump_restore() {
        let mut col = StringColumn::default();
        col.set_filter(StringFilter::parse("REGEX:a+"));
        let mut state = Map::new();
        col.dump_state(&mut state);
        assert_eq!(state["filter"], json!("REGEX:a+"));

        let mut fresh = StringColumn::default();
        fresh.restore_state(&state);
        assert_eq!(fresh.filter(), col.filter());
    }

    #[test]
    fn test_link_pattern_and_objects() {
        let mut desc = ColumnDesc::field("link", "id");
        desc.link = Some("https://example.org/$1".into());
        let col = LinkColumn::from_desc(&desc);
        assert_eq!(col.href(&json!("42")), "https://example.org/42");
        assert_eq!(col.href(&json!(null)), "");

        let obj = json!({"href": "https://a.b", "alt": "A"});
        assert_eq!(col.href(&obj), "https://a.b");
        assert_eq!(col.label(&obj), "A");
    }

    #[test]
    fn test_annotations_override_and_dump() {
        let mut col = AnnotateColumn::default();
        assert!(col.set_annotation(1, "note".into()));
        assert!(!col.set_annotation(1, "note".into()));
        assert_eq!(col.text(&json!("data"), 1), "note");
        assert_eq!(col.text(&json!("data"), 0), "data");

        let mut state = Map::new();
        col.dump_state(&mut state);
        let mut fresh = AnnotateColumn::default();
        fresh.restore_state(&state);
        assert_eq!(fresh.annotations(), col.annotations());
    }
}
