//! Date columns parsed and formatted with strftime patterns.

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::desc::ColumnDesc;
use super::value::{CellValue, is_missing_marker};
use super::{Dumpable, Filterable, ValueKind};

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Inclusive range filter on dates; `None` bounds are open.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateFilter {
    pub min: Option<NaiveDateTime>,
    pub max: Option<NaiveDateTime>,
    #[serde(default)]
    pub filter_missing: bool,
}

impl DateFilter {
    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some() || self.filter_missing
    }
}

#[derive(Debug, Clone)]
pub struct DateColumn {
    format: String,
    parse: String,
    filter: DateFilter,
}

impl Default for DateColumn {
    fn default() -> Self {
        Self {
            format: DEFAULT_DATE_FORMAT.to_string(),
            parse: DEFAULT_DATE_FORMAT.to_string(),
            filter: DateFilter::default(),
        }
    }
}

impl DateColumn {
    pub fn from_desc(desc: &ColumnDesc) -> Self {
        let format = desc
            .date_format
            .clone()
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
        Self {
            parse: desc.date_parse.clone().unwrap_or_else(|| format.clone()),
            format,
            filter: DateFilter::default(),
        }
    }

    /// Parse a cell: strings through the parse pattern (date-only patterns
    /// yield midnight), falling back to RFC 3339; numbers are epoch millis.
    pub fn date(&self, raw: &Value) -> Option<NaiveDateTime> {
        match raw {
            Value::String(s) if !is_missing_marker(s) => {
                let s = s.trim();
                NaiveDateTime::parse_from_str(s, &self.parse)
                    .ok()
                    .or_else(|| {
                        NaiveDate::parse_from_str(s, &self.parse)
                            .ok()
                            .and_then(|d| d.and_hms_opt(0, 0, 0))
                    })
                    .or_else(|| {
                        chrono::DateTime::parse_from_rfc3339(s)
                            .ok()
                            .map(|d| d.naive_utc())
                    })
            }
            Value::Number(n) => n
                .as_i64()
                .and_then(chrono::DateTime::from_timestamp_millis)
                .map(|d| d.naive_utc()),
            _ => None,
        }
    }

    pub fn filter(&self) -> DateFilter {
        self.filter
    }

    pub(crate) fn set_filter(&mut self, filter: DateFilter) -> bool {
        if self.filter == filter {
            return false;
        }
        self.filter = filter;
        true
    }
}

impl ValueKind for DateColumn {
    fn value(&self, raw: &Value) -> CellValue {
        self.date(raw).map_or(CellValue::Missing, CellValue::Date)
    }

    fn label(&self, raw: &Value) -> String {
        self.date(raw)
            .map(|d| d.format(&self.format).to_string())
            .unwrap_or_default()
    }

    /// Missing dates sort after present ones.
    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match (self.date(a), self.date(b)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => x.cmp(&y),
        }
    }
}

impl Filterable for DateColumn {
    fn is_filtered(&self) -> bool {
        self.filter.is_active()
    }

    fn accepts(&self, raw: &Value) -> bool {
        if !self.is_filtered() {
            return true;
        }
        match self.date(raw) {
            None => !self.filter.filter_missing,
            Some(d) => {
                self.filter.min.is_none_or(|min| d >= min) && self.filter.max.is_none_or(|max| d <= max)
            }
        }
    }
}

impl Dumpable for DateColumn {
    fn dump_state(&self, out: &mut Map<String, Value>) {
        if let Ok(filter) = serde_json::to_value(self.filter) {
            out.insert("filter".into(), filter);
        }
    }

    fn restore_state(&mut self, dump: &Map<String, Value>) {
        if let Some(filter) = dump
            .get("filter")
            .and_then(|f| serde_json::from_value(f.clone()).ok())
        {
            self.filter = filter;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_and_format() {
        let col = DateColumn::default();
        assert_eq!(col.date(&json!("2016-11-04")), Some(day(2016, 11, 4)));
        assert_eq!(col.date(&json!("2016-11-04T10:00:00Z")).map(|d| d.date()), Some(day(2016, 11, 4).date()));
        assert_eq!(col.date(&json!("NA")), None);
        assert_eq!(col.label(&json!("2016-11-04")), "2016-11-04");
        assert_eq!(col.label(&json!("garbage")), "");
    }

    #[test]
    fn test_custom_format() {
        let mut desc = ColumnDesc::field("date", "d");
        desc.date_format = Some("%d.%m.%Y".into());
        let col = DateColumn::from_desc(&desc);
        assert_eq!(col.date(&json!("04.11.2016")), Some(day(2016, 11, 4)));
    }

    #[test]
    fn test_missing_sorts_last() {
        let col = DateColumn::default();
        assert_eq!(col.compare(&json!(null), &json!("2000-01-01")), Ordering::Greater);
        assert_eq!(col.compare(&json!("1999-01-01"), &json!("2000-01-01")), Ordering::Less);
    }

    #[test]
    fn test_range_filter() {
        let mut col = DateColumn::default();
        col.set_filter(DateFilter {
            min: Some(day(2000, 1, 1)),
            max: None,
            filter_missing: true,
        });
        assert!(col.accepts(&json!("2001-05-05")));
        assert!(!col.accepts(&json!("1999-05-05")));
        assert!(!col.accepts(&json!(null)));

        let mut state = Map::new();
        col.dump_state(&mut state);
        let mut fresh = DateColumn::default();
        fresh.restore_state(&state);
        assert_eq!(fresh.filter(), col.filter());
    }
}
