//! Boolean columns.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::desc::ColumnDesc;
use super::{Dumpable, Filterable, ValueKind};
use crate::column::value::CellValue;
use crate::group::Group;

pub const BOOLEAN_WIDTH: f64 = 30.0;

#[derive(Debug, Clone)]
pub struct BooleanColumn {
    true_marker: String,
    false_marker: String,
    filter: Option<bool>,
}

impl Default for BooleanColumn {
    fn default() -> Self {
        Self {
            true_marker: "X".to_string(),
            false_marker: String::new(),
            filter: None,
        }
    }
}

impl BooleanColumn {
    pub fn from_desc(desc: &ColumnDesc) -> Self {
        let defaults = Self::default();
        Self {
            true_marker: desc.true_marker.clone().unwrap_or(defaults.true_marker),
            false_marker: desc.false_marker.clone().unwrap_or(defaults.false_marker),
            filter: None,
        }
    }

    /// `true`, `"true"`, `"yes"` and `"x"` (any case) are true; everything else is false.
    pub fn truth(&self, raw: &Value) -> bool {
        match raw {
            Value::Bool(b) => *b,
            Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "yes" | "x"),
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            _ => false,
        }
    }

    pub fn filter(&self) -> Option<bool> {
        self.filter
    }

    pub(crate) fn set_filter(&mut self, filter: Option<bool>) -> bool {
        if self.filter == filter {
            return false;
        }
        self.filter = filter;
        true
    }
}

impl ValueKind for BooleanColumn {
    fn value(&self, raw: &Value) -> CellValue {
        CellValue::Bool(self.truth(raw))
    }

    fn label(&self, raw: &Value) -> String {
        if self.truth(raw) {
            self.true_marker.clone()
        } else {
            self.false_marker.clone()
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        self.truth(a).cmp(&self.truth(b))
    }

    fn group(&self, raw: &Value) -> Option<Group> {
        Some(if self.truth(raw) {
            Group::new("True", "black")
        } else {
            Group::new("False", "white")
        })
    }
}

impl Filterable for BooleanColumn {
    fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }

    fn accepts(&self, raw: &Value) -> bool {
        self.filter.is_none_or(|wanted| self.truth(raw) == wanted)
    }
}

impl Dumpable for BooleanColumn {
    fn dump_state(&self, out: &mut Map<String, Value>) {
        out.insert("filter".into(), self.filter.map_or(Value::Null, Value::Bool));
    }

    fn restore_state(&mut self, dump: &Map<String, Value>) {
        self.filter = dump.get("filter").and_then(Value::as_bool);
    }
}
