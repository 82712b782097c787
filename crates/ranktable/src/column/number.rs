//! Numeric columns with a normalizing mapping function.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::desc::ColumnDesc;
use super::value::{CellValue, compare_numbers, format_number, json_number};
use super::{Dumpable, Filterable, ValueKind};
use crate::mapping::{MappingDump, MappingFunction, ScaleMapping, ScaleType};

/// Significant digits used for labels unless the description overrides it.
pub const DEFAULT_NUMBER_PRECISION: usize = 3;

/// Range filter on raw (unmapped) values. Unbounded ends are infinite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberFilter {
    #[serde(with = "unbounded::lower")]
    pub min: f64,
    #[serde(with = "unbounded::upper")]
    pub max: f64,
    #[serde(default)]
    pub filter_missing: bool,
}

impl Default for NumberFilter {
    fn default() -> Self {
        Self {
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            filter_missing: false,
        }
    }
}

impl NumberFilter {
    pub fn between(min: f64, max: f64) -> Self {
        // NaN bounds mean "open"
        Self {
            min: if min.is_nan() { f64::NEG_INFINITY } else { min },
            max: if max.is_nan() { f64::INFINITY } else { max },
            filter_missing: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.min.is_finite() || self.max.is_finite() || self.filter_missing
    }

    /// `raw` is `None` for a missing cell.
    pub fn accepts(&self, raw: Option<f64>) -> bool {
        match raw {
            None => !self.filter_missing,
            Some(v) => v >= self.min && v <= self.max,
        }
    }
}

/// JSON has no infinity: open bounds serialize as `null`.
mod unbounded {
    macro_rules! bound {
        ($name:ident, $open:expr) => {
            pub mod $name {
                use serde::{Deserialize, Deserializer, Serializer};

                pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
                    if v.is_finite() {
                        s.serialize_f64(*v)
                    } else {
                        s.serialize_none()
                    }
                }

                pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
                    Ok(Option::<f64>::deserialize(d)?.unwrap_or($open))
                }
            }
        };
    }

    bound!(lower, f64::NEG_INFINITY);
    bound!(upper, f64::INFINITY);
}

#[derive(Debug, Clone)]
pub struct NumberColumn {
    mapping: MappingFunction,
    original_mapping: MappingFunction,
    filter: NumberFilter,
    missing_value: f64,
    precision: usize,
}

impl NumberColumn {
    pub fn from_desc(desc: &ColumnDesc) -> Self {
        let mapping = match (&desc.map, &desc.domain) {
            (Some(map), _) => MappingFunction::from_dump(map),
            (None, Some(domain)) => MappingFunction::Scale(ScaleMapping::new(
                ScaleType::Linear,
                domain.clone(),
                desc.range.clone().unwrap_or_else(|| vec![0.0, 1.0]),
            )),
            (None, None) => MappingFunction::default(),
        };
        Self {
            original_mapping: mapping.clone(),
            mapping,
            filter: NumberFilter::default(),
            missing_value: desc.missing_value.unwrap_or(0.0),
            precision: desc.number_format.unwrap_or(DEFAULT_NUMBER_PRECISION),
        }
    }

    pub fn mapping(&self) -> &MappingFunction {
        &self.mapping
    }

    pub fn original_mapping(&self) -> &MappingFunction {
        &self.original_mapping
    }

    /// Returns `false` when the new mapping is equivalent to the current one.
    pub(crate) fn set_mapping(&mut self, mapping: MappingFunction) -> bool {
        if self.mapping.same_as(&mapping) {
            return false;
        }
        self.mapping = mapping;
        true
    }

    pub fn filter(&self) -> NumberFilter {
        self.filter
    }

    pub(crate) fn set_filter(&mut self, filter: NumberFilter) -> bool {
        if self.filter == filter {
            return false;
        }
        self.filter = filter;
        true
    }

    pub fn missing_value(&self) -> f64 {
        self.missing_value
    }

    pub(crate) fn set_missing_value(&mut self, value: f64) -> bool {
        if self.missing_value == value || (self.missing_value.is_nan() && value.is_nan()) {
            return false;
        }
        self.missing_value = value;
        true
    }

    /// The raw cell as a number, `None` when missing.
    pub fn raw_number(&self, raw: &Value) -> Option<f64> {
        json_number(raw)
    }

    /// Raw domain value with `missingValue` substituted.
    pub fn raw_value(&self, raw: &Value) -> f64 {
        self.raw_number(raw).unwrap_or(self.missing_value)
    }

    /// Normalized value in `[0, 1]`, or NaN.
    pub fn number(&self, raw: &Value) -> f64 {
        self.mapping.apply(self.raw_value(raw))
    }

    pub fn format(&self, v: f64) -> String {
        format_number(v, self.precision)
    }
}

impl ValueKind for NumberColumn {
    fn value(&self, raw: &Value) -> CellValue {
        CellValue::Number(self.number(raw))
    }

    fn label(&self, raw: &Value) -> String {
        match self.raw_number(raw) {
            Some(v) => self.format(v),
            None => String::new(),
        }
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering {
        compare_numbers(self.number(a), self.number(b))
    }
}

impl Filterable for NumberColumn {
    fn is_filtered(&self) -> bool {
        self.filter.is_active()
    }

    fn accepts(&self, raw: &Value) -> bool {
        !self.is_filtered() || self.filter.accepts(self.raw_number(raw))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NumberState {
    map: MappingDump,
    filter: NumberFilter,
    #[serde(with = "nan_as_null")]
    missing_value: f64,
}

mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        if v.is_nan() {
            s.serialize_none()
        } else {
            s.serialize_f64(*v)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
    }
}

impl Dumpable for NumberColumn {
    fn dump_state(&self, out: &mut Map<String, Value>) {
        let state = NumberState {
            map: self.mapping.dump(),
            filter: self.filter,
            missing_value: self.missing_value,
        };
        if let Ok(Value::Object(map)) = serde_json::to_value(state) {
            out.extend(map);
        }
    }

    fn restore_state(&mut self, dump: &Map<String, Value>) {
        if let Some(map) = dump.get("map").and_then(|m| serde_json::from_value::<MappingDump>(m.clone()).ok()) {
            self.mapping = MappingFunction::from_dump(&map);
        } else if let Some(domain) = dump.get("domain").and_then(|d| serde_json::from_value::<Vec<f64>>(d.clone()).ok()) {
            let range = dump
                .get("range")
                .and_then(|r| serde_json::from_value::<Vec<f64>>(r.clone()).ok())
                .unwrap_or_else(|| vec![0.0, 1.0]);
            self.mapping = MappingFunction::Scale(ScaleMapping::new(ScaleType::Linear, domain, range));
        }
        if let Some(filter) = dump.get("filter").and_then(|f| serde_json::from_value::<NumberFilter>(f.clone()).ok()) {
            self.filter = filter;
        }
        if let Some(missing) = dump.get("missingValue") {
            self.missing_value = missing.as_f64().unwrap_or(f64::NAN);
        }
    }
}
