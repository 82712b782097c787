//! Row access and cell values.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDateTime;
use serde_json::Value;

/// One data row together with its index in the provider's dataset.
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    pub v: &'a Value,
    pub index: usize,
}

impl<'a> DataRow<'a> {
    pub fn new(v: &'a Value, index: usize) -> Self {
        Self { v, index }
    }

    /// Read a field by name. Array rows accept numeric field names.
    pub fn field(&self, name: &str) -> Option<&'a Value> {
        match self.v {
            Value::Object(map) => map.get(name),
            Value::Array(items) => name.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }
}

/// The typed value a column derives for a row.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Missing,
    Number(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDateTime),
}

impl CellValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    /// Numeric view: NaN for anything that is not a number.
    pub fn as_number(&self) -> f64 {
        match self {
            CellValue::Number(n) => *n,
            CellValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => f64::NAN,
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            CellValue::Text(s) => Cow::Borrowed(s),
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Convert back into JSON, e.g. for the remote backend or the CLI.
    pub fn to_json(&self) -> Value {
        match self {
            CellValue::Missing => Value::Null,
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            CellValue::Text(s) => Value::String(s.clone()),
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Date(d) => Value::String(d.format("%Y-%m-%dT%H:%M:%S").to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Missing => Ok(()),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Strings treated as a missing number.
pub fn is_missing_marker(s: &str) -> bool {
    matches!(s.trim(), "" | "NA" | "na" | "NaN" | "nan" | "null" | "NULL" | "N/A")
}

/// Interpret a raw JSON value as a number; `None` when it is missing or not numeric.
pub fn json_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64().filter(|f| !f.is_nan()),
        Value::String(s) if !is_missing_marker(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Interpret a raw JSON value as text; null becomes the empty string.
pub fn json_text(v: &Value) -> Cow<'_, str> {
    match v {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s),
        Value::Number(n) => Cow::Owned(n.to_string()),
        Value::Bool(b) => Cow::Owned(b.to_string()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Total order on numbers: two NaNs are equal, NaN sorts after every real number.
pub fn compare_numbers(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Case-insensitive comparison, falling back to exact order on ties.
pub fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Format with `precision` significant digits, trimming nothing.
///
/// Very large or very small magnitudes use exponent notation.
pub fn format_number(v: f64, precision: usize) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "∞" } else { "-∞" }.to_string();
    }
    let precision = precision.max(1);
    if v == 0.0 {
        return format!("{:.*}", precision - 1, 0.0);
    }
    let exponent = v.abs().log10().floor() as i32;
    if exponent < -6 || exponent >= precision as i32 + 3 {
        return format!("{:.*e}", precision - 1, v);
    }
    let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
    format!("{v:.decimals$}")
}
