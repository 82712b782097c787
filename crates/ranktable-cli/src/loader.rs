//! Loading data files into rows.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::Path;

use ranktable::{ColumnDesc, RankTableError};
use serde_json::{Map, Value};

/// Read a JSON array of objects, or a CSV/TSV file with a header row.
///
/// Delimited cells become JSON numbers or booleans where they parse as
/// such, `null` when empty, and strings otherwise.
pub fn load_rows(path: &Path) -> ranktable::Result<Vec<Value>> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if extension == "json" {
        let file = File::open(path).map_err(|e| RankTableError::io(path, e))?;
        let rows: Vec<Value> = serde_json::from_reader(BufReader::new(file))?;
        return Ok(rows);
    }

    let delimiter = match extension.as_str() {
        "tsv" | "tab" => b'\t',
        "csv" => b',',
        _ => sniff_delimiter(path)?,
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, cell)| (h.clone(), convert_cell(cell)))
            .collect();
        rows.push(Value::Object(row));
    }
    tracing::debug!(path = %path.display(), rows = rows.len(), columns = headers.len(), "loaded rows");
    Ok(rows)
}

/// Tab when the header line has more tabs than commas.
fn sniff_delimiter(path: &Path) -> ranktable::Result<u8> {
    let file = File::open(path).map_err(|e| RankTableError::io(path, e))?;
    let mut first = String::new();
    BufReader::new(file)
        .read_line(&mut first)
        .map_err(|e| RankTableError::io(path, e))?;
    let tabs = first.matches('\t').count();
    let commas = first.matches(',').count();
    Ok(if tabs > commas { b'\t' } else { b',' })
}

fn convert_cell(cell: &str) -> Value {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match trimmed.to_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(cell.to_string())
}

/// Read a JSON array of column descriptions.
pub fn load_descs(path: &Path) -> ranktable::Result<Vec<ColumnDesc>> {
    let text = fs::read_to_string(path).map_err(|e| RankTableError::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_convert_cell() {
        assert_eq!(convert_cell(""), Value::Null);
        assert_eq!(convert_cell("42"), serde_json::json!(42));
        assert_eq!(convert_cell("2.5"), serde_json::json!(2.5));
        assert_eq!(convert_cell("TRUE"), Value::Bool(true));
        assert_eq!(convert_cell("NaN"), Value::String("NaN".into()));
        assert_eq!(convert_cell("abc"), Value::String("abc".into()));
    }

    #[test]
    fn test_load_tsv_without_extension_hint() {
        let file = file_with(".txt", "name\tscore\na\t1\nb\t\n");
        let rows = load_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["score"], serde_json::json!(1));
        assert_eq!(rows[1]["score"], Value::Null);
    }

    #[test]
    fn test_load_json() {
        let file = file_with(".json", r#"[{"a": 1}, {"a": 2}]"#);
        assert_eq!(load_rows(file.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_load_descs() {
        let file = file_with(".json", r#"[{"type": "number", "column": "a", "domain": [0, 10]}]"#);
        let descs = load_descs(file.path()).unwrap();
        assert_eq!(descs[0].column_type, "number");
        assert_eq!(descs[0].domain, Some(vec![0.0, 10.0]));
    }
}
