//! Delimited-text export of a ranking.

use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde_json::Value;

use crate::column::{ColumnId, DataRow, Parent};
use crate::config::ExportOptions;
use crate::error::{RankTableError, Result};
use crate::ranking::RankingId;
use crate::tree::ColumnTree;

/// The top-level columns of a ranking that an export includes.
pub fn export_columns(tree: &ColumnTree, ranking: RankingId, options: &ExportOptions) -> Vec<ColumnId> {
    tree.members(Parent::Ranking(ranking))
        .iter()
        .copied()
        .filter(|&c| {
            let Some(col) = tree.column(c) else {
                return false;
            };
            if col.is_support() && !options.include_support {
                return false;
            }
            match &options.columns {
                Some(ids) => ids.iter().any(|id| id == col.id()),
                None => !col.is_hidden(),
            }
        })
        .collect()
}

/// Render `rows` (the rows at `order`, in that order) with each column's
/// label. Fails when a row is missing for some index of `order`.
pub fn export_table(
    tree: &ColumnTree,
    ranking: RankingId,
    order: &[usize],
    rows: &[Value],
    options: &ExportOptions,
) -> Result<String> {
    if order.len() != rows.len() {
        return Err(RankTableError::RowMismatch {
            expected: order.len(),
            actual: rows.len(),
        });
    }
    let delimiter = u8::try_from(options.separator)
        .map_err(|_| RankTableError::Config(format!("separator '{}' is not a single byte", options.separator)))?;
    let quote = u8::try_from(options.quote_char)
        .map_err(|_| RankTableError::Config(format!("quote '{}' is not a single byte", options.quote_char)))?;
    let terminator = match options.line_ending.as_str() {
        "\r\n" => Terminator::CRLF,
        "\n" => Terminator::Any(b'\n'),
        "\r" => Terminator::Any(b'\r'),
        other => {
            return Err(RankTableError::Config(format!("unsupported line ending {other:?}")));
        }
    };
    let mut writer = WriterBuilder::new()
        .delimiter(delimiter)
        .quote(quote)
        .quote_style(if options.quote { QuoteStyle::Always } else { QuoteStyle::Necessary })
        .terminator(terminator)
        .from_writer(Vec::new());

    let columns = export_columns(tree, ranking, options);
    if options.header {
        writer.write_record(columns.iter().map(|&c| tree.column(c).map_or("", |col| col.label())))?;
    }
    for (&index, row) in order.iter().zip(rows) {
        let row = DataRow::new(row, index);
        writer.write_record(columns.iter().map(|&c| tree.label(c, &row)))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| RankTableError::io("<export>", e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| RankTableError::Config(format!("export is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDesc;
    use serde_json::json;

    fn setup() -> (ColumnTree, RankingId, Vec<Value>) {
        let mut tree = ColumnTree::new();
        let r = tree.create_ranking("rank0");
        let rank_desc = ColumnDesc::new("rank", "Rank");
        let rank = tree.create("col0", rank_desc.clone(), crate::column::ColumnKind::from_desc(&rank_desc).unwrap());
        let name_desc = ColumnDesc::field("string", "name");
        let name = tree.create("col1", name_desc.clone(), crate::column::ColumnKind::from_desc(&name_desc).unwrap());
        let score_desc = ColumnDesc::field("number", "score").with_domain([0.0, 10.0]);
        let score = tree.create("col2", score_desc.clone(), crate::column::ColumnKind::from_desc(&score_desc).unwrap());
        tree.push(Parent::Ranking(r), rank);
        tree.push(Parent::Ranking(r), name);
        tree.push(Parent::Ranking(r), score);
        let rows = vec![json!({"name": "b, c", "score": 5}), json!({"name": "a", "score": 10})];
        (tree, r, rows)
    }

    #[test]
    fn test_tab_export_skips_support_columns() {
        let (tree, r, rows) = setup();
        let out = export_table(&tree, r, &[1, 0], &[rows[1].clone(), rows[0].clone()], &ExportOptions::default()).unwrap();
        assert_eq!(out, "name\tscore\na\t10.0\nb, c\t5.00\n");
    }

    #[test]
    fn test_csv_export_quotes_when_needed() {
        let (tree, r, rows) = setup();
        let options = ExportOptions::csv().with_support_columns(true);
        let out = export_table(&tree, r, &[0], &rows[..1], &options).unwrap();
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("Rank,name,score"));
        assert_eq!(lines.next(), Some(",\"b, c\",5.00"));
    }

    #[test]
    fn test_rejects_rows_missing_from_order() {
        let (tree, r, rows) = setup();
        // index 7 has no row, so only one row comes back for two indices
        let err = export_table(&tree, r, &[1, 7], &rows[1..], &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, RankTableError::RowMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_rejects_wide_separator() {
        let (tree, r, rows) = setup();
        let options = ExportOptions::default().with_separator('→');
        assert!(export_table(&tree, r, &[0], &rows[..1], &options).is_err());
    }
}
