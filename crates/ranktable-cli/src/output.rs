//! Printing a sorted ranking to the terminal.

use colored::Colorize;
use serde_json::Value;

use ranktable::provider::export::{export_columns, export_table};
use ranktable::{ColumnKind, DataProvider, DataRow, ExportOptions, LocalDataProvider, RankTableError, RankingId};

use crate::cli::OutputFormat;

/// Widest a table cell gets before it is cut.
const MAX_CELL_WIDTH: usize = 40;

/// Print the first `top` rows of a ranking in `format`.
pub async fn print_ranking(
    provider: &LocalDataProvider,
    ranking: RankingId,
    format: OutputFormat,
    top: Option<usize>,
) -> ranktable::Result<()> {
    let tree = provider.core().tree();
    let current = tree
        .ranking(ranking)
        .ok_or_else(|| RankTableError::UnknownRanking(format!("{ranking:?}")))?;
    let mut order = current.order().to_vec();
    if let Some(top) = top {
        order.truncate(top);
    }
    let rows = provider.view(&order).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&Value::Array(rows))?);
        }
        OutputFormat::Tsv | OutputFormat::Csv => {
            let options = if format == OutputFormat::Csv {
                ExportOptions::csv()
            } else {
                ExportOptions::default()
            };
            print!("{}", export_table(tree, ranking, &order, &rows, &options)?);
        }
        OutputFormat::Table => {
            // the rank column is the only support column worth a terminal cell
            let columns: Vec<_> = export_columns(tree, ranking, &ExportOptions::default().with_support_columns(true))
                .into_iter()
                .filter(|&c| {
                    tree.column(c)
                        .is_some_and(|col| !col.is_support() || matches!(col.kind(), ColumnKind::Rank))
                })
                .collect();
            let header: Vec<String> = columns
                .iter()
                .map(|&c| tree.column(c).map_or(String::new(), |col| col.label().to_string()))
                .collect();
            let cells: Vec<Vec<String>> = order
                .iter()
                .zip(&rows)
                .map(|(&index, row)| {
                    let row = DataRow::new(row, index);
                    columns.iter().map(|&c| clip(&tree.label(c, &row))).collect()
                })
                .collect();

            let widths: Vec<usize> = (0..header.len())
                .map(|i| {
                    cells
                        .iter()
                        .map(|r| r[i].chars().count())
                        .chain(std::iter::once(header[i].chars().count()))
                        .max()
                        .unwrap_or(0)
                })
                .collect();

            println!("{}", format_line(&header, &widths).cyan().bold());

            // group headers only when the ranking is actually grouped
            let groups = current.groups();
            let grouped = groups.len() > 1 || current.group_column().is_some();
            let mut printed = 0;
            for group in groups {
                if printed >= cells.len() {
                    break;
                }
                if grouped {
                    println!("{} ({})", group.group.name.yellow().bold(), group.order.len());
                }
                let take = group.order.len().min(cells.len() - printed);
                for line in &cells[printed..printed + take] {
                    println!("{}", format_line(line, &widths));
                }
                printed += take;
            }

            let total = current.order().len();
            if total > order.len() {
                println!("{}", format!("... {} more rows", total - order.len()).dimmed());
            }
        }
    }
    Ok(())
}

fn format_line(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{:<width$}", cell, width = width))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn clip(label: &str) -> String {
    if label.chars().count() <= MAX_CELL_WIDTH {
        label.to_string()
    } else {
        let cut: String = label.chars().take(MAX_CELL_WIDTH - 3).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip() {
        assert_eq!(clip("short"), "short");
        let long = "x".repeat(60);
        let clipped = clip(&long);
        assert_eq!(clipped.chars().count(), MAX_CELL_WIDTH);
        assert!(clipped.ends_with("..."));
    }

    #[test]
    fn test_format_line() {
        let line = format_line(&["a".into(), "bb".into()], &[3, 4]);
        assert_eq!(line, "a    bb");
    }
}
