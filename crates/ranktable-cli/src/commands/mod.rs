//! CLI command implementations.

pub mod describe;
pub mod dump;
pub mod export;
pub mod rank;
pub mod restore;

use std::path::Path;

use ranktable::column::{CategoricalFilter, NumberFilter, StringFilter};
use ranktable::{ColumnId, ColumnKind, DataProvider, LocalDataProvider, RankingId};

use crate::cli::RankingArgs;
use crate::loader;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Load the data and its column descriptions.
pub fn load_provider(input: &Path, columns: Option<&Path>) -> Result<LocalDataProvider, Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("File not found: {}", input.display()).into());
    }
    let rows = loader::load_rows(input)?;
    let provider = match columns {
        Some(path) => LocalDataProvider::new(rows, loader::load_descs(path)?),
        None => LocalDataProvider::from_rows(rows),
    };
    Ok(provider)
}

/// Build the default ranking, apply sorting, grouping and filters, and sort.
pub async fn build_ranking(
    provider: &mut LocalDataProvider,
    args: &RankingArgs,
) -> Result<RankingId, Box<dyn std::error::Error>> {
    let ranking = provider.core_mut().derive_default();

    if let Some(name) = &args.sort {
        let column = find_column(provider, ranking, name).ok_or_else(|| format!("Unknown sort column: {}", name))?;
        let tree = provider.core_mut().tree_mut();
        let ascending = if args.asc {
            true
        } else if args.desc {
            false
        } else {
            tree.default_ascending(column)
        };
        tree.sort_by(ranking, Some(column), ascending);
    }

    if let Some(name) = &args.group {
        let column = find_column(provider, ranking, name).ok_or_else(|| format!("Unknown group column: {}", name))?;
        provider.core_mut().tree_mut().group_by(ranking, Some(column));
    }

    for entry in &args.filter {
        let (name, expr) = entry
            .split_once('=')
            .ok_or_else(|| format!("Filter must be COLUMN=EXPR: {}", entry))?;
        let column = find_column(provider, ranking, name.trim())
            .ok_or_else(|| format!("Unknown filter column: {}", name))?;
        apply_filter(provider, column, expr.trim())?;
    }

    provider.flush().await?;
    Ok(ranking)
}

/// A ranking column by data field or label, case-insensitively.
pub fn find_column(provider: &LocalDataProvider, ranking: RankingId, name: &str) -> Option<ColumnId> {
    let tree = provider.core().tree();
    tree.ranking_columns(ranking).into_iter().find(|&c| {
        tree.column(c).is_some_and(|col| {
            col.desc().column.as_deref().is_some_and(|f| f.eq_ignore_ascii_case(name))
                || col.label().eq_ignore_ascii_case(name)
        })
    })
}

enum FilterKind {
    Number,
    Text,
    Boolean,
    Category,
}

fn apply_filter(provider: &mut LocalDataProvider, column: ColumnId, expr: &str) -> Result<(), String> {
    let tree = provider.core_mut().tree_mut();
    let kind = match tree.column(column).map(|c| c.kind()) {
        Some(ColumnKind::Number(_)) => FilterKind::Number,
        Some(ColumnKind::String(_) | ColumnKind::Link(_) | ColumnKind::Annotate(_)) => FilterKind::Text,
        Some(ColumnKind::Boolean(_)) => FilterKind::Boolean,
        Some(ColumnKind::Categorical(_) | ColumnKind::Ordinal(_)) => FilterKind::Category,
        Some(other) => return Err(format!("Column type '{}' cannot be filtered", other.renderer_type())),
        None => return Err("Filter column is not part of the ranking".to_string()),
    };
    match kind {
        FilterKind::Number => {
            tree.set_number_filter(column, parse_range(expr)?);
        }
        FilterKind::Text => {
            tree.set_string_filter(column, StringFilter::parse(expr));
        }
        FilterKind::Boolean => {
            let value = match expr.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                "" | "any" => None,
                _ => return Err(format!("Boolean filter must be true or false: {}", expr)),
            };
            tree.set_boolean_filter(column, value);
        }
        FilterKind::Category => {
            let allowed = expr.split(',').map(|s| s.trim().to_string()).collect();
            tree.set_categorical_filter(column, Some(CategoricalFilter::OneOf(allowed)));
        }
    }
    Ok(())
}

/// `min..max` with either side optional.
fn parse_range(expr: &str) -> Result<NumberFilter, String> {
    let (min, max) = expr
        .split_once("..")
        .ok_or_else(|| format!("Number filter must be MIN..MAX: {}", expr))?;
    let bound = |s: &str| -> Result<f64, String> {
        let s = s.trim();
        if s.is_empty() {
            Ok(f64::NAN)
        } else {
            s.parse().map_err(|_| format!("Invalid number in filter: {}", s))
        }
    };
    Ok(NumberFilter::between(bound(min)?, bound(max)?))
}
