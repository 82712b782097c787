//! Export command - write a ranking as delimited text.

use std::fs;
use std::path::PathBuf;

use colored::Colorize;
use ranktable::{DataProvider, ExportOptions};

use crate::cli::RankingArgs;

use super::{CommandResult, build_ranking, load_provider};

pub async fn run(
    args: RankingArgs,
    output: PathBuf,
    separator: Option<char>,
    quote: bool,
    support_columns: bool,
    verbose: bool,
) -> CommandResult {
    let mut provider = load_provider(&args.input, args.columns.as_deref())?;
    let ranking = build_ranking(&mut provider, &args).await?;

    let options = export_options(&output, separator)
        .with_quote(quote)
        .with_support_columns(support_columns);
    let text = provider.export_table(ranking, &options).await?;
    fs::write(&output, &text).map_err(|e| format!("Failed to write {}: {}", output.display(), e))?;

    let rows = text.lines().count().saturating_sub(usize::from(options.header));
    println!(
        "{} {} rows to {}",
        "Exported".green().bold(),
        rows,
        output.display().to_string().white()
    );
    if verbose {
        eprintln!("Separator: {:?}", options.separator);
    }
    Ok(())
}

/// Comma for `.csv` outputs, tab otherwise, unless overridden.
fn export_options(output: &std::path::Path, separator: Option<char>) -> ExportOptions {
    let is_csv = output
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let options = if is_csv { ExportOptions::csv() } else { ExportOptions::default() };
    match separator {
        Some(separator) => options.with_separator(separator),
        None => options,
    }
}
