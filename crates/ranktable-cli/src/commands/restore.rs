//! Restore command - rebuild rankings from a dump and print them.

use std::path::PathBuf;

use colored::Colorize;
use ranktable::{DataProvider, ProviderDump};

use crate::cli::OutputFormat;
use crate::output;

use super::{CommandResult, load_provider};

pub async fn run(
    input: PathBuf,
    dump: PathBuf,
    columns: Option<PathBuf>,
    top: Option<usize>,
    format: OutputFormat,
    verbose: bool,
) -> CommandResult {
    let mut provider = load_provider(&input, columns.as_deref())?;
    let state = ProviderDump::load(&dump)?;
    let rankings = provider.core_mut().restore(&state);
    provider.flush().await?;

    let first = rankings
        .first()
        .copied()
        .ok_or_else(|| format!("Dump {} contains no rankings", dump.display()))?;
    if verbose {
        eprintln!("{} {} ranking(s)", "Restored".green(), rankings.len());
    }
    output::print_ranking(&provider, first, format, top).await?;
    Ok(())
}
