//! Rank command - sort, filter and print a data file.

use std::time::Instant;

use ranktable::DataProvider;

use crate::cli::{OutputFormat, RankingArgs};
use crate::output;

use super::{CommandResult, build_ranking, load_provider};

pub async fn run(args: RankingArgs, top: Option<usize>, format: OutputFormat, verbose: bool) -> CommandResult {
    let start = Instant::now();
    let mut provider = load_provider(&args.input, args.columns.as_deref())?;
    let ranking = build_ranking(&mut provider, &args).await?;
    output::print_ranking(&provider, ranking, format, top).await?;

    if verbose {
        let shown = provider
            .core()
            .tree()
            .ranking(ranking)
            .map_or(0, |r| r.order().len());
        eprintln!(
            "Ranked {} of {} rows in {:.1}ms",
            shown,
            provider.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
    }
    Ok(())
}
