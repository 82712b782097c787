//! Dump command - write the ranking state as JSON.

use std::path::PathBuf;

use colored::Colorize;
use ranktable::DataProvider;

use crate::cli::RankingArgs;

use super::{CommandResult, build_ranking, load_provider};

pub async fn run(args: RankingArgs, output: Option<PathBuf>, _verbose: bool) -> CommandResult {
    let mut provider = load_provider(&args.input, args.columns.as_deref())?;
    build_ranking(&mut provider, &args).await?;
    let dump = provider.core().dump();

    match output {
        Some(path) => {
            dump.save(&path)?;
            println!("{} {}", "Saved dump to".green().bold(), path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&dump)?),
    }
    Ok(())
}
