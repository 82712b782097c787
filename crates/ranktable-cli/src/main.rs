//! Ranktable CLI - rank, filter and export tabular data.

mod cli;
mod commands;
mod loader;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Rank { ranking, top, format } => commands::rank::run(ranking, top, format, cli.verbose).await,

        Commands::Export {
            ranking,
            output,
            separator,
            quote,
            support_columns,
        } => commands::export::run(ranking, output, separator, quote, support_columns, cli.verbose).await,

        Commands::Dump { ranking, output } => commands::dump::run(ranking, output, cli.verbose).await,

        Commands::Restore {
            input,
            dump,
            columns,
            top,
            format,
        } => commands::restore::run(input, dump, columns, top, format, cli.verbose).await,

        Commands::Describe { input } => commands::describe::run(input, cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`, `debug` with `--verbose`).
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
