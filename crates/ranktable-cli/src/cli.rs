//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Ranktable: sort, filter and export tabular data as rankings
#[derive(Parser)]
#[command(name = "ranktable")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// How to build the ranking over the input data.
#[derive(Args, Clone, Debug)]
pub struct RankingArgs {
    /// Path to the data file (CSV/TSV or JSON array of objects)
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// JSON file with column descriptions (default: derived from the data)
    #[arg(short, long, value_name = "DESC_FILE")]
    pub columns: Option<PathBuf>,

    /// Column to sort by (field name or label)
    #[arg(short, long)]
    pub sort: Option<String>,

    /// Sort ascending instead of the column's default direction
    #[arg(long)]
    pub asc: bool,

    /// Sort descending instead of the column's default direction
    #[arg(long, conflicts_with = "asc")]
    pub desc: bool,

    /// Filter as COLUMN=EXPR: `min..max` for numbers, text for strings,
    /// `a,b` for categories, `true`/`false` for booleans
    #[arg(short, long, value_name = "COLUMN=EXPR")]
    pub filter: Vec<String>,

    /// Column to group by
    #[arg(short, long)]
    pub group: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rank a data file and print the result
    Rank {
        #[command(flatten)]
        ranking: RankingArgs,

        /// Show only the first N rows
        #[arg(short = 'n', long)]
        top: Option<usize>,

        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Rank a data file and write the table to a file
    Export {
        #[command(flatten)]
        ranking: RankingArgs,

        /// Output path
        #[arg(short, long)]
        output: PathBuf,

        /// Field separator (default: tab, or ',' for .csv outputs)
        #[arg(long)]
        separator: Option<char>,

        /// Quote every field
        #[arg(long)]
        quote: bool,

        /// Include rank and selection columns
        #[arg(long)]
        support_columns: bool,
    },

    /// Rank a data file and write the ranking dump as JSON
    Dump {
        #[command(flatten)]
        ranking: RankingArgs,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rebuild rankings from a dump and print the first one
    Restore {
        /// Path to the data file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Path to the dump
        #[arg(value_name = "DUMP_FILE")]
        dump: PathBuf,

        /// JSON file with column descriptions (default: derived from the data)
        #[arg(short, long, value_name = "DESC_FILE")]
        columns: Option<PathBuf>,

        /// Show only the first N rows
        #[arg(short = 'n', long)]
        top: Option<usize>,

        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    /// Print the column descriptions derived from a data file
    Describe {
        /// Path to the data file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Tsv,
    Csv,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "tsv" => Ok(OutputFormat::Tsv),
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use table, tsv, csv, or json.", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Tsv => write!(f, "tsv"),
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_rank() {
        let cli = Cli::try_parse_from([
            "ranktable", "rank", "data.csv", "--sort", "score", "--asc", "-f", "score=10..", "-n", "5",
        ])
        .unwrap();
        match cli.command {
            Commands::Rank { ranking, top, format } => {
                assert_eq!(ranking.sort.as_deref(), Some("score"));
                assert!(ranking.asc);
                assert_eq!(ranking.filter, vec!["score=10.."]);
                assert_eq!(top, Some(5));
                assert_eq!(format, OutputFormat::Table);
            }
            _ => panic!("expected rank"),
        }
    }

    #[test]
    fn test_output_format() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xlsx".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }
}
