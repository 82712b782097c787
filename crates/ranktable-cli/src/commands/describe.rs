//! Describe command - print the column descriptions derived from data.

use std::path::PathBuf;

use colored::Colorize;
use ranktable::provider::derive_descs;

use crate::loader;

use super::CommandResult;

pub fn run(input: PathBuf, verbose: bool) -> CommandResult {
    if !input.exists() {
        return Err(format!("File not found: {}", input.display()).into());
    }
    let rows = loader::load_rows(&input)?;
    let descs = derive_descs(&rows);
    if verbose {
        eprintln!(
            "{} {} columns from {} rows",
            "Derived".cyan().bold(),
            descs.len(),
            rows.len()
        );
    }
    println!("{}", serde_json::to_string_pretty(&descs)?);
    Ok(())
}
