//! Example: rank a small table by a weighted combination of two columns.
//!
//! Usage:
//!   cargo run --example rank

use ranktable::column::NumberFilter;
use ranktable::{ColumnDesc, DataProvider, ExportOptions, LocalDataProvider, Parent};
use serde_json::json;

#[tokio::main]
async fn main() -> ranktable::Result<()> {
    let rows = vec![
        json!({"university": "Aalto", "teaching": 61.2, "research": 55.0, "country": "FI"}),
        json!({"university": "Bologna", "teaching": 48.9, "research": 51.3, "country": "IT"}),
        json!({"university": "Charles", "teaching": 44.1, "research": 38.7, "country": "CZ"}),
        json!({"university": "Delft", "teaching": 67.5, "research": 71.9, "country": "NL"}),
        json!({"university": "ETH", "teaching": 83.4, "research": 92.8, "country": "CH"}),
        json!({"university": "Freiburg", "teaching": 57.0, "research": null, "country": "DE"}),
    ];
    let descs = vec![
        ColumnDesc::field("string", "university"),
        ColumnDesc::field("number", "teaching").with_domain([0.0, 100.0]),
        ColumnDesc::field("number", "research").with_domain([0.0, 100.0]),
        ColumnDesc::field("categorical", "country"),
    ];
    let mut provider = LocalDataProvider::new(rows, descs.clone());

    let core = provider.core_mut();
    let ranking = core.push_ranking();
    core.push(ranking, &descs[0]);
    if let Some(stack) = core.push(ranking, &ColumnDesc::new("stack", "Overall")) {
        for desc in &descs[1..3] {
            if let Some(child) = core.create(desc) {
                core.tree_mut().push(Parent::Column(stack), child);
            }
        }
        core.tree_mut().set_weights(stack, &[0.4, 0.6]);
        core.tree_mut().sort_by(ranking, Some(stack), false);
        let teaching = core.tree().children(stack)[0];
        core.tree_mut()
            .set_number_filter(teaching, NumberFilter::between(45.0, f64::NAN));
    }
    provider.flush().await?;

    let separator = "=".repeat(60);
    println!("{}", separator);
    println!("Overall = 40% teaching + 60% research, teaching >= 45");
    println!("{}", separator);
    print!("{}", provider.export_table(ranking, &ExportOptions::default()).await?);
    println!();
    println!("Dump:");
    println!("{}", serde_json::to_string_pretty(&provider.core().dump())?);
    Ok(())
}
