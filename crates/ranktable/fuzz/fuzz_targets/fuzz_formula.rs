//! Fuzz target for user formulas.
//!
//! Compiling and evaluating arbitrary text must never panic, and
//! evaluation never sees more than the bound variables.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ranktable::formula::{Formula, Scope};

#[derive(Arbitrary, Debug)]
struct Input {
    source: String,
    values: Vec<f64>,
    value: f64,
}

fuzz_target!(|input: Input| {
    if input.source.len() > 4_096 || input.values.len() > 256 {
        return;
    }
    if let Ok(formula) = Formula::compile(&input.source) {
        let scope = Scope::new()
            .with_list("values", input.values)
            .with_number("value", input.value);
        let _ = formula.evaluate(&scope);
    }
});
