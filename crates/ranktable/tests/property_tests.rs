//! Property-based tests for the ranking model.
//!
//! Properties verified:
//! 1. **Argsort correctness**: sorting yields an ordered permutation of the
//!    rows that pass the filter
//! 2. **Stack widths**: child widths always add up to the stack width
//! 3. **Dump round trips**: restoring a dump reproduces it
//!
//! # Running Property Tests
//!
//! ```bash
//! cargo test -p ranktable --test property_tests
//!
//! # More cases
//! PROPTEST_CASES=10000 cargo test -p ranktable --test property_tests
//! ```

use futures::executor::block_on;
use proptest::prelude::*;
use serde_json::{Value, json};

use ranktable::column::NumberFilter;
use ranktable::{ColumnDesc, DataProvider, DataRow, LocalDataProvider, Parent, ProviderConfig, ProviderCore};

// =============================================================================
// Test Strategies
// =============================================================================

/// Cells of a number column: mostly numbers, sometimes missing.
fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        8 => (-100.0f64..200.0).prop_map(|v| json!(v)),
        1 => Just(Value::Null),
        1 => Just(json!("NA")),
    ]
}

fn rows() -> impl Strategy<Value = Vec<Value>> {
    prop::collection::vec((cell(), "[a-z]{0,6}"), 0..60).prop_map(|cells| {
        cells
            .into_iter()
            .map(|(v, name)| json!({"v": v, "name": name}))
            .collect()
    })
}

fn descs() -> Vec<ColumnDesc> {
    vec![
        ColumnDesc::field("number", "v").with_domain([0.0, 100.0]),
        ColumnDesc::field("string", "name"),
    ]
}

// =============================================================================
// Argsort
// =============================================================================

proptest! {
    #[test]
    fn argsort_is_sorted_permutation(data in rows(), ascending in any::<bool>(), by_name in any::<bool>()) {
        let mut provider = LocalDataProvider::new(data.clone(), descs());
        let r = provider.core_mut().push_ranking();
        let column = provider.core_mut().push(r, &descs()[usize::from(by_name)]).unwrap();
        provider.core_mut().tree_mut().sort_by(r, Some(column), ascending);

        let order = block_on(provider.argsort(r)).unwrap();
        let mut seen = order.clone();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..data.len()).collect::<Vec<_>>());

        let tree = provider.core().tree();
        for pair in order.windows(2) {
            let a = DataRow::new(&data[pair[0]], pair[0]);
            let b = DataRow::new(&data[pair[1]], pair[1]);
            let cmp = tree.compare(column, &a, &b);
            if ascending {
                prop_assert!(cmp.is_le());
            } else {
                prop_assert!(cmp.is_ge());
            }
            // ties keep data order
            if cmp.is_eq() {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }

    #[test]
    fn filtered_rows_are_absent(data in rows(), min in 0.0f64..100.0) {
        let mut provider = LocalDataProvider::new(data.clone(), descs());
        let r = provider.core_mut().push_ranking();
        let column = provider.core_mut().push(r, &descs()[0]).unwrap();
        provider.core_mut().tree_mut().set_number_filter(column, NumberFilter::between(min, f64::NAN));

        let order = block_on(provider.argsort(r)).unwrap();
        let tree = provider.core().tree();
        for (i, v) in data.iter().enumerate() {
            let passes = tree.ranking_accepts(r, &DataRow::new(v, i));
            prop_assert_eq!(order.contains(&i), passes);
        }
    }

    #[test]
    fn global_filter_keeps_intersection(data in rows(), min in 0.0f64..100.0, needle in "[a-z]") {
        let config = ProviderConfig::default().with_filter_globally(true);
        let mut provider = LocalDataProvider::with_config(data.clone(), descs(), config);
        let first = provider.core_mut().push_ranking();
        let v = provider.core_mut().push(first, &descs()[0]).unwrap();
        let second = provider.core_mut().push_ranking();
        let name = provider.core_mut().push(second, &descs()[1]).unwrap();
        let tree = provider.core_mut().tree_mut();
        tree.set_number_filter(v, NumberFilter::between(min, f64::NAN));
        tree.set_string_filter(name, ranktable::column::StringFilter::parse(&needle));

        let a = block_on(provider.argsort(first)).unwrap();
        let mut b = block_on(provider.argsort(second)).unwrap();
        let mut a_sorted = a.clone();
        a_sorted.sort_unstable();
        b.sort_unstable();
        prop_assert_eq!(a_sorted, b);
    }
}

// =============================================================================
// Stack widths
// =============================================================================

fn stack_core(children: usize) -> (ProviderCore, ranktable::ColumnId) {
    let mut core = ProviderCore::new(descs(), ProviderConfig::default());
    let r = core.push_ranking();
    let stack = core.push(r, &ColumnDesc::new("stack", "Stack")).unwrap();
    for _ in 0..children {
        let child = core.create(&descs()[0]).unwrap();
        core.tree_mut().push(Parent::Column(stack), child);
    }
    (core, stack)
}

fn assert_widths_add_up(core: &ProviderCore, stack: ranktable::ColumnId) -> Result<(), TestCaseError> {
    let tree = core.tree();
    if tree.children(stack).is_empty() {
        return Ok(());
    }
    let total = tree.column(stack).unwrap().width();
    let children: f64 = tree
        .children(stack)
        .iter()
        .map(|&c| tree.column(c).unwrap().width())
        .sum();
    prop_assert!((children - total).abs() < 1e-6 * total.max(1.0), "{} != {}", children, total);
    prop_assert!((tree.weights(stack).iter().sum::<f64>() - 1.0).abs() < 1e-9);
    Ok(())
}

proptest! {
    #[test]
    fn stack_weights_sum_to_one(weights in prop::collection::vec(0.01f64..10.0, 1..6)) {
        let (mut core, stack) = stack_core(weights.len());
        core.tree_mut().set_weights(stack, &weights);
        assert_widths_add_up(&core, stack)?;
        let total: f64 = weights.iter().sum();
        for (w, expected) in core.tree().weights(stack).iter().zip(&weights) {
            prop_assert!((w - expected / total).abs() < 1e-9);
        }
    }

    #[test]
    fn stack_width_survives_edits(
        children in 1usize..5,
        widths in prop::collection::vec(1.0f64..400.0, 1..8),
        remove_first in any::<bool>(),
    ) {
        let (mut core, stack) = stack_core(children);
        for (i, width) in widths.into_iter().enumerate() {
            let kids = core.tree().children(stack).to_vec();
            let total = core.tree().column(stack).unwrap().width();
            core.tree_mut().set_width(kids[i % kids.len()], width);
            assert_widths_add_up(&core, stack)?;
            if kids.len() > 1 && width <= total {
                prop_assert!((core.tree().column(stack).unwrap().width() - total).abs() < 1e-6 * total.max(1.0));
            }
        }
        if remove_first {
            let first = core.tree().children(stack)[0];
            core.tree_mut().remove(first);
            assert_widths_add_up(&core, stack)?;
        }
    }

    #[test]
    fn dump_restore_round_trip(
        weights in prop::collection::vec(0.01f64..10.0, 1..4),
        min in prop::option::of(0.0f64..50.0),
        missing in 0.0f64..1.0,
    ) {
        let (mut core, stack) = stack_core(weights.len());
        core.tree_mut().set_weights(stack, &weights);
        let first = core.tree().children(stack)[0];
        if let Some(min) = min {
            core.tree_mut().set_number_filter(first, NumberFilter::between(min, f64::NAN));
        }
        core.tree_mut().set_missing_value(first, missing);

        let dump = core.dump();
        let mut other = ProviderCore::new(descs(), ProviderConfig::default());
        other.restore(&dump);
        let again = other.dump();
        let columns = |d: &ranktable::ProviderDump| {
            let mut v = serde_json::to_value(&d.rankings).unwrap();
            strip_ids(&mut v);
            v
        };
        prop_assert_eq!(columns(&dump), columns(&again));
    }
}

fn strip_ids(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("id");
            map.remove("sortCriteria");
            map.values_mut().for_each(strip_ids);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_ids),
        _ => {}
    }
}
