//! Fuzz target for dump restoration.
//!
//! Restoring any JSON document must either be rejected or produce rankings
//! that can be dumped again.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ranktable::{ColumnDesc, ProviderConfig, ProviderCore};

fuzz_target!(|data: &[u8]| {
    if data.len() > 100_000 {
        return;
    }
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    let mut core = ProviderCore::new(
        vec![
            ColumnDesc::field("string", "name"),
            ColumnDesc::field("number", "score").with_domain([0.0, 100.0]),
            ColumnDesc::field("categorical", "kind").with_categories(["a", "b"]),
        ],
        ProviderConfig::default(),
    );
    if core.restore_json(value).is_ok() {
        let _ = serde_json::to_string(&core.dump());
    }
});
