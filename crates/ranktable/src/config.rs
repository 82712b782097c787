//! Provider and export configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration of a data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Filter every ranking by the filters of all rankings.
    pub filter_globally: bool,

    /// Allow more than one selected row.
    pub multi_selection: bool,

    /// Quiet period before a ranking is resorted after it became dirty.
    #[serde(with = "millis")]
    pub debounce: Duration,

    /// Upper bound of raw values returned by a mapping sample.
    pub max_mapping_sample: usize,

    /// Horizontal gap between flattened columns.
    pub column_padding: f64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            filter_globally: false,
            multi_selection: true,
            debounce: Duration::from_millis(100),
            max_mapping_sample: 500,
            column_padding: 5.0,
        }
    }
}

impl ProviderConfig {
    pub fn with_filter_globally(mut self, enabled: bool) -> Self {
        self.filter_globally = enabled;
        self
    }

    pub fn with_multi_selection(mut self, enabled: bool) -> Self {
        self.multi_selection = enabled;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_max_mapping_sample(mut self, max: usize) -> Self {
        self.max_mapping_sample = max;
        self
    }

    pub fn with_column_padding(mut self, padding: f64) -> Self {
        self.column_padding = padding;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Options of [`export_table`](crate::provider::DataProvider::export_table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    /// Field delimiter, a single byte.
    pub separator: char,
    pub line_ending: String,
    /// Emit a header line with the column labels.
    pub header: bool,
    /// Quote every field.
    pub quote: bool,
    pub quote_char: char,
    /// Include rank, selection and actions columns.
    pub include_support: bool,
    /// Restrict the export to these column ids.
    pub columns: Option<Vec<String>>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            separator: '\t',
            line_ending: "\n".to_string(),
            header: true,
            quote: false,
            quote_char: '"',
            include_support: false,
            columns: None,
        }
    }
}

impl ExportOptions {
    pub fn csv() -> Self {
        Self {
            separator: ',',
            ..Self::default()
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    pub fn with_quote(mut self, quote: bool) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn with_support_columns(mut self, include: bool) -> Self {
        self.include_support = include;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_config_defaults() {
        let config = ProviderConfig::default();
        assert!(!config.filter_globally);
        assert!(config.multi_selection);
        assert_eq!(config.debounce, Duration::from_millis(100));
        assert_eq!(config.max_mapping_sample, 500);
    }

    #[test]
    fn test_partial_config_from_json() {
        let config: ProviderConfig =
            serde_json::from_value(json!({"filterGlobally": true, "debounce": 250})).unwrap();
        assert!(config.filter_globally);
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert!(config.multi_selection);
    }

    #[test]
    fn test_export_builders() {
        let options = ExportOptions::csv().with_quote(true).with_header(false);
        assert_eq!(options.separator, ',');
        assert!(options.quote);
        assert!(!options.header);
        assert!(!options.include_support);
    }
}
