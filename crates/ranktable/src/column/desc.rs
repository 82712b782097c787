//! Column descriptions: the immutable, serializable recipe a column is built from.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::value::DataRow;
use crate::mapping::MappingDump;

/// Custom per-row value extraction, replacing the default field lookup.
pub type Accessor = Arc<dyn Fn(&DataRow<'_>) -> Value + Send + Sync>;

/// Text alignment hint for string columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// How an ordinal column combines the values of a multi-category row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combiner {
    #[default]
    Max,
    Min,
    Mean,
}

/// A category entry: a bare name or a name with label, color and value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryDesc {
    Name(String),
    Detailed {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<f64>,
    },
}

impl CategoryDesc {
    pub fn name(&self) -> &str {
        match self {
            CategoryDesc::Name(name) => name,
            CategoryDesc::Detailed { name, .. } => name,
        }
    }
}

/// Describes one column type instance: its `type` key, data binding and
/// type-specific options. Unused options are simply `None`.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDesc {
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub label: String,
    /// Row field the column reads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renderer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<MappingDump>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_format: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_value: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_marker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub false_marker: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_parse: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<CategoryDesc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combiner: Option<Combiner>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    #[serde(skip)]
    pub accessor: Option<Accessor>,
}

impl ColumnDesc {
    pub fn new(column_type: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            column_type: column_type.into(),
            label: label.into(),
            ..Default::default()
        }
    }

    /// A description bound to a row field, labelled with the field name.
    pub fn field(column_type: impl Into<String>, column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            column_type: column_type.into(),
            label: column.clone(),
            column: Some(column),
            ..Default::default()
        }
    }

    pub fn with_domain(mut self, domain: [f64; 2]) -> Self {
        self.domain = Some(domain.to_vec());
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = Some(
            categories
                .into_iter()
                .map(|c| CategoryDesc::Name(c.into()))
                .collect(),
        );
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_accessor<F>(mut self, accessor: F) -> Self
    where
        F: Fn(&DataRow<'_>) -> Value + Send + Sync + 'static,
    {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    /// Raw cell for `row`: the custom accessor if set, else the bound field.
    pub fn read<'a>(&self, row: &DataRow<'a>) -> Cow<'a, Value> {
        if let Some(accessor) = &self.accessor {
            return Cow::Owned(accessor(row));
        }
        match self.column.as_deref().and_then(|c| row.field(c)) {
            Some(v) => Cow::Borrowed(v),
            None => Cow::Owned(Value::Null),
        }
    }

    /// Short reference used in dumps for data-bound descriptions.
    pub fn reference(&self) -> Option<String> {
        self.column
            .as_ref()
            .map(|c| format!("{}@{}", self.column_type, c))
    }
}

impl fmt::Debug for ColumnDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDesc")
            .field("type", &self.column_type)
            .field("label", &self.label)
            .field("column", &self.column)
            .field("accessor", &self.accessor.is_some())
            .finish_non_exhaustive()
    }
}

impl PartialEq for ColumnDesc {
    fn eq(&self, other: &Self) -> bool {
        // accessors are opaque; compare the serializable part
        serde_json::to_value(self).ok() == serde_json::to_value(other).ok()
    }
}

/// How a dump refers to a column description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DescRef {
    /// `"type@column"` of a description registered with the provider.
    Ref(String),
    Inline(Box<ColumnDesc>),
}

impl DescRef {
    pub fn of(desc: &ColumnDesc) -> Self {
        match desc.reference() {
            Some(r) => DescRef::Ref(r),
            None => DescRef::Inline(Box::new(desc.clone())),
        }
    }
}
