//! The column model.
//!
//! A column is a node of a ranking's column tree. Its identity, layout and
//! metadata live in [`Column`]; its behavior is one of the closed set of
//! [`ColumnKind`]s. Leaf kinds derive values from a raw cell through the
//! [`ValueKind`], [`Filterable`] and [`Dumpable`] capabilities. Composite
//! kinds hold child handles and are evaluated by the
//! [`ColumnTree`](crate::tree::ColumnTree), which owns every column.

pub mod boolean;
pub mod categorical;
pub mod composite;
pub mod date;
pub mod desc;
pub mod number;
pub mod string;
pub mod value;

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use slotmap::new_key_type;

use crate::event::EventDispatcher;
use crate::group::Group;
use crate::ranking::RankingId;

pub use boolean::BooleanColumn;
pub use categorical::{CategoricalColumn, CategoricalFilter, Categories, OrdinalColumn};
pub use composite::{CompositeColumn, CompositeOp};
pub use date::{DateColumn, DateFilter};
pub use desc::{Accessor, ColumnDesc, DescRef};
pub use number::{NumberColumn, NumberFilter};
pub use string::{AnnotateColumn, LinkColumn, StringColumn, StringFilter};
pub use value::{CellValue, DataRow};

new_key_type! {
    /// Arena handle of a column.
    pub struct ColumnId;
}

pub const DEFAULT_WIDTH: f64 = 100.0;
pub const DEFAULT_COLOR: &str = "#C1C1C1";
pub const COMPRESSED_WIDTH: f64 = 16.0;
pub const RANK_WIDTH: f64 = 50.0;
pub const SELECTION_WIDTH: f64 = 20.0;

/// `levels` value of [`ColumnTree::flatten`](crate::tree::ColumnTree::flatten)
/// meaning "all levels, hidden columns included".
pub const FLAT_ALL_COLUMNS: i32 = -1;

/// Types that support rankings rather than carry data.
pub const SUPPORT_TYPES: [&str; 3] = ["rank", "selection", "actions"];

/// The owner of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent {
    Column(ColumnId),
    Ranking(RankingId),
}

/// User-editable header information.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnMetaData {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// A laid-out column: its horizontal offset and width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatColumn {
    pub column: ColumnId,
    pub offset: f64,
    pub width: f64,
}

static CSS_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("valid regex"));

/// Make an id safe for use as a CSS class or DOM id.
pub fn fix_css(id: &str) -> String {
    CSS_UNSAFE.replace_all(id, "_").into_owned()
}

pub fn is_support_type(column_type: &str) -> bool {
    SUPPORT_TYPES.contains(&column_type)
}

/// Value derivation of a leaf column from its raw cell.
pub trait ValueKind {
    fn value(&self, raw: &Value) -> CellValue;

    fn label(&self, raw: &Value) -> String {
        self.value(raw).to_string()
    }

    fn compare(&self, a: &Value, b: &Value) -> Ordering;

    /// Per-row color; `None` uses the column color.
    fn color(&self, _raw: &Value) -> Option<String> {
        None
    }

    /// Group a row falls into when the ranking is grouped by this column.
    fn group(&self, _raw: &Value) -> Option<Group> {
        None
    }
}

/// Row predicate of a leaf column.
pub trait Filterable {
    fn is_filtered(&self) -> bool;

    fn accepts(&self, raw: &Value) -> bool;
}

/// Type-specific state carried by a column dump.
pub trait Dumpable {
    fn dump_state(&self, out: &mut Map<String, Value>);

    fn restore_state(&mut self, dump: &Map<String, Value>);
}

/// What a column is.
#[derive(Debug, Clone)]
pub enum ColumnKind {
    /// No value (the `actions` support column).
    Dummy,
    /// Position of the row in the owning ranking, starting at 1.
    Rank,
    /// Whether the row is selected, read through the description accessor.
    Selection,
    String(StringColumn),
    Link(LinkColumn),
    Annotate(AnnotateColumn),
    Boolean(BooleanColumn),
    Date(DateColumn),
    Number(NumberColumn),
    Categorical(CategoricalColumn),
    Ordinal(OrdinalColumn),
    Composite(CompositeColumn),
}

impl ColumnKind {
    /// Build the built-in kind for `desc.type`, if there is one.
    pub fn from_desc(desc: &ColumnDesc) -> Option<Self> {
        Self::for_type(&desc.column_type, desc)
    }

    /// Build the built-in kind named `column_type`, configured from `desc`.
    pub fn for_type(column_type: &str, desc: &ColumnDesc) -> Option<Self> {
        Some(match column_type {
            "actions" => ColumnKind::Dummy,
            "rank" => ColumnKind::Rank,
            "selection" => ColumnKind::Selection,
            "string" => ColumnKind::String(StringColumn::from_desc(desc)),
            "link" => ColumnKind::Link(LinkColumn::from_desc(desc)),
            "annotate" => ColumnKind::Annotate(AnnotateColumn::from_desc(desc)),
            "boolean" => ColumnKind::Boolean(BooleanColumn::from_desc(desc)),
            "date" => ColumnKind::Date(DateColumn::from_desc(desc)),
            "number" => ColumnKind::Number(NumberColumn::from_desc(desc)),
            "categorical" => ColumnKind::Categorical(CategoricalColumn::from_desc(desc)),
            "ordinal" => ColumnKind::Ordinal(OrdinalColumn::from_desc(desc)),
            _ => ColumnKind::Composite(CompositeColumn::for_type(column_type, desc)?),
        })
    }

    pub fn default_width(&self) -> f64 {
        match self {
            ColumnKind::Rank => RANK_WIDTH,
            ColumnKind::Selection => SELECTION_WIDTH,
            ColumnKind::Boolean(_) => boolean::BOOLEAN_WIDTH,
            ColumnKind::String(_) | ColumnKind::Link(_) | ColumnKind::Annotate(_) => {
                string::STRING_WIDTH
            }
            _ => DEFAULT_WIDTH,
        }
    }

    /// Key of the renderer used to paint cells of this kind.
    pub fn renderer_type(&self) -> &'static str {
        match self {
            ColumnKind::Dummy => "actions",
            ColumnKind::Rank => "rank",
            ColumnKind::Selection => "selection",
            ColumnKind::String(_) => "string",
            ColumnKind::Link(_) => "link",
            ColumnKind::Annotate(_) => "annotate",
            ColumnKind::Boolean(_) => "boolean",
            ColumnKind::Date(_) => "date",
            ColumnKind::Number(_) | ColumnKind::Ordinal(_) => "number",
            ColumnKind::Categorical(_) => "categorical",
            ColumnKind::Composite(c) => c.op().type_name(),
        }
    }

    /// The leaf behavior, for kinds that derive a value from one raw cell
    /// without row context.
    pub fn leaf(&self) -> Option<&dyn ValueKind> {
        Some(match self {
            ColumnKind::String(c) => c,
            ColumnKind::Link(c) => c,
            ColumnKind::Boolean(c) => c,
            ColumnKind::Date(c) => c,
            ColumnKind::Number(c) => c,
            ColumnKind::Categorical(c) => c,
            ColumnKind::Ordinal(c) => c,
            _ => return None,
        })
    }

    pub fn filterable(&self) -> Option<&dyn Filterable> {
        Some(match self {
            ColumnKind::String(c) => c,
            ColumnKind::Link(c) => c,
            ColumnKind::Boolean(c) => c,
            ColumnKind::Date(c) => c,
            ColumnKind::Number(c) => c,
            ColumnKind::Categorical(c) => c,
            ColumnKind::Ordinal(c) => c,
            _ => return None,
        })
    }

    pub fn dumpable(&self) -> Option<&dyn Dumpable> {
        Some(match self {
            ColumnKind::String(c) => c,
            ColumnKind::Link(c) => c,
            ColumnKind::Annotate(c) => c,
            ColumnKind::Boolean(c) => c,
            ColumnKind::Date(c) => c,
            ColumnKind::Number(c) => c,
            ColumnKind::Categorical(c) => c,
            ColumnKind::Ordinal(c) => c,
            _ => return None,
        })
    }

    pub fn dumpable_mut(&mut self) -> Option<&mut dyn Dumpable> {
        Some(match self {
            ColumnKind::String(c) => c,
            ColumnKind::Link(c) => c,
            ColumnKind::Annotate(c) => c,
            ColumnKind::Boolean(c) => c,
            ColumnKind::Date(c) => c,
            ColumnKind::Number(c) => c,
            ColumnKind::Categorical(c) => c,
            ColumnKind::Ordinal(c) => c,
            _ => return None,
        })
    }

    pub fn as_composite(&self) -> Option<&CompositeColumn> {
        match self {
            ColumnKind::Composite(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_composite_mut(&mut self) -> Option<&mut CompositeColumn> {
        match self {
            ColumnKind::Composite(c) => Some(c),
            _ => None,
        }
    }

    /// The shared string behavior of string, link and annotate columns.
    pub fn as_string_mut(&mut self) -> Option<&mut StringColumn> {
        match self {
            ColumnKind::String(c) => Some(c),
            ColumnKind::Link(c) => Some(c.string_mut()),
            ColumnKind::Annotate(c) => Some(c.string_mut()),
            _ => None,
        }
    }

    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            ColumnKind::String(_) | ColumnKind::Link(_) | ColumnKind::Annotate(_)
        )
    }

    pub fn is_number_like(&self) -> bool {
        match self {
            ColumnKind::Number(_) | ColumnKind::Ordinal(_) => true,
            ColumnKind::Composite(c) => c.op().is_number(),
            _ => false,
        }
    }
}

/// A node of the column tree.
#[derive(Debug)]
pub struct Column {
    pub(crate) id: String,
    pub(crate) desc: ColumnDesc,
    pub(crate) meta: ColumnMetaData,
    pub(crate) width: f64,
    pub(crate) compressed: bool,
    pub(crate) parent: Option<Parent>,
    pub(crate) kind: ColumnKind,
    pub(crate) events: EventDispatcher,
}

impl Column {
    pub fn new(id: impl Into<String>, desc: ColumnDesc, kind: ColumnKind) -> Self {
        let width = desc.width.unwrap_or_else(|| kind.default_width());
        let meta = ColumnMetaData {
            label: desc.label.clone(),
            color: desc.color.clone(),
            description: desc.description.clone().unwrap_or_default(),
        };
        Self {
            id: fix_css(&id.into()),
            desc,
            meta,
            width,
            compressed: false,
            parent: None,
            kind,
            events: EventDispatcher::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn desc(&self) -> &ColumnDesc {
        &self.desc
    }

    pub fn column_type(&self) -> &str {
        &self.desc.column_type
    }

    pub fn label(&self) -> &str {
        &self.meta.label
    }

    pub fn metadata(&self) -> &ColumnMetaData {
        &self.meta
    }

    /// The header color, falling back to the default gray.
    pub fn color(&self) -> &str {
        self.meta.color.as_deref().unwrap_or(DEFAULT_COLOR)
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Width as rendered: compressed columns take a fixed narrow width.
    pub fn actual_width(&self) -> f64 {
        if self.compressed { COMPRESSED_WIDTH } else { self.width }
    }

    pub fn is_hidden(&self) -> bool {
        self.width <= 0.0
    }

    pub fn compressed(&self) -> bool {
        self.compressed
    }

    pub fn parent(&self) -> Option<Parent> {
        self.parent
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    pub fn is_support(&self) -> bool {
        is_support_type(&self.desc.column_type)
    }

    pub fn renderer_type(&self) -> &str {
        self.desc
            .renderer
            .as_deref()
            .unwrap_or_else(|| self.kind.renderer_type())
    }

    /// The raw cell this column reads from a row.
    pub fn raw<'a>(&self, row: &DataRow<'a>) -> std::borrow::Cow<'a, Value> {
        self.desc.read(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_css() {
        assert_eq!(fix_css("col 1.a"), "col_1_a");
        assert_eq!(fix_css("ok-id_2"), "ok-id_2");
    }

    #[test]
    fn test_kind_from_desc() {
        let kind = ColumnKind::from_desc(&ColumnDesc::field("number", "x")).unwrap();
        assert!(kind.is_number_like());
        assert_eq!(kind.default_width(), DEFAULT_WIDTH);

        let kind = ColumnKind::from_desc(&ColumnDesc::new("stack", "S")).unwrap();
        assert_eq!(kind.renderer_type(), "stack");
        assert!(kind.leaf().is_none());

        assert!(ColumnKind::from_desc(&ColumnDesc::new("sparkline", "?")).is_none());
    }

    #[test]
    fn test_new_column_uses_desc() {
        let mut desc = ColumnDesc::field("string", "name");
        desc.color = Some("red".into());
        let col = Column::new("col 3", desc.clone(), ColumnKind::from_desc(&desc).unwrap());
        assert_eq!(col.id(), "col_3");
        assert_eq!(col.width(), string::STRING_WIDTH);
        assert_eq!(col.color(), "red");
        assert_eq!(col.label(), "name");
        assert!(!col.is_support());
    }
}
