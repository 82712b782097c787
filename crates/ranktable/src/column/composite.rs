//! Composite columns: one container type, parameterized by how it combines
//! the values of its children.

use serde_json::{Map, Value};

use super::ColumnId;
use super::desc::ColumnDesc;
use super::value::format_number;
use crate::formula::{Evaluator, LazyFormula, Scope};

/// Default expression of a script column.
pub const DEFAULT_SCRIPT: &str = "max(values)";

/// Combination strategy of a composite column.
#[derive(Debug, Clone, PartialEq)]
pub enum CompositeOp {
    /// Weighted sum; child widths are the weights.
    Stack,
    Min,
    Max,
    Mean,
    /// User formula over `values`, `weights` and `count`.
    Script(LazyFormula),
    /// Lexicographic by child, no numeric value.
    Nested,
}

impl CompositeOp {
    pub fn from_desc(desc: &ColumnDesc) -> Option<Self> {
        Self::for_type(&desc.column_type, desc)
    }

    pub fn for_type(column_type: &str, desc: &ColumnDesc) -> Option<Self> {
        Some(match column_type {
            "stack" => CompositeOp::Stack,
            "min" => CompositeOp::Min,
            "max" => CompositeOp::Max,
            "mean" => CompositeOp::Mean,
            "script" => CompositeOp::Script(LazyFormula::new(
                desc.script.as_deref().unwrap_or(DEFAULT_SCRIPT),
            )),
            "nested" => CompositeOp::Nested,
            _ => return None,
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CompositeOp::Stack => "stack",
            CompositeOp::Min => "min",
            CompositeOp::Max => "max",
            CompositeOp::Mean => "mean",
            CompositeOp::Script(_) => "script",
            CompositeOp::Nested => "nested",
        }
    }

    /// Whether the composite produces a number.
    pub fn is_number(&self) -> bool {
        !matches!(self, CompositeOp::Nested)
    }

    /// Multi-level composites lay their children out side by side.
    pub fn is_multi_level(&self) -> bool {
        matches!(self, CompositeOp::Stack | CompositeOp::Nested)
    }

    /// Combine child values. Returns the result together with the index of
    /// the child that decided it, for min and max.
    ///
    /// `weights` are the normalized child weights and are only read by
    /// stacks and scripts.
    pub fn compute(&self, values: &[f64], weights: &[f64]) -> (f64, Option<usize>) {
        if values.is_empty() {
            return (f64::NAN, None);
        }
        match self {
            CompositeOp::Stack => {
                let sum = values.iter().zip(weights).map(|(v, w)| v * w).sum();
                (sum, None)
            }
            CompositeOp::Min => extremum(values, |candidate, best| candidate < best),
            CompositeOp::Max => extremum(values, |candidate, best| candidate > best),
            CompositeOp::Mean => (values.iter().sum::<f64>() / values.len() as f64, None),
            CompositeOp::Script(formula) => {
                let scope = Scope::new()
                    .with_list("values", values.to_vec())
                    .with_list("weights", weights.to_vec())
                    .with_number("count", values.len() as f64);
                (formula.evaluate(&scope), None)
            }
            CompositeOp::Nested => (f64::NAN, None),
        }
    }
}

/// First index wins ties; NaN values are skipped.
fn extremum(values: &[f64], better: impl Fn(f64, f64) -> bool) -> (f64, Option<usize>) {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, b)| better(v, b)) {
            best = Some((i, v));
        }
    }
    match best {
        Some((i, v)) => (v, Some(i)),
        None => (f64::NAN, None),
    }
}

#[derive(Debug, Clone)]
pub struct CompositeColumn {
    pub(crate) children: Vec<ColumnId>,
    op: CompositeOp,
    missing_value: f64,
    collapsed: bool,
}

impl CompositeColumn {
    pub fn new(op: CompositeOp) -> Self {
        Self {
            children: Vec::new(),
            op,
            missing_value: 0.0,
            collapsed: false,
        }
    }

    pub fn from_desc(desc: &ColumnDesc) -> Option<Self> {
        Self::for_type(&desc.column_type, desc)
    }

    pub fn for_type(column_type: &str, desc: &ColumnDesc) -> Option<Self> {
        let mut column = Self::new(CompositeOp::for_type(column_type, desc)?);
        column.missing_value = desc.missing_value.unwrap_or(0.0);
        Some(column)
    }

    pub fn children(&self) -> &[ColumnId] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn op(&self) -> &CompositeOp {
        &self.op
    }

    pub fn is_stack(&self) -> bool {
        matches!(self.op, CompositeOp::Stack)
    }

    pub fn missing_value(&self) -> f64 {
        self.missing_value
    }

    pub(crate) fn set_missing_value(&mut self, value: f64) -> bool {
        if self.missing_value == value || (self.missing_value.is_nan() && value.is_nan()) {
            return false;
        }
        self.missing_value = value;
        true
    }

    pub fn collapsed(&self) -> bool {
        self.collapsed
    }

    pub(crate) fn set_collapsed(&mut self, collapsed: bool) -> bool {
        if self.collapsed == collapsed {
            return false;
        }
        self.collapsed = collapsed;
        true
    }

    /// Formula source of a script composite.
    pub fn script(&self) -> Option<&str> {
        match &self.op {
            CompositeOp::Script(formula) => Some(formula.source()),
            _ => None,
        }
    }

    /// Returns the previous source when it changed.
    pub(crate) fn set_script(&mut self, source: &str) -> Option<String> {
        match &mut self.op {
            CompositeOp::Script(formula) if formula.source() != source => {
                let old = formula.source().to_string();
                formula.set_source(source);
                Some(old)
            }
            _ => None,
        }
    }

    /// Child values combined, with NaN replaced by the missing value.
    pub fn combine(&self, values: &[f64], weights: &[f64]) -> (f64, Option<usize>) {
        let (v, decider) = self.op.compute(values, weights);
        if v.is_nan() {
            (self.missing_value, decider)
        } else {
            (v, decider)
        }
    }

    pub fn format(&self, v: f64) -> String {
        format_number(v, 3)
    }

    pub(crate) fn dump_state(&self, out: &mut Map<String, Value>) {
        out.insert(
            "missingValue".into(),
            serde_json::Number::from_f64(self.missing_value).map_or(Value::Null, Value::Number),
        );
        if self.collapsed {
            out.insert("collapsed".into(), Value::Bool(true));
        }
        if let Some(script) = self.script() {
            out.insert("script".into(), Value::String(script.to_string()));
        }
    }

    pub(crate) fn restore_state(&mut self, dump: &Map<String, Value>) {
        if let Some(missing) = dump.get("missingValue") {
            self.missing_value = missing.as_f64().unwrap_or(f64::NAN);
        }
        self.collapsed = dump.get("collapsed").and_then(Value::as_bool).unwrap_or(false);
        if let Some(script) = dump.get("script").and_then(Value::as_str) {
            self.set_script(script);
        }
    }
}

/// Child weights: each width over the total, all zero when the total is.
pub fn normalize_weights(widths: &[f64]) -> Vec<f64> {
    let total: f64 = widths.iter().sum();
    if total <= 0.0 {
        return vec![0.0; widths.len()];
    }
    widths.iter().map(|w| w / total).collect()
}

/// Turn user weights into child widths summing to `total`.
///
/// A shorter weight list is padded with equal shares of what remains: of 1
/// when the given weights sum to at most 1, of 100 when they sum to at most
/// 100, otherwise with their average. A longer list is truncated. All-zero
/// weights give every child the same width.
pub fn distribute_weights(weights: &[f64], children: usize, total: f64) -> Vec<f64> {
    if children == 0 {
        return Vec::new();
    }
    let mut weights: Vec<f64> = weights.iter().take(children).copied().collect();
    let missing = children - weights.len();
    if missing > 0 {
        let sum: f64 = weights.iter().sum();
        let share = if sum <= 1.0 {
            (1.0 - sum) / missing as f64
        } else if sum <= 100.0 {
            (100.0 - sum) / missing as f64
        } else {
            sum / weights.len() as f64
        };
        weights.extend(std::iter::repeat_n(share.max(0.0), missing));
    }
    let sum: f64 = weights.iter().sum();
    if sum <= 0.0 {
        return vec![total / children as f64; children];
    }
    weights.iter().map(|w| w / sum * total).collect()
}

/// Factor applied to the other children of a stack when one child's weight
/// moves from `old_weight` by `change`, keeping the total constant.
pub fn adapt_factor(old_weight: f64, change: f64) -> Option<f64> {
    let rest = 1.0 - old_weight;
    if rest <= 0.0 {
        return None;
    }
    Some((rest - change) / rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_stack_is_weighted_sum() {
        let (v, _) = CompositeOp::Stack.compute(&[1.0, 0.0], &[0.25, 0.75]);
        assert!(approx(v, 0.25));
    }

    #[test]
    fn test_min_max_report_deciding_child() {
        let values = [0.4, f64::NAN, 0.9, 0.9, 0.1];
        assert_eq!(CompositeOp::Max.compute(&values, &[]), (0.9, Some(2)));
        assert_eq!(CompositeOp::Min.compute(&values, &[]), (0.1, Some(4)));
        let (v, i) = CompositeOp::Min.compute(&[f64::NAN], &[]);
        assert!(v.is_nan());
        assert_eq!(i, None);
    }

    #[test]
    fn test_mean_is_arithmetic_mean() {
        let (v, _) = CompositeOp::Mean.compute(&[0.2, 0.4, 0.9], &[]);
        assert!(approx(v, 0.5));
        let (v, _) = CompositeOp::Mean.compute(&[0.2, f64::NAN], &[]);
        assert!(v.is_nan());
    }

    #[test]
    fn test_script_and_missing_value() {
        let mut desc = ColumnDesc::new("script", "S").with_script("sum(values) * count");
        desc.missing_value = Some(-1.0);
        let col = CompositeColumn::from_desc(&desc).unwrap();
        assert!(approx(col.combine(&[0.5, 0.25], &[0.5, 0.5]).0, 1.5));
        assert_eq!(col.combine(&[], &[]).0, -1.0);

        let broken = CompositeColumn::from_desc(&ColumnDesc::new("script", "S").with_script("1 +")).unwrap();
        assert_eq!(broken.combine(&[0.3], &[1.0]).0, 0.0);
    }

    #[test]
    fn test_set_script_reports_change() {
        let mut col = CompositeColumn::from_desc(&ColumnDesc::new("script", "S")).unwrap();
        assert_eq!(col.script(), Some(DEFAULT_SCRIPT));
        assert_eq!(col.set_script(DEFAULT_SCRIPT), None);
        assert_eq!(col.set_script("min(values)").as_deref(), Some(DEFAULT_SCRIPT));
        assert!(approx(col.combine(&[0.3, 0.7], &[]).0, 0.3));
    }

    #[test]
    fn test_distribute_weights_pads_and_truncates() {
        let widths = distribute_weights(&[0.5], 3, 100.0);
        assert!(approx(widths.iter().sum::<f64>(), 100.0));
        assert!(approx(widths[0], 50.0));
        assert!(approx(widths[1], 25.0));

        let widths = distribute_weights(&[30.0, 30.0], 3, 200.0);
        assert!(approx(widths[2], 80.0));

        let widths = distribute_weights(&[1.0, 1.0, 1.0, 5.0], 2, 10.0);
        assert_eq!(widths, vec![5.0, 5.0]);

        let widths = distribute_weights(&[0.0, 0.0], 2, 10.0);
        assert_eq!(widths, vec![5.0, 5.0]);
    }

    #[test]
    fn test_adapt_factor() {
        assert_eq!(adapt_factor(0.5, 0.5), Some(0.0));
        assert_eq!(adapt_factor(1.0, 0.1), None);
        assert!(approx(adapt_factor(0.25, -0.25).unwrap(), 4.0 / 3.0));
    }

    #[test]
    fn test_dump_restore_state() {
        let mut col = CompositeColumn::from_desc(&ColumnDesc::new("script", "S")).unwrap();
        col.set_collapsed(true);
        col.set_missing_value(0.5);
        col.set_script("mean(values)");
        let mut state = Map::new();
        col.dump_state(&mut state);

        let mut fresh = CompositeColumn::from_desc(&ColumnDesc::new("script", "S")).unwrap();
        fresh.restore_state(&state);
        assert!(fresh.collapsed());
        assert_eq!(fresh.missing_value(), 0.5);
        assert_eq!(fresh.script(), Some("mean(values)"));
    }
}
