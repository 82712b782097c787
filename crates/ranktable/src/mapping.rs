//! Mapping functions: raw domain values to normalized `[0, 1]` scores.

use serde::{Deserialize, Serialize};

use crate::formula::{Evaluator, LazyFormula, Scope};

/// Default script of a script mapping: linear interpolation over the domain.
pub const DEFAULT_MAPPING_SCRIPT: &str = "linear(value, value_min, value_max)";

/// Domain values closer than this are considered equal by [`MappingFunction::same_as`].
const SIMILARITY_EPSILON: f64 = 1e-4;

/// Lower bound substituted for a zero at the start of a log domain.
const LOG_DOMAIN_FLOOR: f64 = 1e-7;

/// Transform applied before interpolating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScaleType {
    #[default]
    #[serde(rename = "linear")]
    Linear,
    #[serde(rename = "log")]
    Log,
    #[serde(rename = "sqrt")]
    Sqrt,
    #[serde(rename = "pow1.1")]
    Pow1_1,
    #[serde(rename = "pow2")]
    Pow2,
    #[serde(rename = "pow3")]
    Pow3,
}

impl ScaleType {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "linear" => ScaleType::Linear,
            "log" => ScaleType::Log,
            "sqrt" => ScaleType::Sqrt,
            "pow1.1" => ScaleType::Pow1_1,
            "pow2" => ScaleType::Pow2,
            "pow3" => ScaleType::Pow3,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            ScaleType::Linear => "linear",
            ScaleType::Log => "log",
            ScaleType::Sqrt => "sqrt",
            ScaleType::Pow1_1 => "pow1.1",
            ScaleType::Pow2 => "pow2",
            ScaleType::Pow3 => "pow3",
        }
    }

    fn transform(self, v: f64) -> f64 {
        match self {
            ScaleType::Linear => v,
            ScaleType::Log => v.ln(),
            ScaleType::Sqrt => pow_signed(v, 0.5),
            ScaleType::Pow1_1 => pow_signed(v, 1.1),
            ScaleType::Pow2 => pow_signed(v, 2.0),
            ScaleType::Pow3 => pow_signed(v, 3.0),
        }
    }

    fn untransform(self, v: f64) -> f64 {
        match self {
            ScaleType::Linear => v,
            ScaleType::Log => v.exp(),
            ScaleType::Sqrt => pow_signed(v, 2.0),
            ScaleType::Pow1_1 => pow_signed(v, 1.0 / 1.1),
            ScaleType::Pow2 => pow_signed(v, 0.5),
            ScaleType::Pow3 => pow_signed(v, 1.0 / 3.0),
        }
    }
}

fn pow_signed(v: f64, exponent: f64) -> f64 {
    if v < 0.0 {
        -(-v).powf(exponent)
    } else {
        v.powf(exponent)
    }
}

/// A clamped continuous scale (linear, log, sqrt or power).
///
/// Domains and ranges with more than two stops are piecewise.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleMapping {
    scale_type: ScaleType,
    domain: Vec<f64>,
    range: Vec<f64>,
}

impl Default for ScaleMapping {
    fn default() -> Self {
        Self::new(ScaleType::Linear, vec![0.0, 1.0], vec![0.0, 1.0])
    }
}

impl ScaleMapping {
    pub fn new(scale_type: ScaleType, domain: Vec<f64>, range: Vec<f64>) -> Self {
        Self {
            scale_type,
            domain: fix_domain(domain, scale_type),
            range,
        }
    }

    pub fn linear(domain: [f64; 2]) -> Self {
        Self::new(ScaleType::Linear, domain.to_vec(), vec![0.0, 1.0])
    }

    pub fn scale_type(&self) -> ScaleType {
        self.scale_type
    }

    pub fn domain(&self) -> &[f64] {
        &self.domain
    }

    pub fn set_domain(&mut self, domain: Vec<f64>) {
        self.domain = fix_domain(domain, self.scale_type);
    }

    pub fn range(&self) -> &[f64] {
        &self.range
    }

    pub fn set_range(&mut self, range: Vec<f64>) {
        self.range = range;
    }

    pub fn apply(&self, v: f64) -> f64 {
        let stops: Vec<f64> = self
            .domain
            .iter()
            .map(|d| self.scale_type.transform(*d))
            .collect();
        let n = stops.len().min(self.range.len());
        match locate(&stops[..n], self.scale_type.transform(v)) {
            Some((i, t)) if n > 1 => lerp(self.range[i], self.range[i + 1], t),
            Some(_) => self.range[0],
            None => f64::NAN,
        }
    }

    /// Map a range value back into the domain.
    pub fn invert(&self, r: f64) -> f64 {
        let n = self.domain.len().min(self.range.len());
        match locate(&self.range[..n], r) {
            Some((i, t)) if n > 1 => {
                let d0 = self.scale_type.transform(self.domain[i]);
                let d1 = self.scale_type.transform(self.domain[i + 1]);
                self.scale_type.untransform(lerp(d0, d1, t))
            }
            Some(_) => self.domain[0],
            None => f64::NAN,
        }
    }
}

/// Find the segment of `stops` covering `x` and the clamped position within it.
///
/// Stops may be ascending or descending. `None` for NaN input or no stops.
fn locate(stops: &[f64], x: f64) -> Option<(usize, f64)> {
    let n = stops.len();
    if n == 0 || x.is_nan() {
        return None;
    }
    if n == 1 {
        return Some((0, 0.0));
    }
    let descending = stops[n - 1] < stops[0];
    let mut i = 0;
    while i < n - 2 {
        let next = stops[i + 1];
        if (!descending && x < next) || (descending && x > next) {
            break;
        }
        i += 1;
    }
    let (d0, d1) = (stops[i], stops[i + 1]);
    let t = if d1 == d0 { 0.5 } else { (x - d0) / (d1 - d0) };
    Some((i, t.clamp(0.0, 1.0)))
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn fix_domain(mut domain: Vec<f64>, scale_type: ScaleType) -> Vec<f64> {
    if scale_type == ScaleType::Log && domain.first() == Some(&0.0) {
        domain[0] = LOG_DOMAIN_FLOOR;
    }
    domain
}

/// A user formula mapping. Bindings: `value`, `value_min`, `value_max`,
/// `value_range`, `value_domain` and the `linear(v, min, max)` helper.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptMapping {
    domain: Vec<f64>,
    code: LazyFormula,
}

impl Default for ScriptMapping {
    fn default() -> Self {
        Self::new(vec![0.0, 1.0], DEFAULT_MAPPING_SCRIPT)
    }
}

impl ScriptMapping {
    pub fn new(domain: Vec<f64>, code: impl Into<String>) -> Self {
        Self {
            domain,
            code: LazyFormula::new(code),
        }
    }

    pub fn code(&self) -> &str {
        self.code.source()
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        let code = code.into();
        if code != self.code.source() {
            self.code.set_source(code);
        }
    }

    pub fn domain(&self) -> &[f64] {
        &self.domain
    }

    pub fn set_domain(&mut self, domain: Vec<f64>) {
        self.domain = domain;
    }

    /// Evaluate the script, clamped to `[0, 1]`; NaN when it does not yield a number.
    pub fn apply(&self, v: f64) -> f64 {
        let min = self.domain.first().copied().unwrap_or(f64::NAN);
        let max = self.domain.last().copied().unwrap_or(f64::NAN);
        let scope = Scope::new()
            .with_number("value", v)
            .with_number("value_min", min)
            .with_number("value_max", max)
            .with_number("value_range", max - min)
            .with_list("value_domain", self.domain.clone());
        let r = self.code.evaluate(&scope);
        if r.is_nan() { r } else { r.clamp(0.0, 1.0) }
    }
}

/// Serialized form of a mapping function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingDump {
    #[serde(rename = "type")]
    pub mapping_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// A numeric normalization function.
#[derive(Debug, Clone)]
pub enum MappingFunction {
    Scale(ScaleMapping),
    Script(ScriptMapping),
}

impl Default for MappingFunction {
    fn default() -> Self {
        MappingFunction::Scale(ScaleMapping::default())
    }
}

impl MappingFunction {
    pub fn apply(&self, v: f64) -> f64 {
        match self {
            MappingFunction::Scale(s) => s.apply(v),
            MappingFunction::Script(s) => s.apply(v),
        }
    }

    pub fn domain(&self) -> &[f64] {
        match self {
            MappingFunction::Scale(s) => s.domain(),
            MappingFunction::Script(s) => s.domain(),
        }
    }

    pub fn set_domain(&mut self, domain: Vec<f64>) {
        match self {
            MappingFunction::Scale(s) => s.set_domain(domain),
            MappingFunction::Script(s) => s.set_domain(domain),
        }
    }

    /// Formatted domain values at the ends of the normalized range.
    pub fn range_labels(&self, format: impl Fn(f64) -> String) -> [String; 2] {
        match self {
            MappingFunction::Scale(s) => [format(s.invert(0.0)), format(s.invert(1.0))],
            MappingFunction::Script(_) => ["?".to_string(), "?".to_string()],
        }
    }

    /// Structural equality with a tolerance on domain and range stops.
    pub fn same_as(&self, other: &MappingFunction) -> bool {
        match (self, other) {
            (MappingFunction::Scale(a), MappingFunction::Scale(b)) => {
                a.scale_type == b.scale_type
                    && similar_all(&a.domain, &b.domain)
                    && similar_all(&a.range, &b.range)
            }
            (MappingFunction::Script(a), MappingFunction::Script(b)) => a.code() == b.code(),
            _ => false,
        }
    }

    pub fn dump(&self) -> MappingDump {
        match self {
            MappingFunction::Scale(s) => MappingDump {
                mapping_type: s.scale_type.name().to_string(),
                domain: Some(s.domain.clone()),
                range: Some(s.range.clone()),
                code: None,
            },
            MappingFunction::Script(s) => MappingDump {
                mapping_type: "script".to_string(),
                domain: Some(s.domain.clone()),
                range: None,
                code: Some(s.code().to_string()),
            },
        }
    }

    /// Rebuild from a dump. Unknown scale names fall back to linear.
    pub fn from_dump(dump: &MappingDump) -> Self {
        if dump.mapping_type == "script" {
            let mut script = ScriptMapping::default();
            if let Some(domain) = &dump.domain {
                script.set_domain(domain.clone());
            }
            if let Some(code) = &dump.code {
                script.set_code(code.clone());
            }
            return MappingFunction::Script(script);
        }
        let scale_type = ScaleType::from_name(&dump.mapping_type).unwrap_or_else(|| {
            tracing::warn!(scale = %dump.mapping_type, "unknown scale type, using linear");
            ScaleType::Linear
        });
        MappingFunction::Scale(ScaleMapping::new(
            scale_type,
            dump.domain.clone().unwrap_or_else(|| vec![0.0, 1.0]),
            dump.range.clone().unwrap_or_else(|| vec![0.0, 1.0]),
        ))
    }
}

fn similar_all(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= SIMILARITY_EPSILON || (x.is_nan() && y.is_nan()))
}
