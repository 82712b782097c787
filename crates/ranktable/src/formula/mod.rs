//! Sandboxed user formulas.
//!
//! Script mappings and script columns evaluate small arithmetic expressions
//! written by the user. Formulas can only read the variables bound in a
//! [`Scope`] and call a fixed set of numeric functions; they have no access
//! to the model or the host.
//!
//! ```
//! use ranktable::formula::{Formula, Scope};
//!
//! let f = Formula::compile("max(values) - min(values)").unwrap();
//! let scope = Scope::new().with_list("values", vec![0.2, 0.9, 0.4]);
//! assert!((f.evaluate(&scope).unwrap() - 0.7).abs() < 1e-12);
//! ```
//!
//! Supported syntax: number literals, `true`/`false`/`NaN`/`Infinity`,
//! list literals `[a, b]`, indexing `values[0]`, the operators
//! `+ - * / % ^ < <= > >= == != && || !` and `cond ? a : b`, and the
//! functions `min max sum mean median count abs sqrt exp ln log10 log2
//! floor ceil round sign pow clamp linear isnan`. An optional leading
//! `return` and trailing `;` are ignored.

mod eval;
mod lexer;
mod parser;

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::OnceCell;
use thiserror::Error;

/// Errors raised while compiling or evaluating a formula.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("invalid number '{text}' at {pos}")]
    InvalidNumber { text: String, pos: usize },

    #[error("unexpected {found} at {pos}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        pos: usize,
    },

    #[error("unexpected end of formula at {pos}")]
    UnexpectedEnd { pos: usize },

    #[error("unknown function '{name}' at {pos}")]
    UnknownFunction { name: String, pos: usize },

    #[error("function '{name}' expects {expected} arguments, got {got}")]
    Arity {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("type error: {0}")]
    Type(String),

    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: f64, len: usize },

    #[error("formula nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Deepest nesting a formula may have, counting parentheses, operators,
/// calls and list literals.
pub const MAX_DEPTH: usize = 256;

/// A runtime value: formulas only deal in numbers and lists of numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    List(Vec<f64>),
}

/// Variable bindings visible to a formula.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    vars: HashMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_number(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, Value::Number(value));
        self
    }

    pub fn with_list(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.set(name, Value::List(values));
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

/// Something that turns a set of bound inputs into a number.
///
/// Implementations never fail: anything that cannot be computed is NaN.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, scope: &Scope) -> f64;
}

/// A parsed formula, ready to evaluate repeatedly.
#[derive(Clone)]
pub struct Formula {
    source: String,
    ast: parser::Expr,
}

impl Formula {
    pub fn compile(source: &str) -> Result<Self, FormulaError> {
        let tokens = lexer::tokenize(source)?;
        let ast = parser::parse(&tokens, source.len())?;
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate to a number. A formula yielding a list is a type error.
    pub fn evaluate(&self, scope: &Scope) -> Result<f64, FormulaError> {
        match eval::evaluate(&self.ast, scope)? {
            Value::Number(n) => Ok(n),
            Value::List(_) => Err(FormulaError::Type("formula produced a list".into())),
        }
    }
}

impl Evaluator for Formula {
    fn evaluate(&self, scope: &Scope) -> f64 {
        Formula::evaluate(self, scope).unwrap_or_else(|err| {
            tracing::trace!(formula = %self.source, %err, "formula evaluation failed");
            f64::NAN
        })
    }
}

impl fmt::Debug for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Formula").field(&self.source).finish()
    }
}

impl PartialEq for Formula {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Formula source that is compiled on first use.
///
/// A source that fails to compile evaluates to NaN for every input.
#[derive(Clone, Default)]
pub struct LazyFormula {
    source: String,
    compiled: OnceCell<Option<Formula>>,
}

impl LazyFormula {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            compiled: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replace the source and drop the compiled form.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.compiled = OnceCell::new();
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    fn compiled(&self) -> Option<&Formula> {
        self.compiled
            .get_or_init(|| match Formula::compile(&self.source) {
                Ok(formula) => Some(formula),
                Err(err) => {
                    tracing::warn!(formula = %self.source, %err, "failed to compile formula");
                    None
                }
            })
            .as_ref()
    }
}

impl Evaluator for LazyFormula {
    fn evaluate(&self, scope: &Scope) -> f64 {
        match self.compiled() {
            Some(formula) => Evaluator::evaluate(formula, scope),
            None => f64::NAN,
        }
    }
}

impl fmt::Debug for LazyFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyFormula")
            .field("source", &self.source)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

impl PartialEq for LazyFormula {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str, scope: &Scope) -> f64 {
        Formula::compile(source).unwrap().evaluate(scope).unwrap()
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        let scope = Scope::new();
        assert_eq!(eval("1 + 2 * 3", &scope), 7.0);
        assert_eq!(eval("(1 + 2) * 3", &scope), 9.0);
        assert_eq!(eval("-2 ^ 2", &scope), -4.0);
        assert_eq!(eval("7 % 4", &scope), 3.0);
    }

    #[test]
    fn test_aggregates_over_lists_and_scalars() {
        let scope = Scope::new().with_list("values", vec![0.5, 0.25, 1.0]);
        assert_eq!(eval("max(values)", &scope), 1.0);
        assert_eq!(eval("min(values, 0.1)", &scope), 0.1);
        assert_eq!(eval("sum(values)", &scope), 1.75);
        assert_eq!(eval("count(values)", &scope), 3.0);
        assert_eq!(eval("median(values)", &scope), 0.5);
        assert_eq!(eval("values[1]", &scope), 0.25);
    }

    #[test]
    fn test_max_of_empty_list_is_nan() {
        let scope = Scope::new().with_list("values", vec![]);
        assert!(eval("max(values)", &scope).is_nan());
    }

    #[test]
    fn test_linear_helper() {
        let scope = Scope::new()
            .with_number("value", 25.0)
            .with_number("value_min", 0.0)
            .with_number("value_max", 100.0);
        assert_eq!(eval("linear(value, value_min, value_max)", &scope), 0.25);
    }

    #[test]
    fn test_conditional_and_logic() {
        let scope = Scope::new().with_number("value", 3.0);
        assert_eq!(eval("value > 2 && value < 5 ? 1 : 0", &scope), 1.0);
        assert_eq!(eval("!(value == 3) || false", &scope), 0.0);
    }

    #[test]
    fn test_unknown_variable_is_runtime_error() {
        let f = Formula::compile("missing + 1").unwrap();
        assert_eq!(
            f.evaluate(&Scope::new()),
            Err(FormulaError::UnknownVariable("missing".into()))
        );
        assert!(Evaluator::evaluate(&f, &Scope::new()).is_nan());
    }

    #[test]
    fn test_arity_checked_at_compile_time() {
        let err = Formula::compile("pow(2)").unwrap_err();
        assert_eq!(
            err,
            FormulaError::Arity {
                name: "pow",
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn test_lazy_formula_compiles_once_and_resets() {
        let mut lazy = LazyFormula::new("max(values)");
        assert!(!lazy.is_compiled());
        let scope = Scope::new().with_list("values", vec![1.0, 2.0]);
        assert_eq!(lazy.evaluate(&scope), 2.0);
        assert!(lazy.is_compiled());

        lazy.set_source("min(values)");
        assert!(!lazy.is_compiled());
        assert_eq!(lazy.evaluate(&scope), 1.0);
    }

    #[test]
    fn test_lazy_formula_with_syntax_error_is_nan() {
        let lazy = LazyFormula::new("max(values");
        assert!(lazy.evaluate(&Scope::new()).is_nan());
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "max(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(
            Formula::compile(&deep).unwrap_err(),
            FormulaError::TooDeep { limit: MAX_DEPTH }
        );
        assert!(LazyFormula::new(deep).evaluate(&Scope::new()).is_nan());

        let shallow = format!("{}1{}", "abs(".repeat(50), ")".repeat(50));
        assert_eq!(eval(&shallow, &Scope::new()), 1.0);
    }

    #[test]
    fn test_list_result_is_type_error() {
        let f = Formula::compile("[1, 2]").unwrap();
        assert!(matches!(f.evaluate(&Scope::new()), Err(FormulaError::Type(_))));
    }
}
