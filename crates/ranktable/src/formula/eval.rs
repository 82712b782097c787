//! Tree-walking evaluation of formula expressions.

use super::parser::{BinaryOp, Expr, UnaryOp};
use super::{FormulaError, MAX_DEPTH, Scope, Value};

/// Built-in functions. Resolved while parsing so a misspelled name fails
/// at compile time instead of on every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Function {
    Min,
    Max,
    Sum,
    Mean,
    Median,
    Count,
    Abs,
    Sqrt,
    Exp,
    Ln,
    Log10,
    Log2,
    Floor,
    Ceil,
    Round,
    Sign,
    Pow,
    Clamp,
    Linear,
    IsNaN,
}

impl Function {
    pub(crate) fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "min" => Function::Min,
            "max" => Function::Max,
            "sum" => Function::Sum,
            "mean" | "avg" => Function::Mean,
            "median" => Function::Median,
            "count" | "len" => Function::Count,
            "abs" => Function::Abs,
            "sqrt" => Function::Sqrt,
            "exp" => Function::Exp,
            "ln" | "log" => Function::Ln,
            "log10" => Function::Log10,
            "log2" => Function::Log2,
            "floor" => Function::Floor,
            "ceil" => Function::Ceil,
            "round" => Function::Round,
            "sign" => Function::Sign,
            "pow" => Function::Pow,
            "clamp" => Function::Clamp,
            "linear" => Function::Linear,
            "isnan" => Function::IsNaN,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Function::Min => "min",
            Function::Max => "max",
            Function::Sum => "sum",
            Function::Mean => "mean",
            Function::Median => "median",
            Function::Count => "count",
            Function::Abs => "abs",
            Function::Sqrt => "sqrt",
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Log10 => "log10",
            Function::Log2 => "log2",
            Function::Floor => "floor",
            Function::Ceil => "ceil",
            Function::Round => "round",
            Function::Sign => "sign",
            Function::Pow => "pow",
            Function::Clamp => "clamp",
            Function::Linear => "linear",
            Function::IsNaN => "isnan",
        }
    }

    fn is_aggregate(self) -> bool {
        matches!(
            self,
            Function::Min
                | Function::Max
                | Function::Sum
                | Function::Mean
                | Function::Median
                | Function::Count
        )
    }

    pub(crate) fn check_arity(self, got: usize) -> Result<(), FormulaError> {
        let expected = match self {
            _ if self.is_aggregate() => return Ok(()),
            Function::Pow => 2,
            Function::Clamp | Function::Linear => 3,
            _ => 1,
        };
        if got == expected {
            Ok(())
        } else {
            Err(FormulaError::Arity {
                name: self.name(),
                expected,
                got,
            })
        }
    }
}

pub(crate) fn evaluate(expr: &Expr, scope: &Scope) -> Result<Value, FormulaError> {
    eval_at(expr, scope, 0)
}

fn eval_at(expr: &Expr, scope: &Scope, depth: usize) -> Result<Value, FormulaError> {
    if depth > MAX_DEPTH {
        return Err(FormulaError::TooDeep { limit: MAX_DEPTH });
    }
    let evaluate = |e: &Expr, scope: &Scope| eval_at(e, scope, depth + 1);
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),
        Expr::Variable(name) => scope
            .get(name)
            .cloned()
            .ok_or_else(|| FormulaError::UnknownVariable(name.clone())),
        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(number(evaluate(item, scope)?)?);
            }
            Ok(Value::List(values))
        }
        Expr::Unary(op, operand) => {
            let v = number(evaluate(operand, scope)?)?;
            Ok(Value::Number(match op {
                UnaryOp::Negate => -v,
                UnaryOp::Not => bool_to_f64(!truthy(v)),
            }))
        }
        Expr::Binary(BinaryOp::And, left, right) => {
            if !truthy(number(evaluate(left, scope)?)?) {
                return Ok(Value::Number(0.0));
            }
            let r = number(evaluate(right, scope)?)?;
            Ok(Value::Number(bool_to_f64(truthy(r))))
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            if truthy(number(evaluate(left, scope)?)?) {
                return Ok(Value::Number(1.0));
            }
            let r = number(evaluate(right, scope)?)?;
            Ok(Value::Number(bool_to_f64(truthy(r))))
        }
        Expr::Binary(op, left, right) => {
            let l = number(evaluate(left, scope)?)?;
            let r = number(evaluate(right, scope)?)?;
            Ok(Value::Number(eval_binary(*op, l, r)))
        }
        Expr::Conditional(condition, then, otherwise) => {
            if truthy(number(evaluate(condition, scope)?)?) {
                evaluate(then, scope)
            } else {
                evaluate(otherwise, scope)
            }
        }
        Expr::Index(target, index) => {
            let list = match evaluate(target, scope)? {
                Value::List(values) => values,
                Value::Number(_) => {
                    return Err(FormulaError::Type("only lists can be indexed".into()));
                }
            };
            let i = number(evaluate(index, scope)?)?;
            if i < 0.0 || i.fract() != 0.0 || i as usize >= list.len() {
                return Err(FormulaError::IndexOutOfBounds {
                    index: i,
                    len: list.len(),
                });
            }
            Ok(Value::Number(list[i as usize]))
        }
        Expr::Call(function, args) => eval_call(*function, args, scope, depth + 1),
    }
}

fn eval_binary(op: BinaryOp, l: f64, r: f64) -> f64 {
    match op {
        BinaryOp::Add => l + r,
        BinaryOp::Subtract => l - r,
        BinaryOp::Multiply => l * r,
        BinaryOp::Divide => l / r,
        BinaryOp::Modulo => l % r,
        BinaryOp::Power => l.powf(r),
        BinaryOp::Less => bool_to_f64(l < r),
        BinaryOp::LessEquals => bool_to_f64(l <= r),
        BinaryOp::Greater => bool_to_f64(l > r),
        BinaryOp::GreaterEquals => bool_to_f64(l >= r),
        BinaryOp::Equals => bool_to_f64(l == r),
        BinaryOp::NotEquals => bool_to_f64(l != r),
        // short-circuited in `evaluate`
        BinaryOp::And => bool_to_f64(truthy(l) && truthy(r)),
        BinaryOp::Or => bool_to_f64(truthy(l) || truthy(r)),
    }
}

fn eval_call(function: Function, args: &[Expr], scope: &Scope, depth: usize) -> Result<Value, FormulaError> {
    let evaluate = |e: &Expr, scope: &Scope| eval_at(e, scope, depth);
    if function.is_aggregate() {
        let mut values = Vec::new();
        for arg in args {
            match evaluate(arg, scope)? {
                Value::Number(n) => values.push(n),
                Value::List(list) => values.extend(list),
            }
        }
        return Ok(Value::Number(aggregate(function, &mut values)));
    }

    let mut numbers = Vec::with_capacity(args.len());
    for arg in args {
        numbers.push(number(evaluate(arg, scope)?)?);
    }
    let x = numbers[0];
    let out = match function {
        Function::Abs => x.abs(),
        Function::Sqrt => x.sqrt(),
        Function::Exp => x.exp(),
        Function::Ln => x.ln(),
        Function::Log10 => x.log10(),
        Function::Log2 => x.log2(),
        Function::Floor => x.floor(),
        Function::Ceil => x.ceil(),
        Function::Round => x.round(),
        Function::Sign => {
            if x.is_nan() || x == 0.0 {
                x
            } else {
                x.signum()
            }
        }
        Function::Pow => x.powf(numbers[1]),
        Function::Clamp => x.max(numbers[1]).min(numbers[2]),
        Function::Linear => (x - numbers[1]) / (numbers[2] - numbers[1]),
        Function::IsNaN => bool_to_f64(x.is_nan()),
        _ => unreachable!("aggregates handled above"),
    };
    Ok(Value::Number(out))
}

/// `min`/`max` skip NaN entries, the others let it propagate.
fn aggregate(function: Function, values: &mut [f64]) -> f64 {
    match function {
        Function::Count => values.len() as f64,
        Function::Sum => values.iter().sum(),
        Function::Min => values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::min)
            .unwrap_or(f64::NAN),
        Function::Max => values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .reduce(f64::max)
            .unwrap_or(f64::NAN),
        Function::Mean => {
            if values.is_empty() {
                f64::NAN
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        }
        Function::Median => {
            if values.is_empty() || values.iter().any(|v| v.is_nan()) {
                return f64::NAN;
            }
            values.sort_by(f64::total_cmp);
            let mid = values.len() / 2;
            if values.len() % 2 == 0 {
                (values[mid - 1] + values[mid]) / 2.0
            } else {
                values[mid]
            }
        }
        _ => f64::NAN,
    }
}

fn number(value: Value) -> Result<f64, FormulaError> {
    match value {
        Value::Number(n) => Ok(n),
        Value::List(_) => Err(FormulaError::Type("expected a number, found a list".into())),
    }
}

fn truthy(v: f64) -> bool {
    v != 0.0 && !v.is_nan()
}

fn bool_to_f64(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn negated(depth: usize) -> Expr {
        (0..depth).fold(Expr::Number(1.0), |inner, _| {
            Expr::Unary(UnaryOp::Negate, Box::new(inner))
        })
    }

    #[test]
    fn test_evaluation_depth_is_bounded() {
        let scope = Scope::new();
        assert_eq!(evaluate(&negated(MAX_DEPTH), &scope), Ok(Value::Number(1.0)));
        assert_eq!(
            evaluate(&negated(1_000), &scope),
            Err(FormulaError::TooDeep { limit: MAX_DEPTH })
        );
    }
}
