//! Recursive-descent parser producing the formula AST.
//!
//! Precedence, lowest first: `?:`, `||`, `&&`, comparisons, `+ -`,
//! `* / %`, unary `- !`, `^` (right associative), indexing `a[i]`.

use super::{FormulaError, MAX_DEPTH};
use super::eval::Function;
use super::lexer::{Spanned, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    Equals,
    NotEquals,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Variable(String),
    List(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

pub(crate) fn parse(tokens: &[Spanned], source_len: usize) -> Result<Expr, FormulaError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source_len,
        nesting: 0,
    };
    // Legacy scripts were statement bodies: accept `return <expr>;`.
    if matches!(parser.peek(), Some(Token::Ident(name)) if name == "return") {
        parser.pos += 1;
    }
    let (expr, _) = parser.expression()?;
    while parser.eat(&Token::Semicolon) {}
    match parser.tokens.get(parser.pos) {
        None => Ok(expr),
        Some(spanned) => Err(FormulaError::UnexpectedToken {
            found: spanned.token.describe(),
            expected: "end of formula".to_string(),
            pos: spanned.pos,
        }),
    }
}

/// An expression and the height of its tree.
type Parsed = (Expr, usize);

struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    end: usize,
    /// Active recursive calls of `expression` and `unary`.
    nesting: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), FormulaError> {
        if self.eat(&expected) {
            return Ok(());
        }
        Err(self.unexpected(&expected.describe()))
    }

    fn unexpected(&self, expected: &str) -> FormulaError {
        match self.tokens.get(self.pos) {
            Some(spanned) => FormulaError::UnexpectedToken {
                found: spanned.token.describe(),
                expected: expected.to_string(),
                pos: spanned.pos,
            },
            None => FormulaError::UnexpectedEnd { pos: self.end },
        }
    }

    /// Run `f` one recursion level deeper.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, FormulaError>) -> Result<T, FormulaError> {
        if self.nesting >= MAX_DEPTH {
            return Err(FormulaError::TooDeep { limit: MAX_DEPTH });
        }
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    fn node(expr: Expr, height: usize) -> Result<Parsed, FormulaError> {
        if height > MAX_DEPTH {
            return Err(FormulaError::TooDeep { limit: MAX_DEPTH });
        }
        Ok((expr, height))
    }

    fn binary(op: BinaryOp, (left, lh): Parsed, (right, rh): Parsed) -> Result<Parsed, FormulaError> {
        Self::node(
            Expr::Binary(op, Box::new(left), Box::new(right)),
            lh.max(rh) + 1,
        )
    }

    fn expression(&mut self) -> Result<Parsed, FormulaError> {
        self.nested(|p| {
            let (condition, ch) = p.or()?;
            if !p.eat(&Token::Question) {
                return Ok((condition, ch));
            }
            let (then, th) = p.expression()?;
            p.expect(Token::Colon)?;
            let (otherwise, oh) = p.expression()?;
            Self::node(
                Expr::Conditional(Box::new(condition), Box::new(then), Box::new(otherwise)),
                ch.max(th).max(oh) + 1,
            )
        })
    }

    fn or(&mut self) -> Result<Parsed, FormulaError> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = Self::binary(BinaryOp::Or, left, right)?;
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Parsed, FormulaError> {
        let mut left = self.comparison()?;
        while self.eat(&Token::And) {
            let right = self.comparison()?;
            left = Self::binary(BinaryOp::And, left, right)?;
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Parsed, FormulaError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Some(Token::Less) => BinaryOp::Less,
            Some(Token::LessEquals) => BinaryOp::LessEquals,
            Some(Token::Greater) => BinaryOp::Greater,
            Some(Token::GreaterEquals) => BinaryOp::GreaterEquals,
            Some(Token::Equals) => BinaryOp::Equals,
            Some(Token::NotEquals) => BinaryOp::NotEquals,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.additive()?;
        Self::binary(op, left, right)
    }

    fn additive(&mut self) -> Result<Parsed, FormulaError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Self::binary(op, left, right)?;
        }
    }

    fn multiplicative(&mut self) -> Result<Parsed, FormulaError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Multiply,
                Some(Token::Slash) => BinaryOp::Divide,
                Some(Token::Percent) => BinaryOp::Modulo,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Self::binary(op, left, right)?;
        }
    }

    fn unary(&mut self) -> Result<Parsed, FormulaError> {
        let op = if self.eat(&Token::Minus) {
            Some(UnaryOp::Negate)
        } else if self.eat(&Token::Bang) {
            Some(UnaryOp::Not)
        } else if self.eat(&Token::Plus) {
            return self.nested(Self::unary);
        } else {
            None
        };
        match op {
            Some(op) => {
                let (operand, h) = self.nested(Self::unary)?;
                Self::node(Expr::Unary(op, Box::new(operand)), h + 1)
            }
            None => self.power(),
        }
    }

    fn power(&mut self) -> Result<Parsed, FormulaError> {
        let base = self.postfix()?;
        if self.eat(&Token::Caret) {
            let exponent = self.nested(Self::unary)?;
            return Self::binary(BinaryOp::Power, base, exponent);
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Parsed, FormulaError> {
        let mut expr = self.primary()?;
        while self.eat(&Token::LBracket) {
            let (index, ih) = self.expression()?;
            self.expect(Token::RBracket)?;
            let (target, th) = expr;
            expr = Self::node(Expr::Index(Box::new(target), Box::new(index)), th.max(ih) + 1)?;
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Parsed, FormulaError> {
        let Some(spanned) = self.tokens.get(self.pos) else {
            return Err(FormulaError::UnexpectedEnd { pos: self.end });
        };
        let pos = spanned.pos;
        match &spanned.token {
            Token::Number(n) => {
                self.pos += 1;
                Ok((Expr::Number(*n), 1))
            }
            Token::Ident(name) => {
                self.pos += 1;
                if !self.eat(&Token::LParen) {
                    let expr = match name.as_str() {
                        "true" => Expr::Number(1.0),
                        "false" => Expr::Number(0.0),
                        "NaN" => Expr::Number(f64::NAN),
                        "Infinity" => Expr::Number(f64::INFINITY),
                        _ => Expr::Variable(name.clone()),
                    };
                    return Ok((expr, 1));
                }
                let function = Function::lookup(name).ok_or_else(|| {
                    FormulaError::UnknownFunction {
                        name: name.clone(),
                        pos,
                    }
                })?;
                let (args, h) = self.arguments(Token::RParen)?;
                function.check_arity(args.len())?;
                Self::node(Expr::Call(function, args), h + 1)
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::LBracket => {
                self.pos += 1;
                let (items, h) = self.arguments(Token::RBracket)?;
                Self::node(Expr::List(items), h + 1)
            }
            _ => Err(self.unexpected("a value")),
        }
    }

    /// Comma separated expressions up to `close`, with the tallest height.
    fn arguments(&mut self, close: Token) -> Result<(Vec<Expr>, usize), FormulaError> {
        let mut args = Vec::new();
        let mut height = 0;
        if self.eat(&close) {
            return Ok((args, height));
        }
        loop {
            let (arg, h) = self.expression()?;
            args.push(arg);
            height = height.max(h);
            if self.eat(&Token::Comma) {
                continue;
            }
            self.expect(close)?;
            return Ok((args, height));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::lexer::tokenize;

    fn parse_str(source: &str) -> Result<Expr, FormulaError> {
        parse(&tokenize(source)?, source.len())
    }

    #[test]
    fn test_precedence() {
        let expr = parse_str("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(Expr::Number(1.0)),
                Box::new(Expr::Binary(
                    BinaryOp::Multiply,
                    Box::new(Expr::Number(2.0)),
                    Box::new(Expr::Number(3.0))
                ))
            )
        );
    }

    #[test]
    fn test_power_is_right_associative() {
        let expr = parse_str("2 ^ 3 ^ 2").unwrap();
        let Expr::Binary(BinaryOp::Power, _, right) = expr else {
            panic!("expected power");
        };
        assert!(matches!(*right, Expr::Binary(BinaryOp::Power, _, _)));
    }

    #[test]
    fn test_return_prefix_and_semicolon_accepted() {
        assert_eq!(
            parse_str("return value;").unwrap(),
            Expr::Variable("value".into())
        );
    }

    #[test]
    fn test_unknown_function_is_rejected_at_parse_time() {
        let err = parse_str("frobnicate(1)").unwrap_err();
        assert!(matches!(err, FormulaError::UnknownFunction { ref name, pos: 0 } if name == "frobnicate"));
    }

    #[test]
    fn test_trailing_tokens_are_rejected() {
        assert!(matches!(
            parse_str("1 2").unwrap_err(),
            FormulaError::UnexpectedToken { pos: 2, .. }
        ));
    }

    #[test]
    fn test_deep_parentheses_are_rejected() {
        let source = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(
            parse_str(&source).unwrap_err(),
            FormulaError::TooDeep { limit: MAX_DEPTH }
        );
    }

    #[test]
    fn test_long_operator_chain_is_rejected() {
        let source = vec!["1"; 10_000].join(" + ");
        assert!(matches!(parse_str(&source), Err(FormulaError::TooDeep { .. })));
        let unary = format!("{}1", "-".repeat(10_000));
        assert!(matches!(parse_str(&unary), Err(FormulaError::TooDeep { .. })));
    }

    #[test]
    fn test_nesting_within_limit_is_accepted() {
        let source = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(parse_str(&source).unwrap(), Expr::Number(1.0));
        let chain = vec!["1"; 200].join(" + ");
        assert!(parse_str(&chain).is_ok());
    }

    #[test]
    fn test_unterminated_call() {
        assert!(matches!(
            parse_str("max(1, 2").unwrap_err(),
            FormulaError::UnexpectedEnd { pos: 8 }
        ));
    }
}
