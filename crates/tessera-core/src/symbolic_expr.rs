//! Symbolic dimension expressions.
//!
//! A dimension of a tensor whose size is not known at compile time is
//! described by an integer expression over named scalar variables, e.g.
//! `n`, `n + 1` or `(batch * seq) / 2`. Expressions compare and hash
//! structurally, so two occurrences of `n + 1` anywhere in a function are
//! the same key in a slot map.
//!
//! Supported operations: `+`, `-`, `*`, `/`, `%`, parentheses
//!
//! # Examples
//!
//! ```
//! use tessera_core::symbolic_expr::{evaluate_expr, parse_expr};
//! use std::collections::HashMap;
//!
//! let expr = parse_expr("(n + 1) * 2").unwrap();
//! let vars = HashMap::from([("n".to_string(), 3)]);
//! assert_eq!(evaluate_expr(&expr, &vars).unwrap(), 8);
//! ```

use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// Integer-valued expression over scalar variables and constants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolicExpr {
    /// Integer literal.
    Literal(i64),
    /// Scalar variable (a dynamic dimension name).
    Variable(String),
    /// Binary operation.
    BinOp(Box<SymbolicExpr>, BinOpKind, Box<SymbolicExpr>),
}

/// Binary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOpKind {
    fn symbol(self) -> &'static str {
        match self {
            BinOpKind::Add => "+",
            BinOpKind::Sub => "-",
            BinOpKind::Mul => "*",
            BinOpKind::Div => "/",
            BinOpKind::Mod => "%",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            BinOpKind::Add | BinOpKind::Sub => 1,
            BinOpKind::Mul | BinOpKind::Div | BinOpKind::Mod => 2,
        }
    }

    /// Apply the operator to two concrete values.
    pub fn apply(self, lhs: i64, rhs: i64) -> Result<i64> {
        let overflow =
            || Error::Symbolic(format!("integer overflow in {lhs} {} {rhs}", self.symbol()));
        match self {
            BinOpKind::Add => lhs.checked_add(rhs).ok_or_else(overflow),
            BinOpKind::Sub => lhs.checked_sub(rhs).ok_or_else(overflow),
            BinOpKind::Mul => lhs.checked_mul(rhs).ok_or_else(overflow),
            BinOpKind::Div if rhs == 0 => {
                Err(Error::Symbolic(format!("division by zero: {lhs} / 0")))
            }
            BinOpKind::Div => Ok(lhs.div_euclid(rhs)),
            BinOpKind::Mod if rhs == 0 => {
                Err(Error::Symbolic(format!("modulo by zero: {lhs} % 0")))
            }
            BinOpKind::Mod => Ok(lhs.rem_euclid(rhs)),
        }
    }
}

impl SymbolicExpr {
    /// Create a variable reference.
    pub fn var(name: impl Into<String>) -> Self {
        SymbolicExpr::Variable(name.into())
    }

    /// Create an integer literal.
    pub fn lit(value: i64) -> Self {
        SymbolicExpr::Literal(value)
    }

    /// Build `self <op> rhs`.
    pub fn binary(self, op: BinOpKind, rhs: SymbolicExpr) -> Self {
        SymbolicExpr::BinOp(Box::new(self), op, Box::new(rhs))
    }

    pub fn add(self, rhs: SymbolicExpr) -> Self {
        self.binary(BinOpKind::Add, rhs)
    }

    pub fn sub(self, rhs: SymbolicExpr) -> Self {
        self.binary(BinOpKind::Sub, rhs)
    }

    pub fn mul(self, rhs: SymbolicExpr) -> Self {
        self.binary(BinOpKind::Mul, rhs)
    }

    pub fn div(self, rhs: SymbolicExpr) -> Self {
        self.binary(BinOpKind::Div, rhs)
    }

    /// Literal value, if this expression is a bare literal.
    pub fn as_literal(&self) -> Option<i64> {
        match self {
            SymbolicExpr::Literal(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, SymbolicExpr::Literal(_))
    }

    /// Variables occurring in this expression, in post-order of first occurrence.
    pub fn free_vars(&self) -> Vec<&str> {
        let mut vars = Vec::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            SymbolicExpr::Literal(_) => {}
            SymbolicExpr::Variable(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name);
                }
            }
            SymbolicExpr::BinOp(lhs, _, rhs) => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            }
        }
    }

    /// Fold the expression to a literal when it contains no variables.
    pub fn try_fold(&self) -> Option<i64> {
        evaluate_expr(self, &HashMap::new()).ok()
    }

    fn fmt_with_parent(
        &self,
        f: &mut fmt::Formatter<'_>,
        parent: Option<(BinOpKind, bool)>,
    ) -> fmt::Result {
        match self {
            SymbolicExpr::Literal(v) => write!(f, "{v}"),
            SymbolicExpr::Variable(name) => write!(f, "{name}"),
            SymbolicExpr::BinOp(lhs, op, rhs) => {
                // Right operands of equal precedence need parens: `a - (b - c)`.
                let needs_parens = parent.is_some_and(|(outer, is_rhs)| {
                    op.precedence() < outer.precedence()
                        || (is_rhs && op.precedence() == outer.precedence())
                });
                if needs_parens {
                    f.write_str("(")?;
                }
                lhs.fmt_with_parent(f, Some((*op, false)))?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_with_parent(f, Some((*op, true)))?;
                if needs_parens {
                    f.write_str(")")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for SymbolicExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with_parent(f, None)
    }
}

impl fmt::Display for BinOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl From<i64> for SymbolicExpr {
    fn from(value: i64) -> Self {
        SymbolicExpr::Literal(value)
    }
}

/// Parse an arithmetic expression string.
///
/// # Grammar
///
/// ```text
/// expr   = term (('+' | '-') term)*
/// term   = factor (('*' | '/' | '%') factor)*
/// factor = '(' expr ')' | number | ident
/// ```
pub fn parse_expr(input: &str) -> Result<SymbolicExpr> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;

    if let Some(token) = parser.tokens.get(parser.pos) {
        return Err(Error::Symbolic(format!(
            "unexpected token {token:?} after expression in '{input}'"
        )));
    }

    Ok(expr)
}

/// Evaluate an expression with the given variable values.
pub fn evaluate_expr(expr: &SymbolicExpr, vars: &HashMap<String, i64>) -> Result<i64> {
    match expr {
        SymbolicExpr::Literal(v) => Ok(*v),
        SymbolicExpr::Variable(name) => vars
            .get(name)
            .copied()
            .ok_or_else(|| Error::Symbolic(format!("variable '{name}' is not bound"))),
        SymbolicExpr::BinOp(lhs, op, rhs) => {
            op.apply(evaluate_expr(lhs, vars)?, evaluate_expr(rhs, vars)?)
        }
    }
}

// ── Lexer ──

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(i64),
    Ident(String),
    Op(BinOpKind),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        let token = match ch {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '+' => Token::Op(BinOpKind::Add),
            '-' => Token::Op(BinOpKind::Sub),
            '*' => Token::Op(BinOpKind::Mul),
            '/' => Token::Op(BinOpKind::Div),
            '%' => Token::Op(BinOpKind::Mod),
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if c.is_ascii_digit() || c.is_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if !(c.is_alphanumeric() || c == '_') {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                let text = &input[start..end];
                if ch.is_ascii_digit() {
                    let value = text
                        .parse()
                        .map_err(|_| Error::Symbolic(format!("invalid number '{text}'")))?;
                    tokens.push(Token::Number(value));
                } else {
                    tokens.push(Token::Ident(text.to_string()));
                }
                continue;
            }
            other => {
                return Err(Error::Symbolic(format!("unexpected character '{other}'")));
            }
        };
        chars.next();
        tokens.push(token);
    }

    Ok(tokens)
}

// ── Parser ──

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek_op(&self, accept: &[BinOpKind]) -> Option<BinOpKind> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) if accept.contains(op) => Some(*op),
            _ => None,
        }
    }

    fn expr(&mut self) -> Result<SymbolicExpr> {
        let mut lhs = self.term()?;
        while let Some(op) = self.peek_op(&[BinOpKind::Add, BinOpKind::Sub]) {
            self.pos += 1;
            lhs = lhs.binary(op, self.term()?);
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<SymbolicExpr> {
        let mut lhs = self.factor()?;
        while let Some(op) = self.peek_op(&[BinOpKind::Mul, BinOpKind::Div, BinOpKind::Mod]) {
            self.pos += 1;
            lhs = lhs.binary(op, self.factor()?);
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<SymbolicExpr> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        match token {
            Some(Token::Number(n)) => Ok(SymbolicExpr::Literal(n)),
            Some(Token::Ident(name)) => Ok(SymbolicExpr::Variable(name)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.tokens.get(self.pos) {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(Error::Symbolic("expected closing parenthesis ')'".to_string())),
                }
            }
            _ => Err(Error::Symbolic("expected number, identifier, or '('".to_string())),
        }
    }
}
