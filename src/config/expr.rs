//! Expression language used by assignments and conditionals.
//!
//! The grammar lives in `grammar.lalrpop`; evaluation reads names through a [`Scope`], which
//! is how [`Config`](super::Config) exposes its variables to expressions.

use std::cmp::Ordering;

use lalrpop_util::lalrpop_mod;
use thiserror::Error;

use super::{ConfigError, Value};

lalrpop_mod! {grammar, "/config/grammar.rs"}

/// Variable namespace of an expression.
pub trait Scope {
    fn resolve(&mut self, name: &str) -> Result<Value, ConfigError>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("invalid expression: {0}")]
    Parse(String),
    #[error(transparent)]
    Variable(#[from] ConfigError),
    #[error("unsupported operand types for '{op}': {lhs} and {rhs}")]
    Operands {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("bad operand type for unary '-': {0}")]
    Negation(&'static str),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("expression does not evaluate to a boolean: {0}")]
    NotBoolean(String),
    /// Only scalars can be stored by an assignment.
    #[error("cannot assign a {0}")]
    NotAScalar(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "or",
            BinOp::And => "and",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::In => "in",
            BinOp::NotIn => "not in",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn unary(op: UnaryOp, e: Expr) -> Expr {
        Expr::Unary(op, Box::new(e))
    }

    pub fn binary(op: BinOp, l: Expr, r: Expr) -> Expr {
        Expr::Binary(op, Box::new(l), Box::new(r))
    }

    pub fn parse(input: &str) -> Result<Expr, ExpressionError> {
        grammar::ExpressionParser::new()
            .parse(input)
            .map_err(|e| ExpressionError::Parse(format!("{}", e)))
    }

    pub fn eval<S: Scope + ?Sized>(&self, scope: &mut S) -> Result<Value, ExpressionError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => Ok(scope.resolve(name)?),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(item.eval(scope)?);
                }
                Ok(Value::List(values))
            }
            Expr::Unary(UnaryOp::Not, e) => Ok(Value::Bool(!e.eval(scope)?.truthy())),
            Expr::Unary(UnaryOp::Neg, e) => match e.eval(scope)? {
                Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(ExpressionError::Overflow),
                Value::Float(x) => Ok(Value::Float(-x)),
                v => Err(ExpressionError::Negation(v.type_name())),
            },
            Expr::Binary(BinOp::And, l, r) => {
                let lhs = l.eval(scope)?;
                if lhs.truthy() { r.eval(scope) } else { Ok(lhs) }
            }
            Expr::Binary(BinOp::Or, l, r) => {
                let lhs = l.eval(scope)?;
                if lhs.truthy() { Ok(lhs) } else { r.eval(scope) }
            }
            Expr::Binary(op, l, r) => {
                let lhs = l.eval(scope)?;
                let rhs = r.eval(scope)?;
                apply(*op, lhs, rhs)
            }
        }
    }
}

fn operands_error(op: BinOp, lhs: &Value, rhs: &Value) -> ExpressionError {
    ExpressionError::Operands {
        op: op.symbol(),
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => (*a as f64) == *b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        // Subtrees have no value semantics
        (Value::Branch(_), _) | (_, Value::Branch(_)) => false,
        (a, b) => a == b,
    }
}

fn compare(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Ordering, ExpressionError> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => None,
    };
    ordering.ok_or_else(|| operands_error(op, lhs, rhs))
}

fn contains(op: BinOp, needle: &Value, haystack: &Value) -> Result<bool, ExpressionError> {
    match (needle, haystack) {
        (_, Value::List(items)) => Ok(items.iter().any(|item| values_equal(needle, item))),
        (Value::Str(n), Value::Str(h)) => Ok(h.contains(n.as_str())),
        (Value::Str(n), Value::Branch(keys)) => Ok(keys.iter().any(|k| k == n)),
        _ => Err(operands_error(op, needle, haystack)),
    }
}

fn float_rem(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r }
}

fn arithmetic(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, ExpressionError> {
    match (op, &lhs, &rhs) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (BinOp::Div, Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = (as_float(&lhs), as_float(&rhs));
            if b == 0.0 {
                Err(ExpressionError::DivisionByZero)
            } else {
                Ok(Value::Float(a / b))
            }
        }
        (_, Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinOp::Add => a.checked_add(*b),
                BinOp::Sub => a.checked_sub(*b),
                BinOp::Mul => a.checked_mul(*b),
                BinOp::Rem if *b == 0 => return Err(ExpressionError::DivisionByZero),
                BinOp::Rem => a
                    .checked_rem(*b)
                    .map(|r| if r != 0 && (r < 0) != (*b < 0) { r + b } else { r }),
                _ => return Err(operands_error(op, &lhs, &rhs)),
            };
            result.map(Value::Int).ok_or(ExpressionError::Overflow)
        }
        (_, Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = (as_float(&lhs), as_float(&rhs));
            match op {
                BinOp::Add => Ok(Value::Float(a + b)),
                BinOp::Sub => Ok(Value::Float(a - b)),
                BinOp::Mul => Ok(Value::Float(a * b)),
                BinOp::Rem if b == 0.0 => Err(ExpressionError::DivisionByZero),
                BinOp::Rem => Ok(Value::Float(float_rem(a, b))),
                _ => Err(operands_error(op, &lhs, &rhs)),
            }
        }
        _ => Err(operands_error(op, &lhs, &rhs)),
    }
}

fn as_float(v: &Value) -> f64 {
    match v {
        Value::Int(i) => *i as f64,
        Value::Float(x) => *x,
        _ => f64::NAN,
    }
}

fn apply(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, ExpressionError> {
    match op {
        BinOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinOp::Lt => Ok(Value::Bool(compare(op, &lhs, &rhs)? == Ordering::Less)),
        BinOp::Le => Ok(Value::Bool(compare(op, &lhs, &rhs)? != Ordering::Greater)),
        BinOp::Gt => Ok(Value::Bool(compare(op, &lhs, &rhs)? == Ordering::Greater)),
        BinOp::Ge => Ok(Value::Bool(compare(op, &lhs, &rhs)? != Ordering::Less)),
        BinOp::In => Ok(Value::Bool(contains(op, &lhs, &rhs)?)),
        BinOp::NotIn => Ok(Value::Bool(!contains(op, &lhs, &rhs)?)),
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
            arithmetic(op, lhs, rhs)
        }
        BinOp::And => Ok(if lhs.truthy() { rhs } else { lhs }),
        BinOp::Or => Ok(if lhs.truthy() { lhs } else { rhs }),
    }
}
