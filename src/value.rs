use std::fmt::Display;

use snafu::Snafu;

use crate::callable::Callable;

/// Runtime value of a Lox expression.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
    Callable(Callable),
}

impl Value {
    /// `nil` and `false` are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Boolean(false))
    }

    /// Both operands of an arithmetic or comparison operator.
    pub fn number_operands(left: &Value, right: &Value) -> Result<(f64, f64), TypeError> {
        match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok((*l, *r)),
            _ => NumberOperandsSnafu.fail(),
        }
    }

    /// `+` on numbers adds, on strings concatenates. Mixed operands are rejected.
    pub fn add(left: &Value, right: &Value) -> Result<Value, TypeError> {
        match (left, right) {
            (Value::Number(l), Value::Number(r)) => Ok(Value::Number(l + r)),
            (Value::String(l), Value::String(r)) => {
                let mut joined = String::with_capacity(l.len() + r.len());
                joined.push_str(l);
                joined.push_str(r);
                Ok(Value::String(joined))
            }
            _ => AddOperandsSnafu.fail(),
        }
    }
}

impl TryFrom<&Value> for f64 {
    type Error = TypeError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => Ok(*n),
            _ => NumberOperandSnafu.fail(),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(l), Value::Boolean(r)) => l == r,
            // NaN equals itself and 0 differs from -0
            (Value::Number(l), Value::Number(r)) => {
                (l.is_nan() && r.is_nan()) || l.to_bits() == r.to_bits()
            }
            (Value::String(l), Value::String(r)) => l == r,
            (Value::Callable(l), Value::Callable(r)) => l == r,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Number(n) if n.is_infinite() => {
                write!(f, "{}", if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            // f64's Display already drops a trailing ".0" for integral values
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Callable(c) => write!(f, "{c}"),
        }
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum TypeError {
    #[snafu(display("Operand must be a number."))]
    NumberOperand,

    #[snafu(display("Operands must be numbers."))]
    NumberOperands,

    #[snafu(display("Operands must be two numbers or two strings."))]
    AddOperands,
}
