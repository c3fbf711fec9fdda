//! The closed set of runtime types and values shared by the AST (as literal
//! payloads and node type annotations) and the evaluator (as stack slots and
//! the result register).

use std::fmt;

/// Language type of an expression. Carried on every AST node (`Void` for
/// statements) and tagged onto every runtime value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Type {
    Void,
    Boolean,
    Integer,
    Float,
    String,
}

/// A literal value owned by the AST. Strings are owned here; the evaluator
/// only ever borrows them.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Boolean(bool),
    Integer(i32),
    Float(f32),
    String(String),
}

impl Literal {
    pub fn ty(&self) -> Type {
        match self {
            Literal::Boolean(_) => Type::Boolean,
            Literal::Integer(_) => Type::Integer,
            Literal::Float(_) => Type::Float,
            Literal::String(_) => Type::String,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(v) => write!(f, "{}", format_float(*v)),
            Literal::String(s) => write!(f, "{}", s),
        }
    }
}

/// Shortest round-trip decimal representation with no trailing zeros, as
/// `print` requires for `Float` values.
pub fn format_float(value: f32) -> String {
    if value == value.trunc() && value.is_finite() {
        format!("{}", value as i64)
    } else {
        let mut repr = format!("{}", value);
        if !repr.contains('.') && !repr.contains('e') && !repr.contains("inf") && !repr.contains("NaN") {
            repr.push_str(".0");
        }
        repr
    }
}
