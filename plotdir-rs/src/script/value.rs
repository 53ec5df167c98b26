//! Typed argument values produced by the parameter caster.
//!
//! Every script token starts life as a string; the cast table decides which
//! of these variants it becomes before it reaches a device capability or an
//! option.

use std::fmt;

/// A typed argument or option value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// A polyline: ordered `(x, y)` vertices.
    Path(Vec<(f64, f64)>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    write!(f, "{:.1}", x)
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Path(points) => {
                f.write_str("[")?;
                for (i, (x, y)) in points.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "({}, {})", Value::Float(*x), Value::Float(*y))?;
                }
                f.write_str("]")
            }
        }
    }
}

impl Value {
    /// Name of the type, used in type-mismatch diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::Path(_) => "path",
        }
    }

    /// Numeric view: integers widen to `f64`, everything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&[(f64, f64)]> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_display_keeps_one_decimal() {
        assert_eq!(Value::Float(0.0).to_string(), "0.0");
        assert_eq!(Value::Float(1.5).to_string(), "1.5");
    }

    #[test]
    fn path_display() {
        let v = Value::Path(vec![(0.0, 0.0), (10.0, 2.5)]);
        assert_eq!(v.to_string(), "[(0.0, 0.0), (10.0, 2.5)]");
    }

    #[test]
    fn int_widens_to_f64() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Str("3".into()).as_f64(), None);
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Bool(true).type_name(), "boolean");
        assert_eq!(Value::Path(vec![]).type_name(), "path");
    }
}
