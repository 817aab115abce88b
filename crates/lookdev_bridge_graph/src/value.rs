// SPDX-License-Identifier: MIT OR Apache-2.0
//! Attribute values read from the source scene and written into templates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Absolute tolerance used when comparing floating point values
pub const FLOAT_TOLERANCE: f64 = 1e-3;

/// Value of a node attribute or a template parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// String
    Str(String),
    /// Fixed-length component tuple (colours, vectors)
    Tuple(Vec<AttrValue>),
    /// Multi-value wrapper as returned by scene queries
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Build an RGB colour tuple
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self::Tuple(vec![Self::Float(r), Self::Float(g), Self::Float(b)])
    }

    /// Build a tuple of floats
    pub fn floats(values: &[f64]) -> Self {
        Self::Tuple(values.iter().copied().map(Self::Float).collect())
    }

    /// Strip a single-element list wrapper
    pub fn unwrap_single(self) -> Self {
        match self {
            Self::List(mut items) if items.len() == 1 => items.remove(0),
            other => other,
        }
    }

    /// Sequence elements for tuples and lists
    pub fn as_sequence(&self) -> Option<&[AttrValue]> {
        match self {
            Self::Tuple(items) | Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether this value is a tuple or list
    pub fn is_sequence(&self) -> bool {
        self.as_sequence().is_some()
    }

    /// Numeric view of the value, parsing strings when possible
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Str(s) => s.trim().parse().ok(),
            Self::Tuple(_) | Self::List(_) => None,
        }
    }

    /// Integer view of the value
    ///
    /// Floats truncate, strings parse, and sequences coerce to their length.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            Self::Float(f) => Some(f.trunc() as i64),
            Self::Str(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
            }
            Self::Tuple(items) | Self::List(items) => Some(items.len() as i64),
        }
    }

    /// Truthiness of the value
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Str(s) => s == "True" || self.as_i64() == Some(1),
            Self::Tuple(items) | Self::List(items) => !items.is_empty(),
            other => other.as_i64() == Some(1),
        }
    }

    /// String view of the value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this value is exactly zero (`0`, `0.0` or `false`)
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Bool(b) => !b,
            Self::Int(i) => *i == 0,
            Self::Float(f) => *f == 0.0,
            _ => false,
        }
    }

    /// Index usable for enumeration lookups
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Bool(b) => Some(usize::from(*b)),
            Self::Int(i) => usize::try_from(*i).ok(),
            Self::Float(f) if f.fract() == 0.0 && *f >= 0.0 => Some(*f as usize),
            _ => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", i32::from(*b)),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => f.write_str(s),
            Self::Tuple(items) | Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Compare two values the way template defaults are compared against scene values
///
/// Sequences compare element-wise over the left side's length. Floats win
/// over bools, bools over ints, and ints over everything else.
pub fn values_equal(a: &AttrValue, b: &AttrValue) -> bool {
    if let Some(left) = a.as_sequence() {
        let Some(right) = b.as_sequence() else {
            return false;
        };
        return left
            .iter()
            .enumerate()
            .all(|(i, item)| right.get(i).is_some_and(|other| values_equal(item, other)));
    }

    match (a, b) {
        (AttrValue::Float(_), _) | (_, AttrValue::Float(_)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < FLOAT_TOLERANCE,
            _ => false,
        },
        (AttrValue::Bool(_), _) | (_, AttrValue::Bool(_)) => a.as_bool() == b.as_bool(),
        (AttrValue::Int(_), _) | (_, AttrValue::Int(_)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => a == b,
    }
}

/// Parameter kind declared by a template slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParamKind {
    /// `FloatAttr`
    #[default]
    Float,
    /// `IntAttr`
    Int,
    /// `StringAttr`
    String,
}

impl ParamKind {
    /// Katana attribute type name
    pub fn attr_name(self) -> &'static str {
        match self {
            Self::Float => "FloatAttr",
            Self::Int => "IntAttr",
            Self::String => "StringAttr",
        }
    }

    /// Coerce a scalar value into this kind
    ///
    /// Values that cannot be represented are returned unchanged.
    pub fn coerce(self, value: AttrValue) -> AttrValue {
        match (self, value) {
            (Self::Float, v @ AttrValue::Float(_)) => v,
            (Self::Float, v) => match v.as_f64() {
                Some(f) if !v.is_sequence() => AttrValue::Float(f),
                _ => v,
            },
            (Self::Int, v @ AttrValue::Int(_)) => v,
            (Self::Int, AttrValue::Bool(b)) => AttrValue::Int(i64::from(b)),
            (Self::Int, v @ (AttrValue::Float(_) | AttrValue::Str(_))) => match v.as_i64() {
                Some(i) => AttrValue::Int(i),
                None => v,
            },
            (Self::String, v @ AttrValue::Str(_)) => v,
            (Self::String, v) if !v.is_sequence() => AttrValue::Str(v.to_string()),
            (_, v) => v,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_tolerance() {
        assert!(values_equal(&AttrValue::Float(1.0), &AttrValue::Float(1.0005)));
        assert!(!values_equal(&AttrValue::Float(1.0), &AttrValue::Float(1.1)));
        assert!(values_equal(&AttrValue::Float(0.5), &AttrValue::from("0.5")));
        assert!(!values_equal(&AttrValue::Float(0.5), &AttrValue::from("abc")));
    }

    #[test]
    fn test_bool_coercion() {
        assert!(values_equal(&AttrValue::Bool(true), &AttrValue::Int(1)));
        assert!(values_equal(&AttrValue::Int(0), &AttrValue::Bool(false)));
        assert!(values_equal(&AttrValue::Bool(true), &AttrValue::from("True")));
        assert!(values_equal(&AttrValue::from("1"), &AttrValue::Bool(true)));
        assert!(!values_equal(&AttrValue::Bool(true), &AttrValue::Int(2)));
    }

    #[test]
    fn test_tuple_comparison() {
        let a = AttrValue::floats(&[1.0, 2.0, 3.0]);
        let b = AttrValue::floats(&[1.0, 2.0, 3.0]);
        let c = AttrValue::floats(&[1.0, 2.0, 4.0]);
        assert!(values_equal(&a, &b));
        assert!(!values_equal(&a, &c));
        assert!(!values_equal(&a, &AttrValue::floats(&[1.0, 2.0])));
        assert!(!values_equal(&a, &AttrValue::Float(1.0)));
    }

    #[test]
    fn test_int_coercion() {
        assert!(values_equal(&AttrValue::Int(3), &AttrValue::from("3")));
        assert!(values_equal(
            &AttrValue::Int(2),
            &AttrValue::Str("2".into())
        ));
        assert!(!values_equal(&AttrValue::from("x"), &AttrValue::Int(1)));
        assert!(values_equal(&AttrValue::from("ggx"), &AttrValue::from("ggx")));
    }

    #[test]
    fn test_unwrap_single() {
        let wrapped = AttrValue::List(vec![AttrValue::rgb(1.0, 0.5, 0.0)]);
        assert_eq!(wrapped.unwrap_single(), AttrValue::rgb(1.0, 0.5, 0.0));

        let pair = AttrValue::List(vec![AttrValue::Int(1), AttrValue::Int(2)]);
        assert!(pair.clone().unwrap_single().is_sequence());
    }

    #[test]
    fn test_is_zero() {
        assert!(AttrValue::Int(0).is_zero());
        assert!(AttrValue::Float(0.0).is_zero());
        assert!(AttrValue::Bool(false).is_zero());
        assert!(!AttrValue::from("0").is_zero());
        assert!(!AttrValue::Float(0.1).is_zero());
    }

    #[test]
    fn test_kind_coercion() {
        assert_eq!(ParamKind::Float.coerce(AttrValue::Int(2)), AttrValue::Float(2.0));
        assert_eq!(ParamKind::Int.coerce(AttrValue::Bool(true)), AttrValue::Int(1));
        assert_eq!(ParamKind::Int.coerce(AttrValue::from("4")), AttrValue::Int(4));
        assert_eq!(
            ParamKind::String.coerce(AttrValue::from("ggx")),
            AttrValue::from("ggx")
        );
        assert_eq!(ParamKind::String.coerce(AttrValue::Bool(true)), AttrValue::from("1"));
        assert_eq!(AttrValue::rgb(1.0, 0.5, 0.25).to_string(), "1 0.5 0.25");
    }
}
