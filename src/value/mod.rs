//! Dynamic configuration values and their type constraints.
//!
//! The bridge moves data between a configuration surface whose values are
//! dynamically typed and a message surface whose fields are statically
//! kinded. This module is the configuration half: a value union carrying
//! its own type, a conversion routine that applies type constraints, and
//! the two raw-mode wire codecs.

mod convert;
pub mod json;
pub mod msgpack;
mod ty;

pub use convert::convert;
pub use ty::Ty;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive};
use ordered_float::OrderedFloat;

/// A configuration number.
///
/// Integral values keep arbitrary precision so that out-of-range literals
/// can be diagnosed exactly rather than silently rounded; non-integral
/// values use a total-ordered double.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Number {
    Int(BigInt),
    Float(OrderedFloat<f64>),
}

impl Number {
    pub fn from_int(v: i64) -> Self {
        Number::Int(BigInt::from(v))
    }

    pub fn from_uint(v: u64) -> Self {
        Number::Int(BigInt::from(v))
    }

    pub fn from_float(v: f64) -> Self {
        Number::Float(OrderedFloat(v))
    }

    /// True when the number has no fractional part.
    pub fn is_whole(&self) -> bool {
        match self {
            Number::Int(_) => true,
            Number::Float(f) => f.fract() == 0.0 && f.is_finite(),
        }
    }

    /// The value as a big integer, when whole.
    pub fn as_bigint(&self) -> Option<BigInt> {
        match self {
            Number::Int(i) => Some(i.clone()),
            Number::Float(f) => {
                if self.is_whole() {
                    BigInt::from_f64(f.into_inner())
                } else {
                    None
                }
            }
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Int(i) => i.to_f64().unwrap_or(f64::INFINITY),
            Number::Float(f) => f.into_inner(),
        }
    }

    fn cmp_canonical(&self, other: &Number) -> Ordering {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(b),
            (Number::Float(a), Number::Float(b)) => a.cmp(b),
            _ => OrderedFloat(self.to_f64()).cmp(&OrderedFloat(other.to_f64())),
        }
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(v) => write!(f, "{}", v.into_inner()),
        }
    }
}

/// The configuration value union.
///
/// Every value knows its own type. `Null` and `Unknown` are typed
/// sentinels: a null still says what it would have been, and an unknown
/// stands for a value to be determined later. Empty collections carry
/// their element constraint for the same reason.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null(Ty),
    Unknown(Ty),
    Bool(bool),
    Number(Number),
    String(String),
    List(Ty, Vec<Value>),
    Set(Ty, Vec<Value>),
    Map(Ty, BTreeMap<String, Value>),
    Tuple(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl Value {
    pub fn null(ty: Ty) -> Value {
        Value::Null(ty)
    }

    pub fn unknown(ty: Ty) -> Value {
        Value::Unknown(ty)
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn int(v: i64) -> Value {
        Value::Number(Number::from_int(v))
    }

    pub fn uint(v: u64) -> Value {
        Value::Number(Number::from_uint(v))
    }

    pub fn big(v: BigInt) -> Value {
        Value::Number(Number::Int(v))
    }

    pub fn float(v: f64) -> Value {
        Value::Number(Number::from_float(v))
    }

    pub fn list(elem: Ty, items: impl IntoIterator<Item = Value>) -> Value {
        Value::List(elem, items.into_iter().collect())
    }

    /// Builds a set in canonical order: elements are sorted and
    /// deduplicated, which is what makes set round-trips deterministic.
    pub fn set(elem: Ty, items: impl IntoIterator<Item = Value>) -> Value {
        let mut items: Vec<Value> = items.into_iter().collect();
        items.sort_by(Value::canonical_cmp);
        items.dedup();
        Value::Set(elem, items)
    }

    pub fn map(
        elem: Ty,
        entries: impl IntoIterator<Item = (String, Value)>,
    ) -> Value {
        Value::Map(elem, entries.into_iter().collect())
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Value {
        Value::Tuple(items.into_iter().collect())
    }

    pub fn object(entries: impl IntoIterator<Item = (String, Value)>) -> Value {
        Value::Object(entries.into_iter().collect())
    }

    pub fn empty_object() -> Value {
        Value::Object(BTreeMap::new())
    }

    /// The value's type. For null and unknown this is the sentinel's
    /// declared type; for structural values it is computed from the shape.
    pub fn ty(&self) -> Ty {
        match self {
            Value::Null(t) | Value::Unknown(t) => t.clone(),
            Value::Bool(_) => Ty::Bool,
            Value::Number(_) => Ty::Number,
            Value::String(_) => Ty::String,
            Value::List(e, _) => Ty::List(Box::new(e.clone())),
            Value::Set(e, _) => Ty::Set(Box::new(e.clone())),
            Value::Map(e, _) => Ty::Map(Box::new(e.clone())),
            Value::Tuple(items) => Ty::Tuple(items.iter().map(Value::ty).collect()),
            Value::Object(entries) => Ty::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.ty()))
                    .collect(),
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    pub fn is_known(&self) -> bool {
        match self {
            Value::Unknown(_) => false,
            Value::List(_, items) | Value::Set(_, items) | Value::Tuple(items) => {
                items.iter().all(Value::is_known)
            }
            Value::Map(_, entries) | Value::Object(entries) => {
                entries.values().all(Value::is_known)
            }
            _ => true,
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
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Number> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    /// Sequence elements of a list, set, or tuple value.
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Value::List(_, items) | Value::Set(_, items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    /// Entries of a map or object value.
    pub fn entries(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(_, entries) | Value::Object(entries) => Some(entries),
            _ => None,
        }
    }

    /// Total order used to canonicalize sets. Values of different shapes
    /// order by shape rank first, then by content.
    pub fn canonical_cmp(&self, other: &Value) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null(_) => 0,
                Value::Unknown(_) => 1,
                Value::Bool(_) => 2,
                Value::Number(_) => 3,
                Value::String(_) => 4,
                Value::List(..) => 5,
                Value::Set(..) => 6,
                Value::Map(..) => 7,
                Value::Tuple(_) => 8,
                Value::Object(_) => 9,
            }
        }

        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.cmp_canonical(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::List(_, a), Value::List(_, b))
            | (Value::Set(_, a), Value::Set(_, b))
            | (Value::Tuple(a), Value::Tuple(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.canonical_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Map(_, a), Value::Map(_, b)) | (Value::Object(a), Value::Object(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.canonical_cmp(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_constructor_sorts_and_dedups() {
        let set = Value::set(
            Ty::String,
            [
                Value::string("Jackson"),
                Value::string("Snakob"),
                Value::string("Rufus"),
                Value::string("Agnes"),
                Value::string("Jackson"),
            ],
        );
        let Value::Set(_, items) = set else {
            panic!("not a set");
        };
        let names: Vec<&str> = items.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(names, ["Agnes", "Jackson", "Rufus", "Snakob"]);
    }

    #[test]
    fn value_types_follow_shape() {
        let tuple = Value::tuple([Value::string("a"), Value::int(2)]);
        assert_eq!(tuple.ty(), Ty::tuple([Ty::String, Ty::Number]));

        let empty = Value::list(Ty::Number, []);
        assert_eq!(empty.ty(), Ty::list(Ty::Number));
    }

    #[test]
    fn whole_number_detection() {
        assert!(Number::from_int(12).is_whole());
        assert!(Number::from_float(4.0).is_whole());
        assert!(!Number::from_float(3.14159).is_whole());
    }
}
