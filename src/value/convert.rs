use std::collections::BTreeMap;

use num_bigint::BigInt;

use crate::error::{ConfmsgError, ConfmsgResult};
use crate::value::{Number, Ty, Value};

/// Converts a value to the given type constraint, or explains why it
/// cannot.
///
/// The rules are the configuration language's usual coercions: bools and
/// numbers stringify, strings parse back where unambiguous, sequence kinds
/// interchange when their elements convert, and objects satisfy map
/// constraints (and vice versa) element-wise. Null and unknown survive any
/// conversion by retyping. A `Dynamic` constraint accepts everything
/// as-is.
pub fn convert(value: &Value, want: &Ty) -> ConfmsgResult<Value> {
    convert_path(value, want, "")
}

fn convert_path(value: &Value, want: &Ty, path: &str) -> ConfmsgResult<Value> {
    if want.is_dynamic() {
        return Ok(value.clone());
    }
    match value {
        Value::Null(_) => return Ok(Value::Null(want.clone())),
        Value::Unknown(_) => return Ok(Value::Unknown(want.clone())),
        _ => {}
    }
    if value.ty() == *want {
        return Ok(value.clone());
    }

    match want {
        Ty::Bool => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(mismatch(path, "a bool is required")),
            },
            _ => Err(mismatch(path, "a bool is required")),
        },

        Ty::Number => match value {
            Value::Number(n) => Ok(Value::Number(n.clone())),
            Value::String(s) => parse_number(s)
                .map(Value::Number)
                .ok_or_else(|| mismatch(path, "a number is required")),
            _ => Err(mismatch(path, "a number is required")),
        },

        Ty::String => match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Bool(true) => Ok(Value::string("true")),
            Value::Bool(false) => Ok(Value::string("false")),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            _ => Err(mismatch(path, "a string is required")),
        },

        Ty::List(ety) => {
            let items = value
                .elements()
                .ok_or_else(|| mismatch(path, "a sequence of values is required"))?;
            let converted = convert_elements(items, ety, path)?;
            Ok(Value::List((**ety).clone(), converted))
        }

        Ty::Set(ety) => {
            let items = value
                .elements()
                .ok_or_else(|| mismatch(path, "a sequence of values is required"))?;
            let converted = convert_elements(items, ety, path)?;
            Ok(Value::set((**ety).clone(), converted))
        }

        Ty::Tuple(etys) => {
            let items = value
                .elements()
                .ok_or_else(|| mismatch(path, "a sequence of values is required"))?;
            if items.len() != etys.len() {
                return Err(mismatch(
                    path,
                    &format!("a sequence of exactly {} elements is required", etys.len()),
                ));
            }
            let mut converted = Vec::with_capacity(items.len());
            for (i, (item, ety)) in items.iter().zip(etys.iter()).enumerate() {
                converted.push(convert_path(item, ety, &element_path(path, i))?);
            }
            Ok(Value::Tuple(converted))
        }

        Ty::Map(ety) => {
            let entries = value
                .entries()
                .ok_or_else(|| mismatch(path, "a mapping from strings to values is required"))?;
            let mut converted = BTreeMap::new();
            for (k, v) in entries {
                converted.insert(k.clone(), convert_path(v, ety, &attribute_path(path, k))?);
            }
            Ok(Value::Map((**ety).clone(), converted))
        }

        Ty::Object(atys) => {
            let entries = value
                .entries()
                .ok_or_else(|| mismatch(path, "an object is required"))?;
            for name in entries.keys() {
                if !atys.contains_key(name) {
                    return Err(mismatch(
                        path,
                        &format!("unexpected attribute {name:?}"),
                    ));
                }
            }
            let mut converted = BTreeMap::new();
            for (name, aty) in atys {
                let v = entries.get(name).ok_or_else(|| {
                    mismatch(path, &format!("attribute {name:?} is required"))
                })?;
                converted.insert(
                    name.clone(),
                    convert_path(v, aty, &attribute_path(path, name))?,
                );
            }
            Ok(Value::Object(converted))
        }

        Ty::Dynamic => unreachable!("dynamic constraint handled above"),
    }
}

fn convert_elements(items: &[Value], ety: &Ty, path: &str) -> ConfmsgResult<Vec<Value>> {
    let mut converted = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        converted.push(convert_path(item, ety, &element_path(path, i))?);
    }
    Ok(converted)
}

fn parse_number(s: &str) -> Option<Number> {
    if let Ok(i) = s.parse::<BigInt>() {
        return Some(Number::Int(i));
    }
    s.parse::<f64>().ok().map(Number::from_float)
}

fn mismatch(path: &str, reason: &str) -> ConfmsgError {
    if path.is_empty() {
        ConfmsgError::Convert(reason.to_string())
    } else {
        ConfmsgError::Convert(format!("{path}: {reason}"))
    }
}

fn element_path(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

fn attribute_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_to_string() {
        let got = convert(&Value::Bool(true), &Ty::String).unwrap();
        assert_eq!(got, Value::string("true"));
    }

    #[test]
    fn string_to_number_keeps_precision() {
        let digits = "314159265358979323846264338327950288419716939937510582097494459";
        let got = convert(&Value::string(digits), &Ty::Number).unwrap();
        let want: BigInt = digits.parse().unwrap();
        assert_eq!(got, Value::big(want));
    }

    #[test]
    fn tuple_to_set_converges() {
        let input = Value::tuple([
            Value::string("Jackson"),
            Value::string("Agnes"),
            Value::string("Jackson"),
        ]);
        let got = convert(&input, &Ty::set(Ty::String)).unwrap();
        assert_eq!(
            got,
            Value::set(Ty::String, [Value::string("Agnes"), Value::string("Jackson")])
        );
    }

    #[test]
    fn tuple_arity_mismatch_is_an_error() {
        let input = Value::tuple([Value::int(1)]);
        let err = convert(&input, &Ty::tuple([Ty::Number, Ty::Number])).unwrap_err();
        assert!(matches!(err, ConfmsgError::Convert(_)));
    }

    #[test]
    fn null_retypes_to_target() {
        let got = convert(&Value::null(Ty::Dynamic), &Ty::Number).unwrap();
        assert_eq!(got, Value::null(Ty::Number));
    }

    #[test]
    fn object_to_map_converts_each_entry() {
        let input = Value::object([
            ("a".to_string(), Value::int(1)),
            ("b".to_string(), Value::string("2")),
        ]);
        let got = convert(&input, &Ty::map(Ty::Number)).unwrap();
        assert_eq!(
            got,
            Value::map(
                Ty::Number,
                [
                    ("a".to_string(), Value::int(1)),
                    ("b".to_string(), Value::int(2)),
                ],
            )
        );
    }
}
