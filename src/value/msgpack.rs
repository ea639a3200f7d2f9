//! MessagePack raw-mode codec.
//!
//! The shape mirrors the JSON codec: a dynamic constraint wraps the value
//! in a two-element array whose first element is the JSON type notation as
//! a binary blob, and whose second is the value itself. Unlike JSON,
//! MessagePack can carry unknown markers: they encode as the reserved
//! extension tag 0 and survive a round trip.

use std::collections::BTreeMap;

use num_traits::ToPrimitive;
use rmpv::Value as Mp;

use crate::error::{ConfmsgError, ConfmsgResult};
use crate::value::{convert, json, Number, Ty, Value};

/// Extension type tag reserved for the unknown-value marker.
pub const UNKNOWN_EXT_TAG: i8 = 0;

/// Encodes the value against the given constraint.
pub fn marshal(value: &Value, ty: &Ty) -> ConfmsgResult<Vec<u8>> {
    let value = convert(value, ty)
        .map_err(|e| ConfmsgError::Codec(format!("value does not conform to type: {e}")))?;
    let encoded = encode(&value, ty)?;
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &encoded)
        .map_err(|e| ConfmsgError::Codec(e.to_string()))?;
    Ok(buf)
}

/// Decodes bytes produced by [`marshal`] against the given constraint.
pub fn unmarshal(bytes: &[u8], ty: &Ty) -> ConfmsgResult<Value> {
    let mut cursor = bytes;
    let parsed = rmpv::decode::read_value(&mut cursor)
        .map_err(|e| ConfmsgError::Codec(format!("malformed payload: {e}")))?;
    decode(&parsed, ty)
}

fn encode(value: &Value, ty: &Ty) -> ConfmsgResult<Mp> {
    if let Value::Unknown(_) = value {
        return Ok(Mp::Ext(UNKNOWN_EXT_TAG, vec![0]));
    }

    if ty.is_dynamic() {
        let actual = value.ty();
        let inner = if actual.is_dynamic() {
            // Only a null can still be dynamic here; unknowns were taken
            // above.
            Mp::Nil
        } else {
            encode(value, &actual)?
        };
        let ty_bytes = serde_json::to_vec(&json::type_to_json(&actual))
            .map_err(|e| ConfmsgError::Codec(e.to_string()))?;
        return Ok(Mp::Array(vec![Mp::Binary(ty_bytes), inner]));
    }

    match value {
        Value::Null(_) => Ok(Mp::Nil),
        Value::Unknown(_) => unreachable!("unknown handled above"),
        Value::Bool(b) => Ok(Mp::Boolean(*b)),
        Value::Number(n) => encode_number(n),
        Value::String(s) => Ok(Mp::String(s.clone().into())),
        Value::List(ety, items) | Value::Set(ety, items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(encode(item, ety)?);
            }
            Ok(Mp::Array(out))
        }
        Value::Tuple(items) => {
            let etys = ty
                .tuple_element_types()
                .ok_or_else(|| ConfmsgError::Codec("tuple value with non-tuple type".into()))?;
            let mut out = Vec::with_capacity(items.len());
            for (item, ety) in items.iter().zip(etys.iter()) {
                out.push(encode(item, ety)?);
            }
            Ok(Mp::Array(out))
        }
        Value::Map(ety, entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                out.push((Mp::String(k.clone().into()), encode(v, ety)?));
            }
            Ok(Mp::Map(out))
        }
        Value::Object(entries) => {
            let atys = ty
                .attribute_types()
                .ok_or_else(|| ConfmsgError::Codec("object value with non-object type".into()))?;
            let mut out = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                let aty = atys
                    .get(k)
                    .ok_or_else(|| ConfmsgError::Codec(format!("unexpected attribute {k:?}")))?;
                out.push((Mp::String(k.clone().into()), encode(v, aty)?));
            }
            Ok(Mp::Map(out))
        }
    }
}

fn encode_number(n: &Number) -> ConfmsgResult<Mp> {
    match n {
        Number::Int(i) => {
            if let Some(v) = i.to_i64() {
                Ok(Mp::from(v))
            } else if let Some(v) = i.to_u64() {
                Ok(Mp::from(v))
            } else {
                let v = i.to_f64().ok_or_else(|| {
                    ConfmsgError::Codec("number is not representable in MessagePack".into())
                })?;
                Ok(Mp::F64(v))
            }
        }
        Number::Float(f) => Ok(Mp::F64(f.into_inner())),
    }
}

fn decode(parsed: &Mp, ty: &Ty) -> ConfmsgResult<Value> {
    if let Mp::Ext(tag, _) = parsed {
        if *tag == UNKNOWN_EXT_TAG {
            return Ok(Value::Unknown(ty.clone()));
        }
        return Err(ConfmsgError::Codec(format!(
            "unsupported extension tag {tag}"
        )));
    }

    if ty.is_dynamic() {
        if let Mp::Nil = parsed {
            return Ok(Value::Null(Ty::Dynamic));
        }
        let parts = match parsed {
            Mp::Array(parts) if parts.len() == 2 => parts,
            _ => {
                return Err(ConfmsgError::Codec(
                    "failed to read dynamic value: two-element array required".into(),
                ))
            }
        };
        let ty_bytes = match &parts[0] {
            Mp::Binary(b) => b.as_slice(),
            Mp::String(s) => s.as_bytes(),
            _ => {
                return Err(ConfmsgError::Codec(
                    "failed to read dynamic type descriptor".into(),
                ))
            }
        };
        let tj: serde_json::Value = serde_json::from_slice(ty_bytes)
            .map_err(|e| ConfmsgError::Codec(format!("malformed type descriptor: {e}")))?;
        let actual = json::type_from_json(&tj)?;
        return decode(&parts[1], &actual);
    }

    if let Mp::Nil = parsed {
        return Ok(Value::Null(ty.clone()));
    }

    match ty {
        Ty::Bool => match parsed {
            Mp::Boolean(b) => Ok(Value::Bool(*b)),
            _ => Err(type_mismatch("bool", parsed)),
        },
        Ty::Number => match parsed {
            Mp::Integer(i) => {
                if let Some(v) = i.as_i64() {
                    Ok(Value::int(v))
                } else if let Some(v) = i.as_u64() {
                    Ok(Value::uint(v))
                } else {
                    Err(type_mismatch("number", parsed))
                }
            }
            Mp::F32(f) => Ok(Value::float(*f as f64)),
            Mp::F64(f) => Ok(Value::float(*f)),
            _ => Err(type_mismatch("number", parsed)),
        },
        Ty::String => match parsed {
            Mp::String(s) => s
                .as_str()
                .map(Value::string)
                .ok_or_else(|| ConfmsgError::Codec("invalid utf-8 in string payload".into())),
            _ => Err(type_mismatch("string", parsed)),
        },
        Ty::List(ety) => {
            let items = decode_elements(parsed, ety)?;
            Ok(Value::List((**ety).clone(), items))
        }
        Ty::Set(ety) => {
            let items = decode_elements(parsed, ety)?;
            Ok(Value::set((**ety).clone(), items))
        }
        Ty::Tuple(etys) => {
            let arr = match parsed {
                Mp::Array(arr) => arr,
                _ => return Err(type_mismatch("tuple", parsed)),
            };
            if arr.len() != etys.len() {
                return Err(ConfmsgError::Codec(format!(
                    "tuple requires {} elements but payload has {}",
                    etys.len(),
                    arr.len()
                )));
            }
            let mut items = Vec::with_capacity(arr.len());
            for (elem, ety) in arr.iter().zip(etys.iter()) {
                items.push(decode(elem, ety)?);
            }
            Ok(Value::Tuple(items))
        }
        Ty::Map(ety) => {
            let entries = decode_entries(parsed, ety)?;
            Ok(Value::Map((**ety).clone(), entries))
        }
        Ty::Object(atys) => {
            let pairs = match parsed {
                Mp::Map(pairs) => pairs,
                _ => return Err(type_mismatch("object", parsed)),
            };
            let mut found = BTreeMap::new();
            for (k, v) in pairs {
                let key = string_key(k)?;
                found.insert(key, v);
            }
            let mut entries = BTreeMap::new();
            for (name, aty) in atys {
                let v = *found.get(name).ok_or_else(|| {
                    ConfmsgError::Codec(format!("missing object attribute {name:?}"))
                })?;
                entries.insert(name.clone(), decode(v, aty)?);
            }
            Ok(Value::Object(entries))
        }
        Ty::Dynamic => unreachable!("dynamic constraint handled above"),
    }
}

fn decode_elements(parsed: &Mp, ety: &Ty) -> ConfmsgResult<Vec<Value>> {
    let arr = match parsed {
        Mp::Array(arr) => arr,
        _ => return Err(type_mismatch("sequence", parsed)),
    };
    let mut items = Vec::with_capacity(arr.len());
    for elem in arr {
        items.push(decode(elem, ety)?);
    }
    Ok(items)
}

fn decode_entries(parsed: &Mp, ety: &Ty) -> ConfmsgResult<BTreeMap<String, Value>> {
    let pairs = match parsed {
        Mp::Map(pairs) => pairs,
        _ => return Err(type_mismatch("map", parsed)),
    };
    let mut entries = BTreeMap::new();
    for (k, v) in pairs {
        entries.insert(string_key(k)?, decode(v, ety)?);
    }
    Ok(entries)
}

fn string_key(key: &Mp) -> ConfmsgResult<String> {
    match key {
        Mp::String(s) => s
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ConfmsgError::Codec("invalid utf-8 in map key".into())),
        _ => Err(ConfmsgError::Codec("map keys must be strings".into())),
    }
}

fn type_mismatch(want: &str, got: &Mp) -> ConfmsgError {
    ConfmsgError::Codec(format!("{want} required, but payload has {got}"))
}
