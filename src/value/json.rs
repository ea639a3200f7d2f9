//! JSON raw-mode codec.
//!
//! A raw attribute value is stored as the object `{"value": V, "type": T}`
//! when its declared constraint is dynamic, where `T` is the JSON type
//! notation of the value's actual type. Non-dynamic constraints store the
//! bare JSON encoding, since the constraint itself already pins the type.
//! Unknown markers are not representable in JSON and fail marshalling.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde_json::{json, Map as JsonMap, Value as Json};

use crate::error::{ConfmsgError, ConfmsgResult};
use crate::value::{convert, Number, Ty, Value};

/// Encodes the value against the given constraint.
pub fn marshal(value: &Value, ty: &Ty) -> ConfmsgResult<Vec<u8>> {
    let value = convert(value, ty)
        .map_err(|e| ConfmsgError::Codec(format!("value does not conform to type: {e}")))?;
    let encoded = encode(&value, ty)?;
    serde_json::to_vec(&encoded).map_err(|e| ConfmsgError::Codec(e.to_string()))
}

/// Decodes bytes produced by [`marshal`] (or a compatible producer)
/// against the given constraint.
pub fn unmarshal(bytes: &[u8], ty: &Ty) -> ConfmsgResult<Value> {
    let parsed: Json = serde_json::from_slice(bytes)
        .map_err(|e| ConfmsgError::Codec(format!("malformed payload: {e}")))?;
    decode(&parsed, ty)
}

fn encode(value: &Value, ty: &Ty) -> ConfmsgResult<Json> {
    if ty.is_dynamic() {
        let actual = value.ty();
        // A null or unknown of dynamic type has no more precise type to
        // record; encoding it at `actual` again would recurse forever.
        let inner = if actual.is_dynamic() {
            match value {
                Value::Null(_) => Json::Null,
                _ => {
                    return Err(ConfmsgError::Codec(
                        "cannot encode an unknown value in JSON".into(),
                    ))
                }
            }
        } else {
            encode(value, &actual)?
        };
        return Ok(json!({"value": inner, "type": type_to_json(&actual)}));
    }

    match value {
        Value::Null(_) => Ok(Json::Null),
        Value::Unknown(_) => Err(ConfmsgError::Codec(
            "cannot encode an unknown value in JSON".into(),
        )),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Number(n) => encode_number(n),
        Value::String(s) => Ok(Json::String(s.clone())),
        Value::List(ety, items) | Value::Set(ety, items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(encode(item, ety)?);
            }
            Ok(Json::Array(out))
        }
        Value::Tuple(items) => {
            let etys = ty
                .tuple_element_types()
                .ok_or_else(|| ConfmsgError::Codec("tuple value with non-tuple type".into()))?;
            let mut out = Vec::with_capacity(items.len());
            for (item, ety) in items.iter().zip(etys.iter()) {
                out.push(encode(item, ety)?);
            }
            Ok(Json::Array(out))
        }
        Value::Map(ety, entries) => {
            let mut out = JsonMap::new();
            for (k, v) in entries {
                out.insert(k.clone(), encode(v, ety)?);
            }
            Ok(Json::Object(out))
        }
        Value::Object(entries) => {
            let atys = ty
                .attribute_types()
                .ok_or_else(|| ConfmsgError::Codec("object value with non-object type".into()))?;
            let mut out = JsonMap::new();
            for (k, v) in entries {
                let aty = atys
                    .get(k)
                    .ok_or_else(|| ConfmsgError::Codec(format!("unexpected attribute {k:?}")))?;
                out.insert(k.clone(), encode(v, aty)?);
            }
            Ok(Json::Object(out))
        }
    }
}

fn encode_number(n: &Number) -> ConfmsgResult<Json> {
    match n {
        Number::Int(i) => {
            if let Some(v) = i.to_i64() {
                Ok(json!(v))
            } else if let Some(v) = i.to_u64() {
                Ok(json!(v))
            } else {
                // Magnitudes beyond 64 bits approximate, matching what a
                // double-based JSON consumer could read back anyway.
                let v = i.to_f64().ok_or_else(|| {
                    ConfmsgError::Codec("number is not representable in JSON".into())
                })?;
                Ok(json!(v))
            }
        }
        Number::Float(f) => {
            let v = f.into_inner();
            if !v.is_finite() {
                return Err(ConfmsgError::Codec(
                    "non-finite number is not representable in JSON".into(),
                ));
            }
            Ok(json!(v))
        }
    }
}

fn decode(parsed: &Json, ty: &Ty) -> ConfmsgResult<Value> {
    if ty.is_dynamic() {
        if parsed.is_null() {
            return Ok(Value::Null(Ty::Dynamic));
        }
        let obj = parsed.as_object().ok_or_else(|| {
            ConfmsgError::Codec("failed to read dynamic value: object with \"value\" and \"type\" keys required".into())
        })?;
        let tj = obj.get("type").ok_or_else(|| {
            ConfmsgError::Codec("failed to read dynamic type descriptor key".into())
        })?;
        let vj = obj
            .get("value")
            .ok_or_else(|| ConfmsgError::Codec("failed to read dynamic value key".into()))?;
        let actual = type_from_json(tj)?;
        return decode(vj, &actual);
    }

    if parsed.is_null() {
        return Ok(Value::Null(ty.clone()));
    }

    match ty {
        Ty::Bool => parsed
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| type_mismatch("bool", parsed)),
        Ty::Number => decode_number(parsed),
        Ty::String => parsed
            .as_str()
            .map(Value::string)
            .ok_or_else(|| type_mismatch("string", parsed)),
        Ty::List(ety) => {
            let items = decode_elements(parsed, ety)?;
            Ok(Value::List((**ety).clone(), items))
        }
        Ty::Set(ety) => {
            let items = decode_elements(parsed, ety)?;
            Ok(Value::set((**ety).clone(), items))
        }
        Ty::Tuple(etys) => {
            let arr = parsed
                .as_array()
                .ok_or_else(|| type_mismatch("tuple", parsed))?;
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
            let obj = parsed
                .as_object()
                .ok_or_else(|| type_mismatch("map", parsed))?;
            let mut entries = BTreeMap::new();
            for (k, v) in obj {
                entries.insert(k.clone(), decode(v, ety)?);
            }
            Ok(Value::Map((**ety).clone(), entries))
        }
        Ty::Object(atys) => {
            let obj = parsed
                .as_object()
                .ok_or_else(|| type_mismatch("object", parsed))?;
            let mut entries = BTreeMap::new();
            for (name, aty) in atys {
                let v = obj.get(name).ok_or_else(|| {
                    ConfmsgError::Codec(format!("missing object attribute {name:?}"))
                })?;
                entries.insert(name.clone(), decode(v, aty)?);
            }
            Ok(Value::Object(entries))
        }
        Ty::Dynamic => unreachable!("dynamic constraint handled above"),
    }
}

fn decode_elements(parsed: &Json, ety: &Ty) -> ConfmsgResult<Vec<Value>> {
    let arr = parsed
        .as_array()
        .ok_or_else(|| type_mismatch("sequence", parsed))?;
    let mut items = Vec::with_capacity(arr.len());
    for elem in arr {
        items.push(decode(elem, ety)?);
    }
    Ok(items)
}

fn decode_number(parsed: &Json) -> ConfmsgResult<Value> {
    match parsed {
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::int(i))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::uint(u))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::float(f))
            } else {
                Err(type_mismatch("number", parsed))
            }
        }
        // Numbers also arrive as strings from producers that refuse to
        // round large integers through a double.
        Json::String(s) => s
            .parse::<BigInt>()
            .map(Value::big)
            .map_err(|_| type_mismatch("number", parsed)),
        _ => Err(type_mismatch("number", parsed)),
    }
}

fn type_mismatch(want: &str, got: &Json) -> ConfmsgError {
    ConfmsgError::Codec(format!("{want} required, but payload has {got}"))
}

/// The JSON type notation: primitives are strings, collections are
/// two-element arrays tagging their element type, and structural types
/// carry their full shape.
pub fn type_to_json(ty: &Ty) -> Json {
    match ty {
        Ty::Bool => json!("bool"),
        Ty::Number => json!("number"),
        Ty::String => json!("string"),
        Ty::Dynamic => json!("dynamic"),
        Ty::List(e) => json!(["list", type_to_json(e)]),
        Ty::Set(e) => json!(["set", type_to_json(e)]),
        Ty::Map(e) => json!(["map", type_to_json(e)]),
        Ty::Tuple(etys) => {
            let inner: Vec<Json> = etys.iter().map(type_to_json).collect();
            json!(["tuple", inner])
        }
        Ty::Object(atys) => {
            let mut inner = JsonMap::new();
            for (name, aty) in atys {
                inner.insert(name.clone(), type_to_json(aty));
            }
            json!(["object", inner])
        }
    }
}

pub fn type_from_json(parsed: &Json) -> ConfmsgResult<Ty> {
    match parsed {
        Json::String(s) => match s.as_str() {
            "bool" => Ok(Ty::Bool),
            "number" => Ok(Ty::Number),
            "string" => Ok(Ty::String),
            "dynamic" => Ok(Ty::Dynamic),
            other => Err(ConfmsgError::Codec(format!(
                "unknown primitive type name {other:?}"
            ))),
        },
        Json::Array(parts) if parts.len() == 2 => {
            let tag = parts[0]
                .as_str()
                .ok_or_else(|| ConfmsgError::Codec("type tag must be a string".into()))?;
            match tag {
                "list" => Ok(Ty::list(type_from_json(&parts[1])?)),
                "set" => Ok(Ty::set(type_from_json(&parts[1])?)),
                "map" => Ok(Ty::map(type_from_json(&parts[1])?)),
                "tuple" => {
                    let inner = parts[1]
                        .as_array()
                        .ok_or_else(|| ConfmsgError::Codec("tuple type requires an array".into()))?;
                    let etys: ConfmsgResult<Vec<Ty>> = inner.iter().map(type_from_json).collect();
                    Ok(Ty::Tuple(etys?))
                }
                "object" => {
                    let inner = parts[1].as_object().ok_or_else(|| {
                        ConfmsgError::Codec("object type requires an object".into())
                    })?;
                    let mut atys = BTreeMap::new();
                    for (name, aty) in inner {
                        atys.insert(name.clone(), type_from_json(aty)?);
                    }
                    Ok(Ty::Object(atys))
                }
                other => Err(ConfmsgError::Codec(format!(
                    "unknown type constructor {other:?}"
                ))),
            }
        }
        other => Err(ConfmsgError::Codec(format!(
            "failed to read dynamic type descriptor: {other}"
        ))),
    }
}
