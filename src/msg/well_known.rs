//! The well-known dynamic-value holder type.
//!
//! One message type in the ecosystem represents "any JSON-like value" and
//! can therefore be targeted by attribute annotations even though it has
//! no bridge annotations of its own. The bridge identifies it by
//! fully-qualified name and converts to and from it with the codec in this
//! module rather than walking its fields generically.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use num_traits::FromPrimitive;

use crate::error::{ConfmsgError, ConfmsgResult};
use crate::msg::descriptor::{
    Cardinality, FieldDesc, FieldDescriptor, FieldKind, FieldOptions, MessageDesc,
    MessageDescriptor, MessageRef,
};
use crate::msg::message::{DynamicMessage, MsgValue};
use crate::value::{Number, Ty, Value};

/// Fully-qualified name of the holder type.
pub const VALUE_FULL_NAME: &str = "confmsg.wellknown.Value";

const NULL_FLAG: u32 = 1;
const BOOL_VALUE: u32 = 2;
const NUMBER_VALUE: u32 = 3;
const STRING_VALUE: u32 = 4;
const LIST_VALUE: u32 = 5;
const STRUCT_VALUE: u32 = 6;

/// The holder's descriptor. Its list and struct fields reference the type
/// itself, which is the one permitted cycle in the descriptor graph; the
/// back edges are weak so the shared descriptor can still be dropped.
pub fn value_descriptor() -> MessageDescriptor {
    static DESC: OnceLock<MessageDescriptor> = OnceLock::new();
    DESC.get_or_init(build_value_descriptor).clone()
}

/// True when the descriptor is the holder type.
pub fn is_value_descriptor(desc: &MessageDescriptor) -> bool {
    desc.full_name() == VALUE_FULL_NAME
}

fn build_value_descriptor() -> MessageDescriptor {
    let inner = Arc::new_cyclic(|weak| {
        let scalar = |number: u32, name: &str, kind: FieldKind| FieldDescriptor {
            inner: Arc::new(FieldDesc {
                name: name.to_string(),
                full_name: format!("{VALUE_FULL_NAME}.{name}"),
                number,
                kind,
                cardinality: Cardinality::Singular,
                map_key: None,
                message: None,
                options: FieldOptions::default(),
                union_group: None,
            }),
        };
        let self_ref = |number: u32, name: &str, cardinality: Cardinality| FieldDescriptor {
            inner: Arc::new(FieldDesc {
                name: name.to_string(),
                full_name: format!("{VALUE_FULL_NAME}.{name}"),
                number,
                kind: FieldKind::Message,
                cardinality,
                map_key: match cardinality {
                    Cardinality::Map => Some(FieldKind::String),
                    _ => None,
                },
                message: Some(MessageRef::Weak(weak.clone())),
                options: FieldOptions::default(),
                union_group: None,
            }),
        };

        MessageDesc {
            full_name: VALUE_FULL_NAME.to_string(),
            fields: vec![
                scalar(NULL_FLAG, "null", FieldKind::Bool),
                scalar(BOOL_VALUE, "bool_value", FieldKind::Bool),
                scalar(NUMBER_VALUE, "number_value", FieldKind::Double),
                scalar(STRING_VALUE, "string_value", FieldKind::String),
                self_ref(LIST_VALUE, "list_value", Cardinality::Repeated),
                self_ref(STRUCT_VALUE, "struct_value", Cardinality::Map),
            ],
        }
    });
    MessageDescriptor { inner }
}

fn field(number: u32) -> FieldDescriptor {
    let desc = value_descriptor();
    desc.fields()
        .iter()
        .find(|f| f.number() == number)
        .expect("holder descriptor has a fixed field set")
        .clone()
}

/// Packs a configuration value into a holder message.
///
/// Numbers narrow to a double on the way in, the same narrowing any
/// JSON-like consumer of the holder would apply.
pub fn to_value_message(value: &Value) -> ConfmsgResult<DynamicMessage> {
    let mut msg = DynamicMessage::new(value_descriptor());
    match value {
        Value::Null(_) => msg.set(&field(NULL_FLAG), MsgValue::Bool(true)),
        Value::Unknown(_) => {
            return Err(ConfmsgError::attr_value("", "value must be known"));
        }
        Value::Bool(b) => msg.set(&field(BOOL_VALUE), MsgValue::Bool(*b)),
        Value::Number(n) => msg.set(&field(NUMBER_VALUE), MsgValue::F64(n.to_f64())),
        Value::String(s) => msg.set(&field(STRING_VALUE), MsgValue::string(s.clone())),
        Value::List(_, items) | Value::Set(_, items) | Value::Tuple(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(MsgValue::Message(to_value_message(item)?));
            }
            msg.set(&field(LIST_VALUE), MsgValue::List(out));
        }
        Value::Map(_, entries) | Value::Object(entries) => {
            let mut out = BTreeMap::new();
            for (k, v) in entries {
                out.insert(k.clone(), MsgValue::Message(to_value_message(v)?));
            }
            msg.set(&field(STRUCT_VALUE), MsgValue::Map(out));
        }
    }
    Ok(msg)
}

/// Unpacks a holder message back into a configuration value. The result
/// uses structural types (tuples and objects), leaving any reshaping to
/// the caller's declared constraint.
pub fn from_value_message(msg: &DynamicMessage) -> ConfmsgResult<Value> {
    if msg.has(&field(NULL_FLAG)) {
        return Ok(Value::null(Ty::Dynamic));
    }
    if msg.has(&field(BOOL_VALUE)) {
        if let MsgValue::Bool(b) = msg.get(&field(BOOL_VALUE)) {
            return Ok(Value::Bool(b));
        }
    }
    if msg.has(&field(NUMBER_VALUE)) {
        if let MsgValue::F64(f) = msg.get(&field(NUMBER_VALUE)) {
            return Ok(number_from_double(f));
        }
    }
    if msg.has(&field(STRING_VALUE)) {
        if let MsgValue::String(s) = msg.get(&field(STRING_VALUE)) {
            return Ok(Value::String(s));
        }
    }
    if msg.has(&field(LIST_VALUE)) {
        if let MsgValue::List(items) = msg.get(&field(LIST_VALUE)) {
            let mut out = Vec::with_capacity(items.len());
            for item in &items {
                let child = item.as_message().ok_or_else(|| {
                    ConfmsgError::schema(VALUE_FULL_NAME, "list_value elements must be messages")
                })?;
                out.push(from_value_message(child)?);
            }
            return Ok(Value::Tuple(out));
        }
    }
    if msg.has(&field(STRUCT_VALUE)) {
        if let MsgValue::Map(entries) = msg.get(&field(STRUCT_VALUE)) {
            let mut out = BTreeMap::new();
            for (k, v) in &entries {
                let child = v.as_message().ok_or_else(|| {
                    ConfmsgError::schema(VALUE_FULL_NAME, "struct_value entries must be messages")
                })?;
                out.insert(k.clone(), from_value_message(child)?);
            }
            return Ok(Value::Object(out));
        }
    }
    // An entirely empty holder is the canonical encoding of null.
    Ok(Value::null(Ty::Dynamic))
}

fn number_from_double(f: f64) -> Value {
    // Whole doubles come back as integers so they convert cleanly to
    // integral constraints downstream.
    if f.fract() == 0.0 && f.is_finite() {
        if let Some(i) = num_bigint::BigInt::from_f64(f) {
            return Value::big(i);
        }
    }
    Value::Number(Number::from_float(f))
}
