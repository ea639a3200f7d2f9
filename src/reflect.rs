//! Reflecting a populated message back into a configuration value.
//!
//! The inverse of decoding: walk the descriptor, read each annotated
//! field, and rebuild an object value whose shape conforms to the
//! constraint computed by the type reconciler. Conversion back to the
//! declared constraint restores type information the message storage
//! dropped, such as set-versus-list identity.

use std::collections::BTreeMap;

use crate::constraint::object_constraint;
use crate::elem::{field_elem, FieldAttribute, FieldElem, FieldNestedBlockType};
use crate::error::{ConfmsgError, ConfmsgResult};
use crate::msg::{
    well_known, CollectionKind, DynamicMessage, FieldDescriptor, MsgValue, RawMode,
};
use crate::value::{convert, json, msgpack, Ty, Value};

/// Reflects the given message as an object-typed configuration value.
///
/// The result conforms to [`object_constraint`] of the message's
/// descriptor. Fields without presence reflect as their kind's default
/// value; unset raw-mode fields reflect as a null of the declared
/// constraint.
pub fn object_value(msg: &DynamicMessage) -> ConfmsgResult<Value> {
    let mut attrs = BTreeMap::new();
    build_object_attrs(msg, &mut attrs)?;
    Ok(Value::Object(attrs))
}

fn build_object_attrs(
    msg: &DynamicMessage,
    attrs: &mut BTreeMap<String, Value>,
) -> ConfmsgResult<()> {
    for field in msg.descriptor().fields() {
        let Some(elem) = field_elem(field)? else {
            continue;
        };

        match elem {
            FieldElem::Attribute(attr) => {
                let value = reflect_attribute(msg, field, &attr)?;
                attrs.insert(attr.name.clone(), value);
            }

            FieldElem::NestedBlock(block) => {
                let value = reflect_nested_block(msg, field, &block)?;
                attrs.insert(block.type_name.clone(), value);
            }

            FieldElem::Flattened(_) => {
                // The child's attributes land in the same object, which is
                // what makes flattening invisible to the reader.
                let MsgValue::Message(child) = msg.get(field) else {
                    return Err(ConfmsgError::schema(
                        field.full_name(),
                        "flattened field does not hold a message",
                    ));
                };
                build_object_attrs(&child, attrs)?;
            }

            FieldElem::BlockLabel(label) => {
                let MsgValue::String(s) = msg.get(field) else {
                    return Err(ConfmsgError::schema(
                        field.full_name(),
                        "only string fields can be used for block labels",
                    ));
                };
                attrs.insert(label.name.clone(), Value::String(s));
            }
        }
    }
    Ok(())
}

fn reflect_attribute(
    msg: &DynamicMessage,
    field: &FieldDescriptor,
    attr: &FieldAttribute,
) -> ConfmsgResult<Value> {
    let (want_ty, diags) = attr.type_constraint();
    if diags.has_errors() {
        return Err(ConfmsgError::schema(
            field.full_name(),
            "invalid type constraint expression",
        ));
    }

    let raw = msg.get(field);
    let value = reflect_msg_value(&raw, field, attr, &want_ty)?;

    // Convert back to the declared constraint to restore what storage
    // flattened away: set identity, tuple shapes, exact numeric types.
    convert(&value, &want_ty).map_err(|err| ConfmsgError::Encoding {
        ty: want_ty.friendly_name(),
        kind: field.kind().name().to_string(),
        reason: err.to_string(),
    })
}

fn reflect_msg_value(
    raw: &MsgValue,
    field: &FieldDescriptor,
    attr: &FieldAttribute,
    want_ty: &Ty,
) -> ConfmsgResult<Value> {
    match raw {
        MsgValue::List(items) => {
            // Repeated storage reflects as a tuple; the declared
            // constraint decides whether it stays one.
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(reflect_scalar(item, field)?);
            }
            Ok(Value::Tuple(out))
        }
        MsgValue::Map(entries) => {
            let mut out = BTreeMap::new();
            for (key, item) in entries {
                out.insert(key.clone(), reflect_scalar(item, field)?);
            }
            Ok(Value::Object(out))
        }
        MsgValue::Bytes(bytes) => {
            // Bytes storage is only legal as the directly-named raw
            // attribute value. An empty payload is how a null (or an
            // omission) was stored, so it reunites with null here.
            if bytes.is_empty() {
                return Ok(Value::null(Ty::Dynamic));
            }
            let decoded = match attr.raw_mode {
                RawMode::Json => json::unmarshal(bytes, want_ty),
                RawMode::MessagePack => msgpack::unmarshal(bytes, want_ty),
                RawMode::NotRaw => Err(ConfmsgError::schema(
                    field.full_name(),
                    "bytes field does not have raw mode enabled",
                )),
            };
            decoded.map_err(|err| match err {
                err @ ConfmsgError::Schema { .. } => err,
                err => ConfmsgError::Encoding {
                    ty: want_ty.friendly_name(),
                    kind: field.kind().name().to_string(),
                    reason: err.to_string(),
                },
            })
        }
        scalar => reflect_scalar(scalar, field),
    }
}

/// Reflects a single stored element by field kind.
fn reflect_scalar(raw: &MsgValue, field: &FieldDescriptor) -> ConfmsgResult<Value> {
    match raw {
        MsgValue::Bool(b) => Ok(Value::Bool(*b)),
        MsgValue::I32(v) => Ok(Value::int(i64::from(*v))),
        MsgValue::I64(v) => Ok(Value::int(*v)),
        MsgValue::U32(v) => Ok(Value::uint(u64::from(*v))),
        MsgValue::U64(v) => Ok(Value::uint(*v)),
        MsgValue::F32(v) => Ok(Value::float(f64::from(*v))),
        MsgValue::F64(v) => Ok(Value::float(*v)),
        // A string field may be holding a full-precision rendering of a
        // non-string value; the declared-constraint conversion upstream
        // settles which.
        MsgValue::String(s) => Ok(Value::String(s.clone())),
        MsgValue::Message(child) => {
            if well_known::is_value_descriptor(child.descriptor()) {
                if !msg_has_any_field(child) {
                    // An untouched holder stands for an absent value.
                    return Ok(Value::null(Ty::Dynamic));
                }
                return well_known::from_value_message(child);
            }
            object_value(child)
        }
        MsgValue::Bytes(_) => Err(ConfmsgError::schema(
            field.full_name(),
            "bytes are only supported as a directly-named raw attribute value",
        )),
        MsgValue::List(_) | MsgValue::Map(_) => Err(ConfmsgError::schema(
            field.full_name(),
            "nested repeated storage cannot be reflected as a single element",
        )),
    }
}

fn msg_has_any_field(msg: &DynamicMessage) -> bool {
    msg.descriptor()
        .fields()
        .iter()
        .any(|field| msg.has(field))
}

fn reflect_nested_block(
    msg: &DynamicMessage,
    field: &FieldDescriptor,
    block: &FieldNestedBlockType,
) -> ConfmsgResult<Value> {
    if !block.repeated {
        // Collection kind AUTO: the child reflects directly as the
        // attribute, or as a typed null when the block never appeared.
        if !msg.has(field) {
            return Ok(Value::null(object_constraint(&block.nested)?));
        }
        let MsgValue::Message(child) = msg.get(field) else {
            return Err(ConfmsgError::schema(
                field.full_name(),
                "nested block field does not hold a message",
            ));
        };
        return object_value(&child);
    }

    let raw = msg.get(field);
    let Some(items) = raw.as_list() else {
        return Err(ConfmsgError::schema(
            field.full_name(),
            "repeated nested block field does not hold a list",
        ));
    };
    let mut reflected = Vec::with_capacity(items.len());
    for item in items {
        let child = item.as_message().ok_or_else(|| {
            ConfmsgError::schema(
                field.full_name(),
                "repeated nested block elements must be messages",
            )
        })?;
        reflected.push(object_value(child)?);
    }

    match block.collection_kind {
        CollectionKind::Auto | CollectionKind::Tuple => Ok(Value::Tuple(reflected)),
        CollectionKind::List => {
            let ety = object_constraint(&block.nested)?;
            let mut items = Vec::with_capacity(reflected.len());
            for item in reflected {
                items.push(convert(&item, &ety)?);
            }
            Ok(Value::List(ety, items))
        }
        CollectionKind::Set => {
            let ety = object_constraint(&block.nested)?;
            let mut items = Vec::with_capacity(reflected.len());
            for item in reflected {
                items.push(convert(&item, &ety)?);
            }
            Ok(Value::set(ety, items))
        }
    }
}
