//! Decoding attribute values into message-typed fields.
//!
//! Only one target message type is currently decodable this way: the
//! well-known dynamic-value holder. It is identified by fully-qualified
//! name, and the conversion defers to the holder codec. The dispatch
//! lives here, isolated from the main decoder, so a generic fallback that
//! inverts reflection could be added without touching the other decode
//! paths.

use std::collections::BTreeMap;

use crate::diag::{schema_error_diagnostic, Diagnostic};
use crate::elem::FieldAttribute;
use crate::error::{ConfmsgError, ConfmsgResult};
use crate::msg::{well_known, MsgValue};
use crate::value::{convert, Ty, Value};

/// Builds the stored value for a message-typed attribute field from an
/// evaluated configuration value.
///
/// The caller has already applied the declared constraint and rejected
/// top-level nulls; the three shapes here mirror the field's cardinality.
pub(crate) fn build_attr_message_value(
    attr: &FieldAttribute,
    value: &Value,
) -> ConfmsgResult<MsgValue> {
    let elem_desc = attr
        .field
        .message_type()
        .expect("message-kind field always has a target type");
    if !well_known::is_value_descriptor(&elem_desc) {
        return Err(ConfmsgError::schema(
            attr.field.full_name(),
            format!(
                "can't decode attribute into message type {}",
                elem_desc.full_name()
            ),
        ));
    }

    let (want_ty, diags) = attr.type_constraint();
    if diags.has_errors() {
        return Err(ConfmsgError::schema(
            attr.field.full_name(),
            "invalid type constraint expression",
        ));
    }

    if attr.field.is_map() {
        build_map(attr, value, &want_ty)
    } else if attr.field.is_list() {
        build_repeated(attr, value, &want_ty)
    } else {
        let converted = convert(value, &want_ty)
            .map_err(|e| ConfmsgError::attr_value("", e.to_string()))?;
        Ok(MsgValue::Message(well_known::to_value_message(&converted)?))
    }
}

fn build_map(attr: &FieldAttribute, value: &Value, want_ty: &Ty) -> ConfmsgResult<MsgValue> {
    if !(want_ty.is_dynamic() || want_ty.is_object() || want_ty.is_map()) {
        return Err(ConfmsgError::schema(
            attr.field.full_name(),
            "map field must have an object or map type constraint",
        ));
    }
    if value.is_null() {
        return Err(ConfmsgError::attr_value("", "must not be null"));
    }
    let Some(entries) = value.entries() else {
        return Err(ConfmsgError::attr_value(
            "",
            "an object or map value is required",
        ));
    };

    let mut out = BTreeMap::new();
    for (key, elem) in entries {
        let want_ety = match want_ty {
            Ty::Dynamic => Ty::Dynamic,
            Ty::Map(ety) => (**ety).clone(),
            Ty::Object(atys) => match atys.get(key) {
                Some(aty) => aty.clone(),
                None => {
                    return Err(ConfmsgError::attr_value(
                        "",
                        format!("does not expect an attribute named {key:?}"),
                    ));
                }
            },
            _ => unreachable!("constraint shape checked above"),
        };
        let converted = convert(elem, &want_ety)
            .map_err(|e| ConfmsgError::attr_value(key.clone(), e.to_string()))?;
        out.insert(
            key.clone(),
            MsgValue::Message(well_known::to_value_message(&converted)?),
        );
    }
    Ok(MsgValue::Map(out))
}

fn build_repeated(attr: &FieldAttribute, value: &Value, want_ty: &Ty) -> ConfmsgResult<MsgValue> {
    if value.is_null() {
        return Err(ConfmsgError::attr_value("", "must not be null"));
    }
    let Some(items) = value.elements() else {
        return Err(ConfmsgError::attr_value(
            "",
            "a sequence of values is required",
        ));
    };
    if let Some(etys) = want_ty.tuple_element_types() {
        if items.len() != etys.len() {
            return Err(ConfmsgError::attr_value(
                "",
                format!("exactly {} elements are required", etys.len()),
            ));
        }
    }

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let want_ety = match want_ty {
            Ty::Dynamic => Ty::Dynamic,
            Ty::List(ety) | Ty::Set(ety) => (**ety).clone(),
            Ty::Tuple(etys) => etys[i].clone(),
            _ => {
                return Err(ConfmsgError::schema(
                    attr.field.full_name(),
                    "repeated field must have a sequence type constraint",
                ));
            }
        };
        let converted = convert(item, &want_ety)
            .map_err(|e| ConfmsgError::attr_value(format!("[{i}]"), e.to_string()))?;
        out.push(MsgValue::Message(well_known::to_value_message(&converted)?));
    }
    Ok(MsgValue::List(out))
}

/// Renders a builder failure as the diagnostic the decoder reports:
/// schema-class errors point at the schema author, everything else at the
/// configuration value.
pub(crate) fn attr_error_diagnostic(err: &ConfmsgError) -> Diagnostic {
    match err {
        ConfmsgError::Schema { .. } | ConfmsgError::TypeExpr(_) => schema_error_diagnostic(err),
        ConfmsgError::AttrValue { path, reason } => {
            let detail = if path.is_empty() {
                format!("Inappropriate value for argument: {reason}.")
            } else {
                format!("Inappropriate value for {path}: {reason}.")
            };
            Diagnostic::error(crate::decode::UNSUITABLE_VALUE_SUMMARY).with_detail(detail)
        }
        other => Diagnostic::error(crate::decode::UNSUITABLE_VALUE_SUMMARY)
            .with_detail(format!("Inappropriate value for argument: {other}.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elem::{field_elem, FieldElem};
    use crate::msg::{AttributeOptions, Field, MessageDescriptor};

    fn holder_attr(field: Field) -> FieldAttribute {
        let desc = MessageDescriptor::builder("testschema.Probe")
            .field(field)
            .build()
            .unwrap();
        match field_elem(&desc.fields()[0]).unwrap() {
            Some(FieldElem::Attribute(attr)) => attr,
            other => panic!("expected attribute, got {other:?}"),
        }
    }

    #[test]
    fn scalar_holder_field_packs_the_value() {
        let attr = holder_attr(
            Field::message(1, "extra", &well_known::value_descriptor())
                .attr(AttributeOptions::named("extra").type_expr("any")),
        );
        let got = build_attr_message_value(&attr, &Value::int(2)).unwrap();
        let MsgValue::Message(msg) = got else {
            panic!("expected message");
        };
        assert_eq!(well_known::from_value_message(&msg).unwrap(), Value::int(2));
    }

    #[test]
    fn map_holder_field_rejects_unexpected_object_attrs() {
        let attr = holder_attr(
            Field::message(1, "extras", &well_known::value_descriptor())
                .map(crate::msg::FieldKind::String)
                .attr(
                    AttributeOptions::named("extras").type_expr("object({known = string})"),
                ),
        );
        let input = Value::object([("surprise".to_string(), Value::string("x"))]);
        let err = build_attr_message_value(&attr, &input).unwrap_err();
        assert!(matches!(err, ConfmsgError::AttrValue { .. }));
    }

    #[test]
    fn other_message_targets_are_schema_errors() {
        let other = MessageDescriptor::builder("testschema.Other")
            .build()
            .unwrap();
        let attr = holder_attr(
            Field::message(1, "extra", &other)
                .attr(AttributeOptions::named("extra").type_expr("any")),
        );
        let err = build_attr_message_value(&attr, &Value::int(2)).unwrap_err();
        assert!(err.is_schema());
    }
}
