//! Decoding a configuration body into a message.
//!
//! The decoder is tolerant of partial failure: it clears every field it
//! visits, fills the ones it can, and accumulates diagnostics for the
//! rest, so a single pass reports as many problems as possible. Schema
//! errors abort only the message they occur in; the caller still receives
//! a well-formed (possibly empty) message alongside the diagnostics.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::attr_message::{attr_error_diagnostic, build_attr_message_value};
use crate::cfg::{Block, Body, BodyContent, EvalContext};
use crate::constraint::value_physical_constraint;
use crate::diag::{schema_error_diagnostic, Diagnostic, Diagnostics, Range};
use crate::elem::{field_elem, FieldAttribute, FieldElem, FieldNestedBlockType};
use crate::msg::{DynamicMessage, FieldDescriptor, FieldKind, MessageDescriptor, MsgValue, RawMode};
use crate::schema::body_schema;
use crate::value::{convert, json, msgpack, Number, Value};

pub(crate) const UNSUITABLE_VALUE_SUMMARY: &str = "Unsuitable attribute value";

/// Decodes the content of the given body into a message conforming to the
/// given descriptor.
///
/// Evaluation of attribute expressions consults `ctx` when present. The
/// returned message is always safe to read, even when the diagnostics
/// contain errors: every field is either cleared or fully populated.
pub fn decode_body(
    body: &Body,
    desc: &MessageDescriptor,
    ctx: Option<&EvalContext>,
) -> (DynamicMessage, Diagnostics) {
    let mut diags = Diagnostics::new();

    let schema = match body_schema(desc) {
        Ok(schema) => schema,
        Err(err) => {
            // A broken schema is a bug in whatever software defined it,
            // but it still arrives as a diagnostic so callers have a
            // single error channel.
            diags.push(schema_error_diagnostic(&err));
            return (DynamicMessage::new(desc.clone()), diags);
        }
    };

    let (content, more_diags) = body.content(&schema);
    diags.extend(more_diags);
    // Even with extraction errors, attempt a partial decode of whatever
    // matched.

    let mut msg = DynamicMessage::new(desc.clone());
    let more_diags = fill_message_from_content(&content, &body.missing_item_range(), &mut msg, ctx);
    diags.extend(more_diags);

    (msg, diags)
}

fn fill_message_from_content(
    content: &BodyContent,
    missing_range: &Range,
    msg: &mut DynamicMessage,
    ctx: Option<&EvalContext>,
) -> Diagnostics {
    let mut diags = Diagnostics::new();

    let fields: Vec<FieldDescriptor> = msg.descriptor().fields().to_vec();
    for field in &fields {
        let elem = match field_elem(field) {
            Ok(elem) => elem,
            Err(err) => {
                // The field is unusable but its siblings may be fine, so
                // report and keep walking.
                diags.push(schema_error_diagnostic(&err));
                continue;
            }
        };
        let Some(elem) = elem else {
            continue;
        };

        match elem {
            FieldElem::Attribute(attr) => {
                fill_attribute(content, missing_range, msg, ctx, &attr, &mut diags);
            }
            FieldElem::NestedBlock(block) => {
                fill_nested_block(content, msg, ctx, field, &block, &mut diags);
            }
            FieldElem::Flattened(flattened) => {
                // A flattened child re-walks the same extracted content:
                // its surface was merged into this body's schema, so its
                // attributes and blocks are already here.
                msg.clear(field);
                let mut child = DynamicMessage::new(flattened.nested.clone());
                let more_diags =
                    fill_message_from_content(content, missing_range, &mut child, ctx);
                diags.extend(more_diags);
                msg.set(field, MsgValue::Message(child));
            }
            FieldElem::BlockLabel(_) => {
                // Labels are bound by the enclosing nested-block decode,
                // not at this level.
            }
        }
    }

    diags
}

fn fill_attribute(
    content: &BodyContent,
    missing_range: &Range,
    msg: &mut DynamicMessage,
    ctx: Option<&EvalContext>,
    attr: &FieldAttribute,
    diags: &mut Diagnostics,
) {
    let field = attr.field.clone();
    msg.clear(&field);

    let Some(entry) = content.attributes.get(&attr.name) else {
        if attr.required {
            diags.push(
                Diagnostic::error("Missing required argument")
                    .with_detail(format!(
                        "The argument {:?} is required, but no definition was found.",
                        attr.name
                    ))
                    .with_subject(missing_range.clone()),
            );
        }
        return;
    };

    let (val, more_diags) = entry.expr.value(ctx);
    let failed = more_diags.has_errors();
    diags.extend(more_diags);
    if failed {
        return;
    }

    let (want_ty, more_diags) = attr.type_constraint();
    let failed = more_diags.has_errors();
    diags.extend(more_diags);
    if failed {
        return;
    }

    // Two stages of conversion: first the annotation's own constraint,
    // then the constraint implied by the field's physical storage. Keeping
    // them separate allows combinations like a number constraint over a
    // string field, which captures a full-precision decimal rendering
    // rather than squeezing through a fixed-width numeric kind.
    let val = match convert(&val, &want_ty) {
        Ok(val) => val,
        Err(err) => {
            diags.push(unsuitable_value(&attr.name, &err, entry));
            return;
        }
    };

    if val.is_null() {
        if attr.required {
            // A null definition counts the same as omitting the argument,
            // which the extraction layer cannot see on its own.
            diags.push(
                Diagnostic::error(UNSUITABLE_VALUE_SUMMARY)
                    .with_detail(format!(
                        "Attribute {:?} is required, so must not be null.",
                        attr.name
                    ))
                    .with_subject(entry.expr.range().clone())
                    .with_context(Range::between(&entry.name_range, entry.expr.range())),
            );
        }
        // Leave the field cleared either way.
        return;
    }

    if field.kind() == FieldKind::Message {
        match build_attr_message_value(attr, &val) {
            Ok(v) => msg.set(&field, v),
            Err(err) => diags.push(attr_error_diagnostic(&err)),
        }
        return;
    }

    let need_ty = match value_physical_constraint(&val.ty(), &field) {
        Ok(ty) => ty,
        Err(err) => {
            diags.push(schema_error_diagnostic(&err));
            return;
        }
    };
    let val = match convert(&val, &need_ty) {
        Ok(val) => val,
        Err(err) => {
            diags.push(unsuitable_value(&attr.name, &err, entry));
            return;
        }
    };

    let (stored, more_diags) = msg_value_for_field(&val, entry.expr.range(), attr);
    let failed = more_diags.has_errors();
    diags.extend(more_diags);
    if failed {
        return;
    }
    if let Some(stored) = stored {
        msg.set(&field, stored);
    }
}

fn unsuitable_value(
    name: &str,
    err: &crate::error::ConfmsgError,
    entry: &crate::cfg::Attribute,
) -> Diagnostic {
    Diagnostic::error(UNSUITABLE_VALUE_SUMMARY)
        .with_detail(format!("Inappropriate value for attribute {name:?}: {err}."))
        .with_subject(entry.expr.range().clone())
        .with_context(Range::between(&entry.name_range, entry.expr.range()))
}

fn fill_nested_block(
    content: &BodyContent,
    msg: &mut DynamicMessage,
    ctx: Option<&EvalContext>,
    field: &FieldDescriptor,
    block: &FieldNestedBlockType,
    diags: &mut Diagnostics,
) {
    msg.clear(field);

    if block.repeated {
        let mut items = Vec::new();
        for candidate in &content.blocks {
            if candidate.type_name != block.type_name {
                continue;
            }
            let (nested, more_diags) = new_message_for_block(candidate, block, ctx);
            diags.extend(more_diags);
            items.push(MsgValue::Message(nested));
        }
        if !items.is_empty() {
            msg.set(field, MsgValue::List(items));
        }
        return;
    }

    // Singleton: at most one block of this type may appear.
    let mut found: Option<&Block> = None;
    for candidate in &content.blocks {
        if candidate.type_name != block.type_name {
            continue;
        }
        if let Some(previous) = found {
            diags.push(
                Diagnostic::error(format!("Duplicate {} block", block.type_name))
                    .with_detail(format!(
                        "There may be no more than one {} block. Previous block declared at {}.",
                        block.type_name, previous.def_range
                    ))
                    .with_subject(candidate.type_range.clone())
                    .with_context(candidate.def_range.clone()),
            );
            break;
        }
        found = Some(candidate);
        let (nested, more_diags) = new_message_for_block(candidate, block, ctx);
        diags.extend(more_diags);
        msg.set(field, MsgValue::Message(nested));
    }
}

/// Decodes one block body into the nested message type and binds the
/// block's positional labels to the child's label fields in descriptor
/// order.
fn new_message_for_block(
    block: &Block,
    elem: &FieldNestedBlockType,
    ctx: Option<&EvalContext>,
) -> (DynamicMessage, Diagnostics) {
    let (mut nested, diags) = decode_body(&block.body, &elem.nested, ctx);

    let mut next_label = 0;
    let nested_fields: Vec<FieldDescriptor> = elem.nested.fields().to_vec();
    for nested_field in &nested_fields {
        // Annotation errors here were already reported while building the
        // schema, so they are silently skipped on this pass.
        let Ok(Some(FieldElem::BlockLabel(_))) = field_elem(nested_field) else {
            continue;
        };
        if let Some(label) = block.labels.get(next_label) {
            nested.set(nested_field, MsgValue::string(label.clone()));
        }
        next_label += 1;
    }

    (nested, diags)
}

/// Converts a fully-normalized value into the field's stored
/// representation. `None` with error diagnostics means the field must be
/// left cleared.
fn msg_value_for_field(
    val: &Value,
    rng: &Range,
    attr: &FieldAttribute,
) -> (Option<MsgValue>, Diagnostics) {
    let mut diags = Diagnostics::new();
    let field = &attr.field;

    if field.is_list() {
        let Some(items) = val.elements() else {
            diags.push(
                Diagnostic::error(UNSUITABLE_VALUE_SUMMARY)
                    .with_detail("This argument requires a sequence of values.")
                    .with_subject(rng.clone()),
            );
            return (None, diags);
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let (stored, more_diags) = msg_value_for_singleton(item, rng, attr);
            let failed = more_diags.has_errors();
            diags.extend(more_diags);
            if failed {
                continue;
            }
            if let Some(stored) = stored {
                out.push(stored);
            }
        }
        if diags.has_errors() {
            return (None, diags);
        }
        return (Some(MsgValue::List(out)), diags);
    }

    if field.is_map() {
        let Some(entries) = val.entries() else {
            diags.push(
                Diagnostic::error(UNSUITABLE_VALUE_SUMMARY)
                    .with_detail("This argument requires a mapping from strings to values.")
                    .with_subject(rng.clone()),
            );
            return (None, diags);
        };
        let mut out = std::collections::BTreeMap::new();
        for (key, item) in entries {
            if !item.is_known() {
                // Raw mode is the only place unknowns are storable, and
                // maps of raw cannot be declared.
                diags.push(
                    Diagnostic::error(UNSUITABLE_VALUE_SUMMARY)
                        .with_detail("Unknown values are not allowed here.")
                        .with_context(rng.clone()),
                );
                return (None, diags);
            }
            let (stored, more_diags) = msg_value_for_singleton_kind(item, rng, field);
            let failed = more_diags.has_errors();
            diags.extend(more_diags);
            if failed {
                continue;
            }
            if let Some(stored) = stored {
                out.insert(key.clone(), stored);
            }
        }
        if diags.has_errors() {
            return (None, diags);
        }
        return (Some(MsgValue::Map(out)), diags);
    }

    msg_value_for_singleton(val, rng, attr)
}

fn msg_value_for_singleton(
    val: &Value,
    rng: &Range,
    attr: &FieldAttribute,
) -> (Option<MsgValue>, Diagnostics) {
    let mut diags = Diagnostics::new();
    let field = &attr.field;

    // The caller already normalized `val` through the value-shape physical
    // constraint, so only constraints tighter than that are checked here.

    if attr.raw_mode != RawMode::NotRaw {
        return msg_value_for_raw(val, attr);
    }
    if field.kind() == FieldKind::Bytes {
        // Annotation resolution rejects this combination, so reaching it
        // means a resolver bug.
        diags.push(schema_error_diagnostic(&crate::error::ConfmsgError::schema(
            field.full_name(),
            "bytes field does not have raw mode enabled",
        )));
        return (None, diags);
    }

    if !val.is_known() {
        // Only raw-mode fields can store unknown values. Applications
        // that expect unknowns and know they are decoding into non-raw
        // fields should catch this before decoding.
        diags.push(
            Diagnostic::error(UNSUITABLE_VALUE_SUMMARY)
                .with_detail("Unknown values are not allowed here.")
                .with_context(rng.clone()),
        );
        return (None, diags);
    }

    msg_value_for_singleton_kind(val, rng, field)
}

fn msg_value_for_raw(val: &Value, attr: &FieldAttribute) -> (Option<MsgValue>, Diagnostics) {
    let mut diags = Diagnostics::new();

    let (want_ty, more_diags) = attr.type_constraint();
    let failed = more_diags.has_errors();
    diags.extend(more_diags);
    if failed {
        return (None, diags);
    }

    let (encoded, codec_name) = match attr.raw_mode {
        RawMode::Json => (json::marshal(val, &want_ty), "JSON"),
        RawMode::MessagePack => (msgpack::marshal(val, &want_ty), "MessagePack"),
        RawMode::NotRaw => unreachable!("caller checks raw mode before dispatching here"),
    };
    match encoded {
        Ok(bytes) => (Some(MsgValue::Bytes(bytes)), diags),
        Err(err) => {
            // The value reached here by satisfying the declared
            // constraint, so an encoding failure means the schema promised
            // a combination the codec cannot deliver.
            diags.push(
                Diagnostic::error("Internal error while decoding configuration").with_detail(
                    format!(
                        "This attribute value is not compatible with the {codec_name} field where it'll be stored internally: {err}.\n\nThis is a bug in the configuration schema."
                    ),
                ),
            );
            (None, diags)
        }
    }
}

fn msg_value_for_singleton_kind(
    val: &Value,
    rng: &Range,
    field: &FieldDescriptor,
) -> (Option<MsgValue>, Diagnostics) {
    let mut diags = Diagnostics::new();

    match field.kind() {
        FieldKind::Bool => match val.as_bool() {
            Some(b) => (Some(MsgValue::Bool(b)), diags),
            None => (None, shape_bug(field, "bool", val)),
        },
        FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => {
            int_stored(val, rng, i32::MIN.into(), i32::MAX.into(), |i| {
                MsgValue::I32(i.to_i32().unwrap_or_default())
            })
        }
        FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => {
            int_stored(val, rng, i64::MIN.into(), i64::MAX.into(), |i| {
                MsgValue::I64(i.to_i64().unwrap_or_default())
            })
        }
        FieldKind::Uint32 | FieldKind::Fixed32 => {
            int_stored(val, rng, 0u32.into(), u32::MAX.into(), |i| {
                MsgValue::U32(i.to_u32().unwrap_or_default())
            })
        }
        FieldKind::Uint64 | FieldKind::Fixed64 => {
            int_stored(val, rng, 0u64.into(), u64::MAX.into(), |i| {
                MsgValue::U64(i.to_u64().unwrap_or_default())
            })
        }
        FieldKind::Float => match val.as_number() {
            Some(n) => (Some(MsgValue::F32(n.to_f64() as f32)), diags),
            None => (None, shape_bug(field, "number", val)),
        },
        FieldKind::Double => match val.as_number() {
            Some(n) => (Some(MsgValue::F64(n.to_f64())), diags),
            None => (None, shape_bug(field, "number", val)),
        },
        FieldKind::String => match val.as_str() {
            Some(s) => (Some(MsgValue::string(s)), diags),
            None => (None, shape_bug(field, "string", val)),
        },
        FieldKind::Message => {
            // Message-typed attribute elements dispatch through the
            // message-attr builder before reaching the kind switch.
            diags.push(schema_error_diagnostic(&crate::error::ConfmsgError::schema(
                field.full_name(),
                "message-typed element reached the scalar decode path",
            )));
            (None, diags)
        }
        FieldKind::Bytes => {
            diags.push(schema_error_diagnostic(&crate::error::ConfmsgError::schema(
                field.full_name(),
                "bytes element reached the scalar decode path",
            )));
            (None, diags)
        }
    }
}

/// Checks integrality and the inclusive `[min, max]` range, then builds
/// the stored value from the in-range integer.
fn int_stored(
    val: &Value,
    rng: &Range,
    min: BigInt,
    max: BigInt,
    store: impl FnOnce(&BigInt) -> MsgValue,
) -> (Option<MsgValue>, Diagnostics) {
    let mut diags = Diagnostics::new();

    let Some(number) = val.as_number() else {
        diags.push(
            Diagnostic::error(UNSUITABLE_VALUE_SUMMARY)
                .with_detail("The value must be a whole number.")
                .with_subject(rng.clone()),
        );
        return (None, diags);
    };

    let Some(i) = whole_number(number) else {
        diags.push(
            Diagnostic::error(UNSUITABLE_VALUE_SUMMARY)
                .with_detail("The value must be a whole number.")
                .with_subject(rng.clone()),
        );
        return (None, diags);
    };

    if i < min {
        diags.push(
            Diagnostic::error(UNSUITABLE_VALUE_SUMMARY)
                .with_detail(format!("The value must be greater than or equal to {min}."))
                .with_subject(rng.clone()),
        );
        return (None, diags);
    }
    if i > max {
        diags.push(
            Diagnostic::error(UNSUITABLE_VALUE_SUMMARY)
                .with_detail(format!("The value must be less than or equal to {max}."))
                .with_subject(rng.clone()),
        );
        return (None, diags);
    }

    (Some(store(&i)), diags)
}

fn whole_number(number: &Number) -> Option<BigInt> {
    if !number.is_whole() {
        return None;
    }
    number.as_bigint()
}

fn shape_bug(field: &FieldDescriptor, want: &str, val: &Value) -> Diagnostics {
    // The physical-constraint conversion should make these impossible;
    // reporting instead of panicking keeps a confused schema recoverable.
    schema_error_diagnostic(&crate::error::ConfmsgError::schema(
        field.full_name(),
        format!(
            "expected a {want} value for this field, but have {}",
            val.ty().friendly_name()
        ),
    ))
    .into()
}
