//! Resolution of per-field annotation payloads into bridge behaviors.
//!
//! Each message field maps to zero or one configuration construct. The
//! resolver reads the four annotation payloads, enforces their mutual
//! exclusion and per-payload invariants, and returns the tagged element
//! the rest of the bridge dispatches on.

use crate::error::{ConfmsgError, ConfmsgResult};
use crate::msg::{
    AttributeOptions, CollectionKind, FieldDescriptor, FieldKind, MessageDescriptor,
    NestedBlockOptions, RawMode,
};

/// The bridge behavior a field is annotated with.
///
/// This is a closed set: every consumer matches on the variant rather than
/// dispatching through any kind of trait object.
#[derive(Debug, Clone)]
pub enum FieldElem {
    Attribute(FieldAttribute),
    NestedBlock(FieldNestedBlockType),
    Flattened(FieldFlattened),
    BlockLabel(FieldBlockLabel),
}

/// An attribute-mapped field.
#[derive(Debug, Clone)]
pub struct FieldAttribute {
    pub name: String,
    pub required: bool,
    pub type_expr: String,
    pub raw_mode: RawMode,
    pub field: FieldDescriptor,
}

/// A nested-block-mapped field.
#[derive(Debug, Clone)]
pub struct FieldNestedBlockType {
    pub type_name: String,
    pub nested: MessageDescriptor,
    pub repeated: bool,
    pub collection_kind: CollectionKind,
}

/// A field whose child message merges into the enclosing body.
#[derive(Debug, Clone)]
pub struct FieldFlattened {
    pub nested: MessageDescriptor,
}

/// A field bound from a block label.
#[derive(Debug, Clone)]
pub struct FieldBlockLabel {
    pub name: String,
}

/// Resolves the annotation element for the given field.
///
/// Returns `None` when the field has no annotation at all, which is not an
/// error: unannotated fields are simply invisible to the bridge. A payload
/// whose identifier is empty counts as absent.
pub fn field_elem(field: &FieldDescriptor) -> ConfmsgResult<Option<FieldElem>> {
    let opts = field.options();
    let attr = opts.attr.as_ref().filter(|a| !a.name.is_empty());
    let block = opts.block.as_ref().filter(|b| !b.type_name.is_empty());
    let label = opts.label.as_ref().filter(|l| !l.name.is_empty());
    let flatten = opts.flatten;

    if let Some(attr) = attr {
        if let Some(block) = block {
            return Err(schema(
                field,
                format!(
                    "cannot be both attribute {:?} and nested block type {:?}",
                    attr.name, block.type_name
                ),
            ));
        }
        if flatten {
            return Err(schema(
                field,
                format!(
                    "cannot be attribute {:?} and also flatten into the current body",
                    attr.name
                ),
            ));
        }
        if let Some(label) = label {
            return Err(schema(
                field,
                format!(
                    "cannot be both attribute {:?} and block label {:?}",
                    attr.name, label.name
                ),
            ));
        }
        return resolve_attribute(field, attr).map(Some);
    }

    if let Some(block) = block {
        if flatten {
            return Err(schema(
                field,
                format!(
                    "cannot be nested block type {:?} and also flatten into the current body",
                    block.type_name
                ),
            ));
        }
        if let Some(label) = label {
            return Err(schema(
                field,
                format!(
                    "cannot be both nested block type {:?} and block label {:?}",
                    block.type_name, label.name
                ),
            ));
        }
        return resolve_nested_block(field, block).map(Some);
    }

    if flatten {
        if let Some(label) = label {
            return Err(schema(
                field,
                format!(
                    "cannot be block label {:?} and also flatten into the current body",
                    label.name
                ),
            ));
        }
        if field.kind() != FieldKind::Message {
            return Err(schema(
                field,
                format!(
                    "field to be flattened must have message type, not {}",
                    field.kind()
                ),
            ));
        }
        if field.is_list() || field.is_map() {
            return Err(schema(field, "field to be flattened must not be repeated"));
        }
        let nested = field
            .message_type()
            .expect("message-kind field always has a target type");
        return Ok(Some(FieldElem::Flattened(FieldFlattened { nested })));
    }

    if let Some(label) = label {
        if field.kind() != FieldKind::String || field.is_list() || field.is_map() {
            return Err(schema(
                field,
                "only singleton string fields can be used for block labels",
            ));
        }
        return Ok(Some(FieldElem::BlockLabel(FieldBlockLabel {
            name: label.name.clone(),
        })));
    }

    Ok(None)
}

fn resolve_attribute(
    field: &FieldDescriptor,
    attr: &AttributeOptions,
) -> ConfmsgResult<FieldElem> {
    if field.is_map() && field.map_key_kind() != Some(FieldKind::String) {
        return Err(schema(field, "only maps with string keys are supported"));
    }

    if attr.raw != RawMode::NotRaw {
        // Only singleton raws: a collection whose elements are raw but
        // whose spine is not cannot be diagnosed coherently. A raw field
        // can still be declared with a collection type constraint, in
        // which case the whole collection packs into one bytes value.
        if field.is_list() {
            return Err(schema(field, "cannot use raw mode with a repeated field"));
        }
        if field.is_map() {
            return Err(schema(field, "cannot use raw mode with a map field"));
        }
        if field.kind() != FieldKind::Bytes {
            return Err(schema(field, "raw mode is allowed only for bytes fields"));
        }
        if attr.type_expr.is_empty() {
            return Err(schema(
                field,
                "must specify an attribute type constraint for this raw-mode field",
            ));
        }
    } else if field.kind() == FieldKind::Bytes {
        return Err(schema(field, "bytes fields must have raw mode enabled"));
    }

    Ok(FieldElem::Attribute(FieldAttribute {
        name: attr.name.clone(),
        required: attr.required,
        type_expr: attr.type_expr.clone(),
        raw_mode: attr.raw,
        field: field.clone(),
    }))
}

fn resolve_nested_block(
    field: &FieldDescriptor,
    block: &NestedBlockOptions,
) -> ConfmsgResult<FieldElem> {
    if field.kind() != FieldKind::Message {
        return Err(schema(
            field,
            format!(
                "field representing nested block must have message type, not {}",
                field.kind()
            ),
        ));
    }
    if field.is_map() {
        // A map of blocks keyed by label may arrive in a future revision;
        // guessing a meaning now would bake in the wrong one.
        return Err(schema(
            field,
            "field representing nested block must not be a map",
        ));
    }

    let repeated = field.is_list();
    let mut collection_kind = block.kind;
    if repeated {
        if collection_kind == CollectionKind::Auto {
            collection_kind = CollectionKind::Tuple;
        }
    } else if collection_kind != CollectionKind::Auto {
        return Err(schema(
            field,
            format!(
                "only repeated fields can have explicit block collection mode {collection_kind}"
            ),
        ));
    }

    let nested = field
        .message_type()
        .expect("message-kind field always has a target type");
    Ok(FieldElem::NestedBlock(FieldNestedBlockType {
        type_name: block.type_name.clone(),
        nested,
        repeated,
        collection_kind,
    }))
}

fn schema(field: &FieldDescriptor, reason: impl Into<String>) -> ConfmsgError {
    ConfmsgError::schema(field.full_name(), reason)
}
