//! Type reconciliation between message field kinds and configuration type
//! constraints.
//!
//! Two different constraint derivations live here and must not be
//! conflated: the *declared* constraint (what the schema author asked for,
//! or an inference from the field kind) applied first, and the *physical*
//! constraint (what the field can actually store) applied as a second
//! normalization pass. The physical constraint comes in two forms as
//! well: one tuned to a concrete value's shape, one derived from the field
//! kind alone.

use std::collections::BTreeMap;

use crate::diag::{schema_error_diagnostic, Diagnostics};
use crate::elem::{field_elem, FieldAttribute, FieldElem};
use crate::error::{ConfmsgError, ConfmsgResult};
use crate::msg::{CollectionKind, FieldDescriptor, FieldKind, MessageDescriptor, RawMode};
use crate::typeexpr;
use crate::value::Ty;

impl FieldAttribute {
    /// The declared or inferred type constraint for this attribute.
    ///
    /// A non-empty annotation type expression wins; otherwise the
    /// constraint is inferred from the field kind. Raw-mode fields have no
    /// inference and must declare explicitly.
    pub fn type_constraint(&self) -> (Ty, Diagnostics) {
        let mut diags = Diagnostics::new();
        if self.type_expr.is_empty() {
            match self.auto_type_constraint() {
                Ok(ty) => return (ty, diags),
                Err(err) => {
                    diags.push(schema_error_diagnostic(&err));
                    return (Ty::Dynamic, diags);
                }
            }
        }

        match typeexpr::parse(&self.type_expr) {
            Ok(ty) => (ty, diags),
            Err(err) => {
                diags.push(schema_error_diagnostic(&ConfmsgError::schema(
                    self.field.full_name(),
                    err.to_string(),
                )));
                (Ty::Dynamic, diags)
            }
        }
    }

    fn auto_type_constraint(&self) -> ConfmsgResult<Ty> {
        if self.raw_mode != RawMode::NotRaw {
            return Err(ConfmsgError::schema(
                self.field.full_name(),
                "must set an explicit type constraint for this raw-mode attribute",
            ));
        }
        auto_type_constraint_for_field(&self.field).ok_or_else(|| {
            ConfmsgError::schema(
                self.field.full_name(),
                "can't infer a type constraint for this field; specify one explicitly",
            )
        })
    }
}

/// Automatic constraint inference from the field shape, for schema authors
/// who left the type expression empty. `None` means there is no sensible
/// inference and the author must declare one.
fn auto_type_constraint_for_field(field: &FieldDescriptor) -> Option<Ty> {
    let ety = auto_type_constraint_for_element(field.kind())?;
    if field.is_list() {
        if ety.has_dynamic() {
            // The exact tuple type can only be chosen once a value
            // arrives.
            return Some(Ty::Dynamic);
        }
        Some(Ty::list(ety))
    } else if field.is_map() {
        if ety.has_dynamic() {
            return Some(Ty::Dynamic);
        }
        Some(Ty::map(ety))
    } else {
        Some(ety)
    }
}

fn auto_type_constraint_for_element(kind: FieldKind) -> Option<Ty> {
    match kind {
        FieldKind::Bool => Some(Ty::Bool),
        k if k.is_integer() || k.is_float() => Some(Ty::Number),
        FieldKind::String => Some(Ty::String),
        // Bytes means raw mode, which always requires an explicit
        // constraint; message-typed elements have no automatic constraint
        // either.
        FieldKind::Bytes | FieldKind::Message => None,
        _ => None,
    }
}

/// Physical constraint tuned to a concrete value's shape.
///
/// For repeated fields the result is a tuple of the input's arity with a
/// uniform element constraint: the constraint is uniform but, being a
/// tuple, each element may still settle on a different exact type when
/// the element constraint is non-exact. Maps get the same treatment
/// through an object keyed like the input.
pub fn value_physical_constraint(value_ty: &Ty, field: &FieldDescriptor) -> ConfmsgResult<Ty> {
    if field.is_list() {
        let ety = physical_constraint_single(field.kind(), field)?;
        return match value_ty {
            Ty::Tuple(etys) => Ok(Ty::Tuple(vec![ety; etys.len()])),
            Ty::List(_) | Ty::Set(_) => {
                // Already-homogeneous inputs normalize to a list, because
                // the field's storage cannot preserve set identity anyway.
                Ok(Ty::list(ety))
            }
            _ => Err(ConfmsgError::schema(
                field.full_name(),
                format!(
                    "can't populate repeated field from {}",
                    value_ty.friendly_name()
                ),
            )),
        };
    }

    if field.is_map() {
        let ety = physical_constraint_single(field.kind(), field)?;
        return match value_ty {
            Ty::Object(atys) => {
                let atys: BTreeMap<String, Ty> =
                    atys.keys().map(|name| (name.clone(), ety.clone())).collect();
                Ok(Ty::Object(atys))
            }
            Ty::Map(_) => Ok(Ty::map(ety)),
            _ => Err(ConfmsgError::schema(
                field.full_name(),
                format!(
                    "can't populate map field from {}",
                    value_ty.friendly_name()
                ),
            )),
        };
    }

    physical_constraint_single(field.kind(), field)
}

/// Physical constraint from the field kind alone, ignoring value shape.
pub fn physical_constraint_single(
    kind: FieldKind,
    field: &FieldDescriptor,
) -> ConfmsgResult<Ty> {
    match kind {
        FieldKind::Bool => Ok(Ty::Bool),
        k if k.is_integer() || k.is_float() => Ok(Ty::Number),
        FieldKind::String => Ok(Ty::String),
        // Bytes fields hold raw-mode payloads, which store the value
        // verbatim without further constraint.
        FieldKind::Bytes => Ok(Ty::Dynamic),
        FieldKind::Message => Err(ConfmsgError::schema(
            field.full_name(),
            "cannot decode a configuration value into a message-typed field",
        )),
        _ => Err(ConfmsgError::schema(
            field.full_name(),
            format!("cannot decode a configuration value into a {kind} field"),
        )),
    }
}

/// The object constraint every reflection of a message with this
/// descriptor will conform to.
///
/// Also doubles as a validity check: any inconsistent annotation in the
/// descriptor surfaces as an error here.
pub fn object_constraint(desc: &MessageDescriptor) -> ConfmsgResult<Ty> {
    let mut atys = BTreeMap::new();
    build_object_attr_types(desc, &mut atys)?;
    Ok(Ty::Object(atys))
}

fn build_object_attr_types(
    desc: &MessageDescriptor,
    atys: &mut BTreeMap<String, Ty>,
) -> ConfmsgResult<()> {
    for field in desc.fields() {
        let Some(elem) = field_elem(field)? else {
            continue;
        };

        match elem {
            FieldElem::Attribute(attr) => {
                let (aty, diags) = attr.type_constraint();
                if diags.has_errors() {
                    return Err(ConfmsgError::schema(
                        field.full_name(),
                        "invalid type constraint expression",
                    ));
                }
                atys.insert(attr.name, aty);
            }

            FieldElem::NestedBlock(block) => {
                let nested_ty = object_constraint(&block.nested)?;
                match block.collection_kind {
                    CollectionKind::Auto => {
                        // AUTO survives resolution only for singletons, so
                        // the nested object type passes through directly.
                        atys.insert(block.type_name, nested_ty);
                    }
                    CollectionKind::Tuple => {
                        // The exact tuple type is only known once there is
                        // a value to count.
                        atys.insert(block.type_name, Ty::Dynamic);
                    }
                    CollectionKind::List => {
                        if nested_ty.has_dynamic() {
                            return Err(ConfmsgError::schema(
                                field.full_name(),
                                "can't use block collection kind LIST with a block type containing an attribute with a dynamic constraint",
                            ));
                        }
                        atys.insert(block.type_name, Ty::list(nested_ty));
                    }
                    CollectionKind::Set => {
                        if nested_ty.has_dynamic() {
                            return Err(ConfmsgError::schema(
                                field.full_name(),
                                "can't use block collection kind SET with a block type containing an attribute with a dynamic constraint",
                            ));
                        }
                        atys.insert(block.type_name, Ty::set(nested_ty));
                    }
                }
            }

            FieldElem::Flattened(flattened) => {
                build_object_attr_types(&flattened.nested, atys)?;
            }

            FieldElem::BlockLabel(label) => {
                // Resolution already guarantees a singleton string field.
                atys.insert(label.name, Ty::String);
            }
        }
    }
    Ok(())
}
