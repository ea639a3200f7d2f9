//! Compilation of a message descriptor into the surface schema a body is
//! extracted against.
//!
//! The compiler walks the descriptor's fields in order, emitting attribute
//! schemas and block header schemas, harvesting label names from nested
//! block children, and merging flattened children into the same surface.
//! Every name must be unique across the union of attribute names, block
//! type names, and block label names, and a collision anywhere in that
//! union is a schema error naming both declarations.

use std::collections::HashMap;

use crate::cfg::{AttributeSchema, BlockHeaderSchema, BodySchema};
use crate::elem::{field_elem, FieldElem};
use crate::error::{ConfmsgError, ConfmsgResult};
use crate::msg::MessageDescriptor;

/// Compiles the surface schema for the given message descriptor.
pub fn body_schema(desc: &MessageDescriptor) -> ConfmsgResult<BodySchema> {
    let mut schema = BodySchema::default();
    let mut names = NameRegistry::default();
    build_into(desc, &mut schema, &mut names)?;
    Ok(schema)
}

/// Tracks which names are taken, and by which declaration, so collisions
/// can report both sides.
#[derive(Default)]
struct NameRegistry {
    attrs: HashMap<String, String>,
    block_types: HashMap<String, String>,
    labels: HashMap<String, String>,
}

impl NameRegistry {
    fn check(&self, decl: &str, name: &str) -> ConfmsgResult<()> {
        if let Some(existing) = self.attrs.get(name) {
            return Err(ConfmsgError::schema(
                decl,
                format!("declaration of {name:?} conflicts with attribute declared by {existing}"),
            ));
        }
        if let Some(existing) = self.block_types.get(name) {
            return Err(ConfmsgError::schema(
                decl,
                format!(
                    "declaration of {name:?} conflicts with block type declared by {existing}"
                ),
            ));
        }
        if let Some(existing) = self.labels.get(name) {
            return Err(ConfmsgError::schema(
                decl,
                format!(
                    "declaration of {name:?} conflicts with block label declared by {existing}"
                ),
            ));
        }
        Ok(())
    }
}

fn build_into(
    desc: &MessageDescriptor,
    schema: &mut BodySchema,
    names: &mut NameRegistry,
) -> ConfmsgResult<()> {
    for field in desc.fields() {
        if let Some(group) = field.union_group() {
            if !group.synthetic {
                // The exclusivity semantics of a tagged-union group have
                // no configuration counterpart, so the whole descriptor is
                // unusable rather than silently mis-modelled.
                return Err(ConfmsgError::schema(
                    field.full_name(),
                    format!("tagged-union group {:?} is not supported", group.name),
                ));
            }
        }

        let Some(elem) = field_elem(field)? else {
            continue;
        };

        match elem {
            FieldElem::Attribute(attr) => {
                names.check(field.full_name(), &attr.name)?;
                names
                    .attrs
                    .insert(attr.name.clone(), field.full_name().to_string());
                schema.attributes.push(AttributeSchema {
                    name: attr.name,
                    required: attr.required,
                    // The type constraint and encoding mode are not part
                    // of the extraction surface; the decoder deals with
                    // them once it holds a concrete expression value, so
                    // some schema errors only surface at decode time.
                });
            }

            FieldElem::NestedBlock(block) => {
                names.check(field.full_name(), &block.type_name)?;
                names
                    .block_types
                    .insert(block.type_name.clone(), field.full_name().to_string());
                let label_names = block_label_names(&block.nested)?;
                schema.blocks.push(BlockHeaderSchema {
                    type_name: block.type_name,
                    label_names,
                });
            }

            FieldElem::Flattened(flattened) => {
                build_into(&flattened.nested, schema, names)?;
            }

            FieldElem::BlockLabel(label) => {
                // Labels are consumed when the enclosing block is
                // constructed, so they are absent from this body's own
                // surface; they still reserve their name.
                names.check(field.full_name(), &label.name)?;
                names
                    .labels
                    .insert(label.name.clone(), field.full_name().to_string());
            }
        }
    }
    Ok(())
}

/// Ordered label names for a block whose child is the given message: one
/// per label-annotated field, in descriptor order.
fn block_label_names(desc: &MessageDescriptor) -> ConfmsgResult<Vec<String>> {
    let mut label_names = Vec::new();
    for field in desc.fields() {
        if let Some(FieldElem::BlockLabel(label)) = field_elem(field)? {
            label_names.push(label.name);
        }
    }
    Ok(label_names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::{AttributeOptions, Field, FieldKind, NestedBlockOptions};

    #[test]
    fn attribute_and_block_surface_in_order() {
        let child = MessageDescriptor::builder("testschema.Doodad")
            .field(Field::new(1, "name", FieldKind::String).label("name"))
            .field(
                Field::new(2, "nickname", FieldKind::String)
                    .attr(AttributeOptions::named("nickname")),
            )
            .build()
            .unwrap();
        let desc = MessageDescriptor::builder("testschema.Root")
            .field(
                Field::new(1, "name", FieldKind::String)
                    .attr(AttributeOptions::named("name").required()),
            )
            .field(Field::message(2, "doodad", &child).block(NestedBlockOptions::named("doodad")))
            .build()
            .unwrap();

        let schema = body_schema(&desc).unwrap();
        assert_eq!(
            schema.attributes,
            vec![AttributeSchema {
                name: "name".into(),
                required: true,
            }]
        );
        assert_eq!(
            schema.blocks,
            vec![BlockHeaderSchema {
                type_name: "doodad".into(),
                label_names: vec!["name".into()],
            }]
        );
    }

    #[test]
    fn name_collision_across_kinds_is_an_error() {
        let child = MessageDescriptor::builder("testschema.Doodad")
            .build()
            .unwrap();
        let desc = MessageDescriptor::builder("testschema.Root")
            .field(Field::new(1, "a", FieldKind::String).attr(AttributeOptions::named("doodad")))
            .field(Field::message(2, "b", &child).block(NestedBlockOptions::named("doodad")))
            .build()
            .unwrap();

        let err = body_schema(&desc).unwrap_err();
        assert!(err.to_string().contains("conflicts with attribute"));
    }

    #[test]
    fn flatten_merges_child_surface() {
        let inner = MessageDescriptor::builder("testschema.Inner")
            .field(Field::new(1, "name", FieldKind::String).attr(AttributeOptions::named("name")))
            .build()
            .unwrap();
        let desc = MessageDescriptor::builder("testschema.Outer")
            .field(Field::message(1, "base", &inner).flatten())
            .field(
                Field::new(2, "species", FieldKind::String)
                    .attr(AttributeOptions::named("species")),
            )
            .build()
            .unwrap();

        let schema = body_schema(&desc).unwrap();
        let names: Vec<&str> = schema.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["name", "species"]);
    }

    #[test]
    fn flatten_collision_reports_both_declarations() {
        let inner = MessageDescriptor::builder("testschema.Inner")
            .field(Field::new(1, "name", FieldKind::String).attr(AttributeOptions::named("name")))
            .build()
            .unwrap();
        let desc = MessageDescriptor::builder("testschema.Outer")
            .field(Field::message(1, "base", &inner).flatten())
            .field(Field::new(2, "name", FieldKind::String).attr(AttributeOptions::named("name")))
            .build()
            .unwrap();

        let err = body_schema(&desc).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("testschema.Outer.name"));
        assert!(text.contains("testschema.Inner.name"));
    }

    #[test]
    fn non_synthetic_union_groups_are_rejected() {
        let desc = MessageDescriptor::builder("testschema.Root")
            .field(
                Field::new(1, "a", FieldKind::String)
                    .union_group("kind")
                    .attr(AttributeOptions::named("a")),
            )
            .build()
            .unwrap();
        assert!(body_schema(&desc).unwrap_err().is_schema());
    }

    #[test]
    fn synthetic_union_groups_pass() {
        let desc = MessageDescriptor::builder("testschema.Root")
            .field(
                Field::new(1, "a", FieldKind::String)
                    .optional()
                    .attr(AttributeOptions::named("a")),
            )
            .build()
            .unwrap();
        assert!(body_schema(&desc).is_ok());
    }
}
