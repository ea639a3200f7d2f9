//! Shared descriptor fixtures used across the integration tests.
//!
//! These mirror a plausible message schema a plugin would describe: simple
//! scalar attributes, collection attributes, raw-mode attributes, block
//! messages with labels, and flatten chains.

#![allow(dead_code)]

use confmsg::msg::{
    well_known, AttributeOptions, CollectionKind, Field, FieldKind, MessageDescriptor,
    NestedBlockOptions, RawMode,
};

pub fn with_string_attr() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithStringAttr")
        .field(Field::new(1, "name", FieldKind::String).attr(AttributeOptions::named("name")))
        .build()
        .expect("descriptor")
}

pub fn with_required_string_attr() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithRequiredStringAttr")
        .field(
            Field::new(1, "name", FieldKind::String)
                .attr(AttributeOptions::named("name").required()),
        )
        .build()
        .expect("descriptor")
}

pub fn with_bool_attr() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithBoolAttr")
        .field(
            Field::new(1, "do_the_thing", FieldKind::Bool)
                .attr(AttributeOptions::named("do_the_thing")),
        )
        .build()
        .expect("descriptor")
}

pub fn with_number_attr_as_int32() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithNumberAttrAsInt32")
        .field(Field::new(1, "num", FieldKind::Int32).attr(AttributeOptions::named("num")))
        .build()
        .expect("descriptor")
}

pub fn with_number_attr_as_string() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithNumberAttrAsString")
        .field(
            Field::new(1, "num", FieldKind::String)
                .attr(AttributeOptions::named("num").type_expr("number")),
        )
        .build()
        .expect("descriptor")
}

pub fn with_string_list_attr() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithStringListAttr")
        .field(
            Field::new(1, "names", FieldKind::String)
                .repeated()
                .attr(AttributeOptions::named("names")),
        )
        .build()
        .expect("descriptor")
}

pub fn with_string_set_attr() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithStringSetAttr")
        .field(
            Field::new(1, "names", FieldKind::String)
                .repeated()
                .attr(AttributeOptions::named("names").type_expr("set(string)")),
        )
        .build()
        .expect("descriptor")
}

pub fn with_string_map_attr() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithStringMapAttr")
        .field(
            Field::new(1, "names", FieldKind::String)
                .map(FieldKind::String)
                .attr(AttributeOptions::named("names")),
        )
        .build()
        .expect("descriptor")
}

pub fn with_raw_dynamic_attr(mode: RawMode) -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithRawDynamicAttr")
        .field(
            Field::new(1, "raw", FieldKind::Bytes)
                .attr(AttributeOptions::named("raw").type_expr("any").raw(mode)),
        )
        .build()
        .expect("descriptor")
}

pub fn with_holder_attr() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithHolderAttr")
        .field(
            Field::message(1, "extra", &well_known::value_descriptor())
                .attr(AttributeOptions::named("extra").type_expr("any")),
        )
        .build()
        .expect("descriptor")
}

pub fn with_holder_map_attr() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithHolderMapAttr")
        .field(
            Field::message(1, "extras", &well_known::value_descriptor())
                .map(FieldKind::String)
                .attr(AttributeOptions::named("extras").type_expr("map(any)")),
        )
        .build()
        .expect("descriptor")
}

pub fn with_holder_list_attr() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithHolderListAttr")
        .field(
            Field::message(1, "extras", &well_known::value_descriptor())
                .repeated()
                .attr(AttributeOptions::named("extras").type_expr("list(any)")),
        )
        .build()
        .expect("descriptor")
}

/// Block child with one label and one attribute.
pub fn with_one_block_label() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithOneBlockLabel")
        .field(Field::new(1, "name", FieldKind::String).label("name"))
        .field(
            Field::new(2, "nickname", FieldKind::String)
                .attr(AttributeOptions::named("nickname")),
        )
        .build()
        .expect("descriptor")
}

/// Block child with two labels and one attribute.
pub fn with_two_block_labels() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithTwoBlockLabels")
        .field(Field::new(1, "type", FieldKind::String).label("type"))
        .field(Field::new(2, "name", FieldKind::String).label("name"))
        .field(
            Field::new(3, "nickname", FieldKind::String)
                .attr(AttributeOptions::named("nickname")),
        )
        .build()
        .expect("descriptor")
}

pub fn nested_block_singleton(child: &MessageDescriptor, name: &str) -> MessageDescriptor {
    MessageDescriptor::builder(format!("testschema.SingletonOf{name}"))
        .field(Field::message(1, "doodad", child).block(NestedBlockOptions::named("doodad")))
        .build()
        .expect("descriptor")
}

pub fn nested_block_repeated(
    child: &MessageDescriptor,
    kind: CollectionKind,
) -> MessageDescriptor {
    MessageDescriptor::builder("testschema.RepeatedBlocks")
        .field(
            Field::message(1, "doodad", child)
                .repeated()
                .block(NestedBlockOptions::named("doodad").kind(kind)),
        )
        .build()
        .expect("descriptor")
}

/// `WithStringAttr` flattened in, plus a sibling `species` attribute.
pub fn with_flatten_string_attr() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithFlattenStringAttr")
        .field(Field::message(1, "base", &with_string_attr()).flatten())
        .field(
            Field::new(2, "species", FieldKind::String)
                .attr(AttributeOptions::named("species")),
        )
        .build()
        .expect("descriptor")
}

/// A two-deep flatten chain: base.base.name, base.species, breed.
pub fn with_nested_flatten_string_attr() -> MessageDescriptor {
    MessageDescriptor::builder("testschema.WithNestedFlattenStringAttr")
        .field(Field::message(1, "base", &with_flatten_string_attr()).flatten())
        .field(
            Field::new(2, "breed", FieldKind::String).attr(AttributeOptions::named("breed")),
        )
        .build()
        .expect("descriptor")
}
