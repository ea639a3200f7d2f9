//! The message reflection surface the bridge decodes into and reflects
//! from.
//!
//! Descriptors describe message types: named fields with kinds,
//! cardinalities, and the bridge's annotation payloads. Messages are
//! dynamic field stores addressed through their descriptor. Both sides of
//! the bridge treat this surface as the only way to touch a message, so a
//! generated-code message type could slot in behind the same API.

mod descriptor;
mod message;
pub mod well_known;

pub use descriptor::{
    AttributeOptions, BlockLabelOptions, Cardinality, CollectionKind, Field, FieldDescriptor,
    FieldKind, FieldOptions, MessageBuilder, MessageDescriptor, NestedBlockOptions, RawMode,
    UnionGroup, ATTRIBUTE_EXT_NUMBER, BLOCK_LABEL_EXT_NUMBER, FLATTEN_EXT_NUMBER,
    NESTED_BLOCK_EXT_NUMBER,
};
pub use message::{DynamicMessage, MsgValue};
