/* Copyright (c) 2026. This Source Code Form is subject to the terms of the Eclipse Public License, v. 2.0. */
//! Confmsg: a schema-driven bridge between block-structured configuration
//! and binary message schemas.
//!
//! Message schemas opt their fields into configuration processing with
//! per-field annotations: an attribute mapping, a nested-block mapping, a
//! block-label mapping, or a flatten directive. Given annotations, the
//! bridge decodes a configuration body into a populated message (plus
//! accumulated diagnostics), and reflects a populated message back into a
//! dynamically-typed configuration value.
//!
//! # Examples
//! ```
//! use confmsg::cfg::Body;
//! use confmsg::msg::{AttributeOptions, Field, FieldKind, MessageDescriptor, MsgValue};
//! use confmsg::value::Value;
//! use confmsg::{decode_body, object_value};
//!
//! let desc = MessageDescriptor::builder("example.Config")
//!     .field(
//!         Field::new(1, "name", FieldKind::String)
//!             .attr(AttributeOptions::named("name").required()),
//!     )
//!     .build()
//!     .expect("descriptor");
//!
//! let body = Body::builder().attr("name", Value::string("Jackson")).build();
//! let (msg, diags) = decode_body(&body, &desc, None);
//! assert!(!diags.has_errors());
//! let name = desc.field_by_name("name").expect("field");
//! assert_eq!(msg.get(name), MsgValue::string("Jackson"));
//!
//! let reflected = object_value(&msg).expect("reflect");
//! assert_eq!(
//!     reflected,
//!     Value::object([("name".to_string(), Value::string("Jackson"))]),
//! );
//! ```

mod attr_message;
pub mod cfg;
mod constraint;
mod decode;
pub mod diag;
mod elem;
mod error;
pub mod msg;
mod reflect;
mod schema;
pub mod typeexpr;
pub mod value;

pub use constraint::{object_constraint, physical_constraint_single, value_physical_constraint};
pub use decode::decode_body;
pub use elem::{
    field_elem, FieldAttribute, FieldBlockLabel, FieldElem, FieldFlattened, FieldNestedBlockType,
};
pub use error::{ConfmsgError, ConfmsgResult};
pub use reflect::object_value;
pub use schema::body_schema;
