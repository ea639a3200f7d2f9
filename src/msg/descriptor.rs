use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Weak};

use crate::error::{ConfmsgError, ConfmsgResult};

/// Scalar and composite kinds a message field can have.
///
/// The full fixed-width integer family is kept distinct because range
/// enforcement depends on the exact kind, even though every integer kind
/// maps to the same configuration type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    Int32,
    Sint32,
    Sfixed32,
    Int64,
    Sint64,
    Sfixed64,
    Uint32,
    Fixed32,
    Uint64,
    Fixed64,
    Float,
    Double,
    String,
    Bytes,
    Message,
}

impl FieldKind {
    pub fn is_integer(self) -> bool {
        use FieldKind::*;
        matches!(
            self,
            Int32 | Sint32 | Sfixed32 | Int64 | Sint64 | Sfixed64 | Uint32 | Fixed32 | Uint64
                | Fixed64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, FieldKind::Float | FieldKind::Double)
    }

    pub fn name(self) -> &'static str {
        use FieldKind::*;
        match self {
            Bool => "bool",
            Int32 => "int32",
            Sint32 => "sint32",
            Sfixed32 => "sfixed32",
            Int64 => "int64",
            Sint64 => "sint64",
            Sfixed64 => "sfixed64",
            Uint32 => "uint32",
            Fixed32 => "fixed32",
            Uint64 => "uint64",
            Fixed64 => "fixed64",
            Float => "float",
            Double => "double",
            String => "string",
            Bytes => "bytes",
            Message => "message",
        }
    }
}

impl Display for FieldKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How many values a field holds. For `Map` fields, [`FieldDescriptor::kind`]
/// describes the *value* kind and the key kind is recorded separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Singular,
    Repeated,
    Map,
}

/// Raw-mode selection for attribute annotations. The discriminants are the
/// stable wire values of the annotation payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RawMode {
    #[default]
    NotRaw = 0,
    MessagePack = 1,
    Json = 2,
}

/// Collection kind for repeated nested-block annotations. The
/// discriminants are the stable wire values of the annotation payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionKind {
    #[default]
    Auto = 0,
    Tuple = 1,
    List = 2,
    Set = 3,
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CollectionKind::Auto => "AUTO",
            CollectionKind::Tuple => "TUPLE",
            CollectionKind::List => "LIST",
            CollectionKind::Set => "SET",
        })
    }
}

/// Extension numbers under which the annotation payloads are registered on
/// field options. These are the stable bit-level contract of this
/// revision; implementations reading serialized descriptors must use the
/// same numbers.
pub const ATTRIBUTE_EXT_NUMBER: u32 = 50000;
pub const NESTED_BLOCK_EXT_NUMBER: u32 = 50001;
pub const BLOCK_LABEL_EXT_NUMBER: u32 = 50002;
pub const FLATTEN_EXT_NUMBER: u32 = 50004;

/// Payload of the attribute annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeOptions {
    pub name: String,
    pub required: bool,
    pub type_expr: String,
    pub raw: RawMode,
}

impl AttributeOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn type_expr(mut self, expr: impl Into<String>) -> Self {
        self.type_expr = expr.into();
        self
    }

    pub fn raw(mut self, mode: RawMode) -> Self {
        self.raw = mode;
        self
    }
}

/// Payload of the nested-block annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestedBlockOptions {
    pub type_name: String,
    pub kind: CollectionKind,
}

impl NestedBlockOptions {
    pub fn named(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: CollectionKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Payload of the block-label annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockLabelOptions {
    pub name: String,
}

/// The four mutually-exclusive annotation payloads a field can carry.
/// An empty identifier in a payload counts as the payload being absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptions {
    pub attr: Option<AttributeOptions>,
    pub block: Option<NestedBlockOptions>,
    pub label: Option<BlockLabelOptions>,
    pub flatten: bool,
}

/// Membership of a field in a tagged-union group. Synthetic groups are the
/// single-field groupings that encode nullability; anything else is
/// unsupported by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnionGroup {
    pub name: String,
    pub synthetic: bool,
}

/// A named message type: ordered fields plus a fully-qualified name.
///
/// Descriptors are cheap handles over shared immutable state. The graph
/// they form is acyclic except for the crate's own well-known holder type,
/// which references itself through a weak edge.
#[derive(Clone)]
pub struct MessageDescriptor {
    pub(crate) inner: Arc<MessageDesc>,
}

pub(crate) struct MessageDesc {
    pub(crate) full_name: String,
    pub(crate) fields: Vec<FieldDescriptor>,
}

impl MessageDescriptor {
    pub fn builder(full_name: impl Into<String>) -> MessageBuilder {
        MessageBuilder {
            full_name: full_name.into(),
            fields: Vec::new(),
        }
    }

    pub fn full_name(&self) -> &str {
        &self.inner.full_name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.inner.fields
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.inner.fields.iter().find(|f| f.name() == name)
    }
}

impl fmt::Debug for MessageDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDescriptor")
            .field("full_name", &self.inner.full_name)
            .field("fields", &self.inner.fields.len())
            .finish()
    }
}

impl PartialEq for MessageDescriptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Reference from a field to its message type. The weak form exists only
/// for self-referential well-known types.
#[derive(Clone)]
pub(crate) enum MessageRef {
    Strong(Arc<MessageDesc>),
    Weak(Weak<MessageDesc>),
}

impl MessageRef {
    fn resolve(&self) -> MessageDescriptor {
        let inner = match self {
            MessageRef::Strong(arc) => arc.clone(),
            MessageRef::Weak(weak) => weak
                .upgrade()
                .unwrap_or_else(|| unreachable!("self-referential descriptor outlives its owner")),
        };
        MessageDescriptor { inner }
    }
}

/// One field of a message: name, number, kind, cardinality, annotation
/// payloads, and (for message kinds) the target message type.
#[derive(Clone)]
pub struct FieldDescriptor {
    pub(crate) inner: Arc<FieldDesc>,
}

pub(crate) struct FieldDesc {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) number: u32,
    pub(crate) kind: FieldKind,
    pub(crate) cardinality: Cardinality,
    pub(crate) map_key: Option<FieldKind>,
    pub(crate) message: Option<MessageRef>,
    pub(crate) options: FieldOptions,
    pub(crate) union_group: Option<UnionGroup>,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Fully-qualified name, used to attribute schema errors.
    pub fn full_name(&self) -> &str {
        &self.inner.full_name
    }

    pub fn number(&self) -> u32 {
        self.inner.number
    }

    /// Element kind of the field: the scalar kind itself, the element kind
    /// for repeated fields, or the *value* kind for map fields.
    pub fn kind(&self) -> FieldKind {
        self.inner.kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.inner.cardinality
    }

    pub fn is_list(&self) -> bool {
        self.inner.cardinality == Cardinality::Repeated
    }

    pub fn is_map(&self) -> bool {
        self.inner.cardinality == Cardinality::Map
    }

    pub fn map_key_kind(&self) -> Option<FieldKind> {
        self.inner.map_key
    }

    /// The target message type, for `Message`-kind fields.
    pub fn message_type(&self) -> Option<MessageDescriptor> {
        self.inner.message.as_ref().map(MessageRef::resolve)
    }

    pub fn options(&self) -> &FieldOptions {
        &self.inner.options
    }

    pub fn union_group(&self) -> Option<&UnionGroup> {
        self.inner.union_group.as_ref()
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("full_name", &self.inner.full_name)
            .field("kind", &self.inner.kind)
            .field("cardinality", &self.inner.cardinality)
            .finish()
    }
}

impl PartialEq for FieldDescriptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Specification of one field, fed to [`MessageBuilder::field`].
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    number: u32,
    kind: FieldKind,
    cardinality: Cardinality,
    map_key: Option<FieldKind>,
    message: Option<MessageDescriptor>,
    options: FieldOptions,
    union_group: Option<UnionGroup>,
}

impl Field {
    pub fn new(number: u32, name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            number,
            kind,
            cardinality: Cardinality::Singular,
            map_key: None,
            message: None,
            options: FieldOptions::default(),
            union_group: None,
        }
    }

    /// A `Message`-kind field targeting the given descriptor.
    pub fn message(number: u32, name: impl Into<String>, target: &MessageDescriptor) -> Self {
        let mut field = Self::new(number, name, FieldKind::Message);
        field.message = Some(target.clone());
        field
    }

    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    /// Turns the field into a map with the given key kind; the field's own
    /// kind describes the values.
    pub fn map(mut self, key: FieldKind) -> Self {
        self.cardinality = Cardinality::Map;
        self.map_key = Some(key);
        self
    }

    /// Puts the field into a named tagged-union group.
    pub fn union_group(mut self, name: impl Into<String>) -> Self {
        self.union_group = Some(UnionGroup {
            name: name.into(),
            synthetic: false,
        });
        self
    }

    /// Marks the field optional via a synthetic single-field union group,
    /// the nullability encoding the bridge accepts.
    pub fn optional(mut self) -> Self {
        self.union_group = Some(UnionGroup {
            name: format!("_{}", self.name),
            synthetic: true,
        });
        self
    }

    pub fn attr(mut self, opts: AttributeOptions) -> Self {
        self.options.attr = Some(opts);
        self
    }

    pub fn block(mut self, opts: NestedBlockOptions) -> Self {
        self.options.block = Some(opts);
        self
    }

    pub fn label(mut self, name: impl Into<String>) -> Self {
        self.options.label = Some(BlockLabelOptions { name: name.into() });
        self
    }

    pub fn flatten(mut self) -> Self {
        self.options.flatten = true;
        self
    }
}

/// Builds a [`MessageDescriptor`] from field specifications.
#[derive(Debug)]
pub struct MessageBuilder {
    full_name: String,
    fields: Vec<Field>,
}

impl MessageBuilder {
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn build(self) -> ConfmsgResult<MessageDescriptor> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for spec in self.fields {
            let full_name = format!("{}.{}", self.full_name, spec.name);
            if spec.kind == FieldKind::Message && spec.message.is_none() {
                return Err(ConfmsgError::schema(
                    full_name,
                    "message-kind field has no target message type",
                ));
            }
            if spec.kind != FieldKind::Message && spec.message.is_some() {
                return Err(ConfmsgError::schema(
                    full_name,
                    "non-message field cannot target a message type",
                ));
            }
            if fields
                .iter()
                .any(|f: &FieldDescriptor| f.number() == spec.number)
            {
                return Err(ConfmsgError::schema(
                    full_name,
                    format!("field number {} is already in use", spec.number),
                ));
            }
            fields.push(FieldDescriptor {
                inner: Arc::new(FieldDesc {
                    name: spec.name,
                    full_name,
                    number: spec.number,
                    kind: spec.kind,
                    cardinality: spec.cardinality,
                    map_key: spec.map_key,
                    message: spec.message.map(|m| MessageRef::Strong(m.inner)),
                    options: spec.options,
                    union_group: spec.union_group,
                }),
            });
        }
        Ok(MessageDescriptor {
            inner: Arc::new(MessageDesc {
                full_name: self.full_name,
                fields,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_assigns_full_names() {
        let desc = MessageDescriptor::builder("testschema.SimpleRoot")
            .field(Field::new(1, "name", FieldKind::String))
            .build()
            .unwrap();
        assert_eq!(desc.full_name(), "testschema.SimpleRoot");
        let field = desc.field_by_name("name").unwrap();
        assert_eq!(field.full_name(), "testschema.SimpleRoot.name");
        assert_eq!(field.kind(), FieldKind::String);
    }

    #[test]
    fn builder_rejects_duplicate_numbers() {
        let err = MessageDescriptor::builder("testschema.Bad")
            .field(Field::new(1, "a", FieldKind::String))
            .field(Field::new(1, "b", FieldKind::String))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfmsgError::Schema { .. }));
    }

    #[test]
    fn map_fields_record_key_kind() {
        let desc = MessageDescriptor::builder("testschema.WithMap")
            .field(Field::new(1, "names", FieldKind::String).map(FieldKind::String))
            .build()
            .unwrap();
        let field = desc.field_by_name("names").unwrap();
        assert!(field.is_map());
        assert_eq!(field.map_key_kind(), Some(FieldKind::String));
    }
}
