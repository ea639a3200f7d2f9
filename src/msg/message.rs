use std::collections::BTreeMap;

use crate::msg::descriptor::{Cardinality, FieldDescriptor, FieldKind, MessageDescriptor};

/// A field's stored value inside a [`DynamicMessage`].
#[derive(Debug, Clone, PartialEq)]
pub enum MsgValue {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Message(DynamicMessage),
    List(Vec<MsgValue>),
    Map(BTreeMap<String, MsgValue>),
}

impl MsgValue {
    pub fn string(s: impl Into<String>) -> MsgValue {
        MsgValue::String(s.into())
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> MsgValue {
        MsgValue::Bytes(b.into())
    }

    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            MsgValue::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MsgValue]> {
        match self {
            MsgValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MsgValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            MsgValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// A message value under construction or inspection.
///
/// The decoder produces these and the reflector consumes them; both go
/// through the same field-level get/set/clear surface regardless of how
/// the descriptor was obtained. Unset fields read back as their kind's
/// default, so a field without presence is indistinguishable from one set
/// to its default value.
#[derive(Debug, Clone)]
pub struct DynamicMessage {
    desc: MessageDescriptor,
    fields: BTreeMap<u32, MsgValue>,
}

impl DynamicMessage {
    pub fn new(desc: MessageDescriptor) -> Self {
        Self {
            desc,
            fields: BTreeMap::new(),
        }
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        &self.desc
    }

    pub fn has(&self, field: &FieldDescriptor) -> bool {
        self.fields.contains_key(&field.number())
    }

    /// The field's value, or its default when unset.
    pub fn get(&self, field: &FieldDescriptor) -> MsgValue {
        self.fields
            .get(&field.number())
            .cloned()
            .unwrap_or_else(|| Self::default_value(field))
    }

    pub fn set(&mut self, field: &FieldDescriptor, value: MsgValue) {
        self.fields.insert(field.number(), value);
    }

    pub fn clear(&mut self, field: &FieldDescriptor) {
        self.fields.remove(&field.number());
    }

    /// The zero value a field reads as while unset.
    pub fn default_value(field: &FieldDescriptor) -> MsgValue {
        match field.cardinality() {
            Cardinality::Repeated => MsgValue::List(Vec::new()),
            Cardinality::Map => MsgValue::Map(BTreeMap::new()),
            Cardinality::Singular => match field.kind() {
                FieldKind::Bool => MsgValue::Bool(false),
                FieldKind::Int32 | FieldKind::Sint32 | FieldKind::Sfixed32 => MsgValue::I32(0),
                FieldKind::Int64 | FieldKind::Sint64 | FieldKind::Sfixed64 => MsgValue::I64(0),
                FieldKind::Uint32 | FieldKind::Fixed32 => MsgValue::U32(0),
                FieldKind::Uint64 | FieldKind::Fixed64 => MsgValue::U64(0),
                FieldKind::Float => MsgValue::F32(0.0),
                FieldKind::Double => MsgValue::F64(0.0),
                FieldKind::String => MsgValue::String(String::new()),
                FieldKind::Bytes => MsgValue::Bytes(Vec::new()),
                FieldKind::Message => {
                    let desc = field
                        .message_type()
                        .expect("message-kind field always has a target type");
                    MsgValue::Message(DynamicMessage::new(desc))
                }
            },
        }
    }
}

impl PartialEq for DynamicMessage {
    /// Messages compare by descriptor identity and populated fields. The
    /// decoder never stores explicit defaults, so a cleared field and a
    /// never-set field compare equal.
    fn eq(&self, other: &Self) -> bool {
        self.desc == other.desc && self.fields == other.fields
    }
}
