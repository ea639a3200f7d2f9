use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// A configuration type constraint.
///
/// Collection constraints carry their element constraint; `Tuple` and
/// `Object` are structural and carry per-position or per-attribute
/// constraints. `Dynamic` matches any value and marks the places where the
/// exact type is only known once a value arrives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Bool,
    Number,
    String,
    Dynamic,
    List(Box<Ty>),
    Set(Box<Ty>),
    Map(Box<Ty>),
    Tuple(Vec<Ty>),
    Object(BTreeMap<String, Ty>),
}

impl Ty {
    pub fn list(elem: Ty) -> Ty {
        Ty::List(Box::new(elem))
    }

    pub fn set(elem: Ty) -> Ty {
        Ty::Set(Box::new(elem))
    }

    pub fn map(elem: Ty) -> Ty {
        Ty::Map(Box::new(elem))
    }

    pub fn tuple(elems: impl IntoIterator<Item = Ty>) -> Ty {
        Ty::Tuple(elems.into_iter().collect())
    }

    pub fn object(attrs: impl IntoIterator<Item = (String, Ty)>) -> Ty {
        Ty::Object(attrs.into_iter().collect())
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Ty::Dynamic)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Ty::List(_))
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Ty::Set(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Ty::Map(_))
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Ty::Tuple(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Ty::Object(_))
    }

    /// Element constraint of a uniform collection.
    pub fn element_type(&self) -> Option<&Ty> {
        match self {
            Ty::List(e) | Ty::Set(e) | Ty::Map(e) => Some(e),
            _ => None,
        }
    }

    pub fn tuple_element_types(&self) -> Option<&[Ty]> {
        match self {
            Ty::Tuple(etys) => Some(etys),
            _ => None,
        }
    }

    pub fn attribute_types(&self) -> Option<&BTreeMap<String, Ty>> {
        match self {
            Ty::Object(atys) => Some(atys),
            _ => None,
        }
    }

    /// True when the constraint contains `Dynamic` anywhere, meaning the
    /// exact type cannot be settled before seeing a value.
    pub fn has_dynamic(&self) -> bool {
        match self {
            Ty::Dynamic => true,
            Ty::Bool | Ty::Number | Ty::String => false,
            Ty::List(e) | Ty::Set(e) | Ty::Map(e) => e.has_dynamic(),
            Ty::Tuple(etys) => etys.iter().any(Ty::has_dynamic),
            Ty::Object(atys) => atys.values().any(Ty::has_dynamic),
        }
    }

    /// Short human-oriented name used in diagnostics.
    pub fn friendly_name(&self) -> String {
        match self {
            Ty::Bool => "bool".into(),
            Ty::Number => "number".into(),
            Ty::String => "string".into(),
            Ty::Dynamic => "dynamic".into(),
            Ty::List(e) => format!("list of {}", e.friendly_name()),
            Ty::Set(e) => format!("set of {}", e.friendly_name()),
            Ty::Map(e) => format!("map of {}", e.friendly_name()),
            Ty::Tuple(_) => "tuple".into(),
            Ty::Object(_) => "object".into(),
        }
    }
}

impl Display for Ty {
    /// Renders the constraint in the type-expression notation, so errors
    /// can echo back something the schema author could paste into an
    /// annotation.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Bool => f.write_str("bool"),
            Ty::Number => f.write_str("number"),
            Ty::String => f.write_str("string"),
            Ty::Dynamic => f.write_str("any"),
            Ty::List(e) => write!(f, "list({e})"),
            Ty::Set(e) => write!(f, "set({e})"),
            Ty::Map(e) => write!(f, "map({e})"),
            Ty::Tuple(etys) => {
                f.write_str("tuple([")?;
                for (i, ety) in etys.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    ety.fmt(f)?;
                }
                f.write_str("])")
            }
            Ty::Object(atys) => {
                f.write_str("object({")?;
                for (i, (name, aty)) in atys.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name} = {aty}")?;
                }
                f.write_str("})")
            }
        }
    }
}
