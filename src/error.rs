use thiserror::Error;

/// Result alias used across the crate.
pub type ConfmsgResult<T> = Result<T, ConfmsgError>;

/// Error variants surfaced by the bridge.
///
/// The taxonomy matters more than the carrier: `Schema` variants are always
/// the fault of whoever defined the message schema, never of the
/// configuration author, and the decoder reports them with a different
/// diagnostic framing than value-level problems.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfmsgError {
    /// The message descriptor carries contradictory or unsupported bridge
    /// annotations and cannot be used for the requested operation.
    #[error("unsupported message schema in {decl}: {reason}")]
    Schema { decl: String, reason: String },

    /// A configuration value does not fit the place where it is used.
    #[error("{}", attr_value_display(.path, .reason))]
    AttrValue { path: String, reason: String },

    /// A value cannot be converted to a requested type constraint.
    #[error("{0}")]
    Convert(String),

    /// A stored field payload does not decode as the declared constraint.
    #[error("invalid encoding of {ty} value as {kind}: {reason}")]
    Encoding {
        ty: String,
        kind: String,
        reason: String,
    },

    /// A raw-mode codec could not encode or decode a payload.
    #[error("{0}")]
    Codec(String),

    /// The embedded type-expression subgrammar rejected an annotation's
    /// type string.
    #[error("invalid type constraint expression: {0}")]
    TypeExpr(String),
}

impl ConfmsgError {
    /// Schema error attributed to the named declaration.
    pub fn schema(decl: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfmsgError::Schema {
            decl: decl.into(),
            reason: reason.into(),
        }
    }

    /// Value error attributed to a path inside an attribute value. An empty
    /// path means the top-level value itself is wrong.
    pub fn attr_value(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfmsgError::AttrValue {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the error is attributed to the schema author rather than
    /// the configuration author.
    pub fn is_schema(&self) -> bool {
        matches!(
            self,
            ConfmsgError::Schema { .. } | ConfmsgError::TypeExpr(_)
        )
    }
}

fn attr_value_display(path: &str, reason: &str) -> String {
    if path.is_empty() {
        format!("inappropriate value: {reason}")
    } else {
        format!("inappropriate value for {path}: {reason}")
    }
}
