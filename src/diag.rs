use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::error::ConfmsgError;

/// How serious a diagnostic is. Warnings do not stop a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A position inside a configuration source, 1-based for line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Pos {
    pub line: u32,
    pub column: u32,
    pub byte: u64,
}

impl Pos {
    pub fn new(line: u32, column: u32, byte: u64) -> Self {
        Self { line, column, byte }
    }
}

/// A half-open source region attached to diagnostics so the host can point
/// the user at the offending text.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Range {
    pub filename: String,
    pub start: Pos,
    pub end: Pos,
}

impl Range {
    pub fn new(filename: impl Into<String>, start: Pos, end: Pos) -> Self {
        Self {
            filename: filename.into(),
            start,
            end,
        }
    }

    /// Smallest range covering both inputs. Used to give an attribute
    /// diagnostic context from its name through its expression.
    pub fn between(a: &Range, b: &Range) -> Range {
        let (start, end) = if a.start.byte <= b.start.byte {
            (a.start, b.end)
        } else {
            (b.start, a.end)
        };
        Range {
            filename: a.filename.clone(),
            start,
            end,
        }
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(
                f,
                "{}:{},{}-{}",
                self.filename, self.start.line, self.start.column, self.end.column
            )
        } else {
            write!(
                f,
                "{}:{},{}-{},{}",
                self.filename, self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

/// One user-surfacing problem. `subject` covers the specific construct at
/// fault; `context` covers the wider construct it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Range>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Range>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: String::new(),
            subject: None,
            context: None,
        }
    }

    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: String::new(),
            subject: None,
            context: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_subject(mut self, range: Range) -> Self {
        self.subject = Some(range);
        self
    }

    pub fn with_context(mut self, range: Range) -> Self {
        self.context = Some(range);
        self
    }
}

/// Accumulating diagnostic list. Order is traversal order; callers must not
/// sort it, because the sequence mirrors the walk that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        self.0.push(diag);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Diagnostic> for Diagnostics {
    fn from(diag: Diagnostic) -> Self {
        Diagnostics(vec![diag])
    }
}

/// Wraps a schema-class error as a diagnostic. The summary deliberately
/// points at the schema author: these never indicate a problem with the
/// configuration text being decoded.
pub(crate) fn schema_error_diagnostic(err: &ConfmsgError) -> Diagnostic {
    Diagnostic::error("Invalid configuration schema").with_detail(format!(
        "{err}. This is a bug in the program that defined the schema, not an error in the configuration."
    ))
}
