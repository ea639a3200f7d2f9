//! The configuration host surface the bridge decodes from.
//!
//! A real host parses source text into bodies; this crate stays out of the
//! parsing business and instead exposes the body contract the decoder
//! drives: attributes holding expressions, labeled blocks holding nested
//! bodies, and schema-directed content extraction. Bodies are built
//! programmatically with [`BodyBuilder`], which is also how the tests
//! simulate parsed configuration.

use std::collections::HashMap;

use crate::diag::{Diagnostic, Diagnostics, Pos, Range};
use crate::value::{Ty, Value};

/// Scope chain of named values available to expression evaluation.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    variables: HashMap<String, Value>,
    parent: Option<Box<EvalContext>>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A child scope that shadows this one.
    pub fn child(self) -> Self {
        Self {
            variables: HashMap::new(),
            parent: Some(Box::new(self)),
        }
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        match self.variables.get(name) {
            Some(v) => Some(v),
            None => self.parent.as_deref().and_then(|p| p.lookup(name)),
        }
    }
}

/// An attribute expression: either a literal value or a variable reference
/// resolved against the evaluation context.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal { value: Value, range: Range },
    Variable { name: String, range: Range },
}

impl Expression {
    pub fn literal(value: Value) -> Self {
        Expression::Literal {
            value,
            range: Range::default(),
        }
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable {
            name: name.into(),
            range: Range::default(),
        }
    }

    pub fn range(&self) -> &Range {
        match self {
            Expression::Literal { range, .. } | Expression::Variable { range, .. } => range,
        }
    }

    pub(crate) fn set_range(&mut self, new: Range) {
        match self {
            Expression::Literal { range, .. } | Expression::Variable { range, .. } => *range = new,
        }
    }

    /// Evaluates the expression. An unresolvable variable yields an
    /// unknown value alongside an error diagnostic, so decoding can keep
    /// going and report every problem at once.
    pub fn value(&self, ctx: Option<&EvalContext>) -> (Value, Diagnostics) {
        match self {
            Expression::Literal { value, .. } => (value.clone(), Diagnostics::new()),
            Expression::Variable { name, range } => match ctx.and_then(|c| c.lookup(name)) {
                Some(v) => (v.clone(), Diagnostics::new()),
                None => {
                    let mut diags = Diagnostics::new();
                    diags.push(
                        Diagnostic::error("Unknown variable")
                            .with_detail(format!("There is no variable named {name:?}."))
                            .with_subject(range.clone()),
                    );
                    (Value::unknown(Ty::Dynamic), diags)
                }
            },
        }
    }
}

/// A `name = expression` entry in a body.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub expr: Expression,
    pub name_range: Range,
    pub range: Range,
}

/// A labeled block enclosing a nested body.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub type_name: String,
    pub labels: Vec<String>,
    pub label_ranges: Vec<Range>,
    pub body: Body,
    pub type_range: Range,
    pub def_range: Range,
}

/// Schema for one attribute the caller wants extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSchema {
    pub name: String,
    pub required: bool,
}

/// Schema for one block type the caller wants extracted, with the ordered
/// names of its labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeaderSchema {
    pub type_name: String,
    pub label_names: Vec<String>,
}

/// The surface schema a body is extracted against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodySchema {
    pub attributes: Vec<AttributeSchema>,
    pub blocks: Vec<BlockHeaderSchema>,
}

/// The result of schema-directed extraction.
#[derive(Debug, Clone, Default)]
pub struct BodyContent {
    pub attributes: HashMap<String, Attribute>,
    pub blocks: Vec<Block>,
}

/// The interior of a configuration block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Body {
    attributes: Vec<Attribute>,
    blocks: Vec<Block>,
    end_range: Range,
}

impl Body {
    pub fn builder() -> BodyBuilder {
        BodyBuilder::new("config")
    }

    /// Extracts the body's content against the given schema.
    ///
    /// Items the schema does not mention are diagnosed, as are blocks whose
    /// label count does not match their header schema. Everything that did
    /// match is returned even when the diagnostics contain errors, so the
    /// caller can attempt a partial decode.
    pub fn content(&self, schema: &BodySchema) -> (BodyContent, Diagnostics) {
        let mut diags = Diagnostics::new();
        let mut content = BodyContent::default();

        let known_attrs: HashMap<&str, &AttributeSchema> = schema
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a))
            .collect();
        let known_blocks: HashMap<&str, &BlockHeaderSchema> = schema
            .blocks
            .iter()
            .map(|b| (b.type_name.as_str(), b))
            .collect();

        for attr in &self.attributes {
            if known_attrs.contains_key(attr.name.as_str()) {
                content.attributes.insert(attr.name.clone(), attr.clone());
            } else {
                diags.push(
                    Diagnostic::error("Unsupported argument")
                        .with_detail(format!(
                            "An argument named {:?} is not expected here.",
                            attr.name
                        ))
                        .with_subject(attr.name_range.clone()),
                );
            }
        }

        for block in &self.blocks {
            let Some(header) = known_blocks.get(block.type_name.as_str()) else {
                diags.push(
                    Diagnostic::error("Unsupported block type")
                        .with_detail(format!(
                            "Blocks of type {:?} are not expected here.",
                            block.type_name
                        ))
                        .with_subject(block.type_range.clone()),
                );
                continue;
            };
            if block.labels.len() != header.label_names.len() {
                let summary = if block.labels.len() > header.label_names.len() {
                    format!("Extraneous label for {}", block.type_name)
                } else {
                    format!("Missing label for {}", block.type_name)
                };
                diags.push(
                    Diagnostic::error(summary)
                        .with_detail(format!(
                            "All {} blocks must have {} label(s).",
                            block.type_name,
                            header.label_names.len()
                        ))
                        .with_subject(block.type_range.clone())
                        .with_context(block.def_range.clone()),
                );
                continue;
            }
            content.blocks.push(block.clone());
        }

        (content, diags)
    }

    /// Where a "missing required item" diagnostic should point: the place
    /// an omitted item would have appeared.
    pub fn missing_item_range(&self) -> Range {
        self.end_range.clone()
    }
}

/// Builds bodies the way a host parser would, assigning each item a
/// distinct synthetic source range so diagnostics stay distinguishable.
#[derive(Debug)]
pub struct BodyBuilder {
    filename: String,
    attributes: Vec<Attribute>,
    blocks: Vec<Block>,
    next_line: u32,
}

impl BodyBuilder {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            attributes: Vec::new(),
            blocks: Vec::new(),
            next_line: 1,
        }
    }

    fn take_line(&mut self) -> u32 {
        let line = self.next_line;
        self.next_line += 1;
        line
    }

    fn range_at(&self, line: u32, start_col: u32, end_col: u32) -> Range {
        Range::new(
            self.filename.clone(),
            Pos::new(line, start_col, u64::from(line) * 100 + u64::from(start_col)),
            Pos::new(line, end_col, u64::from(line) * 100 + u64::from(end_col)),
        )
    }

    /// Adds `name = <literal value>`.
    pub fn attr(self, name: impl Into<String>, value: Value) -> Self {
        self.attr_expr(name, Expression::literal(value))
    }

    /// Adds `name = <expression>`.
    pub fn attr_expr(mut self, name: impl Into<String>, mut expr: Expression) -> Self {
        let name = name.into();
        let line = self.take_line();
        let name_len = name.len() as u32;
        let name_range = self.range_at(line, 1, 1 + name_len);
        let expr_range = self.range_at(line, name_len + 4, name_len + 14);
        expr.set_range(expr_range);
        let range = Range::between(&name_range, expr.range());
        self.attributes.push(Attribute {
            name,
            expr,
            name_range,
            range,
        });
        self
    }

    /// Adds a nested block with the given labels.
    pub fn block(mut self, type_name: impl Into<String>, labels: &[&str], body: Body) -> Self {
        let type_name = type_name.into();
        let labels: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        let line = self.take_line();
        let type_len = type_name.len() as u32;
        let type_range = self.range_at(line, 1, 1 + type_len);
        let mut col = 2 + type_len;
        let label_ranges: Vec<Range> = labels
            .iter()
            .map(|label| {
                let range = self.range_at(line, col, col + label.len() as u32 + 2);
                col += label.len() as u32 + 3;
                range
            })
            .collect();
        let def_range = self.range_at(line, 1, col + 1);
        self.blocks.push(Block {
            type_name,
            labels,
            label_ranges,
            body,
            type_range,
            def_range,
        });
        self
    }

    pub fn build(mut self) -> Body {
        let line = self.take_line();
        let end_range = self.range_at(line, 1, 1);
        Body {
            attributes: self.attributes,
            blocks: self.blocks,
            end_range,
        }
    }
}
