//! Parser for the type-expression subgrammar used by attribute
//! annotations.
//!
//! The grammar covers exactly the constraints the bridge can enforce:
//!
//! ```text
//! type     = "bool" | "number" | "string" | "any"
//!          | ("list" | "set" | "map") "(" type ")"
//!          | "tuple" "(" "[" [ type { "," type } [ "," ] ] "]" ")"
//!          | "object" "(" "{" [ attr { "," attr } [ "," ] ] "}" ")"
//! attr     = identifier "=" type
//! ```

use std::collections::BTreeMap;

use crate::error::{ConfmsgError, ConfmsgResult};
use crate::value::Ty;

/// Parses a type-expression string into a constraint.
pub fn parse(input: &str) -> ConfmsgResult<Ty> {
    let mut parser = Parser::new(input);
    let ty = parser.parse_type()?;
    parser.skip_ws();
    if !parser.is_eof() {
        return Err(parser.error("trailing characters after type expression"));
    }
    Ok(ty)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_type(&mut self) -> ConfmsgResult<Ty> {
        self.skip_ws();
        let name = self.identifier()?;
        match name.as_str() {
            "bool" => Ok(Ty::Bool),
            "number" => Ok(Ty::Number),
            "string" => Ok(Ty::String),
            "any" => Ok(Ty::Dynamic),
            "list" => Ok(Ty::list(self.parenthesized_type()?)),
            "set" => Ok(Ty::set(self.parenthesized_type()?)),
            "map" => Ok(Ty::map(self.parenthesized_type()?)),
            "tuple" => self.tuple_type(),
            "object" => self.object_type(),
            other => Err(self.error(&format!("unknown type keyword {other:?}"))),
        }
    }

    fn parenthesized_type(&mut self) -> ConfmsgResult<Ty> {
        self.expect('(')?;
        let inner = self.parse_type()?;
        self.expect(')')?;
        Ok(inner)
    }

    fn tuple_type(&mut self) -> ConfmsgResult<Ty> {
        self.expect('(')?;
        self.expect('[')?;
        let mut etys = Vec::new();
        self.skip_ws();
        if !self.consume(']') {
            loop {
                etys.push(self.parse_type()?);
                self.skip_ws();
                if self.consume(',') {
                    self.skip_ws();
                    if self.consume(']') {
                        break;
                    }
                    continue;
                }
                self.expect(']')?;
                break;
            }
        }
        self.expect(')')?;
        Ok(Ty::Tuple(etys))
    }

    fn object_type(&mut self) -> ConfmsgResult<Ty> {
        self.expect('(')?;
        self.expect('{')?;
        let mut atys = BTreeMap::new();
        self.skip_ws();
        if !self.consume('}') {
            loop {
                self.skip_ws();
                let name = self.identifier()?;
                self.expect('=')?;
                let aty = self.parse_type()?;
                if atys.insert(name.clone(), aty).is_some() {
                    return Err(self.error(&format!("duplicate attribute {name:?}")));
                }
                self.skip_ws();
                if self.consume(',') {
                    self.skip_ws();
                    if self.consume('}') {
                        break;
                    }
                    continue;
                }
                self.expect('}')?;
                break;
            }
        }
        self.expect(')')?;
        Ok(Ty::Object(atys))
    }

    fn identifier(&mut self) -> ConfmsgResult<String> {
        self.skip_ws();
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.error("identifier expected"));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn expect(&mut self, ch: char) -> ConfmsgResult<()> {
        self.skip_ws();
        if self.consume(ch) {
            Ok(())
        } else {
            Err(self.error(&format!("{ch:?} expected")))
        }
    }

    fn consume(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += ch.len_utf8();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn error(&self, message: &str) -> ConfmsgError {
        ConfmsgError::TypeExpr(format!("{message} at offset {}", self.pos))
    }
}
