//! Parse tree for conf documents
//!
//! The parser produces a "raw" tree where every leaf is an undecoded
//! [`Literal`]: the token text exactly as matched, tagged with the lexical
//! alternative that matched it. Decoding into typed values happens later,
//! during binding, so that decode failures can be reported against the
//! literal's position.
//!
//! ## Shape of a document
//!
//! ```text
//! Config
//!   └── Dictionary { fields }
//!         └── Field { name, value }
//!               └── ValueNode = Dictionary | Array | Literal
//! ```
//!
//! Every node keeps its [`Span`] so diagnostics can point at the source.

use serde::{Deserialize, Serialize};

// =============================================================================
// CORE AST TYPES
// =============================================================================

/// A complete document: a single root dictionary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub root: Dictionary,
}

impl Config {
    /// Number of fields in the root dictionary
    pub fn field_count(&self) -> usize {
        self.root.fields.len()
    }
}

/// `{ name: value ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    pub fields: Vec<Field>,
    pub span: Span,
}

impl Dictionary {
    /// First field with the given name, in source order
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name.name == name)
    }

    pub fn describe(&self) -> &'static str {
        "a dictionary"
    }
}

/// A single `name: value` entry of a dictionary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: Identifier,
    pub value: ValueNode,
    pub span: Span,
}

/// Field name. Quoted names are stored unescaped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

/// `[ value, value ... ]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Array {
    pub items: Vec<ValueNode>,
    pub span: Span,
}

impl Array {
    pub fn describe(&self) -> &'static str {
        "an array"
    }
}

/// Anything that may appear on the right of a `:` or inside an array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueNode {
    Dictionary(Dictionary),
    Array(Array),
    Literal(Literal),
}

impl ValueNode {
    pub fn span(&self) -> Span {
        match self {
            ValueNode::Dictionary(d) => d.span,
            ValueNode::Array(a) => a.span,
            ValueNode::Literal(l) => l.span,
        }
    }

    /// Human-readable node kind, used in structural mismatch messages
    pub fn describe(&self) -> &'static str {
        match self {
            ValueNode::Dictionary(d) => d.describe(),
            ValueNode::Array(a) => a.describe(),
            ValueNode::Literal(l) => l.kind.describe(),
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            ValueNode::Literal(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            ValueNode::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            ValueNode::Array(a) => Some(a),
            _ => None,
        }
    }
}

// =============================================================================
// LITERALS
// =============================================================================

/// An undecoded leaf token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub kind: LiteralKind,
    /// Exact matched token text (quotes and suffixes included)
    pub text: String,
    pub span: Span,
}

/// Which lexical alternative matched a literal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiteralKind {
    String,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Size,
    Duration(DurationForm),
}

impl LiteralKind {
    pub fn describe(&self) -> &'static str {
        match self {
            LiteralKind::String => "a string literal",
            LiteralKind::Integer => "an integer literal",
            LiteralKind::Long => "a long literal",
            LiteralKind::Float => "a float literal",
            LiteralKind::Double => "a double literal",
            LiteralKind::Boolean => "a boolean literal",
            LiteralKind::Size => "a size literal",
            LiteralKind::Duration(_) => "a duration literal",
        }
    }
}

/// The two duration sub-grammars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationForm {
    /// `1 hour 30 minutes`
    Simple,
    /// `PT1H30M`
    Iso8601,
}

// =============================================================================
// SPAN
// =============================================================================

/// Source location of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of start
    pub start: usize,
    /// Byte offset of end
    pub end: usize,
    /// 1-based line of `start`
    pub line: u32,
    /// 1-based column (in chars) of `start`
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}
