//! Error taxonomy for parsing, schema derivation and binding
//!
//! Every failure aborts the whole parse; there is no partial result.

use thiserror::Error;

use crate::ast::Span;
use crate::diagnostics::DiagnosticCode;

pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to parse configuration: {message} (at line:{line} pos:{column})")]
    Syntax {
        message: String,
        line: u32,
        column: u32,
    },

    #[error("Invalid configuration schema for type {type_name}: {message}")]
    Schema { type_name: String, message: String },

    #[error("Found {found} where {expected} was expected at {line}:{column}")]
    StructuralMismatch {
        found: String,
        expected: String,
        line: u32,
        column: u32,
    },

    #[error("Unexpected option '{name}' at {line}:{column}. Expected one of: [{}]", .expected.join(", "))]
    UnknownField {
        name: String,
        expected: Vec<String>,
        line: u32,
        column: u32,
    },

    #[error("Unexpected type '{actual}' at {line}:{column}. Expected: {expected}")]
    TypeMismatch {
        actual: String,
        expected: String,
        line: u32,
        column: u32,
    },

    #[error("{kind} value {text} can not be parsed (at {line}:{column})")]
    NumberDecode {
        kind: &'static str,
        text: String,
        line: u32,
        column: u32,
    },

    #[error("Unable to parse duration value:'{text}' - Not in a known format (at {line}:{column})")]
    DurationDecode { text: String, line: u32, column: u32 },

    #[error("Unable to read configuration data from source")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn schema(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn structural(found: &str, expected: impl Into<String>, span: Span) -> Self {
        Self::StructuralMismatch {
            found: found.to_string(),
            expected: expected.into(),
            line: span.line,
            column: span.column,
        }
    }

    /// 1-based (line, column) where the error was detected, if it has one
    pub fn position(&self) -> Option<(u32, u32)> {
        match self {
            Self::Syntax { line, column, .. }
            | Self::StructuralMismatch { line, column, .. }
            | Self::UnknownField { line, column, .. }
            | Self::TypeMismatch { line, column, .. }
            | Self::NumberDecode { line, column, .. }
            | Self::DurationDecode { line, column, .. } => Some((*line, *column)),
            Self::Schema { .. } | Self::Io(_) => None,
        }
    }

    pub fn code(&self) -> DiagnosticCode {
        match self {
            Self::Syntax { .. } => DiagnosticCode::SyntaxError,
            Self::Schema { .. } => DiagnosticCode::SchemaError,
            Self::StructuralMismatch { .. } => DiagnosticCode::StructuralMismatch,
            Self::UnknownField { .. } => DiagnosticCode::UnknownField,
            Self::TypeMismatch { .. } => DiagnosticCode::TypeMismatch,
            Self::NumberDecode { .. } => DiagnosticCode::NumberDecode,
            Self::DurationDecode { .. } => DiagnosticCode::DurationDecode,
            Self::Io(_) => DiagnosticCode::SourceUnreadable,
        }
    }
}
