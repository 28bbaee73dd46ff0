//! Diagnostics
//!
//! Serializable view of a [`ConfigError`] for tooling (the CLI's JSON output,
//! editors). Also owns the byte-offset to line/column mapping used by the
//! parser.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Diagnostic severity level. Every failure aborts the parse, so errors are
/// the only level produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
}

/// Diagnostic codes, one per error kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // =========================================================================
    // Parse errors
    // =========================================================================
    SyntaxError,

    // =========================================================================
    // Schema errors
    // =========================================================================
    SchemaError,

    // =========================================================================
    // Binding errors
    // =========================================================================
    StructuralMismatch,
    UnknownField,
    TypeMismatch,
    NumberDecode,
    DurationDecode,

    // =========================================================================
    // Source errors
    // =========================================================================
    SourceUnreadable,
}

/// Source location (1-based)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub line: u32,
    pub column: u32,
}

/// A diagnostic message with location and severity
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            span: None,
        }
    }

    /// Add span to diagnostic
    pub fn with_span(mut self, line: u32, column: u32) -> Self {
        self.span = Some(SourceSpan { line, column });
        self
    }

    pub fn from_error(error: &ConfigError) -> Self {
        let diagnostic = Self::error(error.code(), error.to_string());
        match error.position() {
            Some((line, column)) => diagnostic.with_span(line, column),
            None => diagnostic,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Precomputed line starts for fast offset -> (line, column) lookups
#[derive(Debug, Clone)]
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.char_indices()
                .filter(|(_, c)| *c == '\n')
                .map(|(i, _)| i + 1),
        );
        Self { text, line_starts }
    }

    /// Byte offset of `rest` within the indexed text (`rest` must be a suffix)
    pub fn offset_of(&self, rest: &str) -> usize {
        self.text.len().saturating_sub(rest.len())
    }

    /// Convert byte offset to 1-based line and column
    pub fn line_col(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.text.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let column = self
            .text
            .get(start..offset)
            .map(|s| s.chars().count())
            .unwrap_or(0);
        (line as u32 + 1, column as u32 + 1)
    }
}
