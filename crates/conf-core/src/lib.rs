//! Core of the configuration binder
//!
//! Parses a small human-oriented configuration language and binds the parsed
//! document onto strongly typed Rust values in one pass, driven by a schema
//! derived from the target type.
//!
//! - [`parser`]: document grammar, producing a position-tagged [`ast::Config`]
//! - [`literal`]: literal token decoding (numbers, booleans, sizes, durations)
//! - [`shape`] / [`schema`]: target shape contract and derived descriptor graph
//! - [`binder`]: stack-disciplined walk that type-checks and constructs
//! - [`loader`]: [`ConfigurationParser`], the usual entry point

// lets derive output use `::conf_core::` paths inside this crate's own tests
extern crate self as conf_core;

pub mod ast;
pub mod binder;
pub mod diagnostics;
pub mod error;
pub mod literal;
pub mod loader;
pub mod options;
pub mod parser;
pub mod schema;
pub mod shape;
pub mod value;

pub use ast::{Config, Span};
pub use binder::{bind, Binder};
pub use diagnostics::{Diagnostic, DiagnosticCode, LineIndex, Severity, SourceSpan};
pub use error::{ConfigError, Result};
pub use literal::Period;
pub use loader::{from_str, ConfigurationParser};
pub use options::ParserOptions;
pub use parser::parse_config;
pub use schema::{DescriptorId, Schema, TypeDescriptor};
pub use shape::{Configurable, ObjectBuilder, Shape, ShapeKind};
pub use value::{Value, ValueMismatch};
