//! confbind - typed configuration documents
//!
//! Parses the conf language and binds documents straight onto Rust structs.
//!
//! ```ignore
//! use confbind::{Configurable, Period};
//!
//! #[derive(Debug, Default, Configurable)]
//! struct Server {
//!     host: String,
//!     port: i32,
//!     idle_timeout: Option<Period>,
//! }
//!
//! let server: Server = confbind::from_str(r#"{ host: "localhost", port: 8080, idle-timeout: 5 minutes }"#)?;
//! ```
//!
//! The derive expands to `::conf_core::` paths, so crates using it depend on
//! `conf-core` alongside this facade.

pub use conf_core::{
    ast, binder, diagnostics, error, literal, loader, options, parser, schema, shape, value,
};
pub use conf_core::{
    bind, from_str, parse_config, Binder, Config, ConfigError, ConfigurationParser, Configurable,
    DescriptorId, Diagnostic, DiagnosticCode, LineIndex, ObjectBuilder, ParserOptions, Period,
    Result, Schema, Severity, Shape, ShapeKind, SourceSpan, Span, TypeDescriptor, Value,
    ValueMismatch,
};

/// Derive macro counterpart of the [`Configurable`] trait
pub use conf_macros::Configurable;
