//! Configuration parser entry point
//!
//! Reads a document from some source, derives (or fetches) the schema of the
//! requested root type and binds the two together.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::binder::bind;
use crate::error::Result;
use crate::options::ParserOptions;
use crate::parser::parse_config;
use crate::schema::Schema;
use crate::shape::Shape;

#[derive(Debug, Clone, Default)]
pub struct ConfigurationParser {
    options: ParserOptions,
}

impl ConfigurationParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParserOptions) -> Self {
        Self { options }
    }

    /// Create parser with options from the environment
    pub fn from_env() -> Self {
        Self::with_options(ParserOptions::from_env())
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Parse `text` and bind it into a new `T`
    /// The schema is derived before the text is read, so a broken target
    /// type is reported even when the document is malformed too
    pub fn parse_str<T: Shape>(&self, text: &str) -> Result<T> {
        let schema = self.schema::<T>()?;
        let config = parse_config(text)?;
        bind::<T>(&config, &schema)
    }

    /// Read the whole source, then parse it
    pub fn parse_reader<T: Shape>(&self, mut reader: impl Read) -> Result<T> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        self.parse_str(&text)
    }

    pub fn parse_file<T: Shape>(&self, path: impl AsRef<Path>) -> Result<T> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration file");
        let text = std::fs::read_to_string(path)?;
        self.parse_str(&text)
    }

    fn schema<T: Shape>(&self) -> Result<Arc<Schema>> {
        if self.options.cache_schemas {
            Schema::cached::<T>()
        } else {
            Schema::of::<T>().map(Arc::new)
        }
    }
}

/// Parse `text` into a `T` with default options
pub fn from_str<T: Shape>(text: &str) -> Result<T> {
    ConfigurationParser::new().parse_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use indexmap::IndexMap;
    use std::io::Write;

    #[test]
    fn test_parse_str_into_map() {
        let map: IndexMap<String, bool> = from_str("{ on: yes, off: disabled }").unwrap();
        assert_eq!(map["on"], true);
        assert_eq!(map["off"], false);
    }

    #[test]
    fn test_uncached_parser() {
        let parser = ConfigurationParser::with_options(ParserOptions::default().with_schema_cache(false));
        let map: IndexMap<String, i64> = parser.parse_str("{ a: 5L }").unwrap();
        assert_eq!(map["a"], 5);
    }

    #[derive(Debug, Default, conf_macros::Configurable)]
    struct BadCollection {
        #[config(collection)]
        port: i32,
    }

    #[test]
    fn test_schema_error_reported_before_syntax_error() {
        let err = from_str::<BadCollection>("{ port: ").unwrap_err();
        assert!(matches!(err, ConfigError::Schema { .. }), "{err:?}");
    }

    #[test]
    fn test_parse_reader() {
        let parser = ConfigurationParser::new();
        let map: IndexMap<String, String> = parser.parse_reader(&b"{ a: \"b\" }"[..]).unwrap();
        assert_eq!(map["a"], "b");
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ size: 10 GB }}").unwrap();
        let map: IndexMap<String, String> = ConfigurationParser::new().parse_file(file.path()).unwrap();
        assert_eq!(map["size"], "10 GB");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = ConfigurationParser::new()
            .parse_file::<IndexMap<String, String>>("/definitely/not/here.conf")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
