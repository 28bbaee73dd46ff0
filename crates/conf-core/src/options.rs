//! Parser options

/// Environment variable that toggles the process-wide schema cache
pub const SCHEMA_CACHE_ENV: &str = "CONFBIND_SCHEMA_CACHE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Share derived schemas across parses of the same root type
    pub cache_schemas: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            cache_schemas: true,
        }
    }
}

impl ParserOptions {
    /// Read options from the environment, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = Self::default();
        if let Some(raw) = lookup(SCHEMA_CACHE_ENV) {
            options.cache_schemas = !matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }
        options
    }

    pub fn with_schema_cache(mut self, enabled: bool) -> Self {
        self.cache_schemas = enabled;
        self
    }
}
