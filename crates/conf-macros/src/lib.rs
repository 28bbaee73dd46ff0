//! Procedural macros for confbind
//!
//! - `#[derive(Configurable)]` - Describe a struct's configurable fields and
//!   make it usable as a bind target

use proc_macro::TokenStream;

mod configurable;

/// Derive `Configurable` and `Shape` for a named-field struct.
///
/// The struct must implement `Default`; binding starts from a default
/// instance and sets each field the document mentions.
///
/// # Attributes
///
/// Field level:
/// - `#[config(name = "...")]` - Explicit field name (default: kebab-cased Rust name)
/// - `#[config(skip)]` - Not configurable
/// - `#[config(collection)]` - Declared collection (list or map) field
/// - `#[config(key)]` - Receives the name the object appeared under
/// - `#[config(extension)]` - On a `Vec<C>`: accepts `C` values under `C`'s extension name
///
/// Struct level:
/// - `#[config(extension_name = "...")]` - Name this type is accepted under by extension slots
///
/// # Example
///
/// ```ignore
/// #[derive(Default, Configurable)]
/// pub struct Listener {
///     #[config(key)]
///     name: String,
///     port: i32,
///     #[config(name = "tls")]
///     tls_enabled: bool,
/// }
/// ```
#[proc_macro_derive(Configurable, attributes(config))]
pub fn derive_configurable(input: TokenStream) -> TokenStream {
    configurable::derive_configurable_impl(input)
}
