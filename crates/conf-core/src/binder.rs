//! Binder
//!
//! Walks a parsed [`Config`] against a [`Schema`], keeping two explicit
//! stacks in lock-step with the document: the descriptor expected at the
//! current position, and the partially-built container receiving values.
//! Objects are constructed on entry to a dictionary, filled field by field,
//! and handed up to their parent's bind operation once complete.

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::ast::{Array, Config, Dictionary, Field, Literal, Span, ValueNode};
use crate::error::{ConfigError, Result};
use crate::literal::{self, LiteralError};
use crate::schema::{DescriptorId, ObjectDescriptor, Schema, TypeDescriptor};
use crate::shape::{ConvertFn, Shape};
use crate::value::{ObjectValue, Value, ValueMismatch};

/// Bind a parsed document into a `T` using `schema` (derived for `T`)
pub fn bind<T: Shape>(config: &Config, schema: &Schema) -> Result<T> {
    let value = Binder::new(schema).bind_config(config)?;
    T::from_value(value).map_err(|mismatch| type_mismatch(mismatch, config.root.span))
}

pub struct Binder<'s> {
    schema: &'s Schema,
    type_stack: Vec<DescriptorId>,
    value_stack: Vec<Value>,
}

impl<'s> Binder<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        Self {
            schema,
            type_stack: vec![schema.root()],
            value_stack: Vec::new(),
        }
    }

    /// Bind the whole document, returning the root container
    pub fn bind_config(mut self, config: &Config) -> Result<Value> {
        debug!(
            root = %self.schema.root_descriptor().target().name,
            "Visit configuration"
        );
        let value = self.visit_dictionary(&config.root, None)?;
        debug!(result = ?value, "Configured object");
        Ok(value)
    }

    fn current(&self) -> &'s TypeDescriptor {
        let schema = self.schema;
        let id = self.type_stack.last().copied().unwrap_or(schema.root());
        schema.descriptor(id)
    }

    // =========================================================================
    // VISITORS
    // =========================================================================

    /// `key` is the field name or map key the dictionary appeared under
    fn visit_dictionary(&mut self, dict: &Dictionary, key: Option<&str>) -> Result<Value> {
        trace!(depth = self.type_stack.len(), "Visit dictionary");
        match self.current() {
            TypeDescriptor::Object(object) => {
                let mut target = ObjectValue::new(object.target().name.clone(), object.construct());
                if let (Some(bind_key), Some(key)) = (object.key(), key) {
                    bind_key(target.as_any_mut(), Value::String(key.to_string()))
                        .map_err(|mismatch| type_mismatch(mismatch, dict.span))?;
                }
                self.value_stack.push(Value::Object(target));
                for field in &dict.fields {
                    self.visit_object_field(object, field)?;
                }
            }
            TypeDescriptor::Map {
                element, convert, ..
            } => {
                self.value_stack.push(Value::Map(IndexMap::new()));
                for field in &dict.fields {
                    self.visit_map_entry(*element, *convert, field)?;
                }
            }
            other => {
                return Err(ConfigError::structural(
                    dict.describe(),
                    other.describe(),
                    dict.span,
                ))
            }
        }
        self.pop_value(dict.span)
    }

    fn visit_object_field(&mut self, object: &ObjectDescriptor, field: &Field) -> Result<()> {
        let name = field.name.name.as_str();
        trace!(field = %name, "Visit field");

        if let Some(target_field) = object.field(name) {
            let value = self.evaluate(target_field.descriptor(), field)?;
            let target = self.top_object(field.span)?;
            (target_field.bind())(target.as_any_mut(), value)
                .map_err(|mismatch| type_mismatch(mismatch, field.value.span()))
        } else if let Some(extension) = object.extension(name) {
            let value = self.evaluate(extension.descriptor(), field)?;
            let target = self.top_object(field.span)?;
            (extension.append())(target.as_any_mut(), value)
                .map_err(|mismatch| type_mismatch(mismatch, field.value.span()))
        } else {
            Err(ConfigError::UnknownField {
                name: name.to_string(),
                expected: object.accepted_names(),
                line: field.name.span.line,
                column: field.name.span.column,
            })
        }
    }

    /// Map values are converted to the element type as they are inserted
    fn visit_map_entry(
        &mut self,
        element: DescriptorId,
        convert: ConvertFn,
        field: &Field,
    ) -> Result<()> {
        trace!(key = %field.name.name, "Visit map entry");
        let value = self.evaluate(element, field)?;
        let value =
            convert(value).map_err(|mismatch| type_mismatch(mismatch, field.value.span()))?;
        match self.value_stack.last_mut() {
            Some(Value::Map(entries)) => {
                entries.insert(field.name.name.clone(), value);
                Ok(())
            }
            _ => Err(unbalanced("a map", field.span)),
        }
    }

    fn visit_array(&mut self, array: &Array) -> Result<Value> {
        trace!(items = array.items.len(), "Visit array");
        let (element, convert) = match self.current() {
            TypeDescriptor::List {
                element, convert, ..
            } => (*element, *convert),
            other => {
                return Err(ConfigError::structural(
                    array.describe(),
                    other.describe(),
                    array.span,
                ))
            }
        };

        self.type_stack.push(element);
        self.value_stack
            .push(Value::List(Vec::with_capacity(array.items.len())));
        for item in &array.items {
            let value = self.visit_value(item, None)?;
            let value = convert(value).map_err(|mismatch| type_mismatch(mismatch, item.span()))?;
            match self.value_stack.last_mut() {
                Some(Value::List(items)) => items.push(value),
                _ => return Err(unbalanced("a list", item.span())),
            }
        }
        self.type_stack.pop();
        self.pop_value(array.span)
    }

    fn visit_value(&mut self, node: &ValueNode, key: Option<&str>) -> Result<Value> {
        match node {
            ValueNode::Dictionary(dict) => self.visit_dictionary(dict, key),
            ValueNode::Array(array) => self.visit_array(array),
            ValueNode::Literal(literal) => decode_literal(literal),
        }
    }

    /// Evaluate a field's value with `descriptor` as the expected shape
    fn evaluate(&mut self, descriptor: DescriptorId, field: &Field) -> Result<Value> {
        self.type_stack.push(descriptor);
        let value = self.visit_value(&field.value, Some(&field.name.name));
        self.type_stack.pop();
        value
    }

    // =========================================================================
    // STACK HELPERS
    // =========================================================================

    fn top_object(&mut self, span: Span) -> Result<&mut ObjectValue> {
        match self.value_stack.last_mut() {
            Some(Value::Object(object)) => Ok(object),
            _ => Err(unbalanced("an object", span)),
        }
    }

    fn pop_value(&mut self, span: Span) -> Result<Value> {
        self.value_stack
            .pop()
            .ok_or_else(|| unbalanced("a container", span))
    }
}

fn decode_literal(literal: &Literal) -> Result<Value> {
    trace!(kind = literal.kind.describe(), text = %literal.text, "Visit literal");
    let Span { line, column, .. } = literal.span;
    literal::decode(literal).map_err(|err| match err {
        LiteralError::Number { kind, text } => ConfigError::NumberDecode {
            kind,
            text,
            line,
            column,
        },
        LiteralError::Duration { text } => ConfigError::DurationDecode { text, line, column },
    })
}

fn type_mismatch(mismatch: ValueMismatch, span: Span) -> ConfigError {
    ConfigError::TypeMismatch {
        actual: mismatch.actual,
        expected: mismatch.expected,
        line: span.line,
        column: span.column,
    }
}

fn unbalanced(expected: &str, span: Span) -> ConfigError {
    ConfigError::structural("an empty value stack", expected, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Period;
    use crate::parser::parse_config;

    fn bind_str<T: Shape>(src: &str) -> Result<T> {
        let config = parse_config(src)?;
        let schema = Schema::of::<T>()?;
        bind::<T>(&config, &schema)
    }

    #[test]
    fn test_map_root() {
        let map: IndexMap<String, i32> = bind_str("{ b: 2, a: 1 }").unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn test_duplicate_map_key_keeps_last_value() {
        let map: IndexMap<String, i32> = bind_str("{ a: 1, b: 2, a: 3 }").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], 3);
    }

    #[test]
    fn test_nested_map_of_lists() {
        let map: IndexMap<String, Vec<Period>> =
            bind_str("{ waits: [1 second, PT2S] }").unwrap();
        assert_eq!(map["waits"][0].seconds, 1);
        assert_eq!(map["waits"][1].seconds, 2);
    }

    #[test]
    fn test_scalar_root_rejects_dictionary() {
        let err = bind_str::<String>("{ a: 1 }").unwrap_err();
        match err {
            ConfigError::StructuralMismatch {
                found,
                expected,
                line,
                column,
            } => {
                assert_eq!(found, "a dictionary");
                assert_eq!(expected, "a scalar (String)");
                assert_eq!((line, column), (1, 1));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_array_under_map_of_scalars() {
        let err = bind_str::<IndexMap<String, i32>>("{ a: [1] }").unwrap_err();
        assert!(matches!(err, ConfigError::StructuralMismatch { .. }));
        assert!(err.to_string().starts_with("Found an array where a scalar (Integer)"));
    }

    #[test]
    fn test_literal_type_mismatch_in_map() {
        let err = bind_str::<IndexMap<String, i32>>(r#"{ a: "x" }"#).unwrap_err();
        assert_eq!(err.to_string(), "Unexpected type 'String' at 1:6. Expected: Integer");
    }

    #[test]
    fn test_list_element_mismatch_reports_element_position() {
        let src = "{\n  ports: [80,\n    \"http\"]\n}";
        let err = bind_str::<IndexMap<String, Vec<i32>>>(src).unwrap_err();
        match err {
            ConfigError::TypeMismatch {
                actual,
                expected,
                line,
                column,
            } => {
                assert_eq!((actual.as_str(), expected.as_str()), ("String", "Integer"));
                assert_eq!((line, column), (3, 5));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_nested_map_value_mismatch_reports_value_position() {
        let src = "{ limits: { a: 1, b: yes } }";
        let err = bind_str::<IndexMap<String, IndexMap<String, i64>>>(src).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unexpected type 'Boolean' at 1:22. Expected: Long"
        );
    }

    #[test]
    fn test_literal_in_object_list_reports_item_position() {
        let err = bind_str::<IndexMap<String, Vec<Member>>>(r#"{ hosts: [{ host: "a" }, 7] }"#)
            .unwrap_err();
        assert_eq!(err.to_string(), "Unexpected type 'Integer' at 1:26. Expected: Member");
    }

    #[test]
    fn test_integer_overflow_is_number_decode_error() {
        let err = bind_str::<IndexMap<String, i32>>("{ a: 3000000000 }").unwrap_err();
        match err {
            ConfigError::NumberDecode { kind, text, .. } => {
                assert_eq!(kind, "Integer");
                assert_eq!(text, "3000000000");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[derive(Debug, Default, conf_macros::Configurable)]
    struct Pool {
        #[config(key)]
        name: String,
        size: i32,
        #[config(extension)]
        members: Vec<Member>,
    }

    #[derive(Debug, Default, conf_macros::Configurable)]
    #[config(extension_name = "member")]
    struct Member {
        host: String,
    }

    #[test]
    fn test_key_and_extension_slots() {
        let pools: IndexMap<String, Pool> = bind_str(
            r#"{ primary: { size: 2, member: { host: "a" }, member: { host: "b" } } }"#,
        )
        .unwrap();
        let pool = &pools["primary"];
        assert_eq!(pool.name, "primary");
        assert_eq!(pool.size, 2);
        let hosts: Vec<_> = pool.members.iter().map(|m| m.host.as_str()).collect();
        assert_eq!(hosts, vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_field_lists_extensions_last() {
        let err = bind_str::<Pool>("{ replicas: 1 }").unwrap_err();
        match err {
            ConfigError::UnknownField { expected, .. } => {
                assert_eq!(expected, vec!["size", "member"]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_empty_iso_duration_is_duration_error() {
        let err = bind_str::<IndexMap<String, Period>>("{ a: P }").unwrap_err();
        assert!(matches!(err, ConfigError::DurationDecode { ref text, .. } if text == "P"));
    }
}
