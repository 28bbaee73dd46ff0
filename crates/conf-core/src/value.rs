//! Bound values
//!
//! A [`Value`] is what the binder hands to a field's bind operation: either a
//! decoded literal, a finished target object, or a finished container.

use std::any::Any;
use std::fmt;

use indexmap::IndexMap;

use crate::literal::Period;
use crate::shape::Shape;

pub enum Value {
    String(String),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    /// Size literal text, verbatim (`1 GB`)
    Size(String),
    Duration(Period),
    Object(ObjectValue),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
}

/// A constructed target instance, type-erased while it sits on the value stack
pub struct ObjectValue {
    type_name: String,
    inner: Box<dyn Any>,
}

impl ObjectValue {
    pub fn new(type_name: impl Into<String>, inner: Box<dyn Any>) -> Self {
        Self {
            type_name: type_name.into(),
            inner,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn as_any_mut(&mut self) -> &mut dyn Any {
        self.inner.as_mut()
    }

    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        match self.inner.downcast::<T>() {
            Ok(inner) => Ok(*inner),
            Err(inner) => Err(Self {
                type_name: self.type_name,
                inner,
            }),
        }
    }
}

impl Value {
    /// Short type name used in type mismatch messages
    pub fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Integer(_) => "Integer".to_string(),
            Value::Long(_) => "Long".to_string(),
            Value::Float(_) => "Float".to_string(),
            Value::Double(_) => "Double".to_string(),
            Value::Boolean(_) => "Boolean".to_string(),
            Value::Size(_) => "Size".to_string(),
            Value::Duration(_) => "Duration".to_string(),
            Value::Object(o) => o.type_name().to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }

    /// Unwrap a constructed object of type `T`
    pub fn into_object<T: Shape>(self) -> Result<T, ValueMismatch> {
        match self {
            Value::Object(object) => object
                .downcast::<T>()
                .map_err(|object| ValueMismatch::new(object.type_name(), T::type_name())),
            other => Err(ValueMismatch::of::<T>(&other)),
        }
    }

    /// Unwrap a list element or map value, either already converted to `T`
    /// by the binder or still raw
    pub fn into_element<T: Shape>(self) -> Result<T, ValueMismatch> {
        match self {
            Value::Object(object) => match object.downcast::<T>() {
                Ok(element) => Ok(element),
                Err(object) => T::from_value(Value::Object(object)),
            },
            other => T::from_value(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            Value::Long(l) => f.debug_tuple("Long").field(l).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Double(x) => f.debug_tuple("Double").field(x).finish(),
            Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Value::Size(s) => f.debug_tuple("Size").field(s).finish(),
            Value::Duration(p) => f.debug_tuple("Duration").field(p).finish(),
            Value::Object(o) => write!(f, "Object({})", o.type_name()),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
        }
    }
}

/// A bind operation rejected a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueMismatch {
    pub actual: String,
    pub expected: String,
}

impl ValueMismatch {
    pub fn new(actual: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            actual: actual.into(),
            expected: expected.into(),
        }
    }

    /// `value` was offered where a `T` was expected
    pub fn of<T: Shape>(value: &Value) -> Self {
        Self::new(value.type_name(), T::type_name())
    }
}
