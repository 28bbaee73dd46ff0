//! Target shapes
//!
//! A shape is anything a document value can be bound into. Scalars and the
//! standard containers are covered here; user types become shapes by
//! implementing [`Configurable`] (usually through `#[derive(Configurable)]`),
//! which declares an ordered set of `(name, element shape, setter)` triples
//! plus the optional self-key and open extension slots.
//!
//! ```ignore
//! #[derive(Default)]
//! struct Server { host: String, port: i32 }
//!
//! impl Configurable for Server {
//!     fn describe(shape: &mut ObjectBuilder<Self>) {
//!         shape
//!             .field("host", |s: &mut Server, v: String| s.host = v)
//!             .field("port", |s: &mut Server, v: i32| s.port = v);
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::literal::Period;
use crate::schema::{DescriptorId, SchemaBuilder};
use crate::value::{ObjectValue, Value, ValueMismatch};

/// Type-erased setter: applies a bound value to a target instance
pub type BindFn = Arc<dyn Fn(&mut dyn Any, Value) -> Result<(), ValueMismatch> + Send + Sync>;

/// Derives the element descriptor of a list or map shape
pub type Deriver = fn(&mut SchemaBuilder) -> Result<DescriptorId>;

/// Converts one list element or map value into the element type, at the
/// moment it is appended or inserted
pub type ConvertFn = fn(Value) -> Result<Value, ValueMismatch>;

// =============================================================================
// TRAITS
// =============================================================================

/// A type that bound values can be converted into
pub trait Shape: Sized + 'static {
    fn kind() -> ShapeKind;

    fn from_value(value: Value) -> Result<Self, ValueMismatch>;

    /// Short name used in descriptors and error messages
    fn type_name() -> String;
}

/// A user-defined object shape with named fields
pub trait Configurable: Default + 'static {
    fn describe(shape: &mut ObjectBuilder<Self>);

    /// Name under which this type is accepted by open extension slots
    fn extension_name() -> Option<&'static str> {
        None
    }
}

/// How a shape is represented in the schema graph
#[derive(Clone, Copy)]
pub enum ShapeKind {
    Scalar,
    Object(ObjectShape),
    List(ElementShape),
    Map(ElementShape),
}

/// Element side of a list or map shape
#[derive(Clone, Copy)]
pub struct ElementShape {
    pub(crate) derive: Deriver,
    pub(crate) convert: ConvertFn,
}

impl ElementShape {
    fn of<E: Shape>() -> Self {
        Self {
            derive: derive_element::<E>,
            convert: convert_element::<E>,
        }
    }
}

impl ShapeKind {
    pub fn object<T: Configurable + Shape>() -> Self {
        ShapeKind::Object(ObjectShape::of::<T>())
    }

    pub fn list<E: Shape>() -> Self {
        ShapeKind::List(ElementShape::of::<E>())
    }

    pub fn map<E: Shape>() -> Self {
        ShapeKind::Map(ElementShape::of::<E>())
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, ShapeKind::List(_) | ShapeKind::Map(_))
    }
}

fn derive_element<E: Shape>(builder: &mut SchemaBuilder) -> Result<DescriptorId> {
    builder.derive::<E>()
}

/// Converted elements travel as erased `E` instances until the container
/// itself is converted
fn convert_element<E: Shape>(value: Value) -> Result<Value, ValueMismatch> {
    let element = E::from_value(value)?;
    Ok(Value::Object(ObjectValue::new(E::type_name(), Box::new(element))))
}

/// Erased entry points of a [`Configurable`] type
#[derive(Clone, Copy)]
pub struct ObjectShape {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: fn() -> String,
    pub(crate) declare: fn() -> ObjectDeclaration,
    pub(crate) construct: fn() -> Box<dyn Any>,
    pub(crate) extension_name: fn() -> Option<&'static str>,
}

impl ObjectShape {
    pub fn of<T: Configurable + Shape>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: T::type_name,
            declare: declare::<T>,
            construct: construct::<T>,
            extension_name: T::extension_name,
        }
    }
}

fn declare<T: Configurable>() -> ObjectDeclaration {
    let mut builder = ObjectBuilder::<T>::new();
    T::describe(&mut builder);
    builder.declaration
}

fn construct<T: Configurable>() -> Box<dyn Any> {
    Box::new(T::default())
}

// =============================================================================
// OBJECT BUILDER
// =============================================================================

/// What a [`Configurable`] declared, before derivation
#[derive(Default)]
pub(crate) struct ObjectDeclaration {
    pub(crate) fields: Vec<DeclaredField>,
    pub(crate) keys: Vec<BindFn>,
    pub(crate) extensions: Vec<DeclaredExtension>,
}

impl ObjectDeclaration {
    pub(crate) fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.keys.is_empty() && self.extensions.is_empty()
    }
}

pub(crate) struct DeclaredField {
    pub(crate) name: String,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: String,
    pub(crate) kind: ShapeKind,
    pub(crate) bind: BindFn,
    pub(crate) collection: bool,
}

pub(crate) struct DeclaredExtension {
    pub(crate) type_name: String,
    pub(crate) kind: ShapeKind,
    pub(crate) append: BindFn,
}

/// Collects the field declarations of a [`Configurable`] type
pub struct ObjectBuilder<T> {
    declaration: ObjectDeclaration,
    _target: PhantomData<fn(&mut T)>,
}

impl<T: 'static> ObjectBuilder<T> {
    fn new() -> Self {
        Self {
            declaration: ObjectDeclaration::default(),
            _target: PhantomData,
        }
    }

    /// Declare a named field bound through `set`
    pub fn field<V: Shape>(
        &mut self,
        name: &str,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> &mut Self {
        self.push_field::<V>(name, erase(set), false)
    }

    /// Declare a named collection field. The value shape must be list- or
    /// map-kinded; anything else is rejected when the schema is derived.
    pub fn collection<V: Shape>(
        &mut self,
        name: &str,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> &mut Self {
        self.push_field::<V>(name, erase(set), true)
    }

    /// Declare the self-key slot: receives the field name or map key under
    /// which the object appeared
    pub fn key(&mut self, set: impl Fn(&mut T, String) + Send + Sync + 'static) -> &mut Self {
        self.declaration.keys.push(erase(set));
        self
    }

    /// Declare an open extension slot accepting `C` values under `C`'s
    /// extension name, appended through `append`
    pub fn extension<C: Shape>(
        &mut self,
        append: impl Fn(&mut T, C) + Send + Sync + 'static,
    ) -> &mut Self {
        self.declaration.extensions.push(DeclaredExtension {
            type_name: C::type_name(),
            kind: C::kind(),
            append: erase(append),
        });
        self
    }

    fn push_field<V: Shape>(&mut self, name: &str, bind: BindFn, collection: bool) -> &mut Self {
        self.declaration.fields.push(DeclaredField {
            name: name.to_string(),
            type_id: TypeId::of::<V>(),
            type_name: V::type_name(),
            kind: V::kind(),
            bind,
            collection,
        });
        self
    }
}

fn erase<T: 'static, V: Shape>(set: impl Fn(&mut T, V) + Send + Sync + 'static) -> BindFn {
    Arc::new(move |target: &mut dyn Any, value: Value| {
        let target = target
            .downcast_mut::<T>()
            .ok_or_else(|| ValueMismatch::new("foreign target", std::any::type_name::<T>()))?;
        set(target, V::from_value(value)?);
        Ok(())
    })
}

// =============================================================================
// SCALARS
// =============================================================================

impl Shape for String {
    fn kind() -> ShapeKind {
        ShapeKind::Scalar
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        match value {
            Value::String(s) | Value::Size(s) => Ok(s),
            other => Err(ValueMismatch::of::<Self>(&other)),
        }
    }

    fn type_name() -> String {
        "String".to_string()
    }
}

impl Shape for i32 {
    fn kind() -> ShapeKind {
        ShapeKind::Scalar
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        match value {
            Value::Integer(i) => Ok(i),
            other => Err(ValueMismatch::of::<Self>(&other)),
        }
    }

    fn type_name() -> String {
        "Integer".to_string()
    }
}

impl Shape for i64 {
    fn kind() -> ShapeKind {
        ShapeKind::Scalar
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        match value {
            Value::Long(l) => Ok(l),
            Value::Integer(i) => Ok(i64::from(i)),
            other => Err(ValueMismatch::of::<Self>(&other)),
        }
    }

    fn type_name() -> String {
        "Long".to_string()
    }
}

impl Shape for f32 {
    fn kind() -> ShapeKind {
        ShapeKind::Scalar
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Integer(i) => Ok(i as f32),
            other => Err(ValueMismatch::of::<Self>(&other)),
        }
    }

    fn type_name() -> String {
        "Float".to_string()
    }
}

impl Shape for f64 {
    fn kind() -> ShapeKind {
        ShapeKind::Scalar
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        match value {
            Value::Double(d) => Ok(d),
            Value::Float(f) => Ok(f64::from(f)),
            Value::Integer(i) => Ok(f64::from(i)),
            other => Err(ValueMismatch::of::<Self>(&other)),
        }
    }

    fn type_name() -> String {
        "Double".to_string()
    }
}

impl Shape for bool {
    fn kind() -> ShapeKind {
        ShapeKind::Scalar
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        match value {
            Value::Boolean(b) => Ok(b),
            other => Err(ValueMismatch::of::<Self>(&other)),
        }
    }

    fn type_name() -> String {
        "Boolean".to_string()
    }
}

impl Shape for Period {
    fn kind() -> ShapeKind {
        ShapeKind::Scalar
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        match value {
            Value::Duration(p) => Ok(p),
            other => Err(ValueMismatch::of::<Self>(&other)),
        }
    }

    fn type_name() -> String {
        "Duration".to_string()
    }
}

// =============================================================================
// WRAPPERS & CONTAINERS
// =============================================================================

/// Lets a field stay `None` when the document omits it
impl<T: Shape> Shape for Option<T> {
    fn kind() -> ShapeKind {
        T::kind()
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        T::from_value(value).map(Some)
    }

    fn type_name() -> String {
        T::type_name()
    }
}

/// Needed for self-referential shapes (`child: Option<Box<Self>>`)
impl<T: Shape> Shape for Box<T> {
    fn kind() -> ShapeKind {
        T::kind()
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        T::from_value(value).map(Box::new)
    }

    fn type_name() -> String {
        T::type_name()
    }
}

impl<T: Shape> Shape for Vec<T> {
    fn kind() -> ShapeKind {
        ShapeKind::list::<T>()
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        match value {
            Value::List(items) => items.into_iter().map(Value::into_element::<T>).collect(),
            other => Err(ValueMismatch::of::<Self>(&other)),
        }
    }

    fn type_name() -> String {
        format!("List<{}>", T::type_name())
    }
}

fn map_entries<T: Shape, M>(value: Value) -> Result<M, ValueMismatch>
where
    M: FromIterator<(String, T)> + Shape,
{
    match value {
        Value::Map(entries) => entries
            .into_iter()
            .map(|(key, value)| Ok((key, value.into_element::<T>()?)))
            .collect(),
        other => Err(ValueMismatch::of::<M>(&other)),
    }
}

impl<T: Shape> Shape for IndexMap<String, T> {
    fn kind() -> ShapeKind {
        ShapeKind::map::<T>()
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        map_entries::<T, Self>(value)
    }

    fn type_name() -> String {
        format!("Map<String, {}>", T::type_name())
    }
}

impl<T: Shape> Shape for HashMap<String, T> {
    fn kind() -> ShapeKind {
        ShapeKind::map::<T>()
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        map_entries::<T, Self>(value)
    }

    fn type_name() -> String {
        format!("Map<String, {}>", T::type_name())
    }
}

impl<T: Shape> Shape for BTreeMap<String, T> {
    fn kind() -> ShapeKind {
        ShapeKind::map::<T>()
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        map_entries::<T, Self>(value)
    }

    fn type_name() -> String {
        format!("Map<String, {}>", T::type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_widening() {
        assert_eq!(i64::from_value(Value::Integer(7)), Ok(7));
        assert_eq!(f64::from_value(Value::Float(1.5)), Ok(1.5));
        assert_eq!(f32::from_value(Value::Integer(2)), Ok(2.0));
        assert_eq!(String::from_value(Value::Size("1 GB".into())), Ok("1 GB".into()));
    }

    #[test]
    fn test_scalar_narrowing_is_rejected() {
        assert_eq!(
            i32::from_value(Value::Long(1)),
            Err(ValueMismatch::new("Long", "Integer"))
        );
        assert_eq!(
            bool::from_value(Value::String("yes".into())),
            Err(ValueMismatch::new("String", "Boolean"))
        );
    }

    #[test]
    fn test_list_conversion_reports_element_mismatch() {
        let list = Value::List(vec![Value::Integer(1), Value::String("two".into())]);
        assert_eq!(
            Vec::<i32>::from_value(list),
            Err(ValueMismatch::new("String", "Integer"))
        );
        assert_eq!(
            Vec::<i32>::from_value(Value::Integer(1)),
            Err(ValueMismatch::new("Integer", "List<Integer>"))
        );
    }

    #[test]
    fn test_map_conversion_keeps_entries() {
        let mut entries = IndexMap::new();
        entries.insert("b".to_string(), Value::Integer(2));
        entries.insert("a".to_string(), Value::Integer(1));
        let map = IndexMap::<String, i32>::from_value(Value::Map(entries)).unwrap();
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["b", "a"]);

        let mut entries = IndexMap::new();
        entries.insert("a".to_string(), Value::Integer(1));
        let map = BTreeMap::<String, i64>::from_value(Value::Map(entries)).unwrap();
        assert_eq!(map.get("a"), Some(&1));
    }

    #[test]
    fn test_wrapper_type_names_are_transparent() {
        assert_eq!(<Option<Box<i32>>>::type_name(), "Integer");
        assert_eq!(<HashMap<String, Vec<bool>>>::type_name(), "Map<String, List<Boolean>>");
    }

    #[test]
    fn test_kinds() {
        assert!(matches!(String::kind(), ShapeKind::Scalar));
        assert!(<Vec<String>>::kind().is_collection());
        assert!(<BTreeMap<String, String>>::kind().is_collection());
        assert!(!<Option<i32>>::kind().is_collection());
    }
}
