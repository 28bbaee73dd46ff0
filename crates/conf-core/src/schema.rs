//! Schema derivation
//!
//! Walks a root [`Shape`] once and produces an arena of [`TypeDescriptor`]s
//! addressed by [`DescriptorId`]. Object shapes are memoized by type: the id
//! is reserved *before* the fields are walked, so a shape that refers back to
//! itself (directly or through containers) resolves to the same descriptor
//! instead of recursing forever.
//!
//! Derived schemas can be cached process-wide with [`Schema::cached`]; the
//! cache lock is held across derivation so concurrent callers for the same
//! type observe exactly one derived schema.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::error::{ConfigError, Result};
use crate::shape::{BindFn, ConvertFn, ObjectShape, Shape, ShapeKind};

/// Index of a descriptor within its [`Schema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(usize);

impl DescriptorId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// The Rust type a descriptor binds into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetType {
    pub type_id: TypeId,
    pub name: String,
}

// =============================================================================
// DESCRIPTORS
// =============================================================================

pub enum TypeDescriptor {
    Scalar {
        target: TargetType,
    },
    Object(ObjectDescriptor),
    List {
        target: TargetType,
        element: DescriptorId,
        convert: ConvertFn,
    },
    Map {
        target: TargetType,
        element: DescriptorId,
        convert: ConvertFn,
    },
}

impl TypeDescriptor {
    pub fn target(&self) -> &TargetType {
        match self {
            TypeDescriptor::Scalar { target }
            | TypeDescriptor::List { target, .. }
            | TypeDescriptor::Map { target, .. } => target,
            TypeDescriptor::Object(object) => &object.target,
        }
    }

    pub fn has_children(&self) -> bool {
        !matches!(self, TypeDescriptor::Scalar { .. })
    }

    /// Field descriptors in declaration order, or the element descriptor
    pub fn children(&self) -> Vec<DescriptorId> {
        match self {
            TypeDescriptor::Scalar { .. } => Vec::new(),
            TypeDescriptor::Object(object) => {
                object.fields.values().map(|f| f.descriptor).collect()
            }
            TypeDescriptor::List { element, .. } | TypeDescriptor::Map { element, .. } => {
                vec![*element]
            }
        }
    }

    pub fn as_object(&self) -> Option<&ObjectDescriptor> {
        match self {
            TypeDescriptor::Object(object) => Some(object),
            _ => None,
        }
    }

    /// Phrase used in structural mismatch messages
    pub fn describe(&self) -> String {
        match self {
            TypeDescriptor::Scalar { target } => format!("a scalar ({})", target.name),
            TypeDescriptor::Object(object) => format!("an object ({})", object.target.name),
            TypeDescriptor::List { target, .. } => format!("a list ({})", target.name),
            TypeDescriptor::Map { target, .. } => format!("a map ({})", target.name),
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Scalar { target } => {
                f.debug_struct("Scalar").field("target", &target.name).finish()
            }
            TypeDescriptor::Object(object) => object.fmt(f),
            TypeDescriptor::List { target, element, .. } => f
                .debug_struct("List")
                .field("target", &target.name)
                .field("element", element)
                .finish(),
            TypeDescriptor::Map { target, element, .. } => f
                .debug_struct("Map")
                .field("target", &target.name)
                .field("element", element)
                .finish(),
        }
    }
}

pub struct ObjectDescriptor {
    target: TargetType,
    fields: IndexMap<String, FieldDescriptor>,
    key: Option<BindFn>,
    extensions: Vec<ExtensionDescriptor>,
    construct: fn() -> Box<dyn Any>,
}

impl ObjectDescriptor {
    pub fn target(&self) -> &TargetType {
        &self.target
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    pub fn extension(&self, name: &str) -> Option<&ExtensionDescriptor> {
        self.extensions.iter().find(|e| e.name == name)
    }

    pub fn extensions(&self) -> &[ExtensionDescriptor] {
        &self.extensions
    }

    pub fn has_key(&self) -> bool {
        self.key.is_some()
    }

    pub(crate) fn key(&self) -> Option<&BindFn> {
        self.key.as_ref()
    }

    /// Field names followed by extension names, as listed in unknown-field errors
    pub fn accepted_names(&self) -> Vec<String> {
        self.fields
            .keys()
            .cloned()
            .chain(self.extensions.iter().map(|e| e.name.to_string()))
            .collect()
    }

    /// Fresh default-constructed target instance
    pub fn construct(&self) -> Box<dyn Any> {
        (self.construct)()
    }
}

impl fmt::Debug for ObjectDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("target", &self.target.name)
            .field("fields", &self.fields.values().collect::<Vec<_>>())
            .field("key", &self.key.is_some())
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// A named field: wraps the descriptor of its value shape
pub struct FieldDescriptor {
    name: String,
    descriptor: DescriptorId,
    expected: String,
    bind: BindFn,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> DescriptorId {
        self.descriptor
    }

    /// Type name of the field's value shape
    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn has_children(&self, schema: &Schema) -> bool {
        schema.descriptor(self.descriptor).has_children()
    }

    pub fn children(&self, schema: &Schema) -> Vec<DescriptorId> {
        schema.descriptor(self.descriptor).children()
    }

    pub(crate) fn bind(&self) -> &BindFn {
        &self.bind
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("expected", &self.expected)
            .finish()
    }
}

/// Open extension slot: accepts child objects under their advertised name
pub struct ExtensionDescriptor {
    name: &'static str,
    descriptor: DescriptorId,
    expected: String,
    append: BindFn,
}

impl ExtensionDescriptor {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn descriptor(&self) -> DescriptorId {
        self.descriptor
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub(crate) fn append(&self) -> &BindFn {
        &self.append
    }
}

impl fmt::Debug for ExtensionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("expected", &self.expected)
            .finish()
    }
}

// =============================================================================
// SCHEMA
// =============================================================================

/// Immutable descriptor graph rooted at one shape
#[derive(Debug)]
pub struct Schema {
    descriptors: Vec<TypeDescriptor>,
    root: DescriptorId,
}

static SCHEMA_CACHE: Lazy<Mutex<HashMap<TypeId, Arc<Schema>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

impl Schema {
    /// Derive the schema for `T`
    pub fn of<T: Shape>() -> Result<Self> {
        let mut builder = SchemaBuilder::new();
        let root = builder.derive::<T>()?;
        let schema = builder.finish(root)?;
        debug!(
            root = %T::type_name(),
            descriptors = schema.len(),
            "Derived configuration schema"
        );
        Ok(schema)
    }

    /// Derive the schema for `T` once per process and share it afterwards.
    /// Failed derivations are not cached.
    pub fn cached<T: Shape>() -> Result<Arc<Self>> {
        let key = TypeId::of::<T>();
        let mut cache = SCHEMA_CACHE
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(schema) = cache.get(&key) {
            trace!(root = %T::type_name(), "Schema cache hit");
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(Self::of::<T>()?);
        cache.insert(key, Arc::clone(&schema));
        Ok(schema)
    }

    pub fn root(&self) -> DescriptorId {
        self.root
    }

    pub fn root_descriptor(&self) -> &TypeDescriptor {
        self.descriptor(self.root)
    }

    /// Look up a descriptor. Ids are only minted by this schema's builder.
    pub fn descriptor(&self, id: DescriptorId) -> &TypeDescriptor {
        &self.descriptors[id.0]
    }

    pub fn descriptors(&self) -> impl Iterator<Item = (DescriptorId, &TypeDescriptor)> {
        self.descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (DescriptorId(i), d))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

// =============================================================================
// BUILDER
// =============================================================================

/// Arena under construction. Object slots stay empty between reservation and
/// completion; a cycle back to a reserved slot just reuses its id.
#[derive(Default)]
pub struct SchemaBuilder {
    slots: Vec<Option<TypeDescriptor>>,
    registry: HashMap<TypeId, DescriptorId>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn derive<S: Shape>(&mut self) -> Result<DescriptorId> {
        self.derive_kind(TypeId::of::<S>(), S::type_name(), S::kind())
    }

    fn derive_kind(
        &mut self,
        type_id: TypeId,
        type_name: String,
        kind: ShapeKind,
    ) -> Result<DescriptorId> {
        match kind {
            ShapeKind::Scalar => {
                if let Some(&id) = self.registry.get(&type_id) {
                    return Ok(id);
                }
                let id = self.reserve(type_id);
                self.fill(id, scalar(type_id, type_name));
                Ok(id)
            }
            ShapeKind::Object(shape) => self.derive_object(shape),
            ShapeKind::List(shape) => {
                let element = (shape.derive)(self)?;
                let target = TargetType {
                    type_id,
                    name: type_name,
                };
                Ok(self.push(TypeDescriptor::List {
                    target,
                    element,
                    convert: shape.convert,
                }))
            }
            ShapeKind::Map(shape) => {
                let element = (shape.derive)(self)?;
                let target = TargetType {
                    type_id,
                    name: type_name,
                };
                Ok(self.push(TypeDescriptor::Map {
                    target,
                    element,
                    convert: shape.convert,
                }))
            }
        }
    }

    fn derive_object(&mut self, shape: ObjectShape) -> Result<DescriptorId> {
        let type_name = (shape.type_name)();
        if let Some(&id) = self.registry.get(&shape.type_id) {
            trace!(shape = %type_name, "Skipping - already scanned");
            return Ok(id);
        }

        debug!(shape = %type_name, "Scanning shape");
        let id = self.reserve(shape.type_id);
        let declaration = (shape.declare)();

        if declaration.is_empty() {
            // nothing to bind by name: treat the type as an opaque scalar
            self.fill(id, scalar(shape.type_id, type_name));
            return Ok(id);
        }

        let mut fields = IndexMap::new();
        for declared in declaration.fields {
            if fields.contains_key(&declared.name) {
                return Err(ConfigError::schema(
                    &type_name,
                    format!("field '{}' is declared more than once", declared.name),
                ));
            }
            if declared.collection && !declared.kind.is_collection() {
                return Err(ConfigError::schema(
                    &type_name,
                    format!(
                        "collection field '{}' has non-collection type {}",
                        declared.name, declared.type_name
                    ),
                ));
            }
            let expected = declared.type_name.clone();
            let descriptor =
                self.derive_kind(declared.type_id, declared.type_name, declared.kind)?;
            trace!(shape = %type_name, field = %declared.name, "Found field");
            fields.insert(
                declared.name.clone(),
                FieldDescriptor {
                    name: declared.name,
                    descriptor,
                    expected,
                    bind: declared.bind,
                },
            );
        }

        if declaration.keys.len() > 1 {
            return Err(ConfigError::schema(
                &type_name,
                "more than one self-key slot is declared",
            ));
        }
        let key = declaration.keys.into_iter().next();

        let mut extensions: Vec<ExtensionDescriptor> = Vec::new();
        for declared in declaration.extensions {
            let child = match declared.kind {
                ShapeKind::Object(child) => child,
                _ => {
                    return Err(ConfigError::schema(
                        &type_name,
                        format!("extension type {} is not an object shape", declared.type_name),
                    ))
                }
            };
            let name = (child.extension_name)().ok_or_else(|| {
                ConfigError::schema(
                    &type_name,
                    format!("extension type {} declares no extension name", declared.type_name),
                )
            })?;
            if fields.contains_key(name) || extensions.iter().any(|e| e.name == name) {
                return Err(ConfigError::schema(
                    &type_name,
                    format!("extension name '{name}' collides with another field"),
                ));
            }
            let descriptor = self.derive_object(child)?;
            extensions.push(ExtensionDescriptor {
                name,
                descriptor,
                expected: declared.type_name,
                append: declared.append,
            });
        }

        self.fill(
            id,
            TypeDescriptor::Object(ObjectDescriptor {
                target: TargetType {
                    type_id: shape.type_id,
                    name: type_name,
                },
                fields,
                key,
                extensions,
                construct: shape.construct,
            }),
        );
        Ok(id)
    }

    fn reserve(&mut self, type_id: TypeId) -> DescriptorId {
        let id = DescriptorId(self.slots.len());
        self.slots.push(None);
        self.registry.insert(type_id, id);
        id
    }

    fn fill(&mut self, id: DescriptorId, descriptor: TypeDescriptor) {
        self.slots[id.0] = Some(descriptor);
    }

    fn push(&mut self, descriptor: TypeDescriptor) -> DescriptorId {
        let id = DescriptorId(self.slots.len());
        self.slots.push(Some(descriptor));
        id
    }

    fn finish(self, root: DescriptorId) -> Result<Schema> {
        let descriptors = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| {
                slot.ok_or_else(|| {
                    ConfigError::schema("<unknown>", format!("descriptor {i} was never completed"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema { descriptors, root })
    }
}

fn scalar(type_id: TypeId, name: String) -> TypeDescriptor {
    TypeDescriptor::Scalar {
        target: TargetType { type_id, name },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{Configurable, ObjectBuilder};
    use crate::value::{Value, ValueMismatch};

    #[derive(Default)]
    struct Node {
        value: String,
        child: Option<Box<Node>>,
        children: Vec<Node>,
    }

    impl Configurable for Node {
        fn describe(shape: &mut ObjectBuilder<Self>) {
            shape
                .field("value", |n: &mut Node, v: String| n.value = v)
                .field("child", |n: &mut Node, v: Box<Node>| n.child = Some(v))
                .collection("children", |n: &mut Node, v: Vec<Node>| n.children = v);
        }
    }

    impl Shape for Node {
        fn kind() -> ShapeKind {
            ShapeKind::object::<Self>()
        }

        fn from_value(value: Value) -> std::result::Result<Self, ValueMismatch> {
            value.into_object::<Self>()
        }

        fn type_name() -> String {
            "Node".to_string()
        }
    }

    #[derive(Default)]
    struct Opaque;

    impl Configurable for Opaque {
        fn describe(_: &mut ObjectBuilder<Self>) {}
    }

    impl Shape for Opaque {
        fn kind() -> ShapeKind {
            ShapeKind::object::<Self>()
        }

        fn from_value(value: Value) -> std::result::Result<Self, ValueMismatch> {
            value.into_object::<Self>()
        }

        fn type_name() -> String {
            "Opaque".to_string()
        }
    }

    #[derive(Default)]
    struct Twice {
        a: i32,
    }

    impl Configurable for Twice {
        fn describe(shape: &mut ObjectBuilder<Self>) {
            shape
                .field("a", |t: &mut Twice, v: i32| t.a = v)
                .field("a", |t: &mut Twice, v: i32| t.a = v);
        }
    }

    impl Shape for Twice {
        fn kind() -> ShapeKind {
            ShapeKind::object::<Self>()
        }

        fn from_value(value: Value) -> std::result::Result<Self, ValueMismatch> {
            value.into_object::<Self>()
        }

        fn type_name() -> String {
            "Twice".to_string()
        }
    }

    #[test]
    fn test_recursive_shape_reuses_descriptor() {
        let schema = Schema::of::<Node>().unwrap();
        let root = schema.root_descriptor().as_object().unwrap();
        let child = root.field("child").unwrap();
        assert_eq!(child.descriptor(), schema.root());

        let children = root.field("children").unwrap();
        match schema.descriptor(children.descriptor()) {
            TypeDescriptor::List { element, .. } => assert_eq!(*element, schema.root()),
            other => panic!("expected list descriptor, got {other:?}"),
        }
    }

    #[test]
    fn test_fields_keep_declaration_order() {
        let schema = Schema::of::<Node>().unwrap();
        let root = schema.root_descriptor().as_object().unwrap();
        let names: Vec<_> = root.fields().map(|f| f.name()).collect();
        assert_eq!(names, vec!["value", "child", "children"]);
        assert_eq!(root.accepted_names(), vec!["value", "child", "children"]);
    }

    #[test]
    fn test_scalars_are_shared() {
        let schema = Schema::of::<Node>().unwrap();
        let value = schema
            .root_descriptor()
            .as_object()
            .unwrap()
            .field("value")
            .unwrap();
        assert!(!value.has_children(&schema));
        assert!(value.children(&schema).is_empty());
        // root, String, List<Node>
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn test_empty_object_degenerates_to_scalar() {
        let schema = Schema::of::<Opaque>().unwrap();
        assert!(matches!(
            schema.root_descriptor(),
            TypeDescriptor::Scalar { .. }
        ));
        assert!(!schema.root_descriptor().has_children());
    }

    #[test]
    fn test_duplicate_field_is_schema_error() {
        let err = Schema::of::<Twice>().unwrap_err();
        assert!(matches!(err, ConfigError::Schema { .. }));
        assert!(err.to_string().contains("'a'"));
    }

    #[test]
    fn test_scalar_root() {
        let schema = Schema::of::<String>().unwrap();
        assert_eq!(schema.root_descriptor().target().name, "String");
        assert_eq!(schema.root_descriptor().describe(), "a scalar (String)");
    }

    #[test]
    fn test_cached_returns_same_schema() {
        let a = Schema::cached::<Node>().unwrap();
        let b = Schema::cached::<Node>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[derive(Default, conf_macros::Configurable)]
    struct CountedCollection {
        #[config(collection)]
        count: i32,
    }

    #[derive(Default, conf_macros::Configurable)]
    struct TwoKeys {
        #[config(key)]
        name: String,
        #[config(key)]
        alias: String,
        size: i32,
    }

    #[derive(Default, conf_macros::Configurable)]
    struct ScalarExtension {
        size: i32,
        #[config(extension)]
        extras: Vec<i32>,
    }

    #[derive(Default, conf_macros::Configurable)]
    struct Unnamed {
        host: String,
    }

    #[derive(Default, conf_macros::Configurable)]
    struct UnnamedExtension {
        size: i32,
        #[config(extension)]
        extras: Vec<Unnamed>,
    }

    #[derive(Default, conf_macros::Configurable)]
    #[config(extension_name = "size")]
    struct SizeClaim {
        host: String,
    }

    #[derive(Default, conf_macros::Configurable)]
    struct ClaimsFieldName {
        size: i32,
        #[config(extension)]
        claims: Vec<SizeClaim>,
    }

    #[derive(Default, conf_macros::Configurable)]
    #[config(extension_name = "member")]
    struct MemberA {
        host: String,
    }

    #[derive(Default, conf_macros::Configurable)]
    #[config(extension_name = "member")]
    struct MemberB {
        port: i32,
    }

    #[derive(Default, conf_macros::Configurable)]
    struct ClaimsNameTwice {
        #[config(extension)]
        first: Vec<MemberA>,
        #[config(extension)]
        second: Vec<MemberB>,
    }

    fn schema_message<T: Shape>() -> (String, String) {
        match Schema::of::<T>().unwrap_err() {
            ConfigError::Schema { type_name, message } => (type_name, message),
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_collection_field_requires_collection_type() {
        let (type_name, message) = schema_message::<CountedCollection>();
        assert_eq!(type_name, "CountedCollection");
        assert!(message.contains("'count'"), "{message}");
        assert!(message.contains("Integer"), "{message}");
    }

    #[test]
    fn test_two_key_slots_is_schema_error() {
        let (type_name, message) = schema_message::<TwoKeys>();
        assert_eq!(type_name, "TwoKeys");
        assert!(message.contains("self-key"), "{message}");
    }

    #[test]
    fn test_extension_must_be_object() {
        let (_, message) = schema_message::<ScalarExtension>();
        assert!(message.contains("not an object shape"), "{message}");
    }

    #[test]
    fn test_extension_requires_extension_name() {
        let (_, message) = schema_message::<UnnamedExtension>();
        assert!(message.contains("Unnamed declares no extension name"), "{message}");
    }

    #[test]
    fn test_extension_name_colliding_with_field() {
        let (_, message) = schema_message::<ClaimsFieldName>();
        assert!(message.contains("'size'"), "{message}");
    }

    #[test]
    fn test_extension_name_claimed_twice() {
        let (_, message) = schema_message::<ClaimsNameTwice>();
        assert!(message.contains("'member'"), "{message}");
    }

    #[test]
    fn test_failed_derivation_is_not_cached() {
        assert!(Schema::cached::<TwoKeys>().is_err());
        assert!(Schema::cached::<TwoKeys>().is_err());
    }
}
