//! Component schema, kind registry and component instances.
//!
//! A *kind* is a tagged variant keyed by a stable [`KindId`], carrying three
//! function-pointer slots (`default`, `clone`, `copy`) — the five fixed
//! primitive kinds are seeded at world construction and client code can
//! register additional kinds before any component type that uses them is
//! registered (construction-time only).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Stable identifier for a registered kind. Assigned at registration time
/// rather than derived from a name, so canonicalization and dispatch never
/// depend on name collisions.
pub type KindId = u32;

pub const KIND_NUMBER: KindId = 0;
pub const KIND_BOOLEAN: KindId = 1;
pub const KIND_STRING: KindId = 2;
pub const KIND_OPAQUE: KindId = 3;
pub const KIND_ARRAY: KindId = 4;
pub const KIND_JSON: KindId = 5;

/// The value half of a component field. `Opaque` and `Custom` hold a
/// reference-counted handle rather than a deep copy: the kind's own `clone`
/// function decides whether that handle is shared or duplicated.
#[derive(Clone)]
pub enum FieldData {
    Number(f64),
    Boolean(bool),
    String(String),
    Opaque(Rc<dyn Any>),
    Array(Vec<FieldData>),
    Json(serde_json::Value),
    Custom(Rc<dyn Any>),
}

impl fmt::Debug for FieldData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldData::Number(n) => write!(f, "Number({n})"),
            FieldData::Boolean(b) => write!(f, "Boolean({b})"),
            FieldData::String(s) => write!(f, "String({s:?})"),
            FieldData::Opaque(_) => write!(f, "Opaque(..)"),
            FieldData::Array(a) => write!(f, "Array({a:?})"),
            FieldData::Json(j) => write!(f, "Json({j})"),
            FieldData::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl PartialEq for FieldData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldData::Number(a), FieldData::Number(b)) => a == b,
            (FieldData::Boolean(a), FieldData::Boolean(b)) => a == b,
            (FieldData::String(a), FieldData::String(b)) => a == b,
            (FieldData::Array(a), FieldData::Array(b)) => a == b,
            (FieldData::Json(a), FieldData::Json(b)) => a == b,
            (FieldData::Opaque(a), FieldData::Opaque(b)) => Rc::ptr_eq(a, b),
            (FieldData::Custom(a), FieldData::Custom(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Function-pointer triple describing how a kind default-initializes,
/// clones and copies its values. Built-in kinds implement these with plain
/// functions; user-registered kinds supply their own.
pub struct KindDescriptor {
    pub id: KindId,
    pub name: &'static str,
    pub default: fn() -> FieldData,
    pub clone_value: fn(&FieldData) -> FieldData,
    pub copy_value: fn(src: &FieldData, dst: &mut FieldData, field: &str),
}

fn identity_clone(v: &FieldData) -> FieldData {
    v.clone()
}

fn identity_copy(src: &FieldData, dst: &mut FieldData, _field: &str) {
    *dst = src.clone();
}

/// Holds every registered kind, seeded with the five fixed primitives.
pub struct KindRegistry {
    kinds: HashMap<KindId, KindDescriptor>,
    next_id: KindId,
}

impl KindRegistry {
    pub fn new() -> Self {
        let mut registry = KindRegistry {
            kinds: HashMap::new(),
            next_id: 6,
        };
        registry.insert(KindDescriptor {
            id: KIND_NUMBER,
            name: "Number",
            default: || FieldData::Number(0.0),
            clone_value: identity_clone,
            copy_value: identity_copy,
        });
        registry.insert(KindDescriptor {
            id: KIND_BOOLEAN,
            name: "Boolean",
            default: || FieldData::Boolean(false),
            clone_value: identity_clone,
            copy_value: identity_copy,
        });
        registry.insert(KindDescriptor {
            id: KIND_STRING,
            name: "String",
            default: || FieldData::String(String::new()),
            clone_value: identity_clone,
            copy_value: identity_copy,
        });
        registry.insert(KindDescriptor {
            id: KIND_OPAQUE,
            name: "Opaque",
            default: || FieldData::Opaque(Rc::new(())),
            clone_value: identity_clone,
            copy_value: identity_copy,
        });
        registry.insert(KindDescriptor {
            id: KIND_ARRAY,
            name: "Array",
            default: || FieldData::Array(Vec::new()),
            clone_value: identity_clone,
            copy_value: identity_copy,
        });
        registry.insert(KindDescriptor {
            id: KIND_JSON,
            name: "JSON",
            default: || FieldData::Json(serde_json::Value::Null),
            clone_value: identity_clone,
            copy_value: identity_copy,
        });
        registry
    }

    fn insert(&mut self, descriptor: KindDescriptor) {
        self.kinds.insert(descriptor.id, descriptor);
    }

    /// Registers a user-defined kind. Returns its assigned id, or an error
    /// if a kind with the same name already exists.
    pub fn register_kind(
        &mut self,
        name: &'static str,
        default: fn() -> FieldData,
        clone_value: fn(&FieldData) -> FieldData,
        copy_value: fn(&FieldData, &mut FieldData, &str),
    ) -> crate::error::Result<KindId> {
        if self.kinds.values().any(|k| k.name == name) {
            return Err(crate::error::EcsError::DuplicateKind(name.to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;
        self.insert(KindDescriptor {
            id,
            name,
            default,
            clone_value,
            copy_value,
        });
        Ok(id)
    }

    pub fn get(&self, id: KindId) -> Option<&KindDescriptor> {
        self.kinds.get(&id)
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// One field in a component schema. `default` overrides the kind's own
/// default factory when present.
pub struct FieldSchema {
    pub name: String,
    pub kind: KindId,
    pub default: Option<FieldData>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, kind: KindId) -> Self {
        FieldSchema {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, default: FieldData) -> Self {
        self.default = Some(default);
        self
    }
}

/// Stable identifier assigned when a component type is registered with a
/// [`World`](crate::world::World).
pub type ComponentTypeId = u32;

/// A named, registered component type: its ordered schema plus the two
/// lifecycle flags (`is_system_state`, `is_tag`).
pub struct ComponentTypeDescriptor {
    pub id: ComponentTypeId,
    pub name: String,
    pub schema: Vec<FieldSchema>,
    pub is_system_state: bool,
    pub is_tag: bool,
}

impl ComponentTypeDescriptor {
    pub fn new(id: ComponentTypeId, name: impl Into<String>) -> Self {
        ComponentTypeDescriptor {
            id,
            name: name.into(),
            schema: Vec::new(),
            is_system_state: false,
            is_tag: false,
        }
    }

    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.schema.push(field);
        self
    }

    pub fn system_state(mut self) -> Self {
        self.is_system_state = true;
        self
    }

    pub fn tag(mut self) -> Self {
        self.is_tag = true;
        self
    }

    fn field_index(&self, name: &str) -> Option<usize> {
        self.schema.iter().position(|f| f.name == name)
    }
}

/// A live value populated from a [`ComponentTypeDescriptor`]'s schema
/// defaults, optionally overlaid with constructor properties.
#[derive(Clone)]
pub struct ComponentInstance {
    pub type_id: ComponentTypeId,
    fields: Vec<FieldData>,
}

impl ComponentInstance {
    /// Builds an instance from schema defaults, overlaying any field present
    /// in `props` via that field's kind's `copy` function.
    pub fn from_schema(
        descriptor: &ComponentTypeDescriptor,
        kinds: &KindRegistry,
        props: Option<&HashMap<String, FieldData>>,
    ) -> Self {
        let mut fields = Vec::with_capacity(descriptor.schema.len());
        for field in &descriptor.schema {
            let mut value = field.default.clone().unwrap_or_else(|| {
                kinds
                    .get(field.kind)
                    .map(|k| (k.default)())
                    .unwrap_or(FieldData::Json(serde_json::Value::Null))
            });
            if let Some(props) = props {
                if let Some(src) = props.get(&field.name) {
                    if let Some(descriptor) = kinds.get(field.kind) {
                        (descriptor.copy_value)(src, &mut value, &field.name);
                    } else {
                        value = src.clone();
                    }
                }
            }
            fields.push(value);
        }
        ComponentInstance {
            type_id: descriptor.id,
            fields,
        }
    }

    pub fn get(&self, descriptor: &ComponentTypeDescriptor, field: &str) -> Option<&FieldData> {
        descriptor.field_index(field).map(|idx| &self.fields[idx])
    }

    pub fn get_mut(
        &mut self,
        descriptor: &ComponentTypeDescriptor,
        field: &str,
    ) -> Option<&mut FieldData> {
        descriptor
            .field_index(field)
            .map(move |idx| &mut self.fields[idx])
    }

    pub fn set(&mut self, descriptor: &ComponentTypeDescriptor, field: &str, value: FieldData) {
        if let Some(idx) = descriptor.field_index(field) {
            self.fields[idx] = value;
        }
    }

    /// Round-trip clone — field-by-field through each kind's `clone`
    /// function, so mutating the clone never affects the source.
    pub fn clone_value(&self, descriptor: &ComponentTypeDescriptor, kinds: &KindRegistry) -> Self {
        let fields = self
            .fields
            .iter()
            .zip(&descriptor.schema)
            .map(|(value, field)| match kinds.get(field.kind) {
                Some(k) => (k.clone_value)(value),
                None => value.clone(),
            })
            .collect();
        ComponentInstance {
            type_id: self.type_id,
            fields,
        }
    }

    /// Resets this instance's fields back to schema defaults (used by
    /// `Pool::release` via `clone_from`-style reuse when a pool is present).
    pub fn reset(&mut self, descriptor: &ComponentTypeDescriptor, kinds: &KindRegistry) {
        *self = ComponentInstance::from_schema(descriptor, kinds, None);
    }
}
