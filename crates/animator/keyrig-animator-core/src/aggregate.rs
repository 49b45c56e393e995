//! Aggregate type registry.
//!
//! Struct-like value types (a transform, a color) are animated as one
//! semantic unit: a registered aggregate maps to an ordered list of typed
//! sub-field accessors. Registration happens once per type at startup via
//! [`AggregateRegistry::register`]; re-registration is rejected.
//!
//! Accessors are built from plain `fn` pointers over the concrete type and
//! erased behind `dyn Any` downcasts, so binding needs no per-frame lookup.

use std::any::{Any, TypeId};
use std::rc::Rc;

use hashbrown::HashMap;

use crate::error::ConfigError;
use crate::host::{ScalarKind, ScalarValue};

pub type AggregateGet = Rc<dyn Fn(&dyn Any) -> Option<ScalarValue>>;
pub type AggregateSet = Rc<dyn Fn(&mut dyn Any, f32) -> bool>;

/// One registered sub-field of an aggregate type.
#[derive(Clone)]
pub struct AggregateField {
    pub name: &'static str,
    pub kind: ScalarKind,
    pub get: AggregateGet,
    pub set: AggregateSet,
}

impl AggregateField {
    pub fn float<T: 'static>(name: &'static str, get: fn(&T) -> f32, set: fn(&mut T, f32)) -> Self {
        Self {
            name,
            kind: ScalarKind::Float,
            get: Rc::new(move |any| any.downcast_ref::<T>().map(|t| ScalarValue::Float(get(t)))),
            set: Rc::new(move |any, raw| match any.downcast_mut::<T>() {
                Some(t) => {
                    set(t, raw);
                    true
                }
                None => false,
            }),
        }
    }

    pub fn int<T: 'static>(name: &'static str, get: fn(&T) -> i32, set: fn(&mut T, i32)) -> Self {
        Self {
            name,
            kind: ScalarKind::Int,
            get: Rc::new(move |any| any.downcast_ref::<T>().map(|t| ScalarValue::Int(get(t)))),
            set: Rc::new(move |any, raw| match any.downcast_mut::<T>() {
                Some(t) => {
                    set(t, raw as i32);
                    true
                }
                None => false,
            }),
        }
    }

    pub fn bool<T: 'static>(name: &'static str, get: fn(&T) -> bool, set: fn(&mut T, bool)) -> Self {
        Self {
            name,
            kind: ScalarKind::Bool,
            get: Rc::new(move |any| any.downcast_ref::<T>().map(|t| ScalarValue::Bool(get(t)))),
            set: Rc::new(move |any, raw| match any.downcast_mut::<T>() {
                Some(t) => {
                    set(t, raw != 0.0);
                    true
                }
                None => false,
            }),
        }
    }
}

impl std::fmt::Debug for AggregateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateField")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Registered accessor table for one aggregate type.
#[derive(Clone, Debug)]
pub struct AggregateSpec {
    pub type_name: &'static str,
    pub fields: Vec<AggregateField>,
}

impl AggregateSpec {
    pub fn field(&self, name: &str) -> Option<&AggregateField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Table of aggregate value-types to their ordered sub-field accessors.
#[derive(Default)]
pub struct AggregateRegistry {
    entries: HashMap<TypeId, AggregateSpec>,
}

impl AggregateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the ordered accessor list for `T`, once. A second registration
    /// for the same type is a configuration error.
    pub fn register<T: 'static>(
        &mut self,
        type_name: &'static str,
        fields: Vec<AggregateField>,
    ) -> Result<(), ConfigError> {
        let key = TypeId::of::<T>();
        if self.entries.contains_key(&key) {
            return Err(ConfigError::DuplicateAggregate(type_name));
        }
        self.entries.insert(key, AggregateSpec { type_name, fields });
        Ok(())
    }

    pub fn lookup(&self, id: TypeId) -> Option<&AggregateSpec> {
        self.entries.get(&id)
    }

    pub fn lookup_value(&self, value: &dyn Any) -> Option<&AggregateSpec> {
        self.entries.get(&value.type_id())
    }

    pub fn is_registered(&self, id: TypeId) -> bool {
        self.entries.contains_key(&id)
    }
}

impl std::fmt::Debug for AggregateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateRegistry")
            .field("types", &self.entries.len())
            .finish()
    }
}
