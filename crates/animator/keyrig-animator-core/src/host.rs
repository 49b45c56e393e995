//! Host capability contract.
//!
//! Animated objects do not implement a shared animation interface in the
//! original sense; instead each host type opts in by implementing
//! [`Animatable`], declaring its animatable fields and handing out typed
//! accessors. The host graph is a single-threaded shared graph, so handles
//! are `Rc<RefCell<dyn Animatable>>`.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Shared handle to an animatable host object.
pub type AnimHandle = Rc<RefCell<dyn Animatable>>;

/// Primitive kind of an animatable leaf field.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Float,
    Int,
    Bool,
}

/// A concrete leaf value, read back for write-defaults snapshots.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum ScalarValue {
    Float(f32),
    Int(i32),
    Bool(bool),
}

impl ScalarValue {
    #[inline]
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::Float(_) => ScalarKind::Float,
            ScalarValue::Int(_) => ScalarKind::Int,
            ScalarValue::Bool(_) => ScalarKind::Bool,
        }
    }

    /// Widen to f32 (bool encodes 0/1).
    #[inline]
    pub fn as_f32(&self) -> f32 {
        match self {
            ScalarValue::Float(v) => *v,
            ScalarValue::Int(v) => *v as f32,
            ScalarValue::Bool(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Mutable slot for one leaf field.
pub enum ScalarMut<'a> {
    Float(&'a mut f32),
    Int(&'a mut i32),
    Bool(&'a mut bool),
}

impl ScalarMut<'_> {
    #[inline]
    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarMut::Float(_) => ScalarKind::Float,
            ScalarMut::Int(_) => ScalarKind::Int,
            ScalarMut::Bool(_) => ScalarKind::Bool,
        }
    }

    /// Write a raw curve sample through the slot: int truncates, bool tests
    /// nonzero, float passes through.
    #[inline]
    pub fn write_sample(&mut self, raw: f32) {
        match self {
            ScalarMut::Float(slot) => **slot = raw,
            ScalarMut::Int(slot) => **slot = raw as i32,
            ScalarMut::Bool(slot) => **slot = raw != 0.0,
        }
    }

    /// Write a previously snapshotted value back (write-defaults restore).
    #[inline]
    pub fn restore(&mut self, value: ScalarValue) {
        match (self, value) {
            (ScalarMut::Float(slot), v) => **slot = v.as_f32(),
            (ScalarMut::Int(slot), ScalarValue::Int(v)) => **slot = v,
            (ScalarMut::Int(slot), v) => **slot = v.as_f32() as i32,
            (ScalarMut::Bool(slot), ScalarValue::Bool(v)) => **slot = v,
            (ScalarMut::Bool(slot), v) => **slot = v.as_f32() != 0.0,
        }
    }

    #[inline]
    pub fn read(&self) -> ScalarValue {
        match self {
            ScalarMut::Float(slot) => ScalarValue::Float(**slot),
            ScalarMut::Int(slot) => ScalarValue::Int(**slot),
            ScalarMut::Bool(slot) => ScalarValue::Bool(**slot),
        }
    }
}

/// Structural kind of a declared field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    Int,
    Bool,
    /// Nested animatable object (shared handle).
    Object,
    /// Ordered collection of child animatable objects.
    List,
    /// Value of a type registered in the aggregate registry.
    Aggregate,
}

impl FieldKind {
    #[inline]
    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            FieldKind::Float => Some(ScalarKind::Float),
            FieldKind::Int => Some(ScalarKind::Int),
            FieldKind::Bool => Some(ScalarKind::Bool),
            _ => None,
        }
    }
}

/// One entry in a type's animatable field table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldDecl {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Capability trait for animatable host objects. Accessor defaults return
/// `None`; a type implements only the shapes it actually exposes.
pub trait Animatable {
    fn type_name(&self) -> &'static str;

    /// Ordered declarations of this type's animatable fields.
    fn fields(&self) -> &'static [FieldDecl];

    /// Stable string identifier; required (non-empty) for list elements.
    fn stable_id(&self) -> &str {
        ""
    }

    fn scalar(&self, _name: &str) -> Option<ScalarValue> {
        None
    }

    fn scalar_mut(&mut self, _name: &str) -> Option<ScalarMut<'_>> {
        None
    }

    fn object(&self, _name: &str) -> Option<AnimHandle> {
        None
    }

    fn list(&self, _name: &str) -> Option<Vec<AnimHandle>> {
        None
    }

    fn aggregate(&self, _name: &str) -> Option<&dyn Any> {
        None
    }

    fn aggregate_mut(&mut self, _name: &str) -> Option<&mut dyn Any> {
        None
    }
}

/// Wrap a host object into a shared handle.
pub fn handle<T: Animatable + 'static>(value: T) -> AnimHandle {
    Rc::new(RefCell::new(value))
}

/// Identity key for a handle (used by the discovery cache and visited set).
#[inline]
pub(crate) fn handle_key(h: &AnimHandle) -> usize {
    Rc::as_ptr(h) as *const () as usize
}
