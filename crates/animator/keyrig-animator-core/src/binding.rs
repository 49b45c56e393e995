//! Property bindings: a curve paired with a compiled accessor for one field.
//!
//! `bind_group` runs once at state-enter time: it resolves the group's path,
//! then builds one setter/getter closure pair per binding, captured over the
//! resolved parent handle and the typed accessor. The tick loop only invokes
//! closures; there is no per-frame discovery or lookup. A binding whose
//! backing field cannot be located becomes inert (logged), never fatal.

use serde::{Deserialize, Serialize};

use crate::context::AnimContext;
use crate::curve::Curve;
use crate::host::{AnimHandle, ScalarKind, ScalarValue};
use crate::path::{self, PathSegment};

/// One animated field: label, field name, declaring type, primitive kind,
/// and the curve that drives it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PropertyBinding {
    pub label: String,
    pub name: String,
    pub declaring_type: String,
    pub kind: ScalarKind,
    #[serde(default)]
    pub curve: Curve,
}

impl PropertyBinding {
    pub fn new(name: impl Into<String>, declaring_type: impl Into<String>, kind: ScalarKind) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            declaring_type: declaring_type.into(),
            kind,
            curve: Curve::new(),
        }
    }
}

/// One semantic animatable unit: a lone scalar, or all sub-fields of a
/// registered aggregate. Owned by exactly one clip.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PropertyBindingGroup {
    /// Hops from the animation root to the owning container.
    #[serde(default)]
    pub path: Vec<PathSegment>,
    /// For aggregate groups: the container field holding the aggregate value.
    #[serde(default)]
    pub aggregate: Option<String>,
    /// Stable string id disambiguating array elements, if the container was
    /// reached through a list.
    #[serde(default)]
    pub identifier: Option<String>,
    pub bindings: Vec<PropertyBinding>,
}

impl PropertyBindingGroup {
    /// Find a binding by field name (editor convenience).
    pub fn binding_mut(&mut self, name: &str) -> Option<&mut PropertyBinding> {
        self.bindings.iter_mut().find(|b| b.name == name)
    }
}

type Setter = Box<dyn Fn(i32)>;
type Getter = Box<dyn Fn() -> Option<ScalarValue>>;

/// A binding compiled against a resolved container. Inert bindings keep
/// their slot so snapshot indices stay aligned with the group order.
pub struct BoundProperty {
    setter: Option<Setter>,
    getter: Option<Getter>,
}

impl BoundProperty {
    fn inert() -> Self {
        Self {
            setter: None,
            getter: None,
        }
    }

    pub fn is_inert(&self) -> bool {
        self.setter.is_none()
    }

    /// Evaluate the curve at `frame` and write the converted value through
    /// the accessor. No-op when inert.
    #[inline]
    pub fn apply(&self, frame: i32) {
        if let Some(set) = &self.setter {
            set(frame);
        }
    }

    /// Read the field's current value (pre-animation snapshot source).
    #[inline]
    pub fn read(&self) -> Option<ScalarValue> {
        self.getter.as_ref().and_then(|get| get())
    }
}

impl std::fmt::Debug for BoundProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundProperty")
            .field("inert", &self.is_inert())
            .finish()
    }
}

/// A restore writer paired with each bound property, used by write-defaults.
pub struct BoundRestore {
    writer: Option<Box<dyn Fn(ScalarValue)>>,
}

impl BoundRestore {
    fn inert() -> Self {
        Self { writer: None }
    }

    #[inline]
    pub fn write(&self, value: ScalarValue) {
        if let Some(w) = &self.writer {
            w(value);
        }
    }
}

/// Compile every binding of `group` against `root`. Returns one
/// (apply, restore) pair per binding, in group order.
pub fn bind_group(
    ctx: &AnimContext,
    root: &AnimHandle,
    group: &PropertyBindingGroup,
) -> Vec<(BoundProperty, BoundRestore)> {
    let Some(parent) = path::resolve(root, &group.path) else {
        log::warn!(
            "binding path '{}' did not resolve; {} binding(s) inert",
            path::display(&group.path),
            group.bindings.len()
        );
        return group
            .bindings
            .iter()
            .map(|_| (BoundProperty::inert(), BoundRestore::inert()))
            .collect();
    };

    match &group.aggregate {
        Some(field) => bind_aggregate(ctx, &parent, field, group),
        None => bind_scalars(&parent, group),
    }
}

fn bind_scalars(
    parent: &AnimHandle,
    group: &PropertyBindingGroup,
) -> Vec<(BoundProperty, BoundRestore)> {
    group
        .bindings
        .iter()
        .map(|binding| {
            // Probe once at bind time so misconfigured bindings go inert
            // here instead of failing silently every tick.
            if parent.borrow().scalar(&binding.name).is_none() {
                log::warn!(
                    "field '{}' not found on {}; binding inert",
                    binding.name,
                    parent.borrow().type_name()
                );
                return (BoundProperty::inert(), BoundRestore::inert());
            }

            let curve = binding.curve.clone();
            let set_parent = parent.clone();
            let set_name = binding.name.clone();
            let setter: Setter = Box::new(move |frame| {
                let raw = curve.evaluate(frame);
                let mut obj = set_parent.borrow_mut();
                if let Some(mut slot) = obj.scalar_mut(&set_name) {
                    slot.write_sample(raw);
                }
            });

            let get_parent = parent.clone();
            let get_name = binding.name.clone();
            let getter: Getter = Box::new(move || get_parent.borrow().scalar(&get_name));

            let restore_parent = parent.clone();
            let restore_name = binding.name.clone();
            let writer = Box::new(move |value: ScalarValue| {
                let mut obj = restore_parent.borrow_mut();
                if let Some(mut slot) = obj.scalar_mut(&restore_name) {
                    slot.restore(value);
                }
            });

            (
                BoundProperty {
                    setter: Some(setter),
                    getter: Some(getter),
                },
                BoundRestore {
                    writer: Some(writer),
                },
            )
        })
        .collect()
}

fn bind_aggregate(
    ctx: &AnimContext,
    parent: &AnimHandle,
    field: &str,
    group: &PropertyBindingGroup,
) -> Vec<(BoundProperty, BoundRestore)> {
    // Look the spec up once; the closures capture Rc accessor clones.
    let spec = {
        let obj = parent.borrow();
        match obj.aggregate(field) {
            Some(value) => ctx.aggregates().lookup_value(value).cloned(),
            None => None,
        }
    };
    let Some(spec) = spec else {
        log::warn!(
            "aggregate field '{}' on {} is missing or unregistered; {} binding(s) inert",
            field,
            parent.borrow().type_name(),
            group.bindings.len()
        );
        return group
            .bindings
            .iter()
            .map(|_| (BoundProperty::inert(), BoundRestore::inert()))
            .collect();
    };

    group
        .bindings
        .iter()
        .map(|binding| {
            let Some(accessor) = spec.field(&binding.name) else {
                log::warn!(
                    "sub-field '{}' not registered on aggregate {}; binding inert",
                    binding.name,
                    spec.type_name
                );
                return (BoundProperty::inert(), BoundRestore::inert());
            };

            let curve = binding.curve.clone();
            let set_parent = parent.clone();
            let set_field = field.to_string();
            let set_fn = accessor.set.clone();
            let setter: Setter = Box::new(move |frame| {
                let raw = curve.evaluate(frame);
                let mut obj = set_parent.borrow_mut();
                if let Some(value) = obj.aggregate_mut(&set_field) {
                    set_fn(value, raw);
                }
            });

            let get_parent = parent.clone();
            let get_field = field.to_string();
            let get_fn = accessor.get.clone();
            let getter: Getter = Box::new(move || {
                let obj = get_parent.borrow();
                obj.aggregate(&get_field).and_then(|value| get_fn(value))
            });

            let restore_parent = parent.clone();
            let restore_field = field.to_string();
            let restore_fn = accessor.set.clone();
            let writer = Box::new(move |value: ScalarValue| {
                let mut obj = restore_parent.borrow_mut();
                if let Some(slot) = obj.aggregate_mut(&restore_field) {
                    restore_fn(slot, value.as_f32());
                }
            });

            (
                BoundProperty {
                    setter: Some(setter),
                    getter: Some(getter),
                },
                BoundRestore {
                    writer: Some(writer),
                },
            )
        })
        .collect()
}
