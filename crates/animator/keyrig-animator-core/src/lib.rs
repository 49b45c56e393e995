//! Keyrig Animator Core (engine-agnostic)
//!
//! An embedded keyframe-animation runtime that drives numeric fields of a
//! host object graph over time: per-layer state machines with
//! parameter-gated transitions, curve-evaluated clips, write-defaults
//! restore semantics, and frame-exact event dispatch. Hosts opt in through
//! the [`Animatable`] capability trait; no per-frame discovery or lookup
//! happens on the tick path.

pub mod aggregate;
pub mod binding;
pub mod context;
pub mod curve;
pub mod data;
mod discover;
pub mod error;
pub mod host;
pub mod ids;
pub mod outputs;
pub mod params;
pub mod path;
pub mod runtime;
pub mod stored;

// Re-exports for consumers (adapters)
pub use aggregate::{AggregateField, AggregateRegistry, AggregateSpec};
pub use binding::{bind_group, BoundProperty, PropertyBinding, PropertyBindingGroup};
pub use context::AnimContext;
pub use curve::{Curve, KeyFrame, WeightedMode};
pub use data::{
    AnimEvent, Clip, ClipLib, CompareOp, Condition, Controller, EventArg, Layer, State, StateKind,
    Transition,
};
pub use error::ConfigError;
pub use host::{handle, AnimHandle, Animatable, FieldDecl, FieldKind, ScalarKind, ScalarMut, ScalarValue};
pub use ids::{ClipId, IdAllocator, LayerId, ParamId, StableId, StateId};
pub use outputs::{RuntimeEvent, TickOutputs};
pub use params::{ParamRegistry, ParameterDef, ParameterValue};
pub use path::PathSegment;
pub use runtime::{EventHandler, Runtime, SavedLayer, SavedRuntime};
pub use stored::{parse_clip_json, parse_controller_json};
