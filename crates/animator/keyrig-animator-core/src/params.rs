//! Parameter definitions and instance values.
//!
//! The global (name, id) definition registry lives outside this crate; the
//! runtime consumes it to seed each host's parameter table and indexes only
//! by id on the hot path. Controller assets carry instance overrides that
//! are applied on top of the seeded defaults.

use serde::{Deserialize, Serialize};

use crate::ids::ParamId;

/// External definition: a named, globally-registered parameter.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ParameterDef {
    pub name: String,
    pub id: ParamId,
}

/// Definition registry handed in by the host application.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParamRegistry {
    defs: Vec<ParameterDef>,
}

impl ParamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, id: ParamId) {
        self.defs.push(ParameterDef {
            name: name.into(),
            id,
        });
    }

    pub fn defs(&self) -> &[ParameterDef] {
        &self.defs
    }

    pub fn find(&self, name: &str) -> Option<ParamId> {
        self.defs.iter().find(|d| d.name == name).map(|d| d.id)
    }
}

/// Controller-instance override, persisted with the controller asset.
/// Ints truncate and bools/triggers encode 0/1 in the shared float store.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ParameterValue {
    pub id: ParamId,
    pub value: f32,
}
