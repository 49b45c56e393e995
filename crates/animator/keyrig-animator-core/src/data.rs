//! Declarative animation data model: clips, controllers, layers, states,
//! transitions, conditions.
//!
//! The graph is authored by tooling through the mutation methods here and
//! consumed by the runtime. Persisted documents reference states by stable
//! id and clips by name; [`Controller::resolve_references`] turns those into
//! live arena handles after load, purging anything unresolved.

use serde::{Deserialize, Serialize};

use crate::binding::PropertyBindingGroup;
use crate::error::ConfigError;
use crate::ids::{ClipId, IdAllocator, LayerId, ParamId, StableId, StateId};
use crate::params::ParameterValue;

/// Argument carried by a clip event.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum EventArg {
    Float(f32),
    Int(i32),
    Bool(bool),
    Text(String),
}

/// A discrete event: fires once when the layer's tick counter equals `frame`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnimEvent {
    pub frame: u32,
    /// Method reference, resolved against the host's handler table at bind
    /// time. Dispatch passes the host as the implicit first argument.
    pub method: String,
    #[serde(default)]
    pub args: Vec<EventArg>,
}

/// A timed sequence of per-field curves plus discrete events.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Clip {
    pub name: String,
    pub frame_count: u32,
    /// Whether a state playing this clip restarts at frame 0 when no
    /// transition fires at the end.
    #[serde(default = "default_true")]
    pub looping: bool,
    #[serde(default)]
    pub groups: Vec<PropertyBindingGroup>,
    #[serde(default)]
    pub events: Vec<AnimEvent>,
}

fn default_true() -> bool {
    true
}

impl Clip {
    pub fn new(name: impl Into<String>, frame_count: u32) -> Self {
        Self {
            name: name.into(),
            frame_count,
            looping: true,
            groups: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Basic invariants: a usable frame count and in-range event frames.
    pub fn validate_basic(&self) -> Result<(), String> {
        if self.frame_count == 0 {
            return Err(format!("clip '{}' has frame_count 0", self.name));
        }
        for ev in &self.events {
            if ev.frame >= self.frame_count {
                return Err(format!(
                    "clip '{}' event '{}' at frame {} is outside 0..{}",
                    self.name, ev.method, ev.frame, self.frame_count
                ));
            }
        }
        Ok(())
    }
}

/// Runtime clip library (load-time id assignment).
#[derive(Default, Debug)]
pub struct ClipLib {
    items: Vec<(ClipId, Clip)>,
    ids: IdAllocator,
}

impl ClipLib {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, clip: Clip) -> ClipId {
        let id = self.ids.alloc_clip();
        self.items.push((id, clip));
        id
    }

    pub fn get(&self, id: ClipId) -> Option<&Clip> {
        self.items
            .iter()
            .find_map(|(c, clip)| if *c == id { Some(clip) } else { None })
    }

    pub fn find_by_name(&self, name: &str) -> Option<ClipId> {
        self.items
            .iter()
            .find_map(|(id, clip)| if clip.name == name { Some(*id) } else { None })
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ClipId, Clip)> {
        self.items.iter()
    }
}

/// Comparison applied to the live float stored for a parameter id.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompareOp {
    Greater,
    Less,
    Equal,
    NotEqual,
    /// Nonzero test (bool/trigger true).
    If,
    /// Zero test.
    IfNot,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub param: ParamId,
    pub op: CompareOp,
    #[serde(default)]
    pub threshold: f32,
}

impl Condition {
    pub fn eval(&self, value: f32) -> bool {
        match self.op {
            CompareOp::Greater => value > self.threshold,
            CompareOp::Less => value < self.threshold,
            CompareOp::Equal => value == self.threshold,
            CompareOp::NotEqual => value != self.threshold,
            CompareOp::If => value != 0.0,
            CompareOp::IfNot => value == 0.0,
        }
    }
}

/// A directed, condition-gated edge between states. The target persists as a
/// stable id and is resolved to an arena handle after load.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Transition {
    /// Cross-fade length. Blended transitions are an unfinished extension
    /// point; the runtime reports them unsupported and switches instantly.
    #[serde(default)]
    pub exit_ticks: u32,
    pub target_ref: StableId,
    #[serde(skip)]
    pub target: Option<StateId>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Transition {
    pub fn to(target_ref: StableId) -> Self {
        Self {
            exit_ticks: 0,
            target_ref,
            target: None,
            conditions: Vec::new(),
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum StateKind {
    #[default]
    None,
    Default,
    Entry,
    Exit,
}

/// A node bound to at most one clip.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct State {
    pub stable_id: StableId,
    pub name: String,
    #[serde(default)]
    pub kind: StateKind,
    /// Clip reference persisted by name; resolved against the clip library.
    #[serde(default)]
    pub clip_ref: Option<String>,
    #[serde(skip)]
    pub clip: Option<ClipId>,
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default)]
    pub write_defaults: bool,
    #[serde(default)]
    pub transitions: Vec<Transition>,
    /// Source states with an edge into this one, maintained for safe
    /// removal. Rebuilt by the resolve pass.
    #[serde(skip)]
    pub incoming: Vec<StateId>,
}

fn default_speed() -> f32 {
    1.0
}

impl State {
    fn new(stable_id: StableId, name: impl Into<String>, kind: StateKind) -> Self {
        Self {
            stable_id,
            name: name.into(),
            kind,
            clip_ref: None,
            clip: None,
            speed: 1.0,
            write_defaults: false,
            transitions: Vec::new(),
            incoming: Vec::new(),
        }
    }
}

/// One independently-ticking state machine within a controller.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Layer {
    pub name: String,
    pub states: Vec<State>,
}

impl Layer {
    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id.0 as usize)
    }

    pub fn state_mut(&mut self, id: StateId) -> Option<&mut State> {
        self.states.get_mut(id.0 as usize)
    }

    pub fn find_kind(&self, kind: StateKind) -> Option<StateId> {
        self.states
            .iter()
            .position(|s| s.kind == kind)
            .map(|i| StateId(i as u32))
    }

    pub fn find_by_stable(&self, stable_id: StableId) -> Option<StateId> {
        self.states
            .iter()
            .position(|s| s.stable_id == stable_id)
            .map(|i| StateId(i as u32))
    }

    pub fn find_by_name(&self, name: &str) -> Option<StateId> {
        self.states
            .iter()
            .position(|s| s.name == name)
            .map(|i| StateId(i as u32))
    }
}

/// The persisted root asset: parameters plus layers of states.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Controller {
    pub stable_id: StableId,
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterValue>,
    #[serde(default)]
    pub layers: Vec<Layer>,
    #[serde(default)]
    next_stable: StableId,
}

impl Controller {
    pub fn new(stable_id: StableId, name: impl Into<String>) -> Self {
        Self {
            stable_id,
            name: name.into(),
            parameters: Vec::new(),
            layers: Vec::new(),
            // State stable ids are minted in a separate namespace from the
            // asset id; the serializer persists the counter.
            next_stable: 1,
        }
    }

    fn alloc_stable(&mut self) -> StableId {
        let id = self.next_stable;
        self.next_stable += 1;
        id
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.0 as usize)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(id.0 as usize)
    }

    /// Add a layer with its Entry and Exit states pre-created.
    pub fn add_layer(&mut self, name: impl Into<String>) -> LayerId {
        let entry_id = self.alloc_stable();
        let exit_id = self.alloc_stable();
        let layer = Layer {
            name: name.into(),
            states: vec![
                State::new(entry_id, "Entry", StateKind::Entry),
                State::new(exit_id, "Exit", StateKind::Exit),
            ],
        };
        self.layers.push(layer);
        LayerId(self.layers.len() as u32 - 1)
    }

    /// Add an ordinary state. The first one added to a layer becomes the
    /// Default state and an unconditional Entry transition is wired to it.
    pub fn add_state(
        &mut self,
        layer: LayerId,
        name: impl Into<String>,
        clip_ref: Option<String>,
    ) -> Result<StateId, ConfigError> {
        let stable = self.alloc_stable();
        let l = self.layer_mut(layer).ok_or(ConfigError::UnknownLayer)?;
        let mut state = State::new(stable, name, StateKind::None);
        state.clip_ref = clip_ref;

        let id = StateId(l.states.len() as u32);
        let needs_default = l.find_kind(StateKind::Default).is_none();
        if needs_default {
            state.kind = StateKind::Default;
        }
        l.states.push(state);

        if needs_default {
            if let Some(entry) = l.find_kind(StateKind::Entry) {
                let mut t = Transition::to(stable);
                t.target = Some(id);
                l.state_mut(entry)
                    .ok_or(ConfigError::UnknownState)?
                    .transitions
                    .push(t);
                l.state_mut(id)
                    .ok_or(ConfigError::UnknownState)?
                    .incoming
                    .push(entry);
            }
        }
        Ok(id)
    }

    /// Add a state carrying a special kind, enforcing one-per-layer.
    pub fn add_special_state(
        &mut self,
        layer: LayerId,
        name: impl Into<String>,
        kind: StateKind,
    ) -> Result<StateId, ConfigError> {
        let stable = self.alloc_stable();
        let l = self.layer_mut(layer).ok_or(ConfigError::UnknownLayer)?;
        if kind != StateKind::None && l.find_kind(kind).is_some() {
            return Err(ConfigError::DuplicateSpecialState(kind));
        }
        l.states.push(State::new(stable, name, kind));
        Ok(StateId(l.states.len() as u32 - 1))
    }

    /// Move the Default kind to `id`, retargeting Entry's auto transition.
    pub fn set_default_state(&mut self, layer: LayerId, id: StateId) -> Result<(), ConfigError> {
        let l = self.layer_mut(layer).ok_or(ConfigError::UnknownLayer)?;
        let new_stable = l.state(id).ok_or(ConfigError::UnknownState)?.stable_id;
        let old = l.find_kind(StateKind::Default);
        if old == Some(id) {
            return Ok(());
        }
        if let Some(old_id) = old {
            let old_stable = l.state(old_id).map(|s| s.stable_id);
            if let Some(s) = l.state_mut(old_id) {
                s.kind = StateKind::None;
            }
            if let (Some(entry), Some(old_stable)) = (l.find_kind(StateKind::Entry), old_stable) {
                if let Some(e) = l.state_mut(entry) {
                    for t in &mut e.transitions {
                        if t.target_ref == old_stable {
                            t.target_ref = new_stable;
                            t.target = Some(id);
                        }
                    }
                }
                if let Some(s) = l.state_mut(old_id) {
                    s.incoming.retain(|src| *src != entry);
                }
                if let Some(s) = l.state_mut(id) {
                    s.incoming.push(entry);
                }
            }
        }
        l.state_mut(id).ok_or(ConfigError::UnknownState)?.kind = StateKind::Default;
        Ok(())
    }

    /// Add an outgoing transition; the target is recorded both as a resolved
    /// handle and by stable id for persistence, and the reverse edge is
    /// tracked on the target.
    pub fn add_transition(
        &mut self,
        layer: LayerId,
        from: StateId,
        to: StateId,
        exit_ticks: u32,
        conditions: Vec<Condition>,
    ) -> Result<(), ConfigError> {
        let l = self.layer_mut(layer).ok_or(ConfigError::UnknownLayer)?;
        let target_ref = l.state(to).ok_or(ConfigError::UnknownState)?.stable_id;
        let source = l.state_mut(from).ok_or(ConfigError::UnknownState)?;
        source.transitions.push(Transition {
            exit_ticks,
            target_ref,
            target: Some(to),
            conditions,
        });
        l.state_mut(to)
            .ok_or(ConfigError::UnknownState)?
            .incoming
            .push(from);
        Ok(())
    }

    /// Assign a clip to a state, validated against the library.
    pub fn set_state_clip(
        &mut self,
        layer: LayerId,
        id: StateId,
        clip_name: &str,
        clips: &ClipLib,
    ) -> Result<(), ConfigError> {
        let cid = clips
            .find_by_name(clip_name)
            .ok_or_else(|| ConfigError::UnknownClip(clip_name.to_string()))?;
        let state = self
            .layer_mut(layer)
            .ok_or(ConfigError::UnknownLayer)?
            .state_mut(id)
            .ok_or(ConfigError::UnknownState)?;
        state.clip_ref = Some(clip_name.to_string());
        state.clip = Some(cid);
        Ok(())
    }

    /// Remove one outgoing transition by position, dropping the reverse edge.
    pub fn remove_transition(
        &mut self,
        layer: LayerId,
        from: StateId,
        index: usize,
    ) -> Result<(), ConfigError> {
        let l = self.layer_mut(layer).ok_or(ConfigError::UnknownLayer)?;
        let source = l.state_mut(from).ok_or(ConfigError::UnknownState)?;
        if index >= source.transitions.len() {
            return Err(ConfigError::UnknownState);
        }
        let removed = source.transitions.remove(index);
        if let Some(target) = removed.target {
            if let Some(t) = l.state_mut(target) {
                if let Some(pos) = t.incoming.iter().position(|src| *src == from) {
                    t.incoming.remove(pos);
                }
            }
        }
        Ok(())
    }

    /// Remove an ordinary state. Incoming transitions (known from the
    /// reverse edges) are dropped first, then arena indices are compacted.
    pub fn remove_state(&mut self, layer: LayerId, id: StateId) -> Result<(), ConfigError> {
        let l = self.layer_mut(layer).ok_or(ConfigError::UnknownLayer)?;
        let kind = l.state(id).ok_or(ConfigError::UnknownState)?.kind;
        if kind != StateKind::None {
            return Err(ConfigError::CannotRemoveSpecialState(kind));
        }
        let removed_stable = l.state(id).ok_or(ConfigError::UnknownState)?.stable_id;

        for state in &mut l.states {
            state
                .transitions
                .retain(|t| t.target_ref != removed_stable);
        }
        let idx = id.0 as usize;
        l.states.remove(idx);

        // Compact arena handles after the removal point.
        for state in &mut l.states {
            for t in &mut state.transitions {
                if let Some(target) = t.target {
                    if target.0 as usize > idx {
                        t.target = Some(StateId(target.0 - 1));
                    }
                }
            }
            state.incoming.retain(|src| src.0 as usize != idx);
            for src in &mut state.incoming {
                if src.0 as usize > idx {
                    *src = StateId(src.0 - 1);
                }
            }
        }
        Ok(())
    }

    /// Post-load pass: layers -> states -> transitions -> conditions.
    /// Re-resolves stable-id targets and clip names to live handles.
    /// Unresolved transitions are purged with a diagnostic; incoming lists
    /// are rebuilt from scratch.
    pub fn resolve_references(&mut self, clips: &ClipLib) {
        // Loaded documents may omit the counter; never mint an id already
        // in use.
        let max_stable = self
            .layers
            .iter()
            .flat_map(|l| l.states.iter().map(|s| s.stable_id))
            .max()
            .unwrap_or(0);
        if self.next_stable <= max_stable {
            self.next_stable = max_stable + 1;
        }

        for layer in &mut self.layers {
            for state in &mut layer.states {
                state.clip = match &state.clip_ref {
                    Some(name) => {
                        let found = clips.find_by_name(name);
                        if found.is_none() {
                            log::warn!(
                                "state '{}' references unknown clip '{}'",
                                state.name,
                                name
                            );
                        }
                        found
                    }
                    None => None,
                };
                state.incoming.clear();
            }

            let by_stable: Vec<(StableId, StateId)> = layer
                .states
                .iter()
                .enumerate()
                .map(|(i, s)| (s.stable_id, StateId(i as u32)))
                .collect();
            let lookup = |stable: StableId| {
                by_stable
                    .iter()
                    .find_map(|(sid, id)| if *sid == stable { Some(*id) } else { None })
            };

            let layer_name = layer.name.clone();
            let mut edges: Vec<(StateId, StateId)> = Vec::new();
            for (i, state) in layer.states.iter_mut().enumerate() {
                let source = StateId(i as u32);
                state.transitions.retain_mut(|t| match lookup(t.target_ref) {
                    Some(target) => {
                        t.target = Some(target);
                        edges.push((source, target));
                        true
                    }
                    None => {
                        log::warn!(
                            "purging transition to unresolved target {} in layer '{}'",
                            t.target_ref,
                            layer_name
                        );
                        false
                    }
                });
            }
            for (source, target) in edges {
                if let Some(s) = layer.state_mut(target) {
                    s.incoming.push(source);
                }
            }
        }
    }
}
