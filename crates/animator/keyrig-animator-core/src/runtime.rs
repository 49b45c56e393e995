//! Runtime manager: per-host execution engine.
//!
//! One `Runtime` per animated host. Each tick it advances every layer's
//! state machine: invalid states are passed over, finished clips try their
//! outgoing transitions (first-match-wins), and active clips apply their
//! bound setters and dispatch frame-exact events. Everything is synchronous
//! and single-threaded; "no transition fired this tick" is normal.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::binding::{bind_group, BoundProperty, BoundRestore};
use crate::context::AnimContext;
use crate::data::{AnimEvent, Clip, ClipLib, Controller, EventArg, StateKind};
use crate::error::ConfigError;
use crate::host::{AnimHandle, ScalarValue};
use crate::ids::{ClipId, LayerId, ParamId, StableId, StateId};
use crate::outputs::{RuntimeEvent, TickOutputs};
use crate::params::ParamRegistry;

/// Handler invoked for a clip event; the host is the implicit first argument.
pub type EventHandler = Box<dyn Fn(&AnimHandle, &[EventArg])>;

/// Live per-layer sequencing state.
struct LayerRuntime {
    active: Option<StateId>,
    frame: u32,
    /// Fractional frame budget left over from state speed scaling.
    step_accum: f32,
    /// Bindings resolved at state-enter time, kept for the active lifetime.
    bound: Vec<(BoundProperty, BoundRestore)>,
    /// Pre-entry field values, captured when the state has write-defaults.
    snapshots: Vec<Option<ScalarValue>>,
}

impl LayerRuntime {
    fn new(active: Option<StateId>) -> Self {
        Self {
            active,
            frame: 0,
            step_accum: 0.0,
            bound: Vec::new(),
            snapshots: Vec::new(),
        }
    }
}

/// Persisted slice of runtime state, round-tripped through the host's
/// save/load mechanism.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SavedRuntime {
    pub params: Vec<(u16, f32)>,
    pub layers: Vec<SavedLayer>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SavedLayer {
    pub frame: u32,
    pub active: Option<StableId>,
}

pub struct Runtime {
    host: AnimHandle,
    controller: Controller,
    clips: ClipLib,
    params: HashMap<ParamId, f32>,
    layers: Vec<LayerRuntime>,
    handlers: HashMap<String, EventHandler>,
    outputs: TickOutputs,
}

impl Runtime {
    /// Build a runtime for one host. The controller's stable references are
    /// resolved against `clips`, and the parameter table is seeded from the
    /// global definitions then overridden by controller-instance values.
    pub fn new(
        host: AnimHandle,
        mut controller: Controller,
        clips: ClipLib,
        defs: &ParamRegistry,
    ) -> Self {
        controller.resolve_references(&clips);

        let mut params = HashMap::new();
        for def in defs.defs() {
            params.insert(def.id, 0.0);
        }
        for pv in &controller.parameters {
            params.insert(pv.id, pv.value);
        }

        let layers = controller
            .layers
            .iter()
            .map(|l| LayerRuntime::new(l.find_kind(StateKind::Entry)))
            .collect();

        Self {
            host,
            controller,
            clips,
            params,
            layers,
            handlers: HashMap::new(),
            outputs: TickOutputs::default(),
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn clips(&self) -> &ClipLib {
        &self.clips
    }

    /// Load an additional clip; basic invariant violations are logged, the
    /// clip is stored regardless so tooling can fix it up.
    pub fn load_clip(&mut self, clip: Clip) -> ClipId {
        if let Err(msg) = clip.validate_basic() {
            log::warn!("{msg}");
        }
        let id = self.clips.insert(clip);
        self.controller.resolve_references(&self.clips);
        id
    }

    /// Bind a named method for event dispatch. Clips referencing methods
    /// with no handler are reported when their state binds.
    pub fn register_handler(&mut self, method: impl Into<String>, handler: EventHandler) {
        self.handlers.insert(method.into(), handler);
    }

    pub fn active_state(&self, layer: LayerId) -> Option<StateId> {
        self.layers.get(layer.0 as usize).and_then(|l| l.active)
    }

    pub fn layer_frame(&self, layer: LayerId) -> Option<u32> {
        self.layers.get(layer.0 as usize).map(|l| l.frame)
    }

    /// Cross-fades exist in the data model but have no tick semantics yet.
    pub fn cross_fade(
        &mut self,
        _layer: LayerId,
        _target: StateId,
        _exit_ticks: u32,
    ) -> Result<(), ConfigError> {
        Err(ConfigError::CrossFadeUnsupported)
    }

    // ---- parameters -----------------------------------------------------

    fn write_param(&mut self, id: ParamId, value: f32) {
        if !self.params.contains_key(&id) {
            log::warn!("parameter id {} was never seeded; write applied", id.0);
        }
        self.params.insert(id, value);
    }

    pub fn set_float(&mut self, id: ParamId, value: f32) {
        self.write_param(id, value);
    }

    pub fn set_int(&mut self, id: ParamId, value: i32) {
        self.write_param(id, value as f32);
    }

    pub fn set_bool(&mut self, id: ParamId, value: bool) {
        self.write_param(id, if value { 1.0 } else { 0.0 });
    }

    pub fn set_trigger(&mut self, id: ParamId) {
        self.write_param(id, 1.0);
    }

    pub fn reset_trigger(&mut self, id: ParamId) {
        self.write_param(id, 0.0);
    }

    pub fn get_float(&self, id: ParamId) -> f32 {
        self.params.get(&id).copied().unwrap_or(0.0)
    }

    pub fn get_int(&self, id: ParamId) -> i32 {
        self.get_float(id) as i32
    }

    pub fn get_bool(&self, id: ParamId) -> bool {
        self.get_float(id) != 0.0
    }

    // ---- persistence ----------------------------------------------------

    pub fn save(&self) -> SavedRuntime {
        let mut params: Vec<(u16, f32)> = self.params.iter().map(|(id, v)| (id.0, *v)).collect();
        params.sort_by_key(|(id, _)| *id);
        let layers = self
            .layers
            .iter()
            .enumerate()
            .map(|(li, rt)| SavedLayer {
                frame: rt.frame,
                active: rt
                    .active
                    .and_then(|sid| self.controller.layers[li].state(sid))
                    .map(|s| s.stable_id),
            })
            .collect();
        SavedRuntime { params, layers }
    }

    pub fn restore(&mut self, ctx: &AnimContext, saved: &SavedRuntime) {
        for (id, value) in &saved.params {
            self.params.insert(ParamId(*id), *value);
        }
        let count = self.layers.len().min(saved.layers.len());
        for li in 0..count {
            let Some(stable) = saved.layers[li].active else {
                continue;
            };
            match self.controller.layers[li].find_by_stable(stable) {
                Some(sid) => {
                    self.set_state(ctx, li, sid);
                    self.layers[li].frame = saved.layers[li].frame;
                }
                None => {
                    log::warn!("saved state {stable} no longer exists in layer {li}");
                }
            }
        }
    }

    // ---- ticking --------------------------------------------------------

    /// Advance every layer by one logical frame.
    pub fn tick(&mut self, ctx: &AnimContext) -> &TickOutputs {
        self.outputs.clear();
        for li in 0..self.layers.len() {
            self.tick_layer(ctx, li);
        }
        &self.outputs
    }

    fn tick_layer(&mut self, ctx: &AnimContext, li: usize) {
        let clip = self.active_clip(li);
        match clip {
            // Invalid state: passed over immediately.
            None => self.start_next_state(ctx, li),
            Some((cid, frame_count)) => {
                if self.layers[li].frame >= frame_count {
                    self.start_next_state(ctx, li);
                } else {
                    self.advance(li, cid, frame_count);
                }
            }
        }
    }

    /// The active state's clip, when present and loaded.
    fn active_clip(&self, li: usize) -> Option<(ClipId, u32)> {
        let sid = self.layers[li].active?;
        let cid = self.controller.layers[li].state(sid)?.clip?;
        let clip = self.clips.get(cid)?;
        Some((cid, clip.frame_count))
    }

    fn advance(&mut self, li: usize, cid: ClipId, frame_count: u32) {
        let speed = self.layers[li]
            .active
            .and_then(|sid| self.controller.layers[li].state(sid))
            .map(|s| s.speed.max(0.0))
            .unwrap_or(1.0);

        let mut steps = {
            let rt = &mut self.layers[li];
            rt.step_accum += speed;
            let whole = rt.step_accum.floor() as u32;
            rt.step_accum -= whole as f32;
            whole
        };

        while steps > 0 && self.layers[li].frame < frame_count {
            let frame = self.layers[li].frame;
            for (prop, _) in &self.layers[li].bound {
                prop.apply(frame as i32);
            }
            let due: Vec<AnimEvent> = self
                .clips
                .get(cid)
                .map(|clip| {
                    clip.events
                        .iter()
                        .filter(|ev| ev.frame == frame)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            for ev in due {
                self.dispatch_event(LayerId(li as u32), &ev);
            }
            self.layers[li].frame += 1;
            steps -= 1;
        }
    }

    fn dispatch_event(&mut self, layer: LayerId, ev: &AnimEvent) {
        match self.handlers.get(&ev.method) {
            Some(handler) => {
                handler(&self.host, &ev.args);
                self.outputs.push(RuntimeEvent::EventDispatched {
                    layer,
                    method: ev.method.clone(),
                    frame: ev.frame,
                });
            }
            None => {
                log::warn!("event method '{}' has no registered handler", ev.method);
            }
        }
    }

    /// Scan the active state's outgoing transitions in order and take the
    /// first that fires: an empty condition list fires unconditionally,
    /// otherwise at least one condition must hold. First match wins.
    fn start_next_state(&mut self, ctx: &AnimContext, li: usize) {
        let Some(active) = self.layers[li].active else {
            return;
        };

        let chosen = {
            let layer = &self.controller.layers[li];
            let Some(state) = layer.state(active) else {
                return;
            };
            let mut chosen = None;
            for t in &state.transitions {
                let fired = t.conditions.is_empty()
                    || t.conditions.iter().any(|c| {
                        let value = self.params.get(&c.param).copied().unwrap_or(0.0);
                        c.eval(value)
                    });
                if fired {
                    chosen = Some((t.target, t.exit_ticks));
                    break;
                }
            }
            chosen
        };

        match chosen {
            Some((Some(target), exit_ticks)) => {
                if exit_ticks > 0 {
                    log::warn!(
                        "transition requested a {exit_ticks}-tick cross-fade; blending is unsupported, switching instantly"
                    );
                    self.outputs.push(RuntimeEvent::BlendingUnsupported {
                        layer: LayerId(li as u32),
                        exit_ticks,
                    });
                }
                // The layer never truly exits: Exit targets become Default.
                let target = {
                    let layer = &self.controller.layers[li];
                    if layer.state(target).map(|s| s.kind) == Some(StateKind::Exit) {
                        layer.find_kind(StateKind::Default).unwrap_or(target)
                    } else {
                        target
                    }
                };
                self.set_state(ctx, li, target);
            }
            // Unresolved targets were purged at load; nothing to take.
            Some((None, _)) => {}
            None => {
                let loops = self
                    .active_clip(li)
                    .and_then(|(cid, _)| self.clips.get(cid))
                    .map(|clip| clip.looping)
                    .unwrap_or(false);
                if loops {
                    self.layers[li].frame = 0;
                }
                // Otherwise idle at the final frame until a condition holds.
            }
        }
    }

    /// Switch a layer to `new`: restore write-defaults of the outgoing
    /// state, reset sequencing, bind the incoming state's clip (path
    /// resolution happens here, once), and snapshot pre-animation values if
    /// the incoming state wants its defaults written back later.
    fn set_state(&mut self, ctx: &AnimContext, li: usize, new: StateId) {
        let old_write_defaults = self.layers[li]
            .active
            .and_then(|sid| self.controller.layers[li].state(sid))
            .map(|s| s.write_defaults)
            .unwrap_or(false);
        if old_write_defaults {
            let rt = &self.layers[li];
            for ((_, restore), snap) in rt.bound.iter().zip(rt.snapshots.iter()) {
                if let Some(value) = snap {
                    restore.write(*value);
                }
            }
        }

        {
            let rt = &mut self.layers[li];
            rt.active = Some(new);
            rt.frame = 0;
            rt.step_accum = 0.0;
            rt.bound.clear();
            rt.snapshots.clear();
        }

        let Some(state) = self.controller.layers[li].state(new) else {
            return;
        };
        let (stable, name, write_defaults, clip_id) = (
            state.stable_id,
            state.name.clone(),
            state.write_defaults,
            state.clip,
        );

        if let Some(clip) = clip_id.and_then(|cid| self.clips.get(cid)) {
            let mut bound = Vec::new();
            for group in &clip.groups {
                bound.extend(bind_group(ctx, &self.host, group));
            }
            for ev in &clip.events {
                if !self.handlers.contains_key(&ev.method) {
                    log::warn!(
                        "clip '{}' event method '{}' is unresolved against the host",
                        clip.name,
                        ev.method
                    );
                }
            }
            let snapshots = if write_defaults {
                bound.iter().map(|(prop, _)| prop.read()).collect()
            } else {
                vec![None; bound.len()]
            };
            let rt = &mut self.layers[li];
            rt.bound = bound;
            rt.snapshots = snapshots;
        }

        self.outputs.push(RuntimeEvent::StateEntered {
            layer: LayerId(li as u32),
            state: stable,
            name,
        });
    }

    /// Scrub path for preview: bind one clip fresh and apply its values at
    /// an arbitrary frame without touching sequencing state.
    pub fn set_frame(&self, ctx: &AnimContext, clip: ClipId, frame: i32) {
        let Some(clip) = self.clips.get(clip) else {
            log::warn!("set_frame: unknown clip");
            return;
        };
        for group in &clip.groups {
            for (prop, _) in bind_group(ctx, &self.host, group) {
                prop.apply(frame);
            }
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("controller", &self.controller.name)
            .field("layers", &self.layers.len())
            .field("params", &self.params.len())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
