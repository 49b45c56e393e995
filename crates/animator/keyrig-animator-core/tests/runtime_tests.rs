use std::cell::Cell;
use std::rc::Rc;

use keyrig_animator_core::{
    AnimContext, AnimEvent, Clip, ClipLib, CompareOp, Condition, ConfigError, Controller, EventArg,
    LayerId, ParamId, ParamRegistry, PathSegment, Runtime, RuntimeEvent, StateId, StateKind,
    Transition,
};
use keyrig_test_fixtures as fixtures;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

const GO: ParamId = ParamId(1);

fn registry() -> ParamRegistry {
    let mut reg = ParamRegistry::new();
    reg.register("go", GO);
    reg
}

/// 3-frame looping clip animating the rig's `blend` scalar from 0 to 1.
fn idle_clip() -> Clip {
    fixtures::scalar_clip("idle", 3, vec![], "blend", "Rig", &[(0, 0.0), (2, 1.0)])
}

/// 3-frame looping clip animating the first joint's angle from 10 to 20.
fn walk_clip() -> Clip {
    fixtures::scalar_clip(
        "walk",
        3,
        vec![PathSegment::element("joints", 0)],
        "angle",
        "Joint",
        &[(0, 10.0), (2, 20.0)],
    )
}

/// Controller with one layer: A (Default, "idle") and B ("walk").
fn two_state_controller() -> (Controller, LayerId, StateId, StateId) {
    let mut c = Controller::new(100, "test-controller");
    let layer = c.add_layer("base");
    let a = c.add_state(layer, "A", Some("idle".into())).unwrap();
    let b = c.add_state(layer, "B", Some("walk".into())).unwrap();
    (c, layer, a, b)
}

/// it should pass through Entry to the Default state on the first tick and
/// reach an unconditional successor when the clip finishes
#[test]
fn liveness_reaches_successor() {
    let ctx = AnimContext::new();
    let fx = fixtures::rig(&["j0"]);
    let mut clips = ClipLib::new();
    clips.insert(idle_clip());
    clips.insert(walk_clip());

    let (mut c, layer, a, b) = two_state_controller();
    c.add_transition(layer, a, b, 0, vec![]).unwrap();

    let mut rt = Runtime::new(fx.root.clone(), c, clips, &registry());

    // Tick 1: Entry has no clip, so its auto transition fires immediately.
    let out = rt.tick(&ctx);
    assert!(out
        .events
        .iter()
        .any(|e| matches!(e, RuntimeEvent::StateEntered { name, .. } if name == "A")));
    assert_eq!(rt.active_state(layer), Some(a));

    // Ticks 2-4 play idle's three frames; tick 5 takes the transition.
    for _ in 0..3 {
        rt.tick(&ctx);
    }
    assert_eq!(rt.active_state(layer), Some(a));
    let out = rt.tick(&ctx);
    assert!(out
        .events
        .iter()
        .any(|e| matches!(e, RuntimeEvent::StateEntered { name, .. } if name == "B")));
    assert_eq!(rt.active_state(layer), Some(b));

    // B has no outgoing transitions and a looping clip: it wraps forever.
    for _ in 0..4 {
        rt.tick(&ctx);
    }
    assert_eq!(rt.active_state(layer), Some(b));
    assert_eq!(rt.layer_frame(layer), Some(0));
}

/// it should drive host fields through the bound setters each tick
#[test]
fn curves_write_host_fields() {
    let ctx = AnimContext::new();
    let fx = fixtures::rig(&["j0"]);
    let mut clips = ClipLib::new();
    clips.insert(idle_clip());

    let mut c = Controller::new(100, "c");
    let layer = c.add_layer("base");
    c.add_state(layer, "A", Some("idle".into())).unwrap();

    let mut rt = Runtime::new(fx.root.clone(), c, clips, &registry());

    rt.tick(&ctx); // enter A
    rt.tick(&ctx); // frame 0
    assert!(approx(fx.rig.borrow().blend, 0.0));
    rt.tick(&ctx); // frame 1
    assert!(approx(fx.rig.borrow().blend, 0.5));
    rt.tick(&ctx); // frame 2
    assert!(approx(fx.rig.borrow().blend, 1.0));
    assert_eq!(rt.layer_frame(layer), Some(3));
}

/// it should restore pre-entry values when leaving a write-defaults state
#[test]
fn write_defaults_round_trip() {
    let ctx = AnimContext::new();
    let fx = fixtures::rig(&["j0"]);
    let mut clips = ClipLib::new();
    clips.insert(idle_clip());
    clips.insert(walk_clip());

    let (mut c, layer, a, b) = two_state_controller();
    c.layer_mut(layer).unwrap().state_mut(b).unwrap().write_defaults = true;
    c.add_transition(
        layer,
        a,
        b,
        0,
        vec![Condition {
            param: GO,
            op: CompareOp::If,
            threshold: 0.0,
        }],
    )
    .unwrap();
    c.add_transition(
        layer,
        b,
        a,
        0,
        vec![Condition {
            param: GO,
            op: CompareOp::IfNot,
            threshold: 0.0,
        }],
    )
    .unwrap();

    let mut rt = Runtime::new(fx.root.clone(), c, clips, &registry());

    fx.joints[0].borrow_mut().angle = 7.5;

    rt.set_trigger(GO);
    let mut guard = 0;
    while rt.active_state(layer) != Some(b) {
        rt.tick(&ctx);
        guard += 1;
        assert!(guard < 20, "never reached B");
    }
    // Snapshot was taken at entry, before any frame applied.
    assert!(approx(fx.joints[0].borrow().angle, 7.5));
    rt.tick(&ctx);
    assert!(approx(fx.joints[0].borrow().angle, 10.0));

    rt.reset_trigger(GO);
    let mut guard = 0;
    while rt.active_state(layer) != Some(a) {
        rt.tick(&ctx);
        guard += 1;
        assert!(guard < 20, "never returned to A");
    }
    assert!(approx(fx.joints[0].borrow().angle, 7.5));
}

/// it should dispatch a clip event exactly once per pass over its frame
#[test]
fn events_fire_frame_exact() {
    let ctx = AnimContext::new();
    let fx = fixtures::rig(&["j0"]);

    let mut steps = Clip::new("steps", 2);
    steps.events.push(AnimEvent {
        frame: 1,
        method: "OnBeat".into(),
        args: vec![EventArg::Int(7)],
    });
    let mut clips = ClipLib::new();
    clips.insert(steps);

    let mut c = Controller::new(100, "c");
    let layer = c.add_layer("base");
    c.add_state(layer, "A", Some("steps".into())).unwrap();

    let mut rt = Runtime::new(fx.root.clone(), c, clips, &registry());

    let count = Rc::new(Cell::new(0u32));
    let seen = count.clone();
    rt.register_handler(
        "OnBeat",
        Box::new(move |_host, args| {
            assert_eq!(args, &[EventArg::Int(7)]);
            seen.set(seen.get() + 1);
        }),
    );

    let mut dispatched = Vec::new();
    for _ in 0..6 {
        let out = rt.tick(&ctx);
        dispatched.extend(out.events.iter().filter_map(|e| match e {
            RuntimeEvent::EventDispatched { frame, method, .. } => {
                Some((method.clone(), *frame))
            }
            _ => None,
        }));
    }
    // Two full passes over the looping 2-frame clip: frame 1 fires twice.
    assert_eq!(count.get(), 2);
    assert_eq!(dispatched, vec![("OnBeat".to_string(), 1), ("OnBeat".to_string(), 1)]);
    assert_eq!(rt.active_state(layer), Some(StateId(2)));
}

/// it should funnel int, bool, and trigger writes into the shared float store
#[test]
fn parameter_encodings() {
    let fx = fixtures::rig(&[]);
    let (c, _, _, _) = two_state_controller();
    let mut rt = Runtime::new(fx.root, c, ClipLib::new(), &registry());

    rt.set_int(GO, 5);
    assert!(approx(rt.get_float(GO), 5.0));
    assert_eq!(rt.get_int(GO), 5);

    rt.set_bool(GO, true);
    assert!(rt.get_bool(GO));
    assert!(approx(rt.get_float(GO), 1.0));

    rt.set_trigger(GO);
    assert!(approx(rt.get_float(GO), 1.0));
    rt.reset_trigger(GO);
    assert!(!rt.get_bool(GO));

    // Unseeded ids are tolerated with a diagnostic; reads default to zero.
    assert!(approx(rt.get_float(ParamId(9)), 0.0));
    rt.set_float(ParamId(9), 2.5);
    assert!(approx(rt.get_float(ParamId(9)), 2.5));
}

/// it should halve the frame rate for a state at speed 0.5
#[test]
fn state_speed_scales_stepping() {
    let ctx = AnimContext::new();
    let fx = fixtures::rig(&["j0"]);
    let mut clips = ClipLib::new();
    clips.insert(fixtures::scalar_clip(
        "idle",
        4,
        vec![],
        "blend",
        "Rig",
        &[(0, 0.0), (3, 1.0)],
    ));

    let mut c = Controller::new(100, "c");
    let layer = c.add_layer("base");
    let a = c.add_state(layer, "A", Some("idle".into())).unwrap();
    c.layer_mut(layer).unwrap().state_mut(a).unwrap().speed = 0.5;

    let mut rt = Runtime::new(fx.root.clone(), c, clips, &registry());

    rt.tick(&ctx); // enter A
    let mut frames = Vec::new();
    for _ in 0..4 {
        rt.tick(&ctx);
        frames.push(rt.layer_frame(layer).unwrap());
    }
    assert_eq!(frames, vec![0, 1, 1, 2]);
}

/// it should land on the Default state when a transition targets Exit
#[test]
fn exit_target_becomes_default() {
    let ctx = AnimContext::new();
    let fx = fixtures::rig(&["j0"]);
    let mut clips = ClipLib::new();
    clips.insert(idle_clip());
    clips.insert(walk_clip());

    let (mut c, layer, a, b) = two_state_controller();
    let exit = c.layer(layer).unwrap().find_kind(StateKind::Exit).unwrap();
    c.add_transition(layer, a, b, 0, vec![]).unwrap();
    c.add_transition(layer, b, exit, 0, vec![]).unwrap();

    let mut rt = Runtime::new(fx.root.clone(), c, clips, &registry());

    for _ in 0..5 {
        rt.tick(&ctx);
    }
    assert_eq!(rt.active_state(layer), Some(b));
    for _ in 0..4 {
        rt.tick(&ctx);
    }
    assert_eq!(rt.active_state(layer), Some(a));
}

/// it should report a requested cross-fade as unsupported and switch instantly
#[test]
fn blending_reported_unsupported() {
    let ctx = AnimContext::new();
    let fx = fixtures::rig(&["j0"]);
    let mut clips = ClipLib::new();
    clips.insert(idle_clip());
    clips.insert(walk_clip());

    let (mut c, layer, a, b) = two_state_controller();
    c.add_transition(layer, a, b, 5, vec![]).unwrap();

    let mut rt = Runtime::new(fx.root.clone(), c, clips, &registry());

    let mut reported = false;
    for _ in 0..5 {
        let out = rt.tick(&ctx);
        reported |= out.events.iter().any(|e| {
            matches!(e, RuntimeEvent::BlendingUnsupported { exit_ticks: 5, .. })
        });
    }
    assert!(reported);
    assert_eq!(rt.active_state(layer), Some(b));

    assert_eq!(
        rt.cross_fade(layer, a, 3),
        Err(ConfigError::CrossFadeUnsupported)
    );
}

/// it should take the first transition whose conditions hold, in order
#[test]
fn first_match_wins() {
    let ctx = AnimContext::new();
    let fx = fixtures::rig(&["j0"]);

    let build = |go: bool| {
        let mut clips = ClipLib::new();
        clips.insert(idle_clip());
        clips.insert(walk_clip());
        clips.insert(fixtures::scalar_clip(
            "rest",
            2,
            vec![],
            "blend",
            "Rig",
            &[(0, 0.0)],
        ));
        let (mut c, layer, a, b) = two_state_controller();
        let other = c.add_state(layer, "C", Some("rest".into())).unwrap();
        c.add_transition(
            layer,
            a,
            b,
            0,
            vec![Condition {
                param: GO,
                op: CompareOp::If,
                threshold: 0.0,
            }],
        )
        .unwrap();
        c.add_transition(layer, a, other, 0, vec![]).unwrap();
        let mut rt = Runtime::new(fx.root.clone(), c, clips, &registry());
        if go {
            rt.set_trigger(GO);
        }
        for _ in 0..5 {
            rt.tick(&ctx);
        }
        (rt.active_state(layer), layer, b, other)
    };

    let (active, _, _, other) = build(false);
    assert_eq!(active, Some(other));
    let (active, _, b, _) = build(true);
    assert_eq!(active, Some(b));
}

/// it should apply a clip at an arbitrary frame without touching sequencing
#[test]
fn set_frame_scrubs() {
    let ctx = AnimContext::new();
    let fx = fixtures::rig(&["j0"]);
    let mut clips = ClipLib::new();
    let idle_id = clips.insert(idle_clip());

    let (c, layer, _, _) = two_state_controller();
    let rt = Runtime::new(fx.root.clone(), c, clips, &registry());

    rt.set_frame(&ctx, idle_id, 1);
    assert!(approx(fx.rig.borrow().blend, 0.5));
    assert_eq!(rt.layer_frame(layer), Some(0));
}

/// it should round-trip active states, frames, and parameters through save
#[test]
fn save_and_restore() {
    let ctx = AnimContext::new();
    let fx = fixtures::rig(&["j0"]);

    let build = || {
        let mut clips = ClipLib::new();
        clips.insert(idle_clip());
        clips.insert(walk_clip());
        let (c, layer, a, b) = two_state_controller();
        (Runtime::new(fx.root.clone(), c, clips, &registry()), layer, a, b)
    };

    let (mut rt, layer, a, _) = build();
    for _ in 0..3 {
        rt.tick(&ctx);
    }
    rt.set_float(GO, 3.5);
    let saved = rt.save();

    let (mut rt2, _, _, _) = build();
    rt2.restore(&ctx, &saved);
    assert_eq!(rt2.active_state(layer), Some(a));
    assert_eq!(rt2.layer_frame(layer), rt.layer_frame(layer));
    assert!(approx(rt2.get_float(GO), 3.5));

    // The serialized form itself round-trips.
    let json = serde_json::to_string(&saved).unwrap();
    let back: keyrig_animator_core::SavedRuntime = serde_json::from_str(&json).unwrap();
    assert_eq!(back, saved);
}

/// it should validate clip assignment against the library
#[test]
fn clip_assignment_validated() {
    let mut clips = ClipLib::new();
    clips.insert(idle_clip());

    let (mut c, layer, a, _) = two_state_controller();
    assert_eq!(
        c.set_state_clip(layer, a, "missing", &clips),
        Err(ConfigError::UnknownClip("missing".into()))
    );
    c.set_state_clip(layer, a, "idle", &clips).unwrap();
    let state = c.layer(layer).unwrap().state(a).unwrap();
    assert_eq!(state.clip_ref.as_deref(), Some("idle"));
    assert!(state.clip.is_some());
}

/// it should refuse to remove special-kind states
#[test]
fn special_states_cannot_be_removed() {
    let (mut c, layer, a, b) = two_state_controller();
    let entry = c.layer(layer).unwrap().find_kind(StateKind::Entry).unwrap();
    assert_eq!(
        c.remove_state(layer, entry),
        Err(ConfigError::CannotRemoveSpecialState(StateKind::Entry))
    );
    // The first ordinary state became Default and is protected too.
    assert_eq!(
        c.remove_state(layer, a),
        Err(ConfigError::CannotRemoveSpecialState(StateKind::Default))
    );
    c.remove_state(layer, b).unwrap();
}

/// it should purge transitions whose stable target no longer resolves
#[test]
fn unresolved_targets_purged() {
    let mut clips = ClipLib::new();
    clips.insert(idle_clip());
    clips.insert(walk_clip());

    let (mut c, layer, a, _) = two_state_controller();
    c.layer_mut(layer)
        .unwrap()
        .state_mut(a)
        .unwrap()
        .transitions
        .push(Transition::to(9999));
    c.resolve_references(&clips);

    let state = c.layer(layer).unwrap().state(a).unwrap();
    assert!(state.transitions.iter().all(|t| t.target.is_some()));
    assert!(state.transitions.iter().all(|t| t.target_ref != 9999));
}
