use keyrig_animator_core::stored::{
    clip_to_json, controller_to_json, parse_clip_json, parse_controller_json,
};
use keyrig_animator_core::{ClipLib, CompareOp, Condition, Controller, LayerId, ParamId};
use keyrig_test_fixtures as fixtures;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-5
}

/// it should parse a stored clip document, curves and events included
#[test]
fn parse_sample_clip() {
    let clip = parse_clip_json(fixtures::sample_clip_json()).unwrap();
    assert_eq!(clip.name, "fade-in");
    assert_eq!(clip.frame_count, 60);
    assert!(!clip.looping);

    let curve = &clip.groups[0].bindings[0].curve;
    assert!(approx(curve.evaluate(0), 0.0));
    assert!(approx(curve.evaluate(30), 0.5));
    assert!(approx(curve.evaluate(60), 1.0));

    assert_eq!(clip.events.len(), 1);
    assert_eq!(clip.events[0].method, "OnHalfway");
    assert_eq!(clip.events[0].frame, 30);
}

/// it should round-trip a clip through serialization unchanged
#[test]
fn clip_round_trip() {
    let clip = parse_clip_json(fixtures::sample_clip_json()).unwrap();
    let json = clip_to_json(&clip).unwrap();
    let back = parse_clip_json(&json).unwrap();
    assert_eq!(back, clip);
}

/// it should reject clips that violate basic invariants
#[test]
fn invalid_clips_rejected() {
    assert!(parse_clip_json(r#"{ "name": "empty", "frame_count": 0 }"#).is_err());
    let out_of_range = r#"{
        "name": "bad-event",
        "frame_count": 10,
        "events": [ { "frame": 10, "method": "OnEnd" } ]
    }"#;
    assert!(parse_clip_json(out_of_range).is_err());
    assert!(parse_clip_json("not json").is_err());
}

/// it should mint fresh stable ids after loading a document that omits the
/// allocation counter
#[test]
fn loaded_counter_clamped_past_existing_ids() {
    let json = r#"{
        "stable_id": 7,
        "name": "walker",
        "layers": [ { "name": "base", "states": [
            { "stable_id": 1, "name": "Entry", "kind": "Entry" },
            { "stable_id": 2, "name": "Exit", "kind": "Exit" },
            { "stable_id": 3, "name": "A", "kind": "Default" }
        ] } ]
    }"#;
    let mut c = parse_controller_json(json, &ClipLib::new()).unwrap();
    let layer = LayerId(0);

    let first = c.add_state(layer, "B", None).unwrap();
    let second = c.add_state(layer, "C", None).unwrap();

    let l = c.layer(layer).unwrap();
    let mut ids: Vec<_> = l.states.iter().map(|s| s.stable_id).collect();
    assert!(l.state(first).unwrap().stable_id > 3);
    assert!(l.state(second).unwrap().stable_id > 3);
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), l.states.len());
}

/// it should round-trip a controller and re-resolve its live handles on load
#[test]
fn controller_round_trip_resolves() {
    let mut clips = ClipLib::new();
    clips.insert(fixtures::scalar_clip(
        "idle",
        3,
        vec![],
        "blend",
        "Rig",
        &[(0, 0.0), (2, 1.0)],
    ));

    let mut c = Controller::new(7, "walker");
    let layer = c.add_layer("base");
    let a = c.add_state(layer, "A", Some("idle".into())).unwrap();
    let b = c.add_state(layer, "B", Some("missing".into())).unwrap();
    c.add_transition(
        layer,
        a,
        b,
        0,
        vec![Condition {
            param: ParamId(1),
            op: CompareOp::Greater,
            threshold: 0.5,
        }],
    )
    .unwrap();

    let json = controller_to_json(&c).unwrap();
    let parsed = parse_controller_json(&json, &clips).unwrap();

    let l = parsed.layer(layer).unwrap();
    // Clip names resolved where they exist, left unresolved where they don't.
    assert!(l.state(a).unwrap().clip.is_some());
    assert!(l.state(b).unwrap().clip.is_none());
    // Transition targets came back as live handles with reverse edges.
    let t = &l.state(a).unwrap().transitions[0];
    assert_eq!(t.target, Some(b));
    assert_eq!(t.conditions[0].op, CompareOp::Greater);
    assert!(l.state(b).unwrap().incoming.contains(&a));

    // Stable id allocation continues where the loaded document left off.
    let mut parsed = parsed;
    let c2 = parsed.add_state(layer, "C", None).unwrap();
    let fresh = parsed.layer(layer).unwrap().state(c2).unwrap().stable_id;
    let max_existing = c
        .layer(layer)
        .unwrap()
        .states
        .iter()
        .map(|s| s.stable_id)
        .max()
        .unwrap();
    assert!(fresh > max_existing);
}
