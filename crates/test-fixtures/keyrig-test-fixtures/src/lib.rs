//! Shared fixtures for keyrig tests: a small animatable host graph (a rig
//! with a nested body node, a joint list, and a transform aggregate),
//! registration helpers, and clip/controller builders.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Result};

use keyrig_animator_core::{
    handle, AggregateField, AnimContext, AnimHandle, Animatable, Clip, Curve, FieldDecl,
    FieldKind, PathSegment, PropertyBinding, PropertyBindingGroup, ScalarKind, ScalarMut,
    ScalarValue,
};

/// Struct-like value type animated as one unit (registered aggregate).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
}

/// Register the fixture aggregate types on a context. Call once per context.
pub fn register_fixture_aggregates(ctx: &mut AnimContext) -> Result<()> {
    ctx.register_aggregate::<Transform>(
        "Transform",
        vec![
            AggregateField::float::<Transform>("x", |t| t.x, |t, v| t.x = v),
            AggregateField::float::<Transform>("y", |t| t.y, |t, v| t.y = v),
            AggregateField::float::<Transform>("rotation", |t| t.rotation, |t, v| t.rotation = v),
        ],
    )
    .map_err(|e| anyhow!("aggregate registration failed: {e}"))
}

/// List element with a stable string id.
#[derive(Debug)]
pub struct Joint {
    pub id: String,
    pub angle: f32,
    pub enabled: bool,
}

impl Joint {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            angle: 0.0,
            enabled: true,
        }
    }
}

impl Animatable for Joint {
    fn type_name(&self) -> &'static str {
        "Joint"
    }

    fn stable_id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> &'static [FieldDecl] {
        const FIELDS: &[FieldDecl] = &[
            FieldDecl::new("angle", FieldKind::Float),
            FieldDecl::new("enabled", FieldKind::Bool),
        ];
        FIELDS
    }

    fn scalar(&self, name: &str) -> Option<ScalarValue> {
        match name {
            "angle" => Some(ScalarValue::Float(self.angle)),
            "enabled" => Some(ScalarValue::Bool(self.enabled)),
            _ => None,
        }
    }

    fn scalar_mut(&mut self, name: &str) -> Option<ScalarMut<'_>> {
        match name {
            "angle" => Some(ScalarMut::Float(&mut self.angle)),
            "enabled" => Some(ScalarMut::Bool(&mut self.enabled)),
            _ => None,
        }
    }
}

/// Nested object with scalar fields and a transform aggregate.
#[derive(Debug)]
pub struct Node {
    pub id: String,
    pub opacity: f32,
    pub transform: Transform,
}

impl Node {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            opacity: 1.0,
            transform: Transform::default(),
        }
    }
}

impl Animatable for Node {
    fn type_name(&self) -> &'static str {
        "Node"
    }

    fn stable_id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> &'static [FieldDecl] {
        const FIELDS: &[FieldDecl] = &[
            FieldDecl::new("opacity", FieldKind::Float),
            FieldDecl::new("transform", FieldKind::Aggregate),
        ];
        FIELDS
    }

    fn scalar(&self, name: &str) -> Option<ScalarValue> {
        match name {
            "opacity" => Some(ScalarValue::Float(self.opacity)),
            _ => None,
        }
    }

    fn scalar_mut(&mut self, name: &str) -> Option<ScalarMut<'_>> {
        match name {
            "opacity" => Some(ScalarMut::Float(&mut self.opacity)),
            _ => None,
        }
    }

    fn aggregate(&self, name: &str) -> Option<&dyn std::any::Any> {
        match name {
            "transform" => Some(&self.transform),
            _ => None,
        }
    }

    fn aggregate_mut(&mut self, name: &str) -> Option<&mut dyn std::any::Any> {
        match name {
            "transform" => Some(&mut self.transform),
            _ => None,
        }
    }
}

/// Root host object: scalars, a nested body node, and a joint list.
pub struct Rig {
    pub visible: bool,
    pub blend: f32,
    pub frame_bias: i32,
    pub body: Rc<RefCell<Node>>,
    pub joints: Vec<Rc<RefCell<Joint>>>,
}

impl Animatable for Rig {
    fn type_name(&self) -> &'static str {
        "Rig"
    }

    fn fields(&self) -> &'static [FieldDecl] {
        const FIELDS: &[FieldDecl] = &[
            FieldDecl::new("visible", FieldKind::Bool),
            FieldDecl::new("blend", FieldKind::Float),
            FieldDecl::new("frame_bias", FieldKind::Int),
            FieldDecl::new("body", FieldKind::Object),
            FieldDecl::new("joints", FieldKind::List),
        ];
        FIELDS
    }

    fn scalar(&self, name: &str) -> Option<ScalarValue> {
        match name {
            "visible" => Some(ScalarValue::Bool(self.visible)),
            "blend" => Some(ScalarValue::Float(self.blend)),
            "frame_bias" => Some(ScalarValue::Int(self.frame_bias)),
            _ => None,
        }
    }

    fn scalar_mut(&mut self, name: &str) -> Option<ScalarMut<'_>> {
        match name {
            "visible" => Some(ScalarMut::Bool(&mut self.visible)),
            "blend" => Some(ScalarMut::Float(&mut self.blend)),
            "frame_bias" => Some(ScalarMut::Int(&mut self.frame_bias)),
            _ => None,
        }
    }

    fn object(&self, name: &str) -> Option<AnimHandle> {
        match name {
            "body" => {
                let h: AnimHandle = self.body.clone();
                Some(h)
            }
            _ => None,
        }
    }

    fn list(&self, name: &str) -> Option<Vec<AnimHandle>> {
        match name {
            "joints" => Some(
                self.joints
                    .iter()
                    .map(|j| {
                        let h: AnimHandle = j.clone();
                        h
                    })
                    .collect(),
            ),
            _ => None,
        }
    }
}

/// A fully wired rig plus typed handles to its pieces for assertions.
pub struct RigFixture {
    pub root: AnimHandle,
    pub rig: Rc<RefCell<Rig>>,
    pub body: Rc<RefCell<Node>>,
    pub joints: Vec<Rc<RefCell<Joint>>>,
}

pub fn rig(joint_ids: &[&str]) -> RigFixture {
    let body = Rc::new(RefCell::new(Node::new("body")));
    let joints: Vec<Rc<RefCell<Joint>>> = joint_ids
        .iter()
        .map(|id| Rc::new(RefCell::new(Joint::new(id))))
        .collect();
    let rig = Rc::new(RefCell::new(Rig {
        visible: true,
        blend: 0.0,
        frame_bias: 0,
        body: body.clone(),
        joints: joints.clone(),
    }));
    let root: AnimHandle = rig.clone();
    RigFixture {
        root,
        rig,
        body,
        joints,
    }
}

/// Two nodes referencing each other, for cycle-safety tests.
pub struct CyclicNode {
    pub id: String,
    pub value: f32,
    pub next: Option<AnimHandle>,
}

impl Animatable for CyclicNode {
    fn type_name(&self) -> &'static str {
        "CyclicNode"
    }

    fn stable_id(&self) -> &str {
        &self.id
    }

    fn fields(&self) -> &'static [FieldDecl] {
        const FIELDS: &[FieldDecl] = &[
            FieldDecl::new("value", FieldKind::Float),
            FieldDecl::new("next", FieldKind::Object),
        ];
        FIELDS
    }

    fn scalar(&self, name: &str) -> Option<ScalarValue> {
        match name {
            "value" => Some(ScalarValue::Float(self.value)),
            _ => None,
        }
    }

    fn scalar_mut(&mut self, name: &str) -> Option<ScalarMut<'_>> {
        match name {
            "value" => Some(ScalarMut::Float(&mut self.value)),
            _ => None,
        }
    }

    fn object(&self, name: &str) -> Option<AnimHandle> {
        match name {
            "next" => self.next.clone(),
            _ => None,
        }
    }
}

/// Build a pair of nodes with a reference cycle between them.
pub fn cyclic_pair() -> (AnimHandle, AnimHandle) {
    let a = Rc::new(RefCell::new(CyclicNode {
        id: "a".to_string(),
        value: 0.0,
        next: None,
    }));
    let a_dyn: AnimHandle = a.clone();
    let b = handle(CyclicNode {
        id: "b".to_string(),
        value: 0.0,
        next: Some(a_dyn.clone()),
    });
    a.borrow_mut().next = Some(b.clone());
    (a_dyn, b)
}

/// One-group clip animating a single scalar field reached through `path`.
pub fn scalar_clip(
    name: &str,
    frame_count: u32,
    path: Vec<PathSegment>,
    field: &str,
    declaring_type: &str,
    points: &[(u32, f32)],
) -> Clip {
    let mut binding = PropertyBinding::new(field, declaring_type, ScalarKind::Float);
    binding.curve = Curve::from_points(points);
    let mut clip = Clip::new(name, frame_count);
    clip.groups.push(PropertyBindingGroup {
        path,
        aggregate: None,
        identifier: None,
        bindings: vec![binding],
    });
    clip
}

/// Canonical stored-clip JSON used by loader round-trip tests.
pub fn sample_clip_json() -> &'static str {
    r#"{
        "name": "fade-in",
        "frame_count": 60,
        "looping": false,
        "groups": [
            {
                "path": [],
                "aggregate": null,
                "identifier": null,
                "bindings": [
                    {
                        "label": "blend",
                        "name": "blend",
                        "declaring_type": "Rig",
                        "kind": "Float",
                        "curve": { "keys": [
                            { "frame": 0, "value": 0.0 },
                            { "frame": 60, "value": 1.0 }
                        ] }
                    }
                ]
            }
        ],
        "events": [
            { "frame": 30, "method": "OnHalfway", "args": [ { "Int": 30 } ] }
        ]
    }"#
}
