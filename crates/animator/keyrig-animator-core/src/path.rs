//! Property path segments and resolution.
//!
//! A path is an ordered chain of member hops from a root object down to the
//! container that owns a leaf field. A segment with an index steps into an
//! ordered collection of child animatables. Resolution happens once per
//! (state-enter, binding-group) pair; the resolved handle is cached for the
//! state's active lifetime and never re-resolved per frame.

use serde::{Deserialize, Serialize};

use crate::host::AnimHandle;

/// One hop: the declaring field, plus an optional element index.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathSegment {
    pub field: String,
    #[serde(default)]
    pub index: Option<usize>,
}

impl PathSegment {
    pub fn member(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            index: None,
        }
    }

    pub fn element(field: impl Into<String>, index: usize) -> Self {
        Self {
            field: field.into(),
            index: Some(index),
        }
    }
}

/// Walk `segments` from `root`; any failed hop yields `None`.
pub fn resolve(root: &AnimHandle, segments: &[PathSegment]) -> Option<AnimHandle> {
    let mut current = root.clone();
    for seg in segments {
        let next = {
            let obj = current.borrow();
            match seg.index {
                Some(i) => obj.list(&seg.field).and_then(|elems| elems.get(i).cloned()),
                None => obj.object(&seg.field),
            }
        };
        current = next?;
    }
    Some(current)
}

/// Render a path for diagnostics, e.g. `body.joints[2]`.
pub fn display(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for (i, seg) in segments.iter().enumerate() {
        if i > 0 {
            out.push('.');
        }
        out.push_str(&seg.field);
        if let Some(idx) = seg.index {
            out.push_str(&format!("[{idx}]"));
        }
    }
    out
}
