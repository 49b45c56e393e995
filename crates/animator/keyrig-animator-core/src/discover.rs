//! Discovery engine: find every animatable field under a root.
//!
//! Iterative breadth-first traversal with an explicit work queue (no
//! recursion); a visited set of object identities keeps cyclic graphs from
//! looping or emitting duplicate bindings. Field declarations are walked in
//! declaration order, so the emitted group order is deterministic for a
//! given graph shape.

use std::collections::VecDeque;

use hashbrown::HashSet;

use crate::aggregate::AggregateRegistry;
use crate::binding::{PropertyBinding, PropertyBindingGroup};
use crate::host::{handle_key, AnimHandle, FieldKind};
use crate::path::{self, PathSegment};

struct WorkItem {
    handle: AnimHandle,
    path: Vec<PathSegment>,
    /// Stable id of the nearest enclosing list element, carried down so
    /// groups under an element stay disambiguated.
    identifier: Option<String>,
}

pub(crate) fn run(registry: &AggregateRegistry, root: &AnimHandle) -> Vec<PropertyBindingGroup> {
    let mut groups = Vec::new();
    let mut queue: VecDeque<WorkItem> = VecDeque::new();
    let mut visited: HashSet<usize> = HashSet::new();

    queue.push_back(WorkItem {
        handle: root.clone(),
        path: Vec::new(),
        identifier: None,
    });
    visited.insert(handle_key(root));

    while let Some(item) = queue.pop_front() {
        let obj = item.handle.borrow();
        let type_name = obj.type_name();

        for decl in obj.fields() {
            match decl.kind {
                FieldKind::Float | FieldKind::Int | FieldKind::Bool => {
                    let Some(kind) = decl.kind.scalar_kind() else {
                        continue;
                    };
                    if obj.scalar(decl.name).is_none() {
                        log::warn!(
                            "{}.{} declared {:?} but exposes no scalar accessor; skipped",
                            type_name,
                            decl.name,
                            decl.kind
                        );
                        continue;
                    }
                    groups.push(PropertyBindingGroup {
                        path: item.path.clone(),
                        aggregate: None,
                        identifier: item.identifier.clone(),
                        bindings: vec![PropertyBinding::new(decl.name, type_name, kind)],
                    });
                }
                FieldKind::Object => match obj.object(decl.name) {
                    Some(child) => {
                        if !visited.insert(handle_key(&child)) {
                            continue;
                        }
                        let mut child_path = item.path.clone();
                        child_path.push(PathSegment::member(decl.name));
                        queue.push_back(WorkItem {
                            handle: child,
                            path: child_path,
                            identifier: item.identifier.clone(),
                        });
                    }
                    None => {
                        log::debug!("{}.{} is null; nothing to discover", type_name, decl.name);
                    }
                },
                FieldKind::List => {
                    let Some(elements) = obj.list(decl.name) else {
                        log::debug!("{}.{} list is absent; skipped", type_name, decl.name);
                        continue;
                    };
                    for (index, element) in elements.into_iter().enumerate() {
                        let (leaf_capable, element_id) = {
                            let e = element.borrow();
                            (!e.fields().is_empty(), e.stable_id().to_string())
                        };
                        if !leaf_capable {
                            log::warn!(
                                "{}.{}[{}] exposes no animatable fields; skipped",
                                type_name,
                                decl.name,
                                index
                            );
                            continue;
                        }
                        if !visited.insert(handle_key(&element)) {
                            continue;
                        }
                        let mut child_path = item.path.clone();
                        child_path.push(PathSegment::element(decl.name, index));
                        queue.push_back(WorkItem {
                            handle: element,
                            path: child_path,
                            identifier: Some(element_id),
                        });
                    }
                }
                FieldKind::Aggregate => {
                    let Some(value) = obj.aggregate(decl.name) else {
                        log::warn!(
                            "{}.{} declared Aggregate but exposes no value; skipped",
                            type_name,
                            decl.name
                        );
                        continue;
                    };
                    let Some(spec) = registry.lookup_value(value) else {
                        log::warn!(
                            "{}.{} has unregistered aggregate type; field skipped at '{}'",
                            type_name,
                            decl.name,
                            path::display(&item.path)
                        );
                        continue;
                    };
                    let bindings = spec
                        .fields
                        .iter()
                        .map(|sub| {
                            let mut b = PropertyBinding::new(sub.name, spec.type_name, sub.kind);
                            b.label = format!("{}.{}", decl.name, sub.name);
                            b
                        })
                        .collect();
                    groups.push(PropertyBindingGroup {
                        path: item.path.clone(),
                        aggregate: Some(decl.name.to_string()),
                        identifier: item.identifier.clone(),
                        bindings,
                    });
                }
            }
        }
    }

    groups
}
