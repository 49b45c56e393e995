//! Explicit runtime context.
//!
//! Discovery results and the aggregate registry are deliberately not process
//! globals: a context is threaded through discovery, binding, and runtime
//! calls so multiple hosts or test runs never share mutable state. The
//! discovery cache is keyed by host instance identity and carries no
//! concurrency protection; callers must not discover the same host from
//! multiple threads at once.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;

use crate::aggregate::{AggregateField, AggregateRegistry};
use crate::binding::PropertyBindingGroup;
use crate::discover;
use crate::error::ConfigError;
use crate::host::{handle_key, AnimHandle, Animatable};

/// Cached result plus a liveness token: a dropped host's address can be
/// reused by a later allocation, so a dead or mismatched weak is a miss.
#[derive(Debug)]
struct CachedDiscovery {
    host: Weak<RefCell<dyn Animatable>>,
    groups: Vec<PropertyBindingGroup>,
}

#[derive(Debug, Default)]
pub struct AnimContext {
    aggregates: AggregateRegistry,
    discovered: HashMap<usize, CachedDiscovery>,
}

impl AnimContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregates(&self) -> &AggregateRegistry {
        &self.aggregates
    }

    /// Register an aggregate type's ordered sub-field accessors, once.
    pub fn register_aggregate<T: 'static>(
        &mut self,
        type_name: &'static str,
        fields: Vec<AggregateField>,
    ) -> Result<(), ConfigError> {
        self.aggregates.register::<T>(type_name, fields)
    }

    /// Discover every animatable field under `root`, memoized per root
    /// instance until explicitly invalidated.
    pub fn discover(&mut self, root: &AnimHandle) -> Vec<PropertyBindingGroup> {
        let key = handle_key(root);
        if let Some(entry) = self.discovered.get(&key) {
            let same_host = entry
                .host
                .upgrade()
                .map_or(false, |live| Rc::ptr_eq(&live, root));
            if same_host {
                return entry.groups.clone();
            }
        }
        let groups = discover::run(&self.aggregates, root);
        self.discovered.insert(
            key,
            CachedDiscovery {
                host: Rc::downgrade(root),
                groups: groups.clone(),
            },
        );
        groups
    }

    /// Drop the cached discovery result for one root.
    pub fn invalidate(&mut self, root: &AnimHandle) {
        self.discovered.remove(&handle_key(root));
    }

    /// Drop every cached discovery result.
    pub fn invalidate_all(&mut self) {
        self.discovered.clear();
    }
}
