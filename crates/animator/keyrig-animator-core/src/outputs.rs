//! Per-tick diagnostics channel.
//!
//! The tick loop writes host fields directly through bound setters; what it
//! reports back is the semantic signal stream for this tick, which adapters
//! and tests observe.

use serde::{Deserialize, Serialize};

use crate::ids::{LayerId, StableId};

/// Discrete signals emitted while ticking.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[non_exhaustive]
pub enum RuntimeEvent {
    StateEntered {
        layer: LayerId,
        state: StableId,
        name: String,
    },
    EventDispatched {
        layer: LayerId,
        method: String,
        frame: u32,
    },
    /// A taken transition requested a cross-fade; blending is an unfinished
    /// extension point, so the switch happened instantly.
    BlendingUnsupported {
        layer: LayerId,
        exit_ticks: u32,
    },
}

/// Outputs returned by `Runtime::tick`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TickOutputs {
    #[serde(default)]
    pub events: Vec<RuntimeEvent>,
}

impl TickOutputs {
    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    #[inline]
    pub fn push(&mut self, event: RuntimeEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
