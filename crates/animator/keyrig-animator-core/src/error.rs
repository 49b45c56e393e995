//! Configuration-boundary errors.
//!
//! These surface only at explicit mutation/registration/load boundaries.
//! The same conditions met during traversal are logged and the offending
//! entity dropped, so the runtime continues with a reduced but consistent
//! graph. "No transition fired this tick" is normal control flow, not an
//! error.

use thiserror::Error;

use crate::data::StateKind;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("aggregate type {0} is already registered")]
    DuplicateAggregate(&'static str),
    #[error("layer already has a {0:?} state")]
    DuplicateSpecialState(StateKind),
    #[error("the layer's {0:?} state cannot be removed")]
    CannotRemoveSpecialState(StateKind),
    #[error("unknown clip '{0}'")]
    UnknownClip(String),
    #[error("unknown state")]
    UnknownState,
    #[error("unknown layer")]
    UnknownLayer,
    #[error("cross-fade transitions are not supported")]
    CrossFadeUnsupported,
}
