//! Engine error type.

use std::error::Error;
use std::fmt;

use smem_alloc::AllocError;
use smem_core::{ResourceId, ScenarioId};

/// Errors returned by resource and scenario operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    /// The allocator rejected a call.
    Alloc(AllocError),
    /// The scenario id is not in the catalog.
    UnknownScenario {
        /// The rejected id.
        id: ScenarioId,
    },
    /// The resource id is not in the catalog.
    UnknownResource {
        /// The rejected id.
        id: ResourceId,
    },
    /// An earlier invariant violation left the engine unusable.
    Poisoned,
    /// [`check_invariants`](crate::ScenarioEngine::check_invariants) found
    /// an inconsistency between the registry, the running set, and the
    /// allocator.
    InvariantBroken {
        /// What disagreed.
        detail: String,
    },
}

impl EngineError {
    /// Whether the error poisons the engine.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Alloc(e) => e.is_fatal(),
            Self::Poisoned | Self::InvariantBroken { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alloc(e) => write!(f, "allocator: {e}"),
            Self::UnknownScenario { id } => write!(f, "unknown scenario {id}"),
            Self::UnknownResource { id } => write!(f, "unknown resource {id}"),
            Self::Poisoned => write!(f, "engine poisoned by an earlier invariant violation"),
            Self::InvariantBroken { detail } => write!(f, "invariant broken: {detail}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Alloc(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AllocError> for EngineError {
    fn from(e: AllocError) -> Self {
        Self::Alloc(e)
    }
}
