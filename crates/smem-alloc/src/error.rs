//! Allocator error types.

use std::error::Error;
use std::fmt;
use std::io;

use smem_core::{Handle, RegionId, RegionSet};

use crate::config::ConfigError;

/// Errors that can occur during allocator operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// No candidate region has a contiguous free run large enough.
    AllocationExhausted {
        /// Number of bytes requested.
        requested: u64,
        /// Regions that were tried, in order.
        candidates: RegionSet,
    },
    /// The handle is unknown or was already freed.
    InvalidHandle {
        /// The rejected handle.
        handle: Handle,
    },
    /// A chunk was found in a state its ledger entry contradicts.
    ///
    /// Indicates bookkeeping corruption and is never recoverable.
    InvariantViolation {
        /// Region holding the inconsistent chunk.
        region: RegionId,
        /// Index of the first inconsistent chunk.
        chunk: usize,
        /// What was expected versus found.
        detail: String,
    },
    /// A candidate region is not managed by this allocator.
    UnknownRegion {
        /// The unmanaged region.
        region: RegionId,
    },
    /// Alignment is neither zero nor a power of two.
    InvalidAlignment {
        /// The rejected alignment.
        alignment: u64,
    },
    /// A control channel could not be opened, written, or read.
    Io {
        /// The channel that failed.
        channel: String,
        /// The underlying I/O error kind.
        kind: io::ErrorKind,
        /// The underlying I/O error message.
        detail: String,
    },
    /// The device answered with a line that does not parse or places
    /// the allocation somewhere it cannot be.
    MalformedReply {
        /// The raw reply line.
        line: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The allocator geometry is invalid.
    Config(ConfigError),
}

impl AllocError {
    /// Build an [`AllocError::Io`] from a failed operation on `channel`.
    pub fn io(channel: impl fmt::Display, err: &io::Error) -> Self {
        Self::Io {
            channel: channel.to_string(),
            kind: err.kind(),
            detail: err.to_string(),
        }
    }

    /// Build an [`AllocError::MalformedReply`].
    pub fn malformed(line: &str, reason: impl Into<String>) -> Self {
        Self::MalformedReply {
            line: line.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error means the ledger can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllocationExhausted {
                requested,
                candidates,
            } => {
                write!(
                    f,
                    "allocation exhausted: no contiguous {requested:#x} bytes in regions [{candidates}]"
                )
            }
            Self::InvalidHandle { handle } => write!(f, "invalid handle {handle}"),
            Self::InvariantViolation {
                region,
                chunk,
                detail,
            } => {
                write!(
                    f,
                    "ledger invariant violated in region {region} at chunk {chunk}: {detail}"
                )
            }
            Self::UnknownRegion { region } => write!(f, "unknown region {region}"),
            Self::InvalidAlignment { alignment } => {
                write!(f, "alignment {alignment:#x} is not a power of two")
            }
            Self::Io {
                channel, detail, ..
            } => write!(f, "I/O error on {channel}: {detail}"),
            Self::MalformedReply { line, reason } => {
                write!(f, "malformed device reply '{line}': {reason}")
            }
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl Error for AllocError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for AllocError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
