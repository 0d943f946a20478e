//! Typed failures surfaced by the cache's mutating and persistence operations.
//!
//! Oversized-value rejection is deliberately *not* represented here: per the
//! cache's contract it is a silent no-op (see [`crate::unsync::Cache::set`]),
//! not a signaled error.

use std::io;
use thiserror::Error;

/// Errors produced by [`crate::unsync::Cache`] operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The persisted stream's version marker does not match the version this
    /// crate writes. The engine is left untouched.
    #[error("cache file version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// The version this crate writes and expects to read.
        expected: u32,
        /// The version marker actually found in the stream.
        found: u32,
    },

    /// The primary index and the three generation rings disagree on how many
    /// entries are live. Export is aborted without emitting partial output.
    #[error("cache is corrupted: index holds {index_total} entries but the generation rings hold {ring_total}")]
    CorruptedState {
        /// Total entries reachable by walking the three rings.
        ring_total: usize,
        /// Total entries held in the primary index.
        index_total: usize,
    },

    /// An invariant was found broken on the insertion path (for example, a
    /// key the index was believed not to contain was already present). The
    /// offending operation is rejected; the engine remains in a valid state.
    #[error("programmer fault: {0}")]
    ProgrammerFault(&'static str),

    /// Failure from the caller-supplied stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure encoding or decoding a persisted `(key, value)` frame.
    #[error("persistence codec error: {0}")]
    Codec(#[from] bincode::Error),
}

/// Convenience alias for fallible cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
