//! Error types for the flattening engine.

use canopy_core::NotifierError;

use crate::model::IndexPath;

/// Result type alias for flattening operations.
pub type Result<T> = std::result::Result<T, FlattenError>;

/// Errors that can occur while maintaining the flat row sequence.
///
/// Lookup misses (a path or index with no visible row) are not errors; those
/// operations return `Option`.
#[derive(Debug, thiserror::Error)]
pub enum FlattenError {
    /// A structural change arrived while another was still being applied.
    #[error("A structural change is already being applied")]
    Reentrant,

    /// The row has been removed from the tree.
    #[error("Row has been disposed")]
    RowDisposed,

    /// Rows cannot be created at the root path.
    #[error("Cannot create a row at the empty (root) index path")]
    EmptyPath,

    /// A path shift would move a segment below zero.
    #[error("Cannot shift index path {path} by {delta}")]
    InvalidShift { path: IndexPath, delta: isize },

    /// A removal reached past the rows actually present.
    #[error(
        "Removal of {requested} row(s) at flat index {flat_index} exceeds the {available} row(s) present"
    )]
    SpanOverflow {
        flat_index: usize,
        requested: usize,
        available: usize,
    },

    /// A source change referenced positions the level does not have.
    #[error("Change at index {index} (count {count}) does not fit a level of {len} row(s)")]
    SourceOutOfSync {
        index: usize,
        count: usize,
        len: usize,
    },

    /// Subscribing to or releasing a model collection failed.
    #[error(transparent)]
    Notifier(#[from] NotifierError),
}

impl FlattenError {
    pub(crate) fn out_of_sync(index: usize, count: usize, len: usize) -> Self {
        Self::SourceOutOfSync { index, count, len }
    }
}
