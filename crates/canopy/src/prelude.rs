//! Prelude module for Canopy.
//!
//! ```ignore
//! use canopy::prelude::*;
//! ```

// ============================================================================
// Reactive Primitives
// ============================================================================

pub use crate::{
    ChangeNotifier, CollectionChange, ConnectionId, ObservableList, Signal, SubscriptionId,
};

// ============================================================================
// Flattening
// ============================================================================

pub use crate::model::{
    FlatChange, FlatRowsDebug, FlattenerConfig, IndexPath, ItemsSource, PathLookup, RowId,
    RowInfo, TreeFlattener,
};

// ============================================================================
// Errors
// ============================================================================

pub use crate::{FlattenError, ListError, NotifierError, Result};
