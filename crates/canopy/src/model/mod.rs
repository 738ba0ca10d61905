//! Tree-to-rows model layer for Canopy.
//!
//! This module turns a tree of host models into the flat, ordered list of
//! rows a virtualized list or grid renders, and keeps that list up to date
//! as the tree changes.
//!
//! # Core Types
//!
//! - `IndexPath`: Root-relative route to a row, one sibling position per level
//! - `RowId`: Stable handle to a row for as long as its model is in the tree
//! - `ItemsSource`: A fixed or observable collection that forms one tree level
//! - `TreeFlattener`: Owns the rows and maintains the flat sequence
//! - `FlatChange`: Contiguous insert/remove (or reset) of the flat sequence
//!
//! # Change Flow
//!
//! ```text
//! ┌────────────────┐  CollectionChange  ┌───────────────┐  FlatChange  ┌──────────┐
//! │ ObservableList │───────────────────>│ TreeFlattener │─────────────>│   View   │
//! │  (per level)   │                    │  (flat rows)  │   (Signal)   │          │
//! └────────────────┘                    └───────────────┘              └──────────┘
//!                                              ^                             │
//!                                              └──── expand / collapse ──────┘
//! ```
//!
//! Each level sorts its own rows when a comparator is set; ties keep the
//! order of the source collection.

mod debug;
mod flatten;
mod index_path;
mod level;
mod row;

pub use debug::{FlatRowsDebug, RowStyle, RowsFormatOptions};
pub use flatten::{
    DEFAULT_EXPAND_DEPTH_LIMIT, FlatChange, FlattenerConfig, PathLookup, RowInfo, TreeFlattener,
    TreeFlattenerBuilder,
};
pub use index_path::IndexPath;
pub use level::{ChildrenFn, CompareFn, ItemsSource};
pub use row::RowId;
