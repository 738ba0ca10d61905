//! Canopy - incremental tree-to-flat-rows engine for virtualized tree views.
//!
//! Given a tree of application models, some of which expose observable child
//! collections, Canopy maintains the ordered sequence of visible rows and
//! re-derives it incrementally when rows expand or collapse, when any
//! followed collection changes, or when the sort order changes. Observers
//! receive contiguous insert/remove notifications instead of full refreshes.
//!
//! The reactive primitives it builds on live in [`canopy_core`] and are
//! re-exported here.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use canopy::prelude::*;
//!
//! let flattener = TreeFlattener::builder(vec![Arc::new("b"), Arc::new("a")])
//!     .sort(|a: &&str, b: &&str| a.cmp(b))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(*flattener.row_at(0).unwrap().model, "a");
//! assert_eq!(flattener.flat_index_of(&IndexPath::from([1])), Some(1));
//! ```

pub use canopy_core::*;

mod error;
pub mod model;
pub mod prelude;

pub use error::{FlattenError, Result};
