//! Core reactive primitives for Canopy.
//!
//! This crate provides the building blocks shared by host applications and
//! the row-flattening engine:
//!
//! - **Signal/Slot System**: [`Signal`] broadcasts values to any number of slots
//! - **Change Notifier**: [`ChangeNotifier`] delivers structural changes to
//!   exactly one subscriber, with fallible delivery
//! - **Change Vocabulary**: [`CollectionChange`] describes insert, remove,
//!   replace, move and reset edits to an ordered collection
//! - **Observable Collections**: [`ObservableList`] is a host-side list that
//!   reports its own mutations
//!
//! # Example
//!
//! ```
//! use canopy_core::{CollectionChange, ObservableList};
//!
//! let servers = ObservableList::new(vec!["alpha".to_string(), "beta".to_string()]);
//! servers
//!     .subscribe(|change| {
//!         println!("servers changed: {:?}", change.action());
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! servers.push("gamma".to_string()).unwrap();
//! ```

mod change;
mod collection;
mod error;
pub mod logging;
pub mod notifier;
pub mod signal;

pub use change::{ChangeAction, CollectionChange};
pub use collection::ObservableList;
pub use error::{ListError, NotifierError};
pub use notifier::{ChangeHandler, ChangeNotifier, SubscriptionId};
pub use signal::{ConnectionId, Signal};
