//! Single-subscriber change notification.
//!
//! A [`ChangeNotifier`] delivers [`CollectionChange`] events to at most one
//! subscriber. Unlike [`Signal`](crate::Signal), delivery is fallible: the
//! subscriber returns a `Result`, and the error travels back to whoever
//! raised the change. This lets an observer that cannot apply a change (for
//! example because it is already in the middle of applying another one)
//! surface that failure instead of silently drifting out of sync.
//!
//! # Example
//!
//! ```
//! use canopy_core::{ChangeNotifier, CollectionChange};
//!
//! let notifier = ChangeNotifier::<u32>::new();
//! let id = notifier
//!     .subscribe(|change| {
//!         println!("{:?}", change.action());
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! // A second subscriber is refused.
//! assert!(notifier.subscribe(|_| Ok(())).is_err());
//!
//! notifier.notify(&CollectionChange::Reset).unwrap();
//! notifier.unsubscribe(id).unwrap();
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{SlotMap, new_key_type};

use crate::change::CollectionChange;
use crate::error::NotifierError;
use crate::logging::targets;

new_key_type! {
    /// Identifies the active subscription of a [`ChangeNotifier`].
    ///
    /// Keys are versioned, so an ID stays invalid once unsubscribed even if
    /// a new subscriber later takes the same slot.
    pub struct SubscriptionId;
}

/// The subscriber callback of a [`ChangeNotifier`].
pub type ChangeHandler<T> =
    Arc<dyn Fn(&CollectionChange<T>) -> Result<(), NotifierError> + Send + Sync>;

/// A change stream with at most one active subscriber.
pub struct ChangeNotifier<T> {
    subscriber: Mutex<SlotMap<SubscriptionId, ChangeHandler<T>>>,
}

impl<T: 'static> Default for ChangeNotifier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ChangeNotifier<T> {
    /// Releases the subscription.
    ///
    /// Fails with [`NotifierError::InvalidSubscription`] if `id` is not the
    /// active subscription, which includes unsubscribing twice.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<(), NotifierError> {
        match self.subscriber.lock().remove(id) {
            Some(_) => {
                tracing::trace!(target: targets::NOTIFIER, ?id, "unsubscribed");
                Ok(())
            }
            None => Err(NotifierError::InvalidSubscription),
        }
    }

    /// Returns `true` if a subscriber is active.
    pub fn has_subscriber(&self) -> bool {
        !self.subscriber.lock().is_empty()
    }
}

impl<T: 'static> ChangeNotifier<T> {
    /// Creates a notifier with no subscriber.
    pub fn new() -> Self {
        Self {
            subscriber: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Subscribes the given handler.
    ///
    /// Fails with [`NotifierError::AlreadySubscribed`] if a subscriber is
    /// already active.
    pub fn subscribe<F>(&self, handler: F) -> Result<SubscriptionId, NotifierError>
    where
        F: Fn(&CollectionChange<T>) -> Result<(), NotifierError> + Send + Sync + 'static,
    {
        self.subscribe_handler(Arc::new(handler))
    }

    /// Subscribes an already shared handler.
    pub fn subscribe_handler(&self, handler: ChangeHandler<T>) -> Result<SubscriptionId, NotifierError> {
        let mut subscriber = self.subscriber.lock();
        if !subscriber.is_empty() {
            tracing::warn!(target: targets::NOTIFIER, "refusing second subscriber");
            return Err(NotifierError::AlreadySubscribed);
        }
        let id = subscriber.insert(handler);
        tracing::trace!(target: targets::NOTIFIER, ?id, "subscribed");
        Ok(id)
    }

    /// Delivers a change to the subscriber, if any.
    ///
    /// The subscriber runs without the notifier's lock held, so it may
    /// unsubscribe itself. Its error, if any, is returned unchanged.
    pub fn notify(&self, change: &CollectionChange<T>) -> Result<(), NotifierError> {
        let handler = self.subscriber.lock().values().next().cloned();
        match handler {
            Some(handler) => {
                tracing::trace!(
                    target: targets::NOTIFIER,
                    action = ?change.action(),
                    index = ?change.index(),
                    count = change.count(),
                    "delivering change"
                );
                handler(change)
            }
            None => Ok(()),
        }
    }
}

static_assertions::assert_impl_all!(ChangeNotifier<String>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("busy")]
    struct Busy;

    #[test]
    fn test_single_subscriber() {
        let notifier = ChangeNotifier::<i32>::new();
        let id = notifier.subscribe(|_| Ok(())).unwrap();
        assert!(notifier.has_subscriber());
        assert!(matches!(
            notifier.subscribe(|_| Ok(())),
            Err(NotifierError::AlreadySubscribed)
        ));

        notifier.unsubscribe(id).unwrap();
        assert!(!notifier.has_subscriber());
        assert!(notifier.subscribe(|_| Ok(())).is_ok());
    }

    #[test]
    fn test_double_unsubscribe_is_rejected() {
        let notifier = ChangeNotifier::<i32>::new();
        let id = notifier.subscribe(|_| Ok(())).unwrap();
        notifier.unsubscribe(id).unwrap();
        assert!(matches!(
            notifier.unsubscribe(id),
            Err(NotifierError::InvalidSubscription)
        ));

        // A stale ID stays invalid after another subscriber arrives.
        let _next = notifier.subscribe(|_| Ok(())).unwrap();
        assert!(notifier.unsubscribe(id).is_err());
        assert!(notifier.has_subscriber());
    }

    #[test]
    fn test_notify_delivers_and_forwards_errors() {
        let notifier = ChangeNotifier::<i32>::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let recv = received.clone();
        notifier
            .subscribe(move |change| {
                recv.lock().push(change.clone());
                match change {
                    CollectionChange::Reset => Err(NotifierError::rejected(Busy)),
                    _ => Ok(()),
                }
            })
            .unwrap();

        let insert = CollectionChange::Insert {
            index: 0,
            items: vec![7],
        };
        notifier.notify(&insert).unwrap();
        assert!(matches!(
            notifier.notify(&CollectionChange::Reset),
            Err(NotifierError::Rejected(_))
        ));
        assert_eq!(*received.lock(), vec![insert, CollectionChange::Reset]);
    }

    #[test]
    fn test_notify_without_subscriber() {
        let notifier = ChangeNotifier::<i32>::new();
        assert!(notifier.notify(&CollectionChange::Reset).is_ok());
    }
}
