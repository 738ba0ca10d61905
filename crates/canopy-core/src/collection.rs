//! Observable ordered collection.
//!
//! `ObservableList` is the host-side collection type that the flattening
//! engine knows how to watch. Each mutation updates the items first and then
//! reports a [`CollectionChange`] to the single subscriber. If the subscriber
//! fails, the mutation is still in place and the error is returned to the
//! caller.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::change::CollectionChange;
use crate::error::{ListError, NotifierError};
use crate::notifier::{ChangeHandler, ChangeNotifier, SubscriptionId};

/// A list of shared items that reports structural changes.
///
/// # Example
///
/// ```
/// use canopy_core::{CollectionChange, ObservableList};
///
/// let list = ObservableList::new(vec!["a".to_string(), "c".to_string()]);
/// list.subscribe(|change| {
///     if let CollectionChange::Insert { index, items } = change {
///         println!("{} item(s) inserted at {}", items.len(), index);
///     }
///     Ok(())
/// })
/// .unwrap();
///
/// list.insert(1, "b".to_string()).unwrap();
/// assert_eq!(list.len(), 3);
/// ```
pub struct ObservableList<T> {
    items: RwLock<Vec<Arc<T>>>,
    notifier: ChangeNotifier<Arc<T>>,
}

impl<T: Send + Sync + 'static> Default for ObservableList<T> {
    fn default() -> Self {
        Self::from_shared(Vec::new())
    }
}

impl<T> ObservableList<T> {
    /// Releases a subscription. See [`ChangeNotifier::unsubscribe`].
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<(), NotifierError> {
        self.notifier.unsubscribe(id)
    }
}

impl<T: Send + Sync + 'static> ObservableList<T> {
    /// Creates a list owning the given items.
    pub fn new(items: Vec<T>) -> Self {
        Self::from_shared(items.into_iter().map(Arc::new).collect())
    }

    /// Creates a list from already shared items.
    pub fn from_shared(items: Vec<Arc<T>>) -> Self {
        Self {
            items: RwLock::new(items),
            notifier: ChangeNotifier::new(),
        }
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Returns `true` if the list has no items.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Returns the item at `index`.
    pub fn get(&self, index: usize) -> Option<Arc<T>> {
        self.items.read().get(index).cloned()
    }

    /// Returns the position of `item` by identity.
    pub fn position(&self, item: &Arc<T>) -> Option<usize> {
        self.items.read().iter().position(|i| Arc::ptr_eq(i, item))
    }

    /// Returns a copy of the current items.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.items.read().clone()
    }

    /// Returns the change notifier of this list.
    pub fn notifier(&self) -> &ChangeNotifier<Arc<T>> {
        &self.notifier
    }

    /// Subscribes to structural changes. See [`ChangeNotifier::subscribe`].
    pub fn subscribe<F>(&self, handler: F) -> Result<SubscriptionId, NotifierError>
    where
        F: Fn(&CollectionChange<Arc<T>>) -> Result<(), NotifierError> + Send + Sync + 'static,
    {
        self.notifier.subscribe(handler)
    }

    /// Subscribes an already shared handler.
    pub fn subscribe_handler(
        &self,
        handler: ChangeHandler<Arc<T>>,
    ) -> Result<SubscriptionId, NotifierError> {
        self.notifier.subscribe_handler(handler)
    }

    /// Appends an item.
    pub fn push(&self, item: T) -> Result<(), ListError> {
        let index = self.len();
        self.insert(index, item)
    }

    /// Inserts an item at `index`.
    pub fn insert(&self, index: usize, item: T) -> Result<(), ListError> {
        self.insert_many(index, vec![Arc::new(item)])
    }

    /// Inserts a run of shared items starting at `index`.
    pub fn insert_many(&self, index: usize, items: Vec<Arc<T>>) -> Result<(), ListError> {
        if items.is_empty() {
            return Ok(());
        }
        {
            let mut guard = self.items.write();
            if index > guard.len() {
                return Err(ListError::out_of_range(index, items.len(), guard.len()));
            }
            guard.splice(index..index, items.iter().cloned());
        }
        self.notify(CollectionChange::Insert { index, items })
    }

    /// Removes and returns the item at `index`.
    pub fn remove(&self, index: usize) -> Result<Arc<T>, ListError> {
        let mut removed = self.remove_range(index, 1)?;
        // remove_range returned exactly one item
        Ok(removed.swap_remove(0))
    }

    /// Removes `count` items starting at `index`.
    pub fn remove_range(&self, index: usize, count: usize) -> Result<Vec<Arc<T>>, ListError> {
        let items: Vec<Arc<T>> = {
            let mut guard = self.items.write();
            if count == 0 || index.checked_add(count).is_none_or(|end| end > guard.len()) {
                return Err(ListError::out_of_range(index, count, guard.len()));
            }
            guard.drain(index..index + count).collect()
        };
        self.notify(CollectionChange::Remove {
            index,
            items: items.clone(),
        })?;
        Ok(items)
    }

    /// Removes the first item identical to `item`. Returns `false` if absent.
    pub fn remove_item(&self, item: &Arc<T>) -> Result<bool, ListError> {
        match self.position(item) {
            Some(index) => self.remove_range(index, 1).map(|_| true),
            None => Ok(false),
        }
    }

    /// Replaces the item at `index`, returning the old one.
    pub fn replace(&self, index: usize, item: T) -> Result<Arc<T>, ListError> {
        let new_item = Arc::new(item);
        let old_item = {
            let mut guard = self.items.write();
            let len = guard.len();
            let slot = guard
                .get_mut(index)
                .ok_or_else(|| ListError::out_of_range(index, 1, len))?;
            std::mem::replace(slot, new_item.clone())
        };
        self.notify(CollectionChange::Replace {
            index,
            old_items: vec![old_item.clone()],
            new_items: vec![new_item],
        })?;
        Ok(old_item)
    }

    /// Moves the item at `old_index` so that it ends up at `new_index`.
    pub fn move_item(&self, old_index: usize, new_index: usize) -> Result<(), ListError> {
        self.move_range(old_index, 1, new_index)
    }

    /// Moves `count` items at `old_index` so that they end up starting at
    /// `new_index` in the resulting list.
    pub fn move_range(&self, old_index: usize, count: usize, new_index: usize) -> Result<(), ListError> {
        let items: Vec<Arc<T>> = {
            let mut guard = self.items.write();
            let len = guard.len();
            if count == 0 || old_index.checked_add(count).is_none_or(|end| end > len) {
                return Err(ListError::out_of_range(old_index, count, len));
            }
            if new_index.checked_add(count).is_none_or(|end| end > len) {
                return Err(ListError::out_of_range(new_index, count, len));
            }
            if old_index == new_index {
                return Ok(());
            }
            let moved: Vec<Arc<T>> = guard.drain(old_index..old_index + count).collect();
            guard.splice(new_index..new_index, moved.iter().cloned());
            moved
        };
        self.notify(CollectionChange::Move {
            old_index,
            new_index,
            items,
        })
    }

    /// Replaces the whole contents and reports a reset.
    pub fn reset(&self, items: Vec<T>) -> Result<(), ListError> {
        *self.items.write() = items.into_iter().map(Arc::new).collect();
        self.notify(CollectionChange::Reset)
    }

    /// Removes every item and reports a reset.
    pub fn clear(&self) -> Result<(), ListError> {
        self.items.write().clear();
        self.notify(CollectionChange::Reset)
    }

    fn notify(&self, change: CollectionChange<Arc<T>>) -> Result<(), ListError> {
        self.notifier.notify(&change).map_err(ListError::from)
    }
}

impl<T> std::fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableList")
            .field("len", &self.items.read().len())
            .finish_non_exhaustive()
    }
}

static_assertions::assert_impl_all!(ObservableList<String>: Send, Sync);
