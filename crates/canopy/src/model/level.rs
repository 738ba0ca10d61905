//! One level of sibling rows kept in display order.
//!
//! A [`SortableLevel`] mirrors a model collection as rows. It remembers the
//! source order of its rows and, when a comparator is set, a separate sorted
//! display order. Source edits are translated into a single contiguous change
//! of the display order, which the flattener then splices into the flat
//! sequence.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use canopy_core::logging::targets;
use canopy_core::{ChangeHandler, CollectionChange, ObservableList, SubscriptionId};

use super::index_path::IndexPath;
use super::row::{Row, RowArena, RowId};
use crate::error::{FlattenError, Result};

/// Orders two sibling models.
pub type CompareFn<M> = Arc<dyn Fn(&M, &M) -> Ordering + Send + Sync>;

/// Produces the child collection of a model, or `None` for a leaf.
pub type ChildrenFn<M> = Arc<dyn Fn(&M) -> Option<ItemsSource<M>> + Send + Sync>;

/// A collection of models that makes up one tree level.
pub enum ItemsSource<M> {
    /// A collection that never changes.
    Fixed(Vec<Arc<M>>),
    /// A collection whose structural edits are followed.
    Observable(Arc<ObservableList<M>>),
}

impl<M: Send + Sync + 'static> ItemsSource<M> {
    /// Returns the current items.
    pub fn snapshot(&self) -> Vec<Arc<M>> {
        match self {
            Self::Fixed(items) => items.clone(),
            Self::Observable(list) => list.snapshot(),
        }
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        match self {
            Self::Fixed(items) => items.len(),
            Self::Observable(list) => list.len(),
        }
    }

    /// Returns `true` if the collection has no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if edits to this collection are followed.
    pub fn is_observable(&self) -> bool {
        matches!(self, Self::Observable(_))
    }
}

impl<M> Clone for ItemsSource<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Fixed(items) => Self::Fixed(items.clone()),
            Self::Observable(list) => Self::Observable(list.clone()),
        }
    }
}

impl<M> fmt::Debug for ItemsSource<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(items) => f.debug_tuple("Fixed").field(&items.len()).finish(),
            Self::Observable(_) => f.write_str("Observable(..)"),
        }
    }
}

impl<M> From<Vec<Arc<M>>> for ItemsSource<M> {
    fn from(items: Vec<Arc<M>>) -> Self {
        Self::Fixed(items)
    }
}

impl<M> From<Arc<ObservableList<M>>> for ItemsSource<M> {
    fn from(list: Arc<ObservableList<M>>) -> Self {
        Self::Observable(list)
    }
}

/// Who owns a level: the invisible root or an expanded row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LevelOwner {
    Root,
    Row(RowId),
}

/// What a level needs from its surroundings while it changes.
pub(crate) struct LevelEnv<'a, M> {
    pub(crate) rows: &'a mut RowArena<M>,
    pub(crate) compare: Option<&'a CompareFn<M>>,
    pub(crate) connect: &'a dyn Fn(LevelOwner) -> ChangeHandler<Arc<M>>,
}

/// The effect of a source edit on a level's display order.
#[derive(Debug)]
pub(crate) struct LevelChange {
    /// One contiguous edit, or `Reset`.
    pub(crate) change: CollectionChange<RowId>,
    /// Rows that left the level. They are still in the arena and must be
    /// released once the flat sequence no longer refers to them.
    pub(crate) discarded: Vec<RowId>,
}

/// Sibling rows in source order and in display order.
pub(crate) struct SortableLevel<M> {
    owner: LevelOwner,
    source: ItemsSource<M>,
    subscription: Option<SubscriptionId>,
    source_rows: Vec<RowId>,
    rows: Vec<RowId>,
}

impl<M> SortableLevel<M> {
    /// Rows in display order.
    pub(crate) fn rows(&self) -> &[RowId] {
        &self.rows
    }

    #[cfg(test)]
    pub(crate) fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    fn unsubscribe(&mut self) {
        let Some(id) = self.subscription.take() else {
            return;
        };
        if let ItemsSource::Observable(list) = &self.source
            && let Err(err) = list.unsubscribe(id)
        {
            tracing::warn!(target: targets::LEVEL, owner = ?self.owner, %err, "failed to unsubscribe");
        }
    }
}

impl<M: Send + Sync + 'static> SortableLevel<M> {
    /// Creates rows for every item of `source` and starts following it.
    pub(crate) fn build(
        owner: LevelOwner,
        parent_path: &IndexPath,
        source: ItemsSource<M>,
        env: &mut LevelEnv<'_, M>,
    ) -> Result<Self> {
        let subscription = match &source {
            ItemsSource::Observable(list) => Some(list.subscribe_handler((env.connect)(owner))?),
            ItemsSource::Fixed(_) => None,
        };
        let mut level = Self {
            owner,
            source,
            subscription,
            source_rows: Vec::new(),
            rows: Vec::new(),
        };
        match level.populate(parent_path, env) {
            Ok(()) => {
                tracing::trace!(target: targets::LEVEL, ?owner, rows = level.rows.len(), "level built");
                Ok(level)
            }
            Err(err) => {
                level.dispose(env.rows);
                Err(err)
            }
        }
    }

    fn populate(&mut self, parent_path: &IndexPath, env: &mut LevelEnv<'_, M>) -> Result<()> {
        let items = self.source.snapshot();
        self.source_rows = self.create_rows(&items, parent_path, env)?;
        self.rows = self.display_order(env);
        self.restamp(0, env.rows)
    }

    fn create_rows(
        &self,
        items: &[Arc<M>],
        parent_path: &IndexPath,
        env: &mut LevelEnv<'_, M>,
    ) -> Result<Vec<RowId>> {
        let mut ids = Vec::with_capacity(items.len());
        for (i, model) in items.iter().enumerate() {
            ids.push(env.rows.insert(Row::new(model.clone(), parent_path.child(i))?));
        }
        Ok(ids)
    }

    /// Source order, stably sorted by the comparator if there is one.
    fn display_order(&self, env: &LevelEnv<'_, M>) -> Vec<RowId> {
        let mut order = self.source_rows.clone();
        if let Some(compare) = env.compare {
            let rows = &*env.rows;
            order.sort_by(|&a, &b| compare_rows(rows, compare, a, b));
        }
        order
    }

    /// Gives every row from display position `from` onward the path that
    /// matches its position.
    fn restamp(&self, from: usize, rows: &mut RowArena<M>) -> Result<()> {
        for (position, &id) in self.rows.iter().enumerate().skip(from) {
            let current = rows
                .path(id)
                .and_then(IndexPath::last)
                .ok_or(FlattenError::RowDisposed)?;
            rows.shift_index(id, position as isize - current as isize)?;
        }
        Ok(())
    }

    /// Inserts freshly created rows into the sorted display order.
    ///
    /// Ties are broken by source position, so equal rows keep source order.
    fn place(&mut self, ids: &[RowId], env: &LevelEnv<'_, M>) {
        let Some(compare) = env.compare else {
            return;
        };
        let rows = &*env.rows;
        let positions: HashMap<RowId, usize> = self
            .source_rows
            .iter()
            .enumerate()
            .map(|(i, &id)| (id, i))
            .collect();
        for &id in ids {
            let at = self.rows.partition_point(|&other| {
                match compare_rows(rows, compare, other, id) {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => positions.get(&other) < positions.get(&id),
                }
            });
            self.rows.insert(at, id);
        }
    }

    fn unplace(&mut self, ids: &[RowId]) {
        self.rows.retain(|id| !ids.contains(id));
    }

    fn check_range(&self, index: usize, count: usize) -> Result<()> {
        let len = self.source_rows.len();
        if index.checked_add(count).is_none_or(|end| end > len) {
            return Err(FlattenError::out_of_sync(index, count, len));
        }
        Ok(())
    }

    /// Checks that the rows at `index` wrap exactly `items`.
    fn check_models(&self, index: usize, items: &[Arc<M>], rows: &RowArena<M>) -> Result<()> {
        self.check_range(index, items.len())?;
        let matches = self.source_rows[index..index + items.len()]
            .iter()
            .zip(items)
            .all(|(&id, item)| rows.get(id).is_some_and(|row| Arc::ptr_eq(row.model(), item)));
        if !matches {
            tracing::error!(
                target: targets::LEVEL,
                owner = ?self.owner,
                index,
                count = items.len(),
                "source change names models the level does not hold there"
            );
            return Err(FlattenError::out_of_sync(index, items.len(), self.source_rows.len()));
        }
        Ok(())
    }

    /// Applies one edit of the followed collection.
    ///
    /// Returns `None` when the display order is unchanged.
    pub(crate) fn apply_source_change(
        &mut self,
        change: &CollectionChange<Arc<M>>,
        parent_path: &IndexPath,
        env: &mut LevelEnv<'_, M>,
    ) -> Result<Option<LevelChange>> {
        let before = self.rows.clone();
        let mut discarded = Vec::new();

        match change {
            CollectionChange::Insert { index, items } => {
                let index = *index;
                self.check_range(index, 0)?;
                let inserted = self.create_rows(items, parent_path, env)?;
                self.source_rows.splice(index..index, inserted.iter().copied());
                self.place(&inserted, env);
            }
            CollectionChange::Remove { index, items } => {
                let index = *index;
                self.check_models(index, items, env.rows)?;
                let removed: Vec<RowId> = self.source_rows.drain(index..index + items.len()).collect();
                self.unplace(&removed);
                discarded = removed;
            }
            CollectionChange::Replace {
                index,
                old_items,
                new_items,
            } => {
                let index = *index;
                self.check_models(index, old_items, env.rows)?;
                let removed: Vec<RowId> = self.source_rows.drain(index..index + old_items.len()).collect();
                self.unplace(&removed);
                discarded = removed;

                let inserted = self.create_rows(new_items, parent_path, env)?;
                self.source_rows.splice(index..index, inserted.iter().copied());
                self.place(&inserted, env);
            }
            CollectionChange::Move {
                old_index,
                new_index,
                items,
            } => {
                let count = items.len();
                self.check_models(*old_index, items, env.rows)?;
                self.check_range(*new_index, count)?;
                let moved: Vec<RowId> = self.source_rows.drain(*old_index..*old_index + count).collect();
                self.source_rows.splice(*new_index..*new_index, moved.iter().copied());
                self.unplace(&moved);
                self.place(&moved, env);
            }
            CollectionChange::Reset => {
                discarded = std::mem::take(&mut self.source_rows);
                self.rows.clear();
                self.populate(parent_path, env)?;
                return Ok(Some(LevelChange {
                    change: CollectionChange::Reset,
                    discarded,
                }));
            }
        }

        if env.compare.is_none() {
            self.rows = self.source_rows.clone();
        }

        self.finish(&before, discarded, env.rows)
    }

    /// Reports the display change against `before` and restamps the rows
    /// from its start onward. Discarded rows were all in `before`, so a
    /// non-empty discard always comes with a change.
    fn finish(
        &self,
        before: &[RowId],
        discarded: Vec<RowId>,
        rows: &mut RowArena<M>,
    ) -> Result<Option<LevelChange>> {
        match contiguous_diff(before, &self.rows) {
            Some(change) => {
                let from = change.index().unwrap_or(0);
                self.restamp(from, rows)?;
                Ok(Some(LevelChange { change, discarded }))
            }
            None => Ok(None),
        }
    }

    /// Brings the level back in line with the current items of its source.
    ///
    /// Rows whose model is still present are kept together with their
    /// children. Rows for new models are created and rows for vanished
    /// models are discarded.
    pub(crate) fn resync(
        &mut self,
        parent_path: &IndexPath,
        env: &mut LevelEnv<'_, M>,
    ) -> Result<Option<LevelChange>> {
        let before = self.rows.clone();
        let mut by_model: HashMap<*const M, Vec<RowId>> = HashMap::new();
        for &id in self.source_rows.iter().rev() {
            if let Some(row) = env.rows.get(id) {
                by_model.entry(Arc::as_ptr(row.model())).or_default().push(id);
            }
        }

        let items = self.source.snapshot();
        let mut source_rows = Vec::with_capacity(items.len());
        for (i, model) in items.iter().enumerate() {
            let kept = by_model.get_mut(&Arc::as_ptr(model)).and_then(Vec::pop);
            let id = match kept {
                Some(id) => id,
                None => env.rows.insert(Row::new(model.clone(), parent_path.child(i))?),
            };
            source_rows.push(id);
        }
        let discarded: Vec<RowId> = by_model.into_values().flatten().collect();

        self.source_rows = source_rows;
        self.rows = self.display_order(env);
        tracing::debug!(
            target: targets::LEVEL,
            owner = ?self.owner,
            rows = self.rows.len(),
            discarded = discarded.len(),
            "level resynced with its source"
        );
        self.finish(&before, discarded, env.rows)
    }

    /// Re-sorts after the comparator changed. Children keep their rows.
    pub(crate) fn resort(&mut self, env: &mut LevelEnv<'_, M>) -> Result<()> {
        self.rows = self.display_order(env);
        self.restamp(0, env.rows)
    }

    /// Stops following the source and releases every row of the level.
    ///
    /// Safe to call more than once.
    pub(crate) fn dispose(&mut self, rows: &mut RowArena<M>) {
        self.unsubscribe();
        self.rows.clear();
        for id in std::mem::take(&mut self.source_rows) {
            rows.release(id);
        }
    }
}

impl<M> Drop for SortableLevel<M> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn compare_rows<M: Send + Sync + 'static>(
    rows: &RowArena<M>,
    compare: &CompareFn<M>,
    a: RowId,
    b: RowId,
) -> Ordering {
    match (rows.get(a), rows.get(b)) {
        (Some(a), Some(b)) => compare(&**a.model(), &**b.model()),
        _ => Ordering::Equal,
    }
}

/// Reduces the difference between two orders to one contiguous edit by
/// trimming the common prefix and suffix.
fn contiguous_diff(before: &[RowId], after: &[RowId]) -> Option<CollectionChange<RowId>> {
    let prefix = before
        .iter()
        .zip(after)
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = before.len().min(after.len()) - prefix;
    let suffix = before
        .iter()
        .rev()
        .zip(after.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let old_items = before[prefix..before.len() - suffix].to_vec();
    let new_items = after[prefix..after.len() - suffix].to_vec();
    match (old_items.is_empty(), new_items.is_empty()) {
        (true, true) => None,
        (true, false) => Some(CollectionChange::Insert {
            index: prefix,
            items: new_items,
        }),
        (false, true) => Some(CollectionChange::Remove {
            index: prefix,
            items: old_items,
        }),
        (false, false) => Some(CollectionChange::Replace {
            index: prefix,
            old_items,
            new_items,
        }),
    }
}
