//! The flattening controller.
//!
//! [`TreeFlattener`] keeps the visible rows of a tree as one flat sequence:
//! the pre-order walk of the top-level rows where a row's children are
//! included only while it is expanded. Expansion, collapse and edits of any
//! followed child collection are applied incrementally. Each one is spliced
//! into the sequence as at most one contiguous removal followed by one
//! contiguous insertion, and reported through [`TreeFlattener::changed`].
//! Whole-tree operations (new root items, a new sort order, expanding or
//! collapsing everything) rebuild the sequence and report a single
//! [`FlatChange::Reset`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use canopy::model::{FlatChange, IndexPath, ItemsSource, TreeFlattener};
//! use canopy_core::ObservableList;
//!
//! struct Node {
//!     name: &'static str,
//!     children: Option<Arc<ObservableList<Node>>>,
//! }
//!
//! let leaf = |name| Node { name, children: None };
//! let folder = Arc::new(ObservableList::new(vec![leaf("x"), leaf("y")]));
//! let roots = vec![
//!     Arc::new(Node { name: "a", children: Some(folder.clone()) }),
//!     Arc::new(leaf("b")),
//! ];
//!
//! let flattener = TreeFlattener::builder(roots)
//!     .children(|node: &Node| node.children.clone().map(ItemsSource::Observable))
//!     .sort(|a: &Node, b: &Node| a.name.cmp(b.name))
//!     .build()
//!     .unwrap();
//!
//! flattener.changed().connect(|change: &FlatChange| {
//!     println!("{change:?}");
//! });
//!
//! let a = flattener.row_id_at(0).unwrap();
//! flattener.expand(a).unwrap();
//! assert_eq!(flattener.len(), 4);
//! assert_eq!(flattener.flat_index_of(&IndexPath::from([0, 1])), Some(2));
//!
//! folder.remove(0).unwrap();
//! assert_eq!(flattener.len(), 3);
//! ```

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use canopy_core::logging::targets;
use canopy_core::{ChangeHandler, CollectionChange, NotifierError, Signal};
use parking_lot::Mutex;

use super::index_path::IndexPath;
use super::level::{
    ChildrenFn, CompareFn, ItemsSource, LevelChange, LevelEnv, LevelOwner, SortableLevel,
};
use super::row::{Row, RowArena, RowId};
use crate::error::{FlattenError, Result};

/// Default for [`FlattenerConfig::expand_depth_limit`].
pub const DEFAULT_EXPAND_DEPTH_LIMIT: usize = 64;

/// How [`TreeFlattener::flat_index_of`] resolves a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PathLookup {
    /// Keep a path-to-index map in sync with the flat sequence.
    #[default]
    Indexed,
    /// Scan the flat sequence on every lookup.
    Linear,
}

/// Configuration for a [`TreeFlattener`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenerConfig {
    /// Path lookup strategy.
    pub path_lookup: PathLookup,
    /// Rows deeper than this are left collapsed by
    /// [`TreeFlattener::expand_all`]. Guards against model graphs that
    /// contain themselves.
    pub expand_depth_limit: usize,
}

impl Default for FlattenerConfig {
    fn default() -> Self {
        Self {
            path_lookup: PathLookup::default(),
            expand_depth_limit: DEFAULT_EXPAND_DEPTH_LIMIT,
        }
    }
}

/// A change to the flat row sequence.
///
/// Indices refer to the sequence as it was right before the change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlatChange {
    /// `rows` now occupy `flat_index..flat_index + rows.len()`.
    Insert { flat_index: usize, rows: Vec<RowId> },
    /// `rows` were removed from `flat_index..flat_index + rows.len()`.
    Remove { flat_index: usize, rows: Vec<RowId> },
    /// The whole sequence was rebuilt.
    Reset,
}

impl FlatChange {
    /// Returns the first flat index touched, or `None` for a reset.
    pub fn flat_index(&self) -> Option<usize> {
        match self {
            Self::Insert { flat_index, .. } | Self::Remove { flat_index, .. } => Some(*flat_index),
            Self::Reset => None,
        }
    }

    /// Returns the number of rows inserted or removed. Zero for a reset.
    pub fn count(&self) -> usize {
        match self {
            Self::Insert { rows, .. } | Self::Remove { rows, .. } => rows.len(),
            Self::Reset => 0,
        }
    }
}

/// A snapshot of one row.
pub struct RowInfo<M> {
    /// Handle of the row.
    pub id: RowId,
    /// The wrapped model.
    pub model: Arc<M>,
    /// Path at the time of the snapshot.
    pub path: IndexPath,
    /// Whether the row's children are shown.
    pub expanded: bool,
}

impl<M> RowInfo<M> {
    /// Top-level rows have depth 1.
    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    /// Top-level rows have indent 0.
    pub fn indent(&self) -> usize {
        self.path.depth().saturating_sub(1)
    }

    fn from_row(id: RowId, row: &Row<M>) -> Self {
        Self {
            id,
            model: row.model().clone(),
            path: row.path().clone(),
            expanded: row.is_expanded(),
        }
    }
}

impl<M> Clone for RowInfo<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            model: self.model.clone(),
            path: self.path.clone(),
            expanded: self.expanded,
        }
    }
}

impl<M: fmt::Debug> fmt::Debug for RowInfo<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowInfo")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("path", &self.path)
            .field("expanded", &self.expanded)
            .finish()
    }
}

/// Maintains the flat, ordered sequence of visible rows of a tree.
///
/// Cloning yields another handle to the same sequence.
///
/// Operations run one at a time. A mutation started while another is still
/// being applied, for example from a [`changed`](Self::changed) slot or from
/// a model collection edited inside such a slot, fails with
/// [`FlattenError::Reentrant`]. Read operations are always allowed from
/// slots.
pub struct TreeFlattener<M> {
    shared: Arc<Shared<M>>,
}

struct Shared<M> {
    state: Mutex<State<M>>,
    busy: AtomicBool,
    suppressed: AtomicBool,
    /// Levels that missed a source edit and must be resynced.
    stale: Mutex<Vec<LevelOwner>>,
    changed: Signal<FlatChange>,
    sorted: Signal<()>,
}

struct State<M> {
    rows: RowArena<M>,
    root: Option<SortableLevel<M>>,
    flat: Vec<RowId>,
    path_index: Option<HashMap<IndexPath, usize>>,
    compare: Option<CompareFn<M>>,
    children: Option<ChildrenFn<M>>,
    config: FlattenerConfig,
    this: Weak<Shared<M>>,
}

/// Raises an atomic flag for the guard's lifetime.
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(target: targets::FLATTEN, "rejecting re-entrant change");
            return Err(FlattenError::Reentrant);
        }
        Ok(Self(flag))
    }

    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn source_handler<M: Send + Sync + 'static>(
    shared: Weak<Shared<M>>,
    owner: LevelOwner,
) -> ChangeHandler<Arc<M>> {
    Arc::new(move |change: &CollectionChange<Arc<M>>| match shared.upgrade() {
        Some(shared) => shared
            .on_source_change(owner, change)
            .map_err(NotifierError::rejected),
        None => Ok(()),
    })
}

impl<M: Send + Sync + 'static> Shared<M> {
    /// Runs an incremental mutation and emits the changes it produced, even
    /// when it failed part way.
    fn mutate<R>(
        &self,
        op: impl FnOnce(&mut State<M>, &mut Vec<FlatChange>) -> Result<R>,
    ) -> Result<R> {
        let _busy = FlagGuard::acquire(&self.busy)?;
        let mut events = Vec::new();
        let result = {
            let mut state = self.state.lock();
            let stale = self.take_stale();
            state
                .resync(&stale, &mut events)
                .and_then(|()| op(&mut *state, &mut events))
        };
        for event in events {
            tracing::trace!(
                target: targets::FLATTEN,
                flat_index = ?event.flat_index(),
                count = event.count(),
                "flat change"
            );
            self.changed.emit(event);
        }
        result
    }

    /// Runs a whole-tree mutation with source changes deferred, catches up
    /// with them, then rebuilds the sequence and emits a reset.
    fn batch<R>(&self, op: impl FnOnce(&mut State<M>) -> Result<R>) -> Result<R> {
        let _busy = FlagGuard::acquire(&self.busy)?;
        let result = {
            let _quiet = FlagGuard::raise(&self.suppressed);
            let mut state = self.state.lock();
            let result = op(&mut *state);
            let stale = self.take_stale();
            let resynced = state.resync(&stale, &mut Vec::new());
            state.rebuild_flat();
            result.and_then(|value| resynced.map(|()| value))
        };
        self.changed.emit(FlatChange::Reset);
        result
    }

    fn on_source_change(&self, owner: LevelOwner, change: &CollectionChange<Arc<M>>) -> Result<()> {
        if self.suppressed.load(Ordering::Acquire) {
            tracing::trace!(target: targets::FLATTEN, ?owner, "deferring source change until the rebuild ends");
            self.mark_stale(owner);
            return Ok(());
        }
        // A stale level is resynced from its source first, which already
        // includes this change.
        let covered = self.stale.lock().contains(&owner);
        let result = self.mutate(|state, events| {
            if covered {
                return Ok(());
            }
            state.apply_source_change(owner, change, events)
        });
        if let Err(FlattenError::Reentrant) = result {
            self.mark_stale(owner);
        }
        result
    }

    fn mark_stale(&self, owner: LevelOwner) {
        let mut stale = self.stale.lock();
        if !stale.contains(&owner) {
            stale.push(owner);
        }
    }

    fn take_stale(&self) -> Vec<LevelOwner> {
        std::mem::take(&mut *self.stale.lock())
    }
}

impl<M: Send + Sync + 'static> State<M> {
    fn new(
        config: FlattenerConfig,
        compare: Option<CompareFn<M>>,
        children: Option<ChildrenFn<M>>,
        this: Weak<Shared<M>>,
    ) -> Self {
        let path_index = match config.path_lookup {
            PathLookup::Indexed => Some(HashMap::new()),
            PathLookup::Linear => None,
        };
        Self {
            rows: RowArena::new(),
            root: None,
            flat: Vec::new(),
            path_index,
            compare,
            children,
            config,
            this,
        }
    }

    fn with_env<R>(&mut self, f: impl FnOnce(&mut LevelEnv<'_, M>) -> R) -> R {
        let this = self.this.clone();
        let connect = move |owner: LevelOwner| source_handler(this.clone(), owner);
        let mut env = LevelEnv {
            rows: &mut self.rows,
            compare: self.compare.as_ref(),
            connect: &connect,
        };
        f(&mut env)
    }

    fn level(&self, owner: LevelOwner) -> Option<&SortableLevel<M>> {
        match owner {
            LevelOwner::Root => self.root.as_ref(),
            LevelOwner::Row(id) => self.rows.get(id).and_then(Row::children),
        }
    }

    fn take_level(&mut self, owner: LevelOwner) -> Option<SortableLevel<M>> {
        match owner {
            LevelOwner::Root => self.root.take(),
            LevelOwner::Row(id) => self.rows.get_mut(id).and_then(Row::take_children),
        }
    }

    fn put_level(&mut self, owner: LevelOwner, mut level: SortableLevel<M>) {
        match owner {
            LevelOwner::Root => self.root = Some(level),
            LevelOwner::Row(id) => match self.rows.get_mut(id) {
                Some(row) => row.set_children(level),
                None => level.dispose(&mut self.rows),
            },
        }
    }

    fn owner_path(&self, owner: LevelOwner) -> Option<IndexPath> {
        match owner {
            LevelOwner::Root => Some(IndexPath::root()),
            LevelOwner::Row(id) => self.rows.path(id).cloned(),
        }
    }

    fn row_info(&self, id: RowId) -> Option<RowInfo<M>> {
        self.rows.get(id).map(|row| RowInfo::from_row(id, row))
    }

    fn flat_position(&self, id: RowId) -> Option<usize> {
        match &self.path_index {
            Some(index) => {
                let path = self.rows.path(id)?;
                index
                    .get(path)
                    .copied()
                    .filter(|&i| self.flat.get(i) == Some(&id))
            }
            None => self.flat.iter().position(|&row| row == id),
        }
    }

    fn flat_index_of(&self, path: &IndexPath) -> Option<usize> {
        match &self.path_index {
            Some(index) => index.get(path).copied(),
            None => self
                .flat
                .iter()
                .position(|&id| self.rows.path(id) == Some(path)),
        }
    }

    /// Rebuilds the path index entries from `start` onward. Entries before
    /// `start` are untouched.
    fn reindex_from(&mut self, start: usize) {
        let Self {
            path_index,
            flat,
            rows,
            ..
        } = self;
        let Some(index) = path_index else {
            return;
        };
        index.retain(|_, i| *i < start);
        for (i, &id) in flat.iter().enumerate().skip(start) {
            if let Some(path) = rows.path(id) {
                index.insert(path.clone(), i);
            }
        }
    }

    fn rebuild_flat(&mut self) {
        self.flat.clear();
        if let Some(root) = &self.root {
            for &id in root.rows() {
                self.rows.flatten_into(id, &mut self.flat);
            }
        }
        self.reindex_from(0);
        tracing::debug!(target: targets::FLATTEN, rows = self.flat.len(), "flat sequence rebuilt");
    }

    /// Number of consecutive rows from `start` at `depth` or deeper.
    fn subtree_len(&self, start: usize, depth: usize) -> usize {
        self.flat
            .iter()
            .skip(start)
            .take_while(|&&id| self.rows.depth(id) >= depth)
            .count()
    }

    /// Flat length of `count` sibling rows at `depth` starting at `start`,
    /// including their visible descendants.
    fn span_len(&self, start: usize, depth: usize, count: usize) -> Result<usize> {
        let mut seen = 0;
        let mut end = start;
        while let Some(&id) = self.flat.get(end) {
            let row_depth = self.rows.depth(id);
            if row_depth < depth {
                break;
            }
            if row_depth == depth {
                if seen == count {
                    break;
                }
                seen += 1;
            }
            end += 1;
        }
        if seen < count {
            tracing::error!(
                target: targets::FLATTEN,
                flat_index = start,
                requested = count,
                available = seen,
                "removal exceeds the rows present"
            );
            return Err(FlattenError::SpanOverflow {
                flat_index: start,
                requested: count,
                available: seen,
            });
        }
        Ok(end - start)
    }

    /// Flat index of the first row after `preceding` siblings that start at
    /// `base`.
    fn flat_start(&self, base: usize, preceding: &[RowId]) -> usize {
        base + preceding
            .iter()
            .map(|&id| self.rows.visible_span(id))
            .sum::<usize>()
    }

    /// Replaces `remove_len` flat rows at `start` with `roots` and their
    /// visible descendants.
    fn replace_span(
        &mut self,
        start: usize,
        remove_len: usize,
        roots: &[RowId],
        events: &mut Vec<FlatChange>,
    ) -> Result<()> {
        if start + remove_len > self.flat.len() {
            tracing::error!(target: targets::FLATTEN, start, remove_len, len = self.flat.len(), "splice out of bounds");
            return Err(FlattenError::SpanOverflow {
                flat_index: start,
                requested: remove_len,
                available: self.flat.len().saturating_sub(start),
            });
        }
        let mut inserted = Vec::new();
        for &id in roots {
            self.rows.flatten_into(id, &mut inserted);
        }
        let removed: Vec<RowId> = self
            .flat
            .splice(start..start + remove_len, inserted.iter().copied())
            .collect();
        self.reindex_from(start);

        tracing::trace!(
            target: targets::FLATTEN,
            flat_index = start,
            removed = removed.len(),
            inserted = inserted.len(),
            "spliced"
        );
        if !removed.is_empty() {
            events.push(FlatChange::Remove {
                flat_index: start,
                rows: removed,
            });
        }
        if !inserted.is_empty() {
            events.push(FlatChange::Insert {
                flat_index: start,
                rows: inserted,
            });
        }
        Ok(())
    }

    /// Splices a level's display change into the flat sequence.
    fn splice_level_change(
        &mut self,
        owner: LevelOwner,
        change: &CollectionChange<RowId>,
        events: &mut Vec<FlatChange>,
    ) -> Result<()> {
        let (base, depth) = match owner {
            LevelOwner::Root => (0, 1),
            LevelOwner::Row(id) => match self.flat_position(id) {
                Some(position) => (position + 1, self.rows.depth(id) + 1),
                None => {
                    tracing::trace!(target: targets::FLATTEN, ?owner, "change below a hidden row");
                    return Ok(());
                }
            },
        };
        let Some(level) = self.level(owner) else {
            return Ok(());
        };
        let level_rows = level.rows().to_vec();
        let preceding = |index: usize| &level_rows[..index.min(level_rows.len())];

        match change {
            CollectionChange::Insert { index, items } => {
                let start = self.flat_start(base, preceding(*index));
                self.replace_span(start, 0, items, events)
            }
            CollectionChange::Remove { index, items } => {
                let start = self.flat_start(base, preceding(*index));
                let len = self.span_len(start, depth, items.len())?;
                self.replace_span(start, len, &[], events)
            }
            CollectionChange::Replace {
                index,
                old_items,
                new_items,
            } => {
                let start = self.flat_start(base, preceding(*index));
                let len = self.span_len(start, depth, old_items.len())?;
                self.replace_span(start, len, new_items, events)
            }
            CollectionChange::Move { .. } | CollectionChange::Reset => {
                let len = self.subtree_len(base, depth);
                self.replace_span(base, len, &level_rows, events)
            }
        }
    }

    /// Runs `update` on the owner's level and splices the result.
    ///
    /// If the splice fails the flat sequence is rebuilt from the levels and
    /// reported as a reset before the error is returned.
    fn update_level(
        &mut self,
        owner: LevelOwner,
        events: &mut Vec<FlatChange>,
        update: impl FnOnce(
            &mut SortableLevel<M>,
            &IndexPath,
            &mut LevelEnv<'_, M>,
        ) -> Result<Option<LevelChange>>,
    ) -> Result<()> {
        let (Some(parent_path), Some(mut level)) = (self.owner_path(owner), self.take_level(owner))
        else {
            tracing::warn!(target: targets::FLATTEN, ?owner, "source change for a level that is gone");
            return Ok(());
        };
        let applied = self.with_env(|env| update(&mut level, &parent_path, env));
        self.put_level(owner, level);

        let Some(LevelChange { change, discarded }) = applied? else {
            return Ok(());
        };
        let result = self.splice_level_change(owner, &change, events);
        if let Err(err) = &result {
            tracing::error!(target: targets::FLATTEN, ?owner, %err, "splice failed, rebuilding");
            self.rebuild_flat();
            events.push(FlatChange::Reset);
        }
        for id in discarded {
            self.rows.release(id);
        }
        result
    }

    fn apply_source_change(
        &mut self,
        owner: LevelOwner,
        change: &CollectionChange<Arc<M>>,
        events: &mut Vec<FlatChange>,
    ) -> Result<()> {
        let result = self.update_level(owner, events, |level, path, env| {
            level.apply_source_change(change, path, env)
        });
        match result {
            Err(err @ FlattenError::SourceOutOfSync { .. }) => {
                tracing::error!(target: targets::FLATTEN, ?owner, %err, "resyncing level");
                self.update_level(owner, events, |level, path, env| level.resync(path, env))?;
                Err(err)
            }
            other => other,
        }
    }

    /// Resyncs every listed level that still exists.
    fn resync(&mut self, owners: &[LevelOwner], events: &mut Vec<FlatChange>) -> Result<()> {
        for &owner in owners {
            if self.level(owner).is_none() {
                continue;
            }
            self.update_level(owner, events, |level, path, env| level.resync(path, env))?;
        }
        Ok(())
    }

    /// Builds the row's child level without touching the flat sequence.
    ///
    /// Returns `false` if the row was already expanded.
    fn materialize(&mut self, id: RowId) -> Result<bool> {
        let row = self.rows.get(id).ok_or(FlattenError::RowDisposed)?;
        if row.is_expanded() {
            return Ok(false);
        }
        let path = row.path().clone();
        let source = self
            .children
            .as_ref()
            .and_then(|children| children(&**row.model()))
            .unwrap_or_else(|| ItemsSource::Fixed(Vec::new()));

        let owner = LevelOwner::Row(id);
        let level = self.with_env(|env| SortableLevel::build(owner, &path, source, env))?;
        self.put_level(owner, level);
        Ok(true)
    }

    fn expand(&mut self, id: RowId, events: &mut Vec<FlatChange>) -> Result<()> {
        if !self.materialize(id)? {
            return Ok(());
        }
        let children = self
            .level(LevelOwner::Row(id))
            .map(|level| level.rows().to_vec())
            .unwrap_or_default();
        tracing::debug!(target: targets::FLATTEN, ?id, children = children.len(), "expanded");

        match self.flat_position(id) {
            Some(position) => self.replace_span(position + 1, 0, &children, events),
            None => Ok(()),
        }
    }

    fn collapse(&mut self, id: RowId, events: &mut Vec<FlatChange>) -> Result<()> {
        let row = self.rows.get(id).ok_or(FlattenError::RowDisposed)?;
        if !row.is_expanded() {
            return Ok(());
        }
        let depth = row.depth();

        let result = match self.flat_position(id) {
            Some(position) => {
                let len = self.subtree_len(position + 1, depth + 1);
                self.replace_span(position + 1, len, &[], events)
            }
            None => Ok(()),
        };
        self.rows.collapse(id);
        tracing::debug!(target: targets::FLATTEN, ?id, "collapsed");
        result
    }

    fn expand_path(&mut self, path: &IndexPath, events: &mut Vec<FlatChange>) -> Result<Option<RowId>> {
        if path.is_root() {
            return Err(FlattenError::EmptyPath);
        }
        let mut owner = LevelOwner::Root;
        let mut target = None;
        for segment in path.iter() {
            if let LevelOwner::Row(id) = owner {
                self.expand(id, events)?;
            }
            let Some(id) = self
                .level(owner)
                .and_then(|level| level.rows().get(segment).copied())
            else {
                return Ok(None);
            };
            owner = LevelOwner::Row(id);
            target = Some(id);
        }
        Ok(target)
    }

    fn set_items(&mut self, source: ItemsSource<M>) -> Result<()> {
        if let Some(mut old) = self.root.take() {
            old.dispose(&mut self.rows);
        }
        let level = self.with_env(|env| {
            SortableLevel::build(LevelOwner::Root, &IndexPath::root(), source, env)
        })?;
        self.root = Some(level);
        Ok(())
    }

    fn set_comparator(&mut self, compare: Option<CompareFn<M>>) -> Result<()> {
        self.compare = compare;
        let owners = std::iter::once(LevelOwner::Root)
            .chain(self.rows.expanded_rows().into_iter().map(LevelOwner::Row));
        for owner in owners.collect::<Vec<_>>() {
            let Some(mut level) = self.take_level(owner) else {
                continue;
            };
            let resorted = self.with_env(|env| level.resort(env));
            self.put_level(owner, level);
            resorted?;
        }
        Ok(())
    }

    fn expand_all(&mut self) -> Result<()> {
        let limit = self.config.expand_depth_limit;
        let mut pending: Vec<RowId> = self
            .root
            .as_ref()
            .map(|root| root.rows().to_vec())
            .unwrap_or_default();
        while let Some(id) = pending.pop() {
            if self.rows.depth(id) > limit {
                continue;
            }
            self.materialize(id)?;
            if let Some(level) = self.level(LevelOwner::Row(id)) {
                pending.extend_from_slice(level.rows());
            }
        }
        Ok(())
    }

    fn collapse_all(&mut self) {
        for id in self.rows.expanded_rows() {
            self.rows.collapse(id);
        }
    }
}

impl<M: Send + Sync + 'static> TreeFlattener<M> {
    /// Starts building a flattener over the given top-level items.
    pub fn builder(items: impl Into<ItemsSource<M>>) -> TreeFlattenerBuilder<M> {
        TreeFlattenerBuilder::new(items.into())
    }

    /// Creates an unsorted flattener whose rows have no children.
    pub fn new(items: impl Into<ItemsSource<M>>) -> Result<Self> {
        Self::builder(items).build()
    }

    /// Signal emitted for every change of the flat sequence.
    pub fn changed(&self) -> &Signal<FlatChange> {
        &self.shared.changed
    }

    /// Signal emitted after the sort order changed.
    pub fn sorted(&self) -> &Signal<()> {
        &self.shared.sorted
    }

    /// Returns the configuration.
    pub fn config(&self) -> FlattenerConfig {
        self.shared.state.lock().config.clone()
    }

    /// Number of visible rows.
    pub fn len(&self) -> usize {
        self.shared.state.lock().flat.len()
    }

    /// Returns `true` if no row is visible.
    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().flat.is_empty()
    }

    /// Returns the row at flat `index`.
    pub fn row_id_at(&self, index: usize) -> Option<RowId> {
        self.shared.state.lock().flat.get(index).copied()
    }

    /// Returns a snapshot of the row at flat `index`.
    pub fn row_at(&self, index: usize) -> Option<RowInfo<M>> {
        let state = self.shared.state.lock();
        let id = *state.flat.get(index)?;
        state.row_info(id)
    }

    /// Returns a snapshot of a live row, visible or not.
    pub fn row_info(&self, id: RowId) -> Option<RowInfo<M>> {
        self.shared.state.lock().row_info(id)
    }

    /// Returns snapshots of all visible rows in order.
    pub fn rows(&self) -> Vec<RowInfo<M>> {
        let state = self.shared.state.lock();
        state
            .flat
            .iter()
            .filter_map(|&id| state.row_info(id))
            .collect()
    }

    /// Returns the models of all visible rows in order.
    pub fn models(&self) -> Vec<Arc<M>> {
        let state = self.shared.state.lock();
        state
            .flat
            .iter()
            .filter_map(|&id| state.rows.get(id).map(|row| row.model().clone()))
            .collect()
    }

    /// Returns the path of the row at flat `index`.
    pub fn path_of(&self, index: usize) -> Option<IndexPath> {
        let state = self.shared.state.lock();
        let id = *state.flat.get(index)?;
        state.rows.path(id).cloned()
    }

    /// Returns the flat index of the visible row at `path`.
    ///
    /// Rows hidden under a collapsed ancestor are not found.
    pub fn flat_index_of(&self, path: &IndexPath) -> Option<usize> {
        self.shared.state.lock().flat_index_of(path)
    }

    /// Returns the flat index of a visible row.
    pub fn flat_index_of_row(&self, id: RowId) -> Option<usize> {
        self.shared.state.lock().flat_position(id)
    }

    /// Returns `true` if the row is part of the flat sequence.
    pub fn is_visible(&self, id: RowId) -> bool {
        self.flat_index_of_row(id).is_some()
    }

    /// Returns `true` while the row's children are shown.
    pub fn is_expanded(&self, id: RowId) -> bool {
        self.shared.state.lock().rows.is_expanded(id)
    }

    /// Number of flat rows the row occupies: itself plus its visible
    /// descendants.
    pub fn visible_span(&self, id: RowId) -> Option<usize> {
        let state = self.shared.state.lock();
        state.rows.get(id)?;
        Some(state.rows.visible_span(id))
    }

    /// Shows the row's children, read from the model's current child
    /// collection. Does nothing if the row is already expanded.
    pub fn expand(&self, id: RowId) -> Result<()> {
        self.shared.mutate(|state, events| state.expand(id, events))
    }

    /// Hides the row's children and releases them. Does nothing if the row
    /// is collapsed.
    pub fn collapse(&self, id: RowId) -> Result<()> {
        self.shared.mutate(|state, events| state.collapse(id, events))
    }

    /// Flips the row's expansion. Returns the new state.
    pub fn toggle(&self, id: RowId) -> Result<bool> {
        self.shared.mutate(|state, events| {
            if state.rows.is_expanded(id) {
                state.collapse(id, events)?;
                Ok(false)
            } else {
                state.expand(id, events)?;
                Ok(true)
            }
        })
    }

    /// Expands every ancestor of `path` so that its row becomes visible.
    ///
    /// Returns the row, or `None` if the path leads nowhere. Ancestors
    /// expanded before the miss stay expanded.
    pub fn expand_path(&self, path: &IndexPath) -> Result<Option<RowId>> {
        self.shared.mutate(|state, events| state.expand_path(path, events))
    }

    /// Expands every row down to the configured depth limit.
    pub fn expand_all(&self) -> Result<()> {
        self.shared.batch(State::expand_all)
    }

    /// Collapses every row.
    pub fn collapse_all(&self) -> Result<()> {
        self.shared.batch(|state| {
            state.collapse_all();
            Ok(())
        })
    }

    /// Replaces the top-level items. All existing rows are released.
    pub fn set_items(&self, items: impl Into<ItemsSource<M>>) -> Result<()> {
        let source = items.into();
        self.shared.batch(|state| state.set_items(source))
    }

    /// Sets or clears the sibling comparator of every level.
    ///
    /// Sorting is stable: siblings that compare equal keep their source
    /// order. Expansion is preserved.
    pub fn set_comparator(&self, compare: Option<CompareFn<M>>) -> Result<()> {
        let sorted = compare.is_some();
        self.shared.batch(|state| state.set_comparator(compare))?;
        tracing::debug!(target: targets::FLATTEN, sorted, "sort order changed");
        self.shared.sorted.emit(());
        Ok(())
    }

    /// Sorts siblings with `compare`.
    pub fn sort_by<F>(&self, compare: F) -> Result<()>
    where
        F: Fn(&M, &M) -> CmpOrdering + Send + Sync + 'static,
    {
        self.set_comparator(Some(Arc::new(compare)))
    }

    /// Restores source order.
    pub fn clear_sort(&self) -> Result<()> {
        self.set_comparator(None)
    }

    /// Returns `true` while a comparator is set.
    pub fn is_sorted(&self) -> bool {
        self.shared.state.lock().compare.is_some()
    }
}

impl<M> Clone for TreeFlattener<M> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<M: Send + Sync + 'static> fmt::Debug for TreeFlattener<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("TreeFlattener")
            .field("len", &state.flat.len())
            .field("live_rows", &state.rows.len())
            .field("sorted", &state.compare.is_some())
            .field("config", &state.config)
            .finish()
    }
}

static_assertions::assert_impl_all!(TreeFlattener<String>: Send, Sync);

/// Builder for [`TreeFlattener`].
///
/// # Example
///
/// ```
/// use canopy::model::{PathLookup, TreeFlattener};
/// use std::sync::Arc;
///
/// let flattener = TreeFlattener::builder(vec![Arc::new(3), Arc::new(1), Arc::new(2)])
///     .sort(|a: &i32, b: &i32| a.cmp(b))
///     .path_lookup(PathLookup::Linear)
///     .build()
///     .unwrap();
/// assert_eq!(*flattener.row_at(0).unwrap().model, 1);
/// ```
pub struct TreeFlattenerBuilder<M> {
    items: ItemsSource<M>,
    children: Option<ChildrenFn<M>>,
    compare: Option<CompareFn<M>>,
    config: FlattenerConfig,
}

impl<M: Send + Sync + 'static> TreeFlattenerBuilder<M> {
    fn new(items: ItemsSource<M>) -> Self {
        Self {
            items,
            children: None,
            compare: None,
            config: FlattenerConfig::default(),
        }
    }

    /// Sets the child selector.
    ///
    /// The selector and the comparator run while the flattener is locked and
    /// must not call back into it.
    pub fn children<F>(mut self, children: F) -> Self
    where
        F: Fn(&M) -> Option<ItemsSource<M>> + Send + Sync + 'static,
    {
        self.children = Some(Arc::new(children));
        self
    }

    /// Sets an already shared child selector.
    pub fn children_fn(mut self, children: ChildrenFn<M>) -> Self {
        self.children = Some(children);
        self
    }

    /// Sorts siblings with `compare`.
    pub fn sort<F>(mut self, compare: F) -> Self
    where
        F: Fn(&M, &M) -> CmpOrdering + Send + Sync + 'static,
    {
        self.compare = Some(Arc::new(compare));
        self
    }

    /// Sets or clears an already shared comparator.
    pub fn comparator(mut self, compare: Option<CompareFn<M>>) -> Self {
        self.compare = compare;
        self
    }

    /// Chooses how paths are resolved to flat indices.
    pub fn path_lookup(mut self, path_lookup: PathLookup) -> Self {
        self.config.path_lookup = path_lookup;
        self
    }

    /// Sets the deepest row that [`TreeFlattener::expand_all`] expands.
    pub fn expand_depth_limit(mut self, limit: usize) -> Self {
        self.config.expand_depth_limit = limit;
        self
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: FlattenerConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the flattener and its top-level rows.
    pub fn build(self) -> Result<TreeFlattener<M>> {
        let Self {
            items,
            children,
            compare,
            config,
        } = self;
        let shared = Arc::new_cyclic(|this| Shared {
            state: Mutex::new(State::new(config, compare, children, this.clone())),
            busy: AtomicBool::new(false),
            suppressed: AtomicBool::new(false),
            stale: Mutex::new(Vec::new()),
            changed: Signal::new(),
            sorted: Signal::new(),
        });
        {
            let mut state = shared.state.lock();
            state.set_items(items)?;
            state.rebuild_flat();
        }
        Ok(TreeFlattener { shared })
    }
}
