//! Rows and the arena that owns them.
//!
//! A [`Row`] binds one model to one tree position and carries its expansion
//! state. Rows live in a [`RowArena`] and are addressed by [`RowId`], so a
//! level only stores IDs and the flat sequence is a plain `Vec<RowId>`.

use std::sync::Arc;

use slotmap::{SlotMap, new_key_type};

use super::index_path::IndexPath;
use super::level::SortableLevel;
use crate::error::{FlattenError, Result};

new_key_type! {
    /// A stable handle to a row.
    ///
    /// The handle stays valid for the row's whole lifetime, across sorting,
    /// sibling shifts and collapse. It becomes stale once the row's model
    /// leaves the tree; operations on a stale handle fail with
    /// [`FlattenError::RowDisposed`].
    pub struct RowId;
}

/// One model at one tree position.
///
/// A row is expanded exactly while it holds a child level.
pub(crate) struct Row<M> {
    model: Arc<M>,
    path: IndexPath,
    children: Option<SortableLevel<M>>,
}

impl<M> Row<M> {
    /// Creates a collapsed row. The path must not be the root path.
    pub(crate) fn new(model: Arc<M>, path: IndexPath) -> Result<Self> {
        if path.is_root() {
            return Err(FlattenError::EmptyPath);
        }
        Ok(Self {
            model,
            path,
            children: None,
        })
    }

    /// Returns the wrapped model.
    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    /// Returns the current index path.
    pub fn path(&self) -> &IndexPath {
        &self.path
    }

    /// Returns `true` while the row's children are shown.
    pub fn is_expanded(&self) -> bool {
        self.children.is_some()
    }

    /// Returns the row's depth. Top-level rows have depth 1.
    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    pub(crate) fn children(&self) -> Option<&SortableLevel<M>> {
        self.children.as_ref()
    }

    pub(crate) fn take_children(&mut self) -> Option<SortableLevel<M>> {
        self.children.take()
    }

    pub(crate) fn set_children(&mut self, level: SortableLevel<M>) {
        self.children = Some(level);
    }
}

/// Owner of every live row.
pub(crate) struct RowArena<M> {
    rows: SlotMap<RowId, Row<M>>,
}

impl<M: Send + Sync + 'static> RowArena<M> {
    pub(crate) fn new() -> Self {
        Self {
            rows: SlotMap::with_key(),
        }
    }

    pub(crate) fn insert(&mut self, row: Row<M>) -> RowId {
        self.rows.insert(row)
    }

    pub(crate) fn get(&self, id: RowId) -> Option<&Row<M>> {
        self.rows.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: RowId) -> Option<&mut Row<M>> {
        self.rows.get_mut(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    /// IDs of every row that currently holds a child level.
    pub(crate) fn expanded_rows(&self) -> Vec<RowId> {
        self.rows
            .iter()
            .filter(|(_, row)| row.is_expanded())
            .map(|(id, _)| id)
            .collect()
    }

    pub(crate) fn path(&self, id: RowId) -> Option<&IndexPath> {
        self.rows.get(id).map(Row::path)
    }

    pub(crate) fn depth(&self, id: RowId) -> usize {
        self.rows.get(id).map_or(0, Row::depth)
    }

    pub(crate) fn is_expanded(&self, id: RowId) -> bool {
        self.rows.get(id).is_some_and(Row::is_expanded)
    }

    /// Moves the row's sibling position by `delta` and re-stamps every
    /// descendant with the new prefix.
    pub(crate) fn shift_index(&mut self, id: RowId, delta: isize) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let row = self.rows.get_mut(id).ok_or(FlattenError::RowDisposed)?;
        row.path = row
            .path
            .shifted(delta)
            .ok_or_else(|| FlattenError::InvalidShift {
                path: row.path.clone(),
                delta,
            })?;
        self.restamp_children(id);
        Ok(())
    }

    /// Re-roots the paths of all descendants under the row's current path.
    fn restamp_children(&mut self, id: RowId) {
        let Some(row) = self.rows.get(id) else {
            return;
        };
        let Some(level) = row.children() else {
            return;
        };
        let parent_path = row.path.clone();
        let child_ids = level.rows().to_vec();

        for child in child_ids {
            if let Some(child_row) = self.rows.get_mut(child) {
                child_row.path = child_row.path.reparented(&parent_path);
            }
            self.restamp_children(child);
        }
    }

    /// Number of flat rows the row occupies: itself plus its visible
    /// descendants.
    pub(crate) fn visible_span(&self, id: RowId) -> usize {
        match self.rows.get(id).and_then(Row::children) {
            Some(level) => 1 + level.rows().iter().map(|&c| self.visible_span(c)).sum::<usize>(),
            None => 1,
        }
    }

    /// Appends the row and its visible descendants in pre-order.
    pub(crate) fn flatten_into(&self, id: RowId, out: &mut Vec<RowId>) {
        out.push(id);
        if let Some(level) = self.rows.get(id).and_then(Row::children) {
            for &child in level.rows() {
                self.flatten_into(child, out);
            }
        }
    }

    /// Drops the row's child level, releasing every descendant.
    ///
    /// Returns `false` if the row was not expanded.
    pub(crate) fn collapse(&mut self, id: RowId) -> bool {
        let level = self.rows.get_mut(id).and_then(Row::take_children);
        match level {
            Some(mut level) => {
                level.dispose(self);
                true
            }
            None => false,
        }
    }

    /// Removes the row and releases its subtree.
    pub(crate) fn release(&mut self, id: RowId) {
        if let Some(mut row) = self.rows.remove(id)
            && let Some(mut level) = row.take_children()
        {
            level.dispose(self);
        }
    }
}
