//! Structural change events for ordered collections.
//!
//! [`CollectionChange`] is the vocabulary shared by every observable
//! collection in Canopy: host model collections push it to their subscriber,
//! and the engine republishes row-level changes in the same shape.

/// The kind of a [`CollectionChange`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeAction {
    Insert,
    Remove,
    Replace,
    Move,
    Reset,
}

/// A structural change to an ordered collection.
///
/// Indices are positions in the collection that raised the change:
///
/// - `Insert`: `items` now occupy `index..index + items.len()`.
/// - `Remove`: `items` previously occupied `index..index + items.len()`.
/// - `Replace`: `old_items` at `index` were replaced by `new_items` at the
///   same index. The two runs may differ in length.
/// - `Move`: `items` previously at `old_index` now occupy
///   `new_index..new_index + items.len()` of the resulting collection.
/// - `Reset`: anything may have changed; re-read the whole collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionChange<T> {
    Insert {
        index: usize,
        items: Vec<T>,
    },
    Remove {
        index: usize,
        items: Vec<T>,
    },
    Replace {
        index: usize,
        old_items: Vec<T>,
        new_items: Vec<T>,
    },
    Move {
        old_index: usize,
        new_index: usize,
        items: Vec<T>,
    },
    Reset,
}

impl<T> CollectionChange<T> {
    /// Returns the kind of this change.
    pub fn action(&self) -> ChangeAction {
        match self {
            Self::Insert { .. } => ChangeAction::Insert,
            Self::Remove { .. } => ChangeAction::Remove,
            Self::Replace { .. } => ChangeAction::Replace,
            Self::Move { .. } => ChangeAction::Move,
            Self::Reset => ChangeAction::Reset,
        }
    }

    /// Returns the lowest affected index, or `None` for a reset.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Insert { index, .. } | Self::Remove { index, .. } | Self::Replace { index, .. } => {
                Some(*index)
            }
            Self::Move {
                old_index,
                new_index,
                ..
            } => Some((*old_index).min(*new_index)),
            Self::Reset => None,
        }
    }

    /// Returns the number of items the change carries.
    ///
    /// For a replace this is the number of new items.
    pub fn count(&self) -> usize {
        match self {
            Self::Insert { items, .. } | Self::Remove { items, .. } | Self::Move { items, .. } => {
                items.len()
            }
            Self::Replace { new_items, .. } => new_items.len(),
            Self::Reset => 0,
        }
    }

    /// Returns the net change in collection length, if known.
    pub fn len_delta(&self) -> Option<isize> {
        match self {
            Self::Insert { items, .. } => Some(items.len() as isize),
            Self::Remove { items, .. } => Some(-(items.len() as isize)),
            Self::Replace {
                old_items,
                new_items,
                ..
            } => Some(new_items.len() as isize - old_items.len() as isize),
            Self::Move { .. } => Some(0),
            Self::Reset => None,
        }
    }

    /// Returns `true` if the change is a reset.
    pub fn is_reset(&self) -> bool {
        matches!(self, Self::Reset)
    }
}
