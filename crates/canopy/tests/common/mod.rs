//! Shared fixtures for the flattening tests.

#![allow(dead_code)]

use std::sync::Arc;

use canopy::model::{FlatChange, IndexPath, ItemsSource, RowId, TreeFlattener};
use canopy::ObservableList;
use parking_lot::Mutex;

/// A named tree node with an optional observable child list.
#[derive(Debug)]
pub struct Entry {
    pub name: &'static str,
    pub rank: u32,
    pub children: Option<Arc<ObservableList<Entry>>>,
}

pub type Children = Arc<ObservableList<Entry>>;

pub fn leaf(name: &'static str) -> Entry {
    Entry {
        name,
        rank: 0,
        children: None,
    }
}

pub fn ranked(name: &'static str, rank: u32) -> Entry {
    Entry {
        name,
        rank,
        children: None,
    }
}

pub fn folder(name: &'static str, children: &Children) -> Entry {
    Entry {
        name,
        rank: 0,
        children: Some(children.clone()),
    }
}

pub fn list(entries: Vec<Entry>) -> Children {
    Arc::new(ObservableList::new(entries))
}

pub fn children_of(entry: &Entry) -> Option<ItemsSource<Entry>> {
    entry.children.clone().map(ItemsSource::Observable)
}

pub fn by_name(a: &Entry, b: &Entry) -> std::cmp::Ordering {
    a.name.cmp(b.name)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn names(flattener: &TreeFlattener<Entry>) -> Vec<&'static str> {
    flattener.models().iter().map(|entry| entry.name).collect()
}

pub fn row_named(flattener: &TreeFlattener<Entry>, name: &str) -> RowId {
    flattener
        .rows()
        .into_iter()
        .find(|row| row.model.name == name)
        .map(|row| row.id)
        .unwrap_or_else(|| panic!("no visible row named {name}"))
}

/// Records every flat change and replays it onto a mirror of the sequence.
pub struct Recorder {
    pub events: Arc<Mutex<Vec<FlatChange>>>,
    mirror: Arc<Mutex<Vec<RowId>>>,
}

impl Recorder {
    pub fn attach(flattener: &TreeFlattener<Entry>) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mirror = Arc::new(Mutex::new(
            flattener.rows().into_iter().map(|row| row.id).collect::<Vec<_>>(),
        ));

        let sink = events.clone();
        let replay = mirror.clone();
        let source = flattener.clone();
        flattener.changed().connect(move |change: &FlatChange| {
            sink.lock().push(change.clone());
            let mut mirror = replay.lock();
            match change {
                FlatChange::Insert { flat_index, rows } => {
                    mirror.splice(*flat_index..*flat_index, rows.iter().copied());
                }
                FlatChange::Remove { flat_index, rows } => {
                    let removed: Vec<RowId> =
                        mirror.drain(*flat_index..*flat_index + rows.len()).collect();
                    assert_eq!(&removed, rows, "removed rows do not match the mirror");
                }
                FlatChange::Reset => {
                    *mirror = source.rows().into_iter().map(|row| row.id).collect();
                }
            }
        });
        Self { events, mirror }
    }

    pub fn take(&self) -> Vec<FlatChange> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Asserts that replaying the events reproduced the current sequence.
    pub fn assert_in_sync(&self, flattener: &TreeFlattener<Entry>) {
        let current: Vec<RowId> = flattener.rows().into_iter().map(|row| row.id).collect();
        assert_eq!(*self.mirror.lock(), current);
    }
}

/// Checks the structural invariants of the flat sequence.
pub fn assert_consistent(flattener: &TreeFlattener<Entry>) {
    let rows = flattener.rows();
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(flattener.path_of(i).as_ref(), Some(&row.path));
        assert_eq!(flattener.flat_index_of(&row.path), Some(i), "lookup of {}", row.path);

        if i > 0 {
            assert!(rows[i - 1].path < row.path, "paths out of pre-order at {i}");
        }
        if row.depth() > 1 {
            let parent = row.path.parent().unwrap_or_else(IndexPath::root);
            let parent_index = flattener
                .flat_index_of(&parent)
                .expect("parent of a visible row is visible");
            assert!(parent_index < i);
            assert!(rows[parent_index].expanded);
        }

        let descendants = rows[i + 1..]
            .iter()
            .take_while(|next| next.path.is_descendant_of(&row.path))
            .count();
        assert_eq!(flattener.visible_span(row.id), Some(descendants + 1));
        if !row.expanded {
            assert_eq!(descendants, 0);
        }
    }
}
