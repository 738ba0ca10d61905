//! Structural properties that must hold after any sequence of operations.

mod common;

use std::sync::Arc;

use canopy::model::{CompareFn, FlatChange, FlatRowsDebug, IndexPath, PathLookup, TreeFlattener};
use canopy::{FlattenError, ListError, NotifierError};
use common::*;
use parking_lot::Mutex;

type Step<'a> = Box<dyn Fn(&TreeFlattener<Entry>) + 'a>;

fn step<'a>(f: impl Fn(&TreeFlattener<Entry>) + 'a) -> Step<'a> {
    Box::new(f)
}

/// Three levels: root `[M, K, L]`, K has `[K2, K1]`, K1 has `[J]`.
fn deep_tree() -> (Children, Children, Children) {
    let k1_children = list(vec![leaf("J")]);
    let k_children = list(vec![leaf("K2"), folder("K1", &k1_children)]);
    let root = list(vec![leaf("M"), folder("K", &k_children), leaf("L")]);
    (root, k_children, k1_children)
}

#[test]
fn test_expand_is_idempotent() {
    let (root, _k, _k1) = deep_tree();
    let flattener = TreeFlattener::builder(root.clone())
        .children(children_of)
        .build()
        .unwrap();
    let k = row_named(&flattener, "K");
    let recorder = Recorder::attach(&flattener);

    flattener.expand(k).unwrap();
    let once = names(&flattener);
    flattener.expand(k).unwrap();

    assert_eq!(names(&flattener), once);
    assert_eq!(recorder.take().len(), 1);
    assert_consistent(&flattener);
}

#[test]
fn test_collapse_then_expand_reproduces_subtree() {
    let (root, _k, _k1) = deep_tree();
    let flattener = TreeFlattener::builder(root.clone())
        .children(children_of)
        .build()
        .unwrap();
    let k = row_named(&flattener, "K");
    flattener.expand(k).unwrap();
    let before: Vec<(&str, IndexPath)> = flattener
        .rows()
        .into_iter()
        .map(|row| (row.model.name, row.path))
        .collect();
    let models_before = flattener.models();

    flattener.collapse(k).unwrap();
    assert_eq!(flattener.visible_span(k), Some(1));
    flattener.expand(k).unwrap();

    let after: Vec<(&str, IndexPath)> = flattener
        .rows()
        .into_iter()
        .map(|row| (row.model.name, row.path))
        .collect();
    assert_eq!(before, after);
    for (a, b) in models_before.iter().zip(flattener.models().iter()) {
        assert!(Arc::ptr_eq(a, b));
    }
}

#[test]
fn test_sorting_is_stable() {
    let root = list(vec![
        ranked("d", 2),
        ranked("a", 1),
        ranked("c", 2),
        ranked("b", 1),
    ]);
    let flattener = TreeFlattener::new(root.clone()).unwrap();

    flattener
        .sort_by(|x: &Entry, y: &Entry| x.rank.cmp(&y.rank))
        .unwrap();
    assert_eq!(names(&flattener), vec!["a", "b", "d", "c"]);

    flattener.sort_by(by_name).unwrap();
    assert_eq!(names(&flattener), vec!["a", "b", "c", "d"]);

    // All-equal keys restore source order.
    flattener
        .sort_by(|_: &Entry, _: &Entry| std::cmp::Ordering::Equal)
        .unwrap();
    assert_eq!(names(&flattener), vec!["d", "a", "c", "b"]);
    assert_consistent(&flattener);
}

#[test]
fn test_comparator_applies_to_every_level() {
    let (root, k_children, _k1) = deep_tree();
    let flattener = TreeFlattener::builder(root.clone())
        .children(children_of)
        .build()
        .unwrap();
    flattener.expand_all().unwrap();
    assert_eq!(names(&flattener), vec!["M", "K", "K2", "K1", "J", "L"]);

    let compare: CompareFn<Entry> = Arc::new(by_name);
    flattener.set_comparator(Some(compare)).unwrap();
    assert_eq!(names(&flattener), vec!["K", "K1", "J", "K2", "L", "M"]);
    assert_consistent(&flattener);

    // Incremental edits keep honoring the comparator.
    k_children.push(leaf("K0")).unwrap();
    assert_eq!(names(&flattener), vec!["K", "K0", "K1", "J", "K2", "L", "M"]);
    assert_consistent(&flattener);
}

#[test]
fn test_each_level_subscribes_once() {
    let (root, k_children, k1_children) = deep_tree();
    let flattener = TreeFlattener::builder(root.clone())
        .children(children_of)
        .build()
        .unwrap();
    assert!(root.notifier().has_subscriber());
    assert!(!k_children.notifier().has_subscriber());

    flattener.expand_all().unwrap();
    assert!(k_children.notifier().has_subscriber());
    assert!(k1_children.notifier().has_subscriber());
    assert!(matches!(
        k_children.subscribe(|_| Ok(())),
        Err(NotifierError::AlreadySubscribed)
    ));

    flattener.collapse_all().unwrap();
    assert!(!k_children.notifier().has_subscriber());
    assert!(!k1_children.notifier().has_subscriber());

    // Removing an expanded row releases its level.
    flattener.expand(row_named(&flattener, "K")).unwrap();
    assert!(k_children.notifier().has_subscriber());
    root.remove(1).unwrap();
    assert!(!k_children.notifier().has_subscriber());
    assert_eq!(names(&flattener), vec!["M", "L"]);

    drop(flattener);
    assert!(!root.notifier().has_subscriber());
}

#[test]
fn test_batch_operations_emit_single_reset() {
    let (root, _k, _k1) = deep_tree();
    let flattener = TreeFlattener::builder(root.clone())
        .children(children_of)
        .build()
        .unwrap();
    let recorder = Recorder::attach(&flattener);

    flattener.expand_all().unwrap();
    flattener.sort_by(by_name).unwrap();
    flattener.collapse_all().unwrap();
    flattener.set_items(list(vec![leaf("Z")])).unwrap();

    assert_eq!(recorder.take(), vec![FlatChange::Reset; 4]);
    assert_eq!(names(&flattener), vec!["Z"]);
    assert!(!root.notifier().has_subscriber());
    recorder.assert_in_sync(&flattener);
}

#[test]
fn test_mutation_from_observer_is_rejected() {
    let (root, _k, _k1) = deep_tree();
    let flattener = TreeFlattener::builder(root.clone())
        .children(children_of)
        .build()
        .unwrap();
    let k = row_named(&flattener, "K");
    let outcomes = Arc::new(Mutex::new(Vec::new()));

    let handle = flattener.clone();
    let sink = outcomes.clone();
    let edited = root.clone();
    flattener.changed().connect(move |_: &FlatChange| {
        let mut sink = sink.lock();
        if sink.is_empty() {
            sink.push(matches!(handle.collapse(k), Err(FlattenError::Reentrant)));
            let rejected = match edited.push(leaf("late")) {
                Err(ListError::Notifier(NotifierError::Rejected(err))) => {
                    matches!(err.downcast_ref::<FlattenError>(), Some(FlattenError::Reentrant))
                }
                _ => false,
            };
            sink.push(rejected);
        }
    });

    flattener.expand(k).unwrap();
    assert_eq!(*outcomes.lock(), vec![true, true]);

    // The next operation first catches up with the rejected push.
    flattener.collapse(k).unwrap();
    assert_eq!(names(&flattener), vec!["M", "K", "L", "late"]);
    assert_consistent(&flattener);
}

#[test]
fn test_linear_and_indexed_lookup_agree() {
    let (root_a, _ka, _k1a) = deep_tree();
    let (root_b, _kb, _k1b) = deep_tree();
    let indexed = TreeFlattener::builder(root_a.clone())
        .children(children_of)
        .build()
        .unwrap();
    let linear = TreeFlattener::builder(root_b.clone())
        .children(children_of)
        .path_lookup(PathLookup::Linear)
        .build()
        .unwrap();

    for flattener in [&indexed, &linear] {
        flattener.expand_all().unwrap();
        flattener.sort_by(by_name).unwrap();
    }
    root_a.remove(0).unwrap();
    root_b.remove(0).unwrap();

    assert_eq!(indexed.len(), linear.len());
    for i in 0..indexed.len() {
        let path = indexed.path_of(i).unwrap();
        assert_eq!(linear.path_of(i), Some(path.clone()));
        assert_eq!(indexed.flat_index_of(&path), Some(i));
        assert_eq!(linear.flat_index_of(&path), Some(i));
    }
    assert_eq!(indexed.flat_index_of(&IndexPath::from([9, 9])), None);
    assert_eq!(linear.flat_index_of(&IndexPath::from([9, 9])), None);
}

#[test]
fn test_invariants_hold_through_edit_script() {
    init_tracing();
    let (root, k_children, k1_children) = deep_tree();
    let flattener = TreeFlattener::builder(root.clone())
        .children(children_of)
        .build()
        .unwrap();
    let recorder = Recorder::attach(&flattener);

    let steps: Vec<Step<'_>> = vec![
        step(|f| f.expand(row_named(f, "K")).unwrap()),
        step(|f| f.expand(row_named(f, "K1")).unwrap()),
        step(|_| k1_children.push(leaf("J2")).unwrap()),
        step(|_| k_children.insert(0, leaf("K3")).unwrap()),
        step(|_| root.insert(0, leaf("A")).unwrap()),
        step(|_| k_children.move_item(2, 0).unwrap()),
        step(|f| f.sort_by(by_name).unwrap()),
        step(|_| k1_children.remove(0).map(|_| ()).unwrap()),
        step(|_| root.move_item(2, 0).unwrap()),
        step(|f| f.clear_sort().unwrap()),
        step(|_| k_children.replace(1, leaf("K9")).map(|_| ()).unwrap()),
        step(|f| {
            f.toggle(row_named(f, "K")).unwrap();
        }),
        step(|f| {
            f.expand_path(&IndexPath::from([2, 0])).unwrap();
        }),
        step(|_| k_children.clear().unwrap()),
    ];

    for (i, step) in steps.iter().enumerate() {
        step(&flattener);
        assert_consistent(&flattener);
        recorder.assert_in_sync(&flattener);
        tracing::debug!(step = i, "\n{}", FlatRowsDebug::new().format_with(&flattener, |e| e.name.to_string()));
    }
}
