use std::fs;
use std::sync::Arc;

use tempfile::TempDir;
use treesync_core::{ErrorKind, FileTree, LocalFs, MountConfig, NodeId, SyncConfig, TreeEvent};
use treesync_sync::SyncEngine;

fn setup(temp: &TempDir) -> (SyncEngine, FileTree, NodeId) {
    let config = SyncConfig::new(vec![MountConfig::new("tmp", temp.path())]);
    let engine = SyncEngine::from_config(Arc::new(LocalFs::new()), &config).unwrap();
    let tree = FileTree::from_config(&config);
    let root = tree.mounts()[0];
    (engine, tree, root)
}

fn names(tree: &FileTree, id: NodeId) -> Vec<String> {
    tree.child_nodes(id).map(|n| n.name().to_string()).collect()
}

#[test]
fn test_refresh_tracks_local_changes() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("b")).unwrap();
    fs::write(temp.path().join("a.txt"), "a").unwrap();
    let (engine, mut tree, root) = setup(&temp);

    engine.refresh(&mut tree, root).unwrap();
    assert_eq!(names(&tree, root), vec!["b", "a.txt"]);

    fs::create_dir(temp.path().join("a")).unwrap();
    fs::remove_file(temp.path().join("a.txt")).unwrap();
    let events = engine.refresh(&mut tree, root).unwrap();

    assert_eq!(names(&tree, root), vec!["a", "b"]);
    assert!(tree.is_sorted(root));
    assert!(events.iter().any(|e| matches!(e, TreeEvent::Inserted { .. })));
    assert!(events.iter().any(|e| matches!(e, TreeEvent::Removed { .. })));
}

#[test]
fn test_refresh_twice_yields_same_children() {
    let temp = TempDir::new().unwrap();
    for name in ["c", "B", "a"] {
        fs::write(temp.path().join(name), name).unwrap();
    }
    let (engine, mut tree, root) = setup(&temp);

    engine.refresh(&mut tree, root).unwrap();
    let first = tree.children(root).to_vec();
    engine.refresh(&mut tree, root).unwrap();

    assert_eq!(tree.children(root), first.as_slice());
}

#[test]
fn test_default_filter_hides_sidecars_from_tree() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("report.aadl"), "model").unwrap();
    fs::write(temp.path().join("report.aadl.prefs"), "prefs").unwrap();
    let (engine, mut tree, root) = setup(&temp);

    engine.refresh(&mut tree, root).unwrap();

    assert_eq!(names(&tree, root), vec!["report.aadl"]);
}

#[test]
fn test_rename_cascades_sidecar_on_disk() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("report.aadl"), "model").unwrap();
    fs::write(temp.path().join("report.aadl.prefs"), "prefs").unwrap();
    let (engine, mut tree, root) = setup(&temp);
    engine.refresh(&mut tree, root).unwrap();
    let report = tree.children(root)[0];

    let outcome = engine.rename(&mut tree, report, "summary.aadl").unwrap();

    assert!(outcome.warnings.is_empty());
    assert!(temp.path().join("summary.aadl").exists());
    assert_eq!(
        fs::read_to_string(temp.path().join("summary.aadl.prefs")).unwrap(),
        "prefs"
    );
    assert!(!temp.path().join("report.aadl.prefs").exists());

    engine.refresh(&mut tree, root).unwrap();
    assert_eq!(tree.children(root), &[report]);
}

#[test]
fn test_resolve_and_create_nested() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("x/y")).unwrap();
    let (engine, mut tree, _root) = setup(&temp);

    let chain = engine
        .resolve_path(&mut tree, &temp.path().join("x/y"))
        .unwrap()
        .unwrap();
    let y = *chain.last().unwrap();
    let created = engine.create_file(&mut tree, y, "new.txt").unwrap();

    assert!(temp.path().join("x/y/new.txt").is_file());
    assert_eq!(tree.parent(created), Some(y));
}

#[test]
fn test_rename_refuses_to_clobber_case_variant() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a"), "one").unwrap();
    fs::write(temp.path().join("A"), "two").unwrap();
    if fs::read_dir(temp.path()).unwrap().count() != 2 {
        // Case-insensitive volume: both names are one entry.
        return;
    }
    let (engine, mut tree, root) = setup(&temp);
    engine.refresh(&mut tree, root).unwrap();
    let a = tree
        .child_nodes(root)
        .find(|n| n.name() == "a")
        .map(|n| n.id)
        .unwrap();

    let err = engine.rename(&mut tree, a, "A").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(fs::read_to_string(temp.path().join("a")).unwrap(), "one");
    assert_eq!(fs::read_to_string(temp.path().join("A")).unwrap(), "two");
    assert_eq!(tree.children(root).len(), 2);
    assert!(tree.is_sorted(root));
}

#[test]
fn test_case_only_rename_of_single_entry() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("notes.txt"), "n").unwrap();
    let (engine, mut tree, root) = setup(&temp);
    engine.refresh(&mut tree, root).unwrap();
    let notes = tree.children(root)[0];

    engine.rename(&mut tree, notes, "Notes.txt").unwrap();

    assert_eq!(names(&tree, root), vec!["Notes.txt"]);
    assert_eq!(
        fs::read_to_string(temp.path().join("Notes.txt")).unwrap(),
        "n"
    );
}
