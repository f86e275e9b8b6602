use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use treesync_core::{LocalFs, MountConfig, SyncConfig};
use treesync_ops::{
    BatchEngine, ItemOutcome, NoProgress, OperationExecutor, OverwritePolicy, SkipReason,
};

fn setup(temp: &TempDir) -> BatchEngine {
    let config = SyncConfig::new(vec![MountConfig::new("tmp", temp.path())]);
    BatchEngine::from_config(Arc::new(LocalFs::new()), &config).unwrap()
}

#[test]
fn test_copy_directory_tree() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("src/nested")).unwrap();
    fs::write(temp.path().join("src/one.txt"), "one").unwrap();
    fs::write(temp.path().join("src/nested/two.txt"), "two").unwrap();
    let engine = setup(&temp);

    let result = engine
        .copy_items(
            &[temp.path().join("src")],
            &temp.path().join("dst"),
            &OverwritePolicy::Skip,
            &NoProgress,
        )
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.total_files, 2);
    assert_eq!(
        fs::read_to_string(temp.path().join("dst/src/nested/two.txt")).unwrap(),
        "two"
    );
    assert!(temp.path().join("src/one.txt").exists());
}

#[test]
fn test_move_with_sidecar_on_disk() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("report.aadl"), "model").unwrap();
    fs::write(temp.path().join("report.aadl.prefs"), "prefs").unwrap();
    fs::create_dir(temp.path().join("archive")).unwrap();
    let engine = setup(&temp);

    let result = engine
        .move_items(
            &[temp.path().join("report.aadl")],
            &temp.path().join("archive"),
            &OverwritePolicy::Skip,
            &NoProgress,
        )
        .unwrap();

    assert!(result.is_success());
    assert!(temp.path().join("archive/report.aadl").exists());
    assert!(temp.path().join("archive/report.aadl.prefs").exists());
    assert!(!temp.path().join("report.aadl.prefs").exists());
}

#[test]
fn test_delete_reports_missing_item() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("a"), "").unwrap();
    let engine = setup(&temp);

    let result = engine
        .delete_items(
            &[temp.path().join("missing"), temp.path().join("a")],
            false,
            &NoProgress,
        )
        .unwrap();

    assert_eq!(result.failed(), 1);
    assert_eq!(result.succeeded(), 1);
    assert!(!temp.path().join("a").exists());
    assert_eq!(result.summary(), "Deleted 1 items, 1 failed");
}

#[test]
fn test_affected_parents_after_move() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("from")).unwrap();
    fs::create_dir(temp.path().join("to")).unwrap();
    fs::write(temp.path().join("from/f"), "").unwrap();
    let engine = setup(&temp);

    let result = engine
        .move_items(
            &[temp.path().join("from/f")],
            &temp.path().join("to"),
            &OverwritePolicy::Skip,
            &NoProgress,
        )
        .unwrap();

    let parents = result.affected_parents();
    assert_eq!(parents, vec![temp.path().join("from"), temp.path().join("to")]);
}

#[tokio::test]
async fn test_executor_cancellation_token() {
    let temp = TempDir::new().unwrap();
    let sources: Vec<PathBuf> = (1..=3)
        .map(|i| {
            let path = temp.path().join(format!("{i}.txt"));
            fs::write(&path, "x").unwrap();
            path
        })
        .collect();
    let engine = setup(&temp);
    let executor = OperationExecutor::new(Arc::new(engine));

    let handle = executor.delete(sources.clone());
    handle.cancellation_token().cancel();
    let result = handle.wait().await.unwrap();

    assert!(
        result
            .items
            .iter()
            .all(|i| i.outcome == ItemOutcome::Skipped(SkipReason::Cancelled))
    );
    assert!(sources.iter().all(|p| p.exists()));
}
