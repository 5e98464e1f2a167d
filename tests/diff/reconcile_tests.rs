// Tests for reconcile module
// Full diff runs against in-process stores

use super::{config, keys, list, map, pool, scalar, set, stores};
use rediff::progress::RunPhase;
use rediff::{DiffConfig, DiffError, Reconciler, Value};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[tokio::test]
async fn test_unique_and_shared_keys() {
    let (a, b) = stores();
    a.insert("k1", scalar("v"));
    a.insert("k2", list(&["1", "2"]));
    b.insert("k1", scalar("v"));
    b.insert("k3", scalar("x"));

    let mut reconciler = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let report = reconciler.run().await.unwrap();
    let result = &report.result;

    assert_eq!(result.unique_to_a, keys(&["k2"]));
    assert_eq!(result.unique_to_b, keys(&["k3"]));
    assert_eq!(result.shared, keys(&["k1"]));
    assert!(result.different.is_empty());
    assert_eq!((result.keys_a, result.keys_b), (2, 2));
    assert!(report.sync.is_none());
    assert_eq!(reconciler.phase(), RunPhase::Done);
}

#[tokio::test]
async fn test_different_scalar() {
    let (a, b) = stores();
    a.insert("k1", scalar("v"));
    b.insert("k1", scalar("w"));

    let mut reconciler = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let result = reconciler.diff().await.unwrap();

    assert_eq!(result.shared, keys(&["k1"]));
    assert_eq!(result.different, keys(&["k1"]));
    assert!(!result.is_clean());
}

#[tokio::test]
async fn test_containers_compared_by_content() {
    let (a, b) = stores();
    a.insert("ordered", list(&["1", "2", "3"]));
    b.insert("ordered", list(&["3", "1", "2"]));
    a.insert("dupes", list(&["1", "2"]));
    b.insert("dupes", list(&["1", "2", "2"]));
    a.insert("members", set(&["x", "y"]));
    b.insert("members", set(&["y", "x"]));
    a.insert("fields", map(&[("x", "1"), ("y", "2")]));
    b.insert("fields", map(&[("y", "2"), ("x", "1")]));
    a.insert("renamed", map(&[("x", "1"), ("y", "2")]));
    b.insert("renamed", map(&[("x", "1"), ("z", "2")]));

    let mut reconciler = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let result = reconciler.diff().await.unwrap();

    assert_eq!(result.shared.len(), 5);
    assert_eq!(result.different, keys(&["dupes", "renamed"]));
}

#[tokio::test]
async fn test_type_mismatch_skips_value_reads() {
    let (a, b) = stores();
    a.insert("k", list(&["1"]));
    b.insert("k", set(&["1"]));

    let mut reconciler = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let result = reconciler.diff().await.unwrap();

    assert_eq!(result.different, keys(&["k"]));
    assert_eq!(a.value_reads(), 0);
    assert_eq!(b.value_reads(), 0);
}

#[tokio::test]
async fn test_unsupported_type_is_skipped() {
    let (a, b) = stores();
    a.insert_unsupported("rank", "zset");
    b.insert_unsupported("rank", "zset");
    a.insert("k", scalar("v"));
    b.insert("k", scalar("v"));

    let mut reconciler = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let result = reconciler.diff().await.unwrap();

    assert_eq!(result.skipped, keys(&["rank"]));
    assert!(result.different.is_empty());
    assert!(result.is_clean());
}

#[tokio::test]
async fn test_scan_fault_degrades_to_empty_side() {
    let (a, b) = stores();
    a.insert("k1", scalar("v"));
    b.insert("k1", scalar("v"));
    b.insert("k2", scalar("v"));
    a.fail_key("*");

    let mut reconciler = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let result = reconciler.diff().await.unwrap();

    assert_eq!(result.keys_a, 0);
    assert_eq!(result.unique_to_b, keys(&["k1", "k2"]));
    assert!(result.shared.is_empty());
}

#[tokio::test]
async fn test_per_key_fault_reports_different() {
    let (a, b) = stores();
    a.insert("k1", scalar("v"));
    a.insert("k2", scalar("v"));
    b.insert("k1", scalar("v"));
    b.insert("k2", scalar("v"));
    b.fail_key("k2");

    let mut reconciler = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let result = reconciler.diff().await.unwrap();

    assert_eq!(result.shared.len(), 2);
    assert_eq!(result.different, keys(&["k2"]));
}

#[tokio::test]
async fn test_transport_fault_aborts_run() {
    let (a, b) = stores();
    a.insert("k1", scalar("v"));
    b.insert("k1", scalar("v"));
    b.set_transport_down(true);

    let mut reconciler = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let err = reconciler.run().await.unwrap_err();
    assert!(matches!(err, DiffError::Transport(_)));
}

#[tokio::test]
async fn test_exclude_patterns() {
    let (a, b) = stores();
    a.insert("user:1", scalar("v"));
    a.insert("tmp:1", scalar("v"));
    b.insert("user:1", scalar("v"));
    b.insert("tmp:2", scalar("v"));

    let config = DiffConfig {
        exclude: vec!["tmp:*".into()],
        ..config()
    };
    let mut reconciler = Reconciler::new(pool(&a, &b), &config).unwrap();
    let result = reconciler.diff().await.unwrap();

    assert!(result.unique_to_a.is_empty());
    assert!(result.unique_to_b.is_empty());
    assert_eq!(result.shared, keys(&["user:1"]));
}

#[tokio::test]
async fn test_scan_pattern() {
    let (a, b) = stores();
    a.insert("user:1", scalar("v"));
    a.insert("order:1", scalar("v"));
    b.insert("user:1", scalar("v"));

    let config = DiffConfig {
        pattern: "user:*".into(),
        ..config()
    };
    let mut reconciler = Reconciler::new(pool(&a, &b), &config).unwrap();
    let result = reconciler.diff().await.unwrap();

    assert!(result.is_clean());
    assert_eq!(result.keys_a, 1);
}

#[tokio::test]
async fn test_progress_channel() {
    let (a, b) = stores();
    for i in 0..3 {
        let key = format!("k{}", i);
        a.insert(key.clone(), scalar("v"));
        b.insert(key, scalar("v"));
    }

    let (tx, mut rx) = mpsc::channel(64);
    let mut reconciler = Reconciler::new(pool(&a, &b), &config()).unwrap().with_progress(tx);
    reconciler.run().await.unwrap();
    drop(reconciler);

    let mut phases = Vec::new();
    let mut compared = 0;
    while let Some(update) = rx.recv().await {
        if phases.last() != Some(&update.phase) {
            phases.push(update.phase);
        }
        if update.phase == RunPhase::Comparing {
            assert_eq!(update.total.max(3), 3);
            compared = compared.max(update.completed);
        }
    }

    assert_eq!(compared, 3);
    assert_eq!(
        phases,
        vec![RunPhase::EnumeratingKeys, RunPhase::Diffing, RunPhase::Comparing, RunPhase::Done]
    );
}

#[tokio::test]
async fn test_interval_spaces_dispatch() {
    let (a, b) = stores();
    for i in 0..4 {
        let key = format!("k{}", i);
        a.insert(key.clone(), scalar("v"));
        b.insert(key, scalar("v"));
    }

    let config = DiffConfig {
        interval_ms: 20,
        ..config()
    };
    let start = Instant::now();
    let mut reconciler = Reconciler::new(pool(&a, &b), &config).unwrap();
    let result = reconciler.diff().await.unwrap();

    assert_eq!(result.shared.len(), 4);
    assert!(start.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn test_empty_keyspaces() {
    let (a, b) = stores();
    let mut reconciler = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let report = reconciler.run().await.unwrap();

    assert!(report.result.is_clean());
    assert_eq!(report.result.keys_a + report.result.keys_b, 0);
}

#[tokio::test]
async fn test_binary_values_compared_by_bytes() {
    let (a, b) = stores();
    a.insert("blob", Value::Scalar(vec![0xff, 0xfe, 0x00]));
    b.insert("blob", Value::Scalar(vec![0xff, 0xfe, 0x01]));
    a.insert("same", Value::Scalar(vec![0xc3, 0x28]));
    b.insert("same", Value::Scalar(vec![0xc3, 0x28]));
    a.insert("bits", Value::Set(vec![vec![0x80], vec![0x81]]));
    b.insert("bits", Value::Set(vec![vec![0x81], vec![0x80]]));

    let mut reconciler = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let result = reconciler.diff().await.unwrap();

    assert_eq!(result.shared.len(), 3);
    assert_eq!(result.different, keys(&["blob"]));
}

#[tokio::test]
async fn test_undecodable_reads_report_different() {
    let (a, b) = stores();
    a.insert("blob", scalar("one"));
    b.insert("blob", scalar("two"));
    a.fail_reads("blob");
    b.fail_reads("blob");

    let mut reconciler = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let result = reconciler.diff().await.unwrap();

    assert_eq!(result.different, keys(&["blob"]));
    assert!(result.skipped.is_empty());
}

#[tokio::test]
async fn test_progress_channel_covers_sync() {
    let (a, b) = stores();
    a.insert("k1", scalar("v"));
    a.insert("k2", scalar("v"));
    b.insert("k3", scalar("v"));

    let config = DiffConfig {
        write: true,
        ..config()
    };
    let (tx, mut rx) = mpsc::channel(64);
    let mut reconciler = Reconciler::new(pool(&a, &b), &config).unwrap().with_progress(tx);
    reconciler.run().await.unwrap();
    drop(reconciler);

    let mut synced = Vec::new();
    while let Some(update) = rx.recv().await {
        if update.phase == RunPhase::Syncing && update.total > 0 {
            synced.push((update.completed, update.total));
        }
    }

    assert_eq!(synced.last(), Some(&(3, 3)));
}
