// Tests for sync module
// Repairs B from A and checks the follow-up diff comes back clean

use super::{config, keys, list, map, pool, scalar, set, stores};
use rediff::schedule::DispatchLimiter;
use rediff::sync::{ActionOutcome, SyncAction};
use rediff::{DiffConfig, DiffError, DiffResult, Reconciler, Synchronizer, Value};

fn writing() -> DiffConfig {
    DiffConfig {
        write: true,
        ..config()
    }
}

#[tokio::test]
async fn test_sync_overwrites_different_scalar() {
    let (a, b) = stores();
    a.insert("k1", scalar("v"));
    b.insert("k1", scalar("w"));

    let mut reconciler = Reconciler::new(pool(&a, &b), &writing()).unwrap();
    let report = reconciler.run().await.unwrap();

    assert_eq!(report.result.different, keys(&["k1"]));
    let stats = report.sync.unwrap();
    assert_eq!(stats.overwritten, 1);
    assert_eq!(b.value("k1"), Some(scalar("v")));
}

#[tokio::test]
async fn test_sync_is_idempotent() {
    let (a, b) = stores();
    a.insert("greeting", scalar("hello"));
    a.insert("queue", list(&["3", "1", "2"]));
    a.insert("tags", set(&["red", "blue"]));
    a.insert("profile", map(&[("name", "ada"), ("lang", "en")]));
    a.insert("shared", scalar("same"));

    b.insert("greeting", scalar("hi"));
    b.insert("queue", list(&["3", "1", "2", "2"]));
    b.insert("profile", map(&[("name", "ada")]));
    b.insert("shared", scalar("same"));
    b.insert("stale", scalar("old"));

    let mut reconciler = Reconciler::new(pool(&a, &b), &writing()).unwrap();
    let report = reconciler.run().await.unwrap();
    let stats = report.sync.unwrap();

    assert_eq!(stats.deleted, 1);
    assert_eq!(stats.copied, 1);
    assert_eq!(stats.overwritten, 3);
    assert_eq!(stats.failed, 0);

    let mut again = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let result = again.diff().await.unwrap();
    assert!(result.unique_to_a.is_empty());
    assert!(result.unique_to_b.is_empty());
    assert!(result.different.is_empty());
    assert_eq!(result.shared.len(), 5);
}

#[tokio::test]
async fn test_copy_preserves_list_order() {
    let (a, b) = stores();
    a.insert("queue", list(&["c", "a", "b", "a"]));

    let mut reconciler = Reconciler::new(pool(&a, &b), &writing()).unwrap();
    let report = reconciler.run().await.unwrap();

    assert_eq!(report.sync.unwrap().elements_written, 4);
    assert_eq!(b.value("queue"), Some(list(&["c", "a", "b", "a"])));
}

#[tokio::test]
async fn test_sync_deletes_keys_only_on_b() {
    let (a, b) = stores();
    b.insert("orphan", set(&["x"]));
    b.insert("orphan2", scalar("y"));

    let mut reconciler = Reconciler::new(pool(&a, &b), &writing()).unwrap();
    let report = reconciler.run().await.unwrap();

    assert_eq!(report.sync.unwrap().deleted, 2);
    assert!(b.is_empty());
}

#[tokio::test]
async fn test_unsupported_key_not_copied() {
    let (a, b) = stores();
    a.insert_unsupported("rank", "zset");

    let mut reconciler = Reconciler::new(pool(&a, &b), &writing()).unwrap();
    let report = reconciler.run().await.unwrap();

    assert_eq!(report.result.unique_to_a, keys(&["rank"]));
    assert_eq!(report.sync.unwrap().skipped, 1);
    assert!(b.is_empty());
    assert_eq!(b.writes(), 0);
}

#[tokio::test]
async fn test_skipped_shared_key_not_synced() {
    let (a, b) = stores();
    a.insert_unsupported("rank", "zset");
    b.insert_unsupported("rank", "stream");

    let mut reconciler = Reconciler::new(pool(&a, &b), &writing()).unwrap();
    let report = reconciler.run().await.unwrap();

    assert_eq!(report.result.skipped, keys(&["rank"]));
    assert_eq!(report.sync.unwrap().planned, 0);
    assert_eq!(b.writes(), 0);
}

#[tokio::test]
async fn test_per_key_write_fault_counted() {
    let (a, b) = stores();
    a.insert("good", scalar("v"));
    a.insert("bad", scalar("v"));
    b.fail_key("bad");

    let mut reconciler = Reconciler::new(pool(&a, &b), &writing()).unwrap();
    let stats = reconciler.run().await.unwrap().sync.unwrap();

    assert_eq!(stats.copied, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(b.value("good"), Some(scalar("v")));
}

#[tokio::test]
async fn test_no_writes_without_flag() {
    let (a, b) = stores();
    a.insert("k1", scalar("v"));
    b.insert("k1", scalar("w"));
    b.insert("k2", scalar("x"));

    let mut reconciler = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let report = reconciler.run().await.unwrap();

    assert!(report.sync.is_none());
    assert_eq!(b.writes(), 0);
    assert_eq!(b.value("k1"), Some(scalar("w")));
}

#[tokio::test]
async fn test_overwrite_replaces_whole_container() {
    let (a, b) = stores();
    a.insert("fields", map(&[("x", "1")]));
    b.insert("fields", map(&[("x", "1"), ("y", "2")]));

    let pool = pool(&a, &b);
    let action = SyncAction::OverwriteOnB { key: "fields".into() };
    let outcome = Synchronizer::execute(&pool, &action).await.unwrap();

    assert_eq!(outcome, ActionOutcome::Overwritten { elements: 1 });
    assert_eq!(b.value("fields"), Some(map(&[("x", "1")])));
}

#[tokio::test]
async fn test_copy_of_vanished_key_skipped() {
    let (a, b) = stores();
    let pool = pool(&a, &b);

    let action = SyncAction::CopyToB { key: "gone".into() };
    let outcome = Synchronizer::execute(&pool, &action).await.unwrap();

    assert_eq!(outcome, ActionOutcome::Skipped);
    assert!(b.value("gone").is_none());
}

#[tokio::test]
async fn test_transport_fault_aborts_sync() {
    let (a, b) = stores();
    a.insert("k1", scalar("v"));
    b.set_transport_down(true);

    let result = DiffResult {
        keys_a: 1,
        unique_to_a: keys(&["k1"]),
        ..Default::default()
    };
    let synchronizer = Synchronizer::new(pool(&a, &b), DispatchLimiter::unlimited());
    let err = synchronizer.run(&result).await.unwrap_err();

    assert!(matches!(err, DiffError::Transport(_)));
    assert!(!matches!(b.value("k1"), Some(Value::Scalar(_))));
}

#[tokio::test]
async fn test_unreadable_source_leaves_b_untouched() {
    let (a, b) = stores();
    a.insert("k", scalar("v"));
    a.fail_reads("k");
    b.insert("k", scalar("w"));

    let mut reconciler = Reconciler::new(pool(&a, &b), &writing()).unwrap();
    let report = reconciler.run().await.unwrap();
    let stats = report.sync.unwrap();

    assert_eq!(report.result.different, keys(&["k"]));
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped, 0);
    assert_eq!(b.value("k"), Some(scalar("w")));
    assert_eq!(b.writes(), 0);
}

#[tokio::test]
async fn test_overwrite_with_failed_type_query_counted_failed() {
    let (a, b) = stores();
    a.insert("k", scalar("v"));
    a.fail_key("k");
    b.insert("k", scalar("w"));

    let mut reconciler = Reconciler::new(pool(&a, &b), &writing()).unwrap();
    let report = reconciler.run().await.unwrap();
    let stats = report.sync.unwrap();

    assert_eq!(report.result.different, keys(&["k"]));
    assert_eq!((stats.failed, stats.skipped), (1, 0));
    assert_eq!(b.value("k"), Some(scalar("w")));

    let action = SyncAction::OverwriteOnB { key: "k".into() };
    let outcome = Synchronizer::execute(&pool(&a, &b), &action).await.unwrap();
    assert_eq!(outcome, ActionOutcome::Failed);
}

#[tokio::test]
async fn test_sync_copies_binary_values() {
    let (a, b) = stores();
    a.insert("blob", Value::Scalar(vec![0x00, 0xff, 0x80]));
    a.insert("fields", Value::Map([(vec![0xfe], vec![0x00, 0x01])].into_iter().collect()));
    b.insert("blob", Value::Scalar(vec![0x00]));

    let mut reconciler = Reconciler::new(pool(&a, &b), &writing()).unwrap();
    let stats = reconciler.run().await.unwrap().sync.unwrap();
    assert_eq!((stats.copied, stats.overwritten, stats.failed), (1, 1, 0));

    let mut again = Reconciler::new(pool(&a, &b), &config()).unwrap();
    let result = again.diff().await.unwrap();
    assert!(result.is_clean());
    assert_eq!(b.value("blob"), Some(Value::Scalar(vec![0x00, 0xff, 0x80])));
}
