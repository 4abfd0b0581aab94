use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use futures::future;
use futures::stream::{self, StreamExt};
use rstest::rstest;
use tokio_util::sync::CancellationToken;

use crate::core::client::storage::s3::MAX_KEYS_PER_DELETE;
use crate::core::client::storage::{ListObjectsOptions, MockStoreClient, ObjectEntry, RemovalFailure, StoreClient};
use crate::error::ExecutorError;
use crate::executor::bucket::{reset_bucket, ResetOutcome};
use crate::executor::Executor;
use crate::tests::common::{executor, step, store, InMemoryConnector, InMemoryStore};
use crate::types::{Command, StepResult};

fn object_keys(count: usize) -> impl Iterator<Item = String> {
    (0..count).map(|i| format!("object-{:04}", i))
}

#[rstest]
#[tokio::test]
async fn reset_creates_missing_bucket(executor: (Executor<InMemoryConnector>, InMemoryStore)) {
    let (executor, store) = executor;

    let result = executor.run(CancellationToken::new(), &step("create-or-reset-bucket").with_bucket("test")).await;

    assert_eq!(result.unwrap(), StepResult::empty());
    assert!(store.has_bucket("test"));
    assert!(store.keys("test").is_empty());
}

#[rstest]
#[tokio::test]
async fn reset_twice_is_idempotent(executor: (Executor<InMemoryConnector>, InMemoryStore)) {
    let (executor, store) = executor;
    let reset = step("create-or-reset-bucket").with_bucket("test");

    executor.run(CancellationToken::new(), &reset).await.unwrap();
    let second = executor.run(CancellationToken::new(), &reset).await;

    assert_eq!(second.unwrap(), StepResult::empty());
    assert!(store.has_bucket("test"));
    assert!(store.keys("test").is_empty());
}

#[rstest]
#[case::empty(0)]
#[case::single(1)]
#[case::thousand(1000)]
#[tokio::test]
async fn reset_empties_existing_bucket(store: InMemoryStore, #[case] count: usize) {
    let store = store.with_objects("test", object_keys(count));
    assert_eq!(store.keys("test").len(), count);

    let outcome = reset_bucket(Arc::new(store.clone()), "test").await.unwrap();

    assert_eq!(outcome, ResetOutcome::Emptied { forwarded: count });
    assert!(store.has_bucket("test"));
    assert!(store.keys("test").is_empty());
}

#[rstest]
#[tokio::test]
async fn reset_reports_creation(store: InMemoryStore) {
    let outcome = reset_bucket(Arc::new(store.clone()), "fresh").await.unwrap();

    assert_eq!(outcome, ResetOutcome::Created);
    assert!(store.has_bucket("fresh"));
}

#[rstest]
#[tokio::test]
async fn reset_leaves_listing_empty(store: InMemoryStore) {
    let store = store.with_objects("test", ["a", "b", "c"].map(String::from));
    let executor = Executor::with_connector(InMemoryConnector::new(store.clone()));

    let result = executor.run(CancellationToken::new(), &step("create-or-reset-bucket").with_bucket("test")).await;

    assert_eq!(result.unwrap(), StepResult::empty());
    let listed: Vec<_> = store.list_objects("test", ListObjectsOptions::everything()).collect().await;
    assert!(listed.is_empty());
}

#[rstest]
#[tokio::test]
async fn reset_only_touches_named_bucket(store: InMemoryStore) {
    let store = store.with_objects("test", object_keys(3)).with_objects("other", object_keys(2));
    let executor = Executor::with_connector(InMemoryConnector::new(store.clone()));

    executor.run(CancellationToken::new(), &step("create-or-reset-bucket").with_bucket("test")).await.unwrap();

    assert!(store.keys("test").is_empty());
    assert_eq!(store.keys("other").len(), 2);
}

#[rstest]
#[tokio::test]
async fn reset_requires_bucket_name_before_connecting(store: InMemoryStore) {
    let connector = InMemoryConnector::new(store);
    let executor = Executor::with_connector(connector.clone());

    let result = executor.run(CancellationToken::new(), &step("create-or-reset-bucket")).await;

    assert_matches!(
        result,
        Err(ExecutorError::MissingParameter { command: Command::CreateOrResetBucket, field: "bucket_name" })
    );
    assert!(connector.connections().is_empty());
}

#[rstest]
#[tokio::test]
async fn listing_stays_within_one_batch_of_deletion() {
    const TOTAL: usize = 20_000;
    let listed = Arc::new(AtomicUsize::new(0));
    let listed_before_first_delete = Arc::new(AtomicUsize::new(0));
    let deleted = Arc::new(AtomicUsize::new(0));

    let mut client = MockStoreClient::new();
    client.expect_bucket_exists().times(1).returning(|_| Ok(true));
    let listing_counter = listed.clone();
    client.expect_list_objects().times(1).returning(move |_, _| {
        let listed = listing_counter.clone();
        stream::iter(0..TOTAL)
            .map(move |i| {
                listed.fetch_add(1, Ordering::SeqCst);
                Ok(ObjectEntry::new(format!("object-{:05}", i)))
            })
            .boxed()
    });
    let (listed_seen, first_seen, deleted_seen) = (listed.clone(), listed_before_first_delete.clone(), deleted.clone());
    client.expect_remove_objects().times(1).returning(move |_, keys| {
        let (listed, first, deleted) = (listed_seen.clone(), first_seen.clone(), deleted_seen.clone());
        // A slow store: nothing is pulled from the input until the first request would have returned
        stream::unfold((keys, false), move |(mut keys, started)| {
            let (listed, first, deleted) = (listed.clone(), first.clone(), deleted.clone());
            async move {
                if !started {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
                keys.next().await?;
                if !started {
                    first.store(listed.load(Ordering::SeqCst), Ordering::SeqCst);
                }
                deleted.fetch_add(1, Ordering::SeqCst);
                Some((None::<RemovalFailure>, (keys, true)))
            }
        })
        .filter_map(future::ready)
        .boxed()
    });

    let outcome = reset_bucket(Arc::new(client), "test").await.unwrap();

    assert_eq!(outcome, ResetOutcome::Emptied { forwarded: TOTAL });
    assert_eq!(deleted.load(Ordering::SeqCst), TOTAL);
    let buffered = listed_before_first_delete.load(Ordering::SeqCst);
    assert!(buffered <= MAX_KEYS_PER_DELETE + 1, "{buffered} keys were listed before the first delete");
}
