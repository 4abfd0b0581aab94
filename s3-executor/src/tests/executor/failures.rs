use std::sync::Arc;

use assert_matches::assert_matches;
use bytes::Bytes;
use futures::future;
use futures::stream::{self, StreamExt};
use mockall::predicate::eq;
use rstest::rstest;
use tokio_util::sync::CancellationToken;

use crate::core::client::storage::{
    MockStoreClient, MockStoreConnector, ObjectEntry, PutObjectReceipt, RemovalFailure, StorageError, StoreClient,
};
use crate::error::ExecutorError;
use crate::executor::Executor;
use crate::tests::common::step;
use crate::types::StepRequest;

fn executor_over(client: MockStoreClient) -> Executor<MockStoreConnector> {
    let client: Arc<dyn StoreClient> = Arc::new(client);
    let mut connector = MockStoreConnector::new();
    connector.expect_connect().times(1).returning(move |_, _| Ok(client.clone()));
    Executor::with_connector(connector)
}

fn reset_step() -> StepRequest {
    step("create-or-reset-bucket").with_bucket("test")
}

fn rejected(message: &str) -> StorageError {
    StorageError::ObjectRejected { code: "AccessDenied".to_string(), message: message.to_string() }
}

#[rstest]
#[tokio::test]
async fn connector_failure_is_a_connection_error() {
    let mut connector = MockStoreConnector::new();
    connector
        .expect_connect()
        .times(1)
        .returning(|_, _| Err(StorageError::InvalidCredentials("access key and secret key must be set".to_string())));
    let executor = Executor::with_connector(connector);

    let result = executor.run(CancellationToken::new(), &reset_step()).await;

    assert_matches!(result, Err(ExecutorError::ConnectionError(StorageError::InvalidCredentials(_))));
}

#[rstest]
#[tokio::test]
async fn bucket_query_failure_stops_the_reset() {
    let mut client = MockStoreClient::new();
    client.expect_bucket_exists().with(eq("test")).times(1).returning(|_| Err(StorageError::Cancelled));
    client.expect_create_bucket().never();
    client.expect_list_objects().never();

    let result = executor_over(client).run(CancellationToken::new(), &reset_step()).await;

    assert_matches!(
        result,
        Err(ExecutorError::BucketQueryError { bucket, source: StorageError::Cancelled }) if bucket == "test"
    );
}

#[rstest]
#[tokio::test]
async fn create_failure_is_reported() {
    let mut client = MockStoreClient::new();
    client.expect_bucket_exists().times(1).returning(|_| Ok(false));
    client.expect_create_bucket().times(1).returning(|_| Err(rejected("bucket names are reserved")));
    client.expect_list_objects().never();

    let result = executor_over(client).run(CancellationToken::new(), &reset_step()).await;

    assert_matches!(result, Err(ExecutorError::CreateBucketError { bucket, .. }) if bucket == "test");
}

#[rstest]
#[tokio::test]
async fn listing_error_fails_the_reset() {
    let mut client = MockStoreClient::new();
    client.expect_bucket_exists().times(1).returning(|_| Ok(true));
    client.expect_list_objects().times(1).returning(|_, _| {
        stream::iter(vec![
            Ok(ObjectEntry::new("a")),
            Err(StorageError::ObjectStreamError("listing connection reset".to_string())),
            Ok(ObjectEntry::new("never-listed")),
        ])
        .boxed()
    });
    client
        .expect_remove_objects()
        .times(1)
        .returning(|_, keys| keys.filter_map(|_| future::ready(None::<RemovalFailure>)).boxed());

    let result = executor_over(client).run(CancellationToken::new(), &reset_step()).await;

    assert_matches!(
        result,
        Err(ExecutorError::ListObjectsError { bucket, source: StorageError::ObjectStreamError(_) }) if bucket == "test"
    );
}

#[rstest]
#[tokio::test]
async fn first_delete_failure_aborts_the_reset() {
    let mut client = MockStoreClient::new();
    client.expect_bucket_exists().times(1).returning(|_| Ok(true));
    client
        .expect_list_objects()
        .times(1)
        .returning(|_, _| stream::iter(["a", "b", "c"].map(|key| Ok(ObjectEntry::new(key)))).boxed());
    client.expect_remove_objects().times(1).returning(|_, keys| {
        keys.filter_map(|key| {
            let failure =
                (key != "a").then(|| RemovalFailure { error: rejected(&format!("{} is locked", key)), key: Some(key) });
            future::ready(failure)
        })
        .boxed()
    });

    let result = executor_over(client).run(CancellationToken::new(), &reset_step()).await;

    assert_matches!(
        result,
        Err(ExecutorError::DeleteObjectError { bucket, object: Some(object), source: StorageError::ObjectRejected { .. } })
            if bucket == "test" && object == "b"
    );
}

#[rstest]
#[tokio::test]
async fn batch_delete_failure_has_no_object() {
    let mut client = MockStoreClient::new();
    client.expect_bucket_exists().times(1).returning(|_| Ok(true));
    client.expect_list_objects().times(1).returning(|_, _| stream::iter([Ok(ObjectEntry::new("a"))]).boxed());
    client.expect_remove_objects().times(1).returning(|_, _| {
        stream::once(future::ready(RemovalFailure { key: None, error: StorageError::TaskFailed("batch lost".to_string()) }))
            .boxed()
    });

    let error = executor_over(client).run(CancellationToken::new(), &reset_step()).await.unwrap_err();

    assert_matches!(error, ExecutorError::DeleteObjectError { object: None, .. });
}

#[rstest]
#[tokio::test]
async fn read_stream_failure_is_a_read_error() {
    let mut client = MockStoreClient::new();
    client.expect_get_object().with(eq("test"), eq("k")).times(1).returning(|_, _| {
        Ok(stream::iter(vec![
            Ok(Bytes::from_static(b"Hel")),
            Err(StorageError::ObjectStreamError("connection closed mid-body".to_string())),
        ])
        .boxed())
    });

    let result = executor_over(client)
        .run(CancellationToken::new(), &step("read-object").with_bucket("test").with_object("k"))
        .await;

    assert_matches!(
        result,
        Err(ExecutorError::ReadObjectError { object, source: StorageError::ObjectStreamError(_), .. }) if object == "k"
    );
}

#[rstest]
#[tokio::test]
async fn non_utf8_body_is_a_read_error() {
    let mut client = MockStoreClient::new();
    client
        .expect_get_object()
        .times(1)
        .returning(|_, _| Ok(stream::iter([Ok(Bytes::from_static(&[0xff, 0xfe]))]).boxed()));

    let result = executor_over(client)
        .run(CancellationToken::new(), &step("read-object").with_bucket("test").with_object("k"))
        .await;

    assert_matches!(result, Err(ExecutorError::ReadObjectError { source: StorageError::ObjectStreamError(_), .. }));
}

#[rstest]
#[tokio::test]
async fn write_passes_etag_through() {
    let mut client = MockStoreClient::new();
    client
        .expect_put_object()
        .withf(|bucket, key, data| bucket == "test" && key == "k" && &data[..] == b"Hello World!")
        .times(1)
        .returning(|_, _, _| Ok(PutObjectReceipt { etag: Some("abc123".to_string()) }));

    let result = executor_over(client)
        .run(
            CancellationToken::new(),
            &step("write-object").with_bucket("test").with_object("k").with_content("Hello World!"),
        )
        .await
        .unwrap();

    assert_eq!(result.object_etag.as_deref(), Some("abc123"));
}

#[rstest]
#[tokio::test]
async fn write_failure_is_a_write_error() {
    let mut client = MockStoreClient::new();
    client.expect_put_object().times(1).returning(|_, _, _| Err(StorageError::Cancelled));

    let result = executor_over(client)
        .run(CancellationToken::new(), &step("write-object").with_bucket("test").with_object("k").with_content("v"))
        .await;

    assert_matches!(
        result,
        Err(ExecutorError::WriteObjectError { bucket, object, source: StorageError::Cancelled })
            if bucket == "test" && object == "k"
    );
}

#[rstest]
#[tokio::test]
async fn delete_failure_names_the_object() {
    let mut client = MockStoreClient::new();
    client.expect_remove_object().with(eq("test"), eq("k")).times(1).returning(|_, _| Err(rejected("locked")));

    let result = executor_over(client)
        .run(CancellationToken::new(), &step("delete-object").with_bucket("test").with_object("k"))
        .await;

    assert_matches!(
        result,
        Err(ExecutorError::DeleteObjectError { bucket, object: Some(object), .. }) if bucket == "test" && object == "k"
    );
}
