use bytes::Bytes;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::{required, Executor};
use crate::core::client::storage::{PutObjectReceipt, StorageError, StoreClient, StoreConnector};
use crate::error::{ExecutorError, ExecutorResult};
use crate::types::{Command, StepRequest, StepResult};

impl<C: StoreConnector> Executor<C> {
    /// Fetches the whole object and returns it as text.
    #[instrument(skip_all, fields(bucket = step.bucket_name.as_deref(), object = step.object_name.as_deref()))]
    pub async fn read_object(&self, cancel: CancellationToken, step: &StepRequest) -> ExecutorResult<StepResult> {
        let command = Command::ReadObject;
        let bucket = required(command, "bucket_name", &step.bucket_name)?;
        let object = required(command, "object_name", &step.object_name)?;
        let store = self.connect(command, step, cancel)?;

        let content = read_object(store.as_ref(), bucket, object).await?;
        Ok(StepResult::read(object, content))
    }

    /// Stores `object_content` under `object_name` and reports the entity tag the store assigned.
    #[instrument(skip_all, fields(bucket = step.bucket_name.as_deref(), object = step.object_name.as_deref()))]
    pub async fn write_object(&self, cancel: CancellationToken, step: &StepRequest) -> ExecutorResult<StepResult> {
        let command = Command::WriteObject;
        let bucket = required(command, "bucket_name", &step.bucket_name)?;
        let object = required(command, "object_name", &step.object_name)?;
        let content = required(command, "object_content", &step.object_content)?;
        let store = self.connect(command, step, cancel)?;

        let receipt = write_object(store.as_ref(), bucket, object, content).await?;
        Ok(StepResult::written(object, content, receipt.etag))
    }

    #[instrument(skip_all, fields(bucket = step.bucket_name.as_deref(), object = step.object_name.as_deref()))]
    pub async fn delete_object(&self, cancel: CancellationToken, step: &StepRequest) -> ExecutorResult<StepResult> {
        let command = Command::DeleteObject;
        let bucket = required(command, "bucket_name", &step.bucket_name)?;
        let object = required(command, "object_name", &step.object_name)?;
        let store = self.connect(command, step, cancel)?;

        delete_object(store.as_ref(), bucket, object).await?;
        Ok(StepResult::empty())
    }
}

/// Reads `object` into memory. The body stream is dropped on every return path.
pub async fn read_object(store: &dyn StoreClient, bucket: &str, object: &str) -> ExecutorResult<String> {
    let read_error = |source: StorageError| ExecutorError::ReadObjectError {
        bucket: bucket.to_string(),
        object: object.to_string(),
        source,
    };

    let mut body = store.get_object(bucket, object).await.map_err(read_error)?;
    let mut data = Vec::new();
    while let Some(chunk) = body.next().await {
        data.extend_from_slice(&chunk.map_err(read_error)?);
    }
    debug!(bucket = %bucket, object = %object, bytes = data.len(), "Read object");

    String::from_utf8(data)
        .map_err(|e| read_error(StorageError::ObjectStreamError(format!("object body is not valid UTF-8: {}", e))))
}

pub async fn write_object(
    store: &dyn StoreClient,
    bucket: &str,
    object: &str,
    content: &str,
) -> ExecutorResult<PutObjectReceipt> {
    let receipt = store
        .put_object(bucket, object, Bytes::copy_from_slice(content.as_bytes()))
        .await
        .map_err(|source| ExecutorError::WriteObjectError { bucket: bucket.to_string(), object: object.to_string(), source })?;

    debug!(bucket = %bucket, object = %object, bytes = content.len(), etag = ?receipt.etag, "Wrote object");
    Ok(receipt)
}

pub async fn delete_object(store: &dyn StoreClient, bucket: &str, object: &str) -> ExecutorResult<()> {
    store.remove_object(bucket, object).await.map_err(|source| ExecutorError::DeleteObjectError {
        bucket: bucket.to_string(),
        object: Some(object.to_string()),
        source,
    })?;

    debug!(bucket = %bucket, object = %object, "Deleted object");
    Ok(())
}
