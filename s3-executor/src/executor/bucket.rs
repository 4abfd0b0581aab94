use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinError;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{required, Executor};
use crate::core::client::storage::s3::MAX_KEYS_PER_DELETE;
use crate::core::client::storage::{
    ListObjectsOptions, ObjectListing, RemovalFailure, StorageError, StoreClient, StoreConnector,
};
use crate::error::{ExecutorError, ExecutorResult};
use crate::types::{Command, StepRequest, StepResult};

/// What a reset had to do to leave the bucket empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The bucket did not exist and was created
    Created,
    /// The bucket existed and was emptied. `forwarded` counts the keys handed to the delete stage,
    /// the store does not confirm individual deletions in quiet mode.
    Emptied { forwarded: usize },
}

impl<C: StoreConnector> Executor<C> {
    /// Makes sure `bucket_name` exists and holds no objects.
    #[instrument(skip_all, fields(bucket = step.bucket_name.as_deref()))]
    pub async fn create_or_reset_bucket(
        &self,
        cancel: CancellationToken,
        step: &StepRequest,
    ) -> ExecutorResult<StepResult> {
        let command = Command::CreateOrResetBucket;
        let bucket = required(command, "bucket_name", &step.bucket_name)?;
        let store = self.connect(command, step, cancel)?;

        reset_bucket(store, bucket).await?;
        Ok(StepResult::empty())
    }
}

/// Brings `bucket` to the "exists and empty" state.
///
/// An existing bucket is emptied by streaming its listing into a bulk delete: a spawned task
/// forwards listed keys through a channel holding at most one delete batch, so listing never runs
/// more than a batch ahead of deletion, while this function drains the delete failures. The first
/// listing error or delete failure aborts the reset.
pub async fn reset_bucket(store: Arc<dyn StoreClient>, bucket: &str) -> ExecutorResult<ResetOutcome> {
    let exists = store
        .bucket_exists(bucket)
        .await
        .map_err(|source| ExecutorError::BucketQueryError { bucket: bucket.to_string(), source })?;

    if !exists {
        store
            .create_bucket(bucket)
            .await
            .map_err(|source| ExecutorError::CreateBucketError { bucket: bucket.to_string(), source })?;
        info!(bucket = %bucket, "Created bucket");
        return Ok(ResetOutcome::Created);
    }

    let (sender, receiver) = mpsc::channel(MAX_KEYS_PER_DELETE);
    let mut producer = tokio::spawn(forward_listing(store.list_objects(bucket, ListObjectsOptions::everything()), sender));
    let mut failures = store.remove_objects(bucket, ReceiverStream::new(receiver).boxed());

    let mut forwarded = None;
    loop {
        tokio::select! {
            biased;
            joined = &mut producer, if forwarded.is_none() => {
                forwarded = Some(listing_outcome(bucket, joined)?);
            }
            failure = failures.next() => match failure {
                Some(failure) => {
                    producer.abort();
                    return Err(removal_error(bucket, failure));
                }
                None => break,
            }
        }
    }

    // The channel closes as the producer returns, so the failure stream can end before its handle resolves
    let forwarded = match forwarded {
        Some(forwarded) => forwarded,
        None => listing_outcome(bucket, producer.await)?,
    };

    info!(bucket = %bucket, forwarded, "Emptied bucket");
    Ok(ResetOutcome::Emptied { forwarded })
}

/// Forwards every listed key to the delete stage, stopping at the first listing error.
async fn forward_listing(mut listing: ObjectListing, sender: Sender<String>) -> Result<usize, StorageError> {
    let mut forwarded = 0;
    while let Some(entry) = listing.next().await {
        let entry = entry?;
        if sender.send(entry.key).await.is_err() {
            debug!("Delete stage dropped its input, stopping listing");
            break;
        }
        forwarded += 1;
    }
    Ok(forwarded)
}

fn listing_outcome(bucket: &str, joined: Result<Result<usize, StorageError>, JoinError>) -> ExecutorResult<usize> {
    let source = match joined {
        Ok(Ok(forwarded)) => return Ok(forwarded),
        Ok(Err(source)) => source,
        Err(join_error) => StorageError::TaskFailed(join_error.to_string()),
    };
    warn!(bucket = %bucket, error = %source, "Listing failed while resetting bucket");
    Err(ExecutorError::ListObjectsError { bucket: bucket.to_string(), source })
}

fn removal_error(bucket: &str, failure: RemovalFailure) -> ExecutorError {
    warn!(bucket = %bucket, object = ?failure.key, error = %failure.error, "Delete failed while resetting bucket");
    ExecutorError::DeleteObjectError { bucket: bucket.to_string(), object: failure.key, source: failure.error }
}
