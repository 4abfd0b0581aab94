use thiserror::Error;

use crate::core::client::storage::StorageError;
use crate::types::Command;

/// Result type for executor operations
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Every way a step can fail. Store errors are wrapped with the bucket/object they concern.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("{command} is not a valid command, available commands are [{}]", .available.join(", "))]
    UnsupportedCommand { command: String, available: Vec<&'static str> },

    #[error("{command} requires `{field}` to be set")]
    MissingParameter { command: Command, field: &'static str },

    #[error("Error creating store client: {0}")]
    ConnectionError(#[source] StorageError),

    #[error("Error checking if bucket {bucket} exists: {source}")]
    BucketQueryError { bucket: String, source: StorageError },

    #[error("Error creating bucket {bucket}: {source}")]
    CreateBucketError { bucket: String, source: StorageError },

    #[error("Error listing objects of bucket {bucket}: {source}")]
    ListObjectsError { bucket: String, source: StorageError },

    #[error("Error removing object {} from bucket {bucket}: {source}", .object.as_deref().unwrap_or("<batch>"))]
    DeleteObjectError { bucket: String, object: Option<String>, source: StorageError },

    #[error("Error reading object {object} from bucket {bucket}: {source}")]
    ReadObjectError { bucket: String, object: String, source: StorageError },

    #[error("Error writing object {object} to bucket {bucket}: {source}")]
    WriteObjectError { bucket: String, object: String, source: StorageError },
}

impl ExecutorError {
    /// Underlying store error, if the failure came from the store
    pub fn storage_error(&self) -> Option<&StorageError> {
        match self {
            ExecutorError::UnsupportedCommand { .. } | ExecutorError::MissingParameter { .. } => None,
            ExecutorError::ConnectionError(source)
            | ExecutorError::BucketQueryError { source, .. }
            | ExecutorError::CreateBucketError { source, .. }
            | ExecutorError::ListObjectsError { source, .. }
            | ExecutorError::DeleteObjectError { source, .. }
            | ExecutorError::ReadObjectError { source, .. }
            | ExecutorError::WriteObjectError { source, .. } => Some(source),
        }
    }
}
