use aws_sdk_s3::error::{BuildError, SdkError};
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::delete_object::DeleteObjectError;
use aws_sdk_s3::operation::delete_objects::DeleteObjectsError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_bucket::HeadBucketError;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Error;
use aws_sdk_s3::operation::put_object::PutObjectError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Failed to check bucket: {0}")]
    HeadBucketError(#[from] SdkError<HeadBucketError>),

    #[error("Failed to create bucket: {0}")]
    CreateBucketError(#[from] SdkError<CreateBucketError>),

    #[error("Failed to list objects: {0}")]
    ListObjectsError(#[from] SdkError<ListObjectsV2Error>),

    #[error("Failed to delete objects: {0}")]
    DeleteObjectsError(#[from] SdkError<DeleteObjectsError>),

    #[error("Unable to delete object: {0}")]
    DeleteObjectError(#[from] SdkError<DeleteObjectError>),

    #[error("Failed to get object: {0}")]
    GetObjectError(#[from] SdkError<GetObjectError>),

    #[error("Failed to put object: {0}")]
    PutObjectError(#[from] SdkError<PutObjectError>),

    #[error("Failed to build request: {0}")]
    RequestBuildError(#[from] BuildError),

    #[error("Bucket {0} does not exist")]
    NoSuchBucket(String),

    #[error("Object {key} does not exist in bucket {bucket}")]
    NoSuchKey { bucket: String, key: String },

    /// Per-key failure reported inside a successful bulk delete response
    #[error("Object rejected by store ({code}): {message}")]
    ObjectRejected { code: String, message: String },

    #[error("Failed to stream object: {0}")]
    ObjectStreamError(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("Operation cancelled")]
    Cancelled,
}
