pub mod error;
pub mod s3;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
pub use error::StorageError;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

/// Lazily produced object listing. Each item is either an entry or the error that ended the listing.
pub type ObjectListing = BoxStream<'static, Result<ObjectEntry, StorageError>>;

/// Failures reported by a bulk removal, in the order the store reports them.
pub type RemovalReport = BoxStream<'static, RemovalFailure>;

/// Body of a fetched object. Dropping the stream releases the underlying connection.
pub type ObjectBody = BoxStream<'static, Result<Bytes, StorageError>>;

/// Everything needed to open a connection to the store.
#[derive(Clone)]
pub struct ConnectionParams {
    /// `host[:port]`, without scheme
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub use_ssl: bool,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("use_ssl", &self.use_ssl)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsOptions {
    pub prefix: Option<String>,
    /// Descend into every "directory" instead of stopping at the first `/`
    pub recursive: bool,
}

impl ListObjectsOptions {
    /// Every object in the bucket.
    pub fn everything() -> Self {
        Self { prefix: None, recursive: true }
    }
}

/// One object yielded by a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
}

impl ObjectEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// A key the store refused to delete. `key` is `None` when a whole batch failed.
#[derive(Debug)]
pub struct RemovalFailure {
    pub key: Option<String>,
    pub error: StorageError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObjectReceipt {
    pub etag: Option<String>,
}

/// Object storage operations the executor relies on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Check whether the bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError>;

    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError>;

    /// Enumerate objects page by page. Nothing is fetched until the stream is polled.
    fn list_objects(&self, bucket: &str, options: ListObjectsOptions) -> ObjectListing;

    /// Delete every key the input stream yields, batching on the store side.
    ///
    /// The returned stream ends once the input is exhausted and every batch has been sent.
    fn remove_objects(&self, bucket: &str, keys: BoxStream<'static, String>) -> RemovalReport;

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), StorageError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StorageError>;

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<PutObjectReceipt, StorageError>;
}

/// Builds a [`StoreClient`] for one invocation.
///
/// Implementations validate the parameters only and must not touch the network:
/// transport failures surface on the first call made through the returned client.
#[cfg_attr(test, mockall::automock)]
pub trait StoreConnector: Send + Sync {
    fn connect(
        &self,
        params: &ConnectionParams,
        cancel: CancellationToken,
    ) -> Result<Arc<dyn StoreClient>, StorageError>;
}
