use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_s3::operation::delete_objects::DeleteObjectsOutput;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::future::{self, FutureExt, TryFutureExt};
use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::core::client::storage::{
    ConnectionParams, ListObjectsOptions, ObjectBody, ObjectEntry, ObjectListing, PutObjectReceipt, RemovalFailure,
    RemovalReport, StorageError, StoreClient, StoreConnector,
};

/// Region used for signing. S3-compatible stores generally ignore it.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Upper bound S3 puts on the number of keys in one DeleteObjects request
pub const MAX_KEYS_PER_DELETE: usize = 1000;

/// Opens [`S3Store`] connections against an S3-compatible endpoint using static credentials.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Connector;

impl S3Connector {
    /// Builds the SDK configuration for the given parameters.
    /// Only validates its input, nothing is sent over the wire.
    pub fn sdk_config(params: &ConnectionParams) -> Result<SdkConfig, StorageError> {
        let endpoint = endpoint_url(&params.endpoint, params.use_ssl)?;

        if params.access_key.is_empty() {
            return Err(StorageError::InvalidCredentials("access key is empty".to_string()));
        }
        if params.secret_key.is_empty() {
            return Err(StorageError::InvalidCredentials("secret key is empty".to_string()));
        }

        let credentials = Credentials::from_keys(params.access_key.clone(), params.secret_key.clone(), None);

        Ok(SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(DEFAULT_REGION))
            .endpoint_url(endpoint.as_str().trim_end_matches('/'))
            .credentials_provider(SharedCredentialsProvider::new(credentials))
            .build())
    }
}

impl StoreConnector for S3Connector {
    fn connect(
        &self,
        params: &ConnectionParams,
        cancel: CancellationToken,
    ) -> Result<Arc<dyn StoreClient>, StorageError> {
        let sdk_config = Self::sdk_config(params)?;

        // Buckets are addressed as `endpoint/bucket`, S3-compatible stores rarely serve virtual hosts
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(true).build();
        let client = Client::from_conf(s3_config);

        debug!(endpoint = %params.endpoint, use_ssl = params.use_ssl, "Created S3 client");
        Ok(Arc::new(S3Store::new(client, cancel)))
    }
}

/// [`StoreClient`] backed by the AWS SDK. Every remote call is abandoned once `cancel` fires.
#[derive(Clone, Debug)]
pub struct S3Store {
    client: Client,
    cancel: CancellationToken,
}

impl S3Store {
    pub fn new(client: Client, cancel: CancellationToken) -> Self {
        Self { client, cancel }
    }
}

#[async_trait]
impl StoreClient for S3Store {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        match race(&self.cancel, self.client.head_bucket().bucket(bucket).send()).await? {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        race(&self.cancel, self.client.create_bucket().bucket(bucket).send()).await??;
        Ok(())
    }

    fn list_objects(&self, bucket: &str, options: ListObjectsOptions) -> ObjectListing {
        let client = self.client.clone();
        let cancel = self.cancel.clone();
        let bucket = bucket.to_string();

        paginate(move |continuation_token| {
            let mut request = client
                .list_objects_v2()
                .bucket(&bucket)
                .set_prefix(options.prefix.clone())
                .set_continuation_token(continuation_token);
            if !options.recursive {
                request = request.delimiter("/");
            }
            let cancel = cancel.clone();
            let bucket = bucket.clone();
            async move {
                let page = race(&cancel, request.send()).await??;
                debug!(bucket = %bucket, objects = page.contents().len(), "Listed page of objects");
                Ok::<_, StorageError>(page)
            }
        })
    }

    fn remove_objects(&self, bucket: &str, keys: BoxStream<'static, String>) -> RemovalReport {
        let client = self.client.clone();
        let cancel = self.cancel.clone();
        let bucket = bucket.to_string();

        remove_in_batches(keys, move |batch| {
            let client = client.clone();
            let cancel = cancel.clone();
            let bucket = bucket.clone();
            async move { delete_batch(&client, &cancel, &bucket, &batch).await }
        })
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        race(&self.cancel, self.client.delete_object().bucket(bucket).key(key).send()).await??;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StorageError> {
        let output = match race(&self.cancel, self.client.get_object().bucket(bucket).key(key).send()).await? {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Err(StorageError::NoSuchKey { bucket: bucket.to_string(), key: key.to_string() });
            }
            Err(err) => return Err(err.into()),
        };

        let cancel = self.cancel.clone();
        let body = stream::try_unfold(output.body, move |mut body| {
            let cancel = cancel.clone();
            async move {
                let next = race(&cancel, body.try_next()).await?;
                match next {
                    Ok(Some(chunk)) => Ok(Some((chunk, body))),
                    Ok(None) => Ok(None),
                    Err(err) => Err(StorageError::ObjectStreamError(err.to_string())),
                }
            }
        });
        Ok(body.boxed())
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<PutObjectReceipt, StorageError> {
        let length = i64::try_from(data.len())
            .map_err(|_| StorageError::ObjectStreamError(format!("object of {} bytes is too large", data.len())))?;

        let output = race(
            &self.cancel,
            self.client.put_object().bucket(bucket).key(key).content_length(length).body(ByteStream::from(data)).send(),
        )
        .await??;

        Ok(PutObjectReceipt { etag: output.e_tag().map(trim_etag) })
    }
}

enum ListCursor {
    First,
    Next(String),
    Exhausted,
}

/// Walks a ListObjectsV2 listing one page at a time.
///
/// `fetch` gets the continuation token of the page to load and is only called again once every
/// entry of the previous page has been consumed. The first failed page ends the listing.
fn paginate<F, Fut>(mut fetch: F) -> ObjectListing
where
    F: FnMut(Option<String>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<ListObjectsV2Output, StorageError>> + Send + 'static,
{
    stream::try_unfold(ListCursor::First, move |cursor| {
        let continuation_token = match cursor {
            ListCursor::First => None,
            ListCursor::Next(token) => Some(token),
            ListCursor::Exhausted => return future::ready(Ok::<_, StorageError>(None)).left_future(),
        };
        fetch(continuation_token)
            .map_ok(|page| {
                let (entries, next) = page_entries(&page);
                Some((stream::iter(entries), next))
            })
            .right_future()
    })
    .map(|page| match page {
        Ok(entries) => entries.left_stream(),
        Err(error) => stream::once(future::ready(Err(error))).right_stream(),
    })
    .flatten()
    .boxed()
}

fn page_entries(page: &ListObjectsV2Output) -> (Vec<Result<ObjectEntry, StorageError>>, ListCursor) {
    let entries = page.contents().iter().filter_map(|object| object.key()).map(|key| Ok(ObjectEntry::new(key))).collect();
    let next = match page.next_continuation_token() {
        Some(token) => ListCursor::Next(token.to_string()),
        None => ListCursor::Exhausted,
    };
    (entries, next)
}

/// Groups keys into DeleteObjects-sized batches and flattens what each batch reports.
///
/// A batch that fails as a whole is reported once, without a key.
fn remove_in_batches<F, Fut>(keys: BoxStream<'static, String>, mut delete: F) -> RemovalReport
where
    F: FnMut(Vec<String>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<RemovalFailure>, StorageError>> + Send + 'static,
{
    keys.chunks(MAX_KEYS_PER_DELETE)
        .then(move |batch| {
            delete(batch).map(|outcome| outcome.unwrap_or_else(|error| vec![RemovalFailure { key: None, error }]))
        })
        .flat_map(stream::iter)
        .boxed()
}

/// Sends one DeleteObjects request in quiet mode, so only failed keys come back.
async fn delete_batch(
    client: &Client,
    cancel: &CancellationToken,
    bucket: &str,
    keys: &[String],
) -> Result<Vec<RemovalFailure>, StorageError> {
    let objects = keys.iter().map(|key| ObjectIdentifier::builder().key(key).build()).collect::<Result<Vec<_>, _>>()?;
    let delete = Delete::builder().set_objects(Some(objects)).quiet(true).build()?;

    let output = race(cancel, client.delete_objects().bucket(bucket).delete(delete).send()).await??;
    debug!(bucket = %bucket, keys = keys.len(), failed = output.errors().len(), "Sent bulk delete");

    Ok(removal_failures(&output))
}

fn removal_failures(output: &DeleteObjectsOutput) -> Vec<RemovalFailure> {
    output
        .errors()
        .iter()
        .map(|failure| RemovalFailure {
            key: failure.key().map(str::to_string),
            error: StorageError::ObjectRejected {
                code: failure.code().unwrap_or("Unknown").to_string(),
                message: failure.message().unwrap_or_default().to_string(),
            },
        })
        .collect()
}

/// Resolves to the call's output, or [`StorageError::Cancelled`] if the token fires first.
async fn race<F: Future>(cancel: &CancellationToken, call: F) -> Result<F::Output, StorageError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StorageError::Cancelled),
        output = call => Ok(output),
    }
}

/// Turns `host[:port]` into the URL the SDK talks to.
pub(crate) fn endpoint_url(endpoint: &str, use_ssl: bool) -> Result<Url, StorageError> {
    let invalid = |reason: &str| StorageError::InvalidEndpoint { endpoint: endpoint.to_string(), reason: reason.to_string() };

    if endpoint.trim().is_empty() {
        return Err(invalid("endpoint is empty"));
    }
    if endpoint.contains("://") {
        return Err(invalid("expected host[:port] without a scheme"));
    }

    let scheme = if use_ssl { "https" } else { "http" };
    let url = Url::parse(&format!("{scheme}://{endpoint}")).map_err(|e| invalid(&e.to_string()))?;

    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() || !url.username().is_empty() {
        return Err(invalid("endpoint must not carry a path or query"));
    }
    Ok(url)
}

/// Stores quote entity tags on the wire, callers get the bare token.
fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}
