pub mod storage;

pub use storage::s3::{S3Connector, S3Store};
pub use storage::{StoreClient, StoreConnector};
