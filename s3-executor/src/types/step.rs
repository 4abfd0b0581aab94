use std::fmt;

use serde::{Deserialize, Serialize};

/// One invocation of the executor, as supplied by the harness.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRequest {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_content: Option<String>,
}

impl StepRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self { command: command.into(), ..Default::default() }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn with_bucket(mut self, bucket_name: impl Into<String>) -> Self {
        self.bucket_name = Some(bucket_name.into());
        self
    }

    pub fn with_object(mut self, object_name: impl Into<String>) -> Self {
        self.object_name = Some(object_name.into());
        self
    }

    pub fn with_content(mut self, object_content: impl Into<String>) -> Self {
        self.object_content = Some(object_content.into());
        self
    }
}

impl fmt::Debug for StepRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRequest")
            .field("command", &self.command)
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("use_ssl", &self.use_ssl)
            .field("bucket_name", &self.bucket_name)
            .field("object_name", &self.object_name)
            .field("object_content", &self.object_content)
            .finish()
    }
}

/// What a step hands back to the harness. Fields the command does not produce stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_etag: Option<String>,
}

impl StepResult {
    /// Result of a bucket-level or delete command
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn read(object_name: impl Into<String>, object_content: impl Into<String>) -> Self {
        Self { object_name: Some(object_name.into()), object_content: Some(object_content.into()), object_etag: None }
    }

    pub fn written(
        object_name: impl Into<String>,
        object_content: impl Into<String>,
        object_etag: Option<String>,
    ) -> Self {
        Self { object_name: Some(object_name.into()), object_content: Some(object_content.into()), object_etag }
    }
}
