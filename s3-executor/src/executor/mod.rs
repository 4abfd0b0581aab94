pub mod bucket;
pub mod object;

use std::str::FromStr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::core::client::storage::{ConnectionParams, StoreClient, StoreConnector};
use crate::core::client::S3Connector;
use crate::error::{ExecutorError, ExecutorResult};
use crate::types::{Command, StepRequest, StepResult};

/// Name under which a harness registers this executor
pub const EXECUTOR_NAME: &str = "s3";

/// Commands accepted by [`Executor::run`]
pub fn available_commands() -> Vec<&'static str> {
    Command::names()
}

/// Runs steps against an object store.
///
/// Holds no state between calls: every step opens its own connection through `C`.
#[derive(Debug, Clone, Default)]
pub struct Executor<C = S3Connector> {
    connector: C,
}

impl Executor<S3Connector> {
    pub fn new() -> Self {
        Self { connector: S3Connector }
    }
}

impl<C: StoreConnector> Executor<C> {
    pub fn with_connector(connector: C) -> Self {
        Self { connector }
    }

    /// Dispatches the step to the handler its command names.
    ///
    /// # Arguments
    /// * `cancel` - Fired by the caller to abandon in-flight store calls.
    /// * `step` - The step to run.
    ///
    /// # Returns
    /// * `ExecutorResult<StepResult>` - The handler's result, unchanged.
    #[instrument(skip_all, fields(command = %step.command))]
    pub async fn run(&self, cancel: CancellationToken, step: &StepRequest) -> ExecutorResult<StepResult> {
        let command = Command::from_str(&step.command).map_err(|_| ExecutorError::UnsupportedCommand {
            command: step.command.clone(),
            available: available_commands(),
        })?;
        debug!(?step, "Dispatching step");

        match command {
            Command::CreateOrResetBucket => self.create_or_reset_bucket(cancel, step).await,
            Command::ReadObject => self.read_object(cancel, step).await,
            Command::WriteObject => self.write_object(cancel, step).await,
            Command::DeleteObject => self.delete_object(cancel, step).await,
        }
    }

    fn connect(
        &self,
        command: Command,
        step: &StepRequest,
        cancel: CancellationToken,
    ) -> ExecutorResult<Arc<dyn StoreClient>> {
        let params = ConnectionParams {
            endpoint: required(command, "endpoint", &step.endpoint)?.to_string(),
            access_key: required(command, "user", &step.user)?.to_string(),
            secret_key: required(command, "password", &step.password)?.to_string(),
            use_ssl: step.use_ssl,
        };
        self.connector.connect(&params, cancel).map_err(ExecutorError::ConnectionError)
    }
}

/// Value of a step field the command cannot run without.
fn required<'a>(command: Command, field: &'static str, value: &'a Option<String>) -> ExecutorResult<&'a str> {
    value.as_deref().ok_or(ExecutorError::MissingParameter { command, field })
}
