//! Defines the AWS collaborators of the handler, and the global
//! clients that back them.

use crate::conf::aws_service_config;
use crate::error::BoxError;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use tracing::instrument;

/// Source of the configuration documents.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Retrieves the full contents of an object.
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BoxError>;
}

/// Sink of the augmented documents.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Starts an execution of the given state machine with `input` as
    /// its input, returning the execution ARN.
    async fn start_execution(&self, state_machine: &str, input: &str) -> Result<String, BoxError>;
}

/// An [`ObjectStore`] backed by S3.
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

#[async_trait]
impl ObjectStore for S3Store {
    #[instrument(skip(self))]
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BoxError> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        let contents = object.body.collect().await?;
        Ok(contents.into_bytes().to_vec())
    }
}

/// An [`Orchestrator`] backed by AWS Step Functions.
pub struct StepFunctions {
    client: aws_sdk_sfn::Client,
}

#[async_trait]
impl Orchestrator for StepFunctions {
    #[instrument(skip(self, input))]
    async fn start_execution(&self, state_machine: &str, input: &str) -> Result<String, BoxError> {
        let response = self
            .client
            .start_execution()
            .state_machine_arn(state_machine)
            .input(input)
            .send()
            .await?;
        response
            .execution_arn()
            .map(String::from)
            .ok_or_else(|| BoxError::from("StartExecution response is missing the execution ARN"))
    }
}

/// The set of AWS clients used by the handler.
pub struct Clients {
    /// The S3 client used to fetch documents.
    pub store: S3Store,

    /// The Step Functions client used to start executions.
    pub orchestrator: StepFunctions,
}

/// Global clients instance.
static CURRENT: OnceCell<Clients> = OnceCell::new();

/// Initialize the global clients.
pub async fn init() -> Result<()> {
    let config = aws_service_config().await;
    let clients = Clients {
        store: S3Store {
            client: aws_sdk_s3::Client::new(config),
        },
        orchestrator: StepFunctions {
            client: aws_sdk_sfn::Client::new(config),
        },
    };
    CURRENT
        .set(clients)
        .map_err(|_| anyhow!("client::CURRENT was already initialized"))
}

/// Get the current clients, or panic if they haven't been
/// initialized.
pub fn current() -> &'static Clients {
    CURRENT.get().expect("client is not initialized")
}
