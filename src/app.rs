//! Defines the read-only application state and the handling of a
//! single S3 notification.

use crate::client::{ObjectStore, Orchestrator};
use crate::conf::Settings;
use crate::document::{ConfigDocument, DocumentError, ParseError};
use crate::error::HandlerError;
use crate::notification::Notification;
use anyhow::{anyhow, Result};
use aws_lambda_events::event::s3::S3Event;
use envy::from_env;
use once_cell::sync::OnceCell;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::{error, info, instrument, warn};

/// The result of a handled notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// An execution was started; holds its ARN.
    Started(String),

    /// The configuration file wasn't valid YAML, so nothing was
    /// started. This is reported as a regular result, not as a
    /// failed invocation.
    ParseFailed(ParseError),
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Outcome::Started(execution_arn) => serializer.serialize_str(execution_arn),
            Outcome::ParseFailed(parse_error) => {
                let mut state = serializer.serialize_struct("ParseFailed", 2)?;
                state.serialize_field("errorType", "ParseError")?;
                state.serialize_field("errorMessage", &parse_error.message)?;
                state.end()
            }
        }
    }
}

/// An App is an initialized application state, derived from
/// settings.
pub struct App {
    /// The state machine to start, if one was configured.
    state_machine: Option<String>,
}

impl App {
    /// Initialize an App instance given a settings struct. A blank
    /// state machine is treated as missing.
    pub fn new(settings: Settings) -> Self {
        App {
            state_machine: settings
                .state_machine
                .map(|arn| arn.trim().to_string())
                .filter(|arn| !arn.is_empty()),
        }
    }

    /// Handle an S3 notification: pull the configuration file it
    /// points to, augment its stack sets and start an execution with
    /// the result.
    #[instrument(skip_all)]
    pub async fn handle(
        &self,
        event: &S3Event,
        store: &dyn ObjectStore,
        orchestrator: &dyn Orchestrator,
    ) -> Result<Outcome, HandlerError> {
        let Notification { bucket, key } = Notification::from(event)?;
        info!(%bucket, %key, "Received configuration file");

        let contents = match store.fetch(&bucket, &key).await {
            Ok(contents) => contents,
            Err(source) => {
                error!(%bucket, %key, "Couldn't fetch configuration file: {}", source);
                return Err(HandlerError::Fetch {
                    bucket,
                    key,
                    source,
                });
            }
        };

        let mut document = match ConfigDocument::parse(&contents) {
            Ok(document) => document,
            Err(DocumentError::Parse(parse_error)) => {
                warn!(%bucket, %key, "Configuration file is not valid YAML: {}", parse_error);
                return Ok(Outcome::ParseFailed(parse_error));
            }
            Err(DocumentError::Structure(message)) => return Err(HandlerError::Structure(message)),
        };
        document
            .augment_stacksets()
            .map_err(|e| HandlerError::Structure(e.to_string()))?;

        info!(
            "Triggering state machine with these values: {}",
            document.to_pretty()?
        );
        let state_machine = self
            .state_machine
            .as_deref()
            .ok_or(HandlerError::UnsetTarget)?;
        let input = document.to_input()?;
        let execution_arn = orchestrator
            .start_execution(state_machine, &input)
            .await
            .map_err(|source| HandlerError::Orchestrator {
                state_machine: state_machine.to_string(),
                source,
            })?;
        info!(%execution_arn, "Started execution");
        Ok(Outcome::Started(execution_arn))
    }
}

/// Global App instance.
static CURRENT: OnceCell<App> = OnceCell::new();

/// Initialize the global App instance.
pub fn init() -> Result<()> {
    let settings = from_env()?;
    let app = App::new(settings);
    CURRENT
        .set(app)
        .map_err(|_| anyhow!("app::CURRENT was already initialized"))
}

/// Get the current App instance, or panic if it hasn't been
/// initialized.
pub fn current() -> &'static App {
    CURRENT.get().expect("app is not initialized")
}
