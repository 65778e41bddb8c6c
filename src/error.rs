//! Defines the errors that abort an invocation.

use thiserror::Error;

/// Error type returned by the AWS collaborators, kept opaque so that
/// SDK error types don't leak past the client module.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A fatal failure while handling a notification. Parse failures of
/// the fetched document are not represented here, since those are
/// reported through [`crate::app::Outcome`] instead.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The S3 event didn't have the expected shape.
    #[error("malformed S3 notification: {0}")]
    Notification(String),

    /// The configuration document couldn't be retrieved.
    #[error("failed to fetch object {key:?} from bucket {bucket:?}")]
    Fetch {
        bucket: String,
        key: String,
        #[source]
        source: BoxError,
    },

    /// The document parsed, but lacks the fields required to build
    /// the execution input.
    #[error("invalid configuration document: {0}")]
    Structure(String),

    /// No state machine was configured through `STATE_MACHINE`.
    #[error("no state machine configured; STATE_MACHINE is not set")]
    UnsetTarget,

    /// The execution input couldn't be encoded as JSON.
    #[error("failed to serialize execution input")]
    Serialize(#[from] serde_json::Error),

    /// The state machine execution couldn't be started.
    #[error("failed to start an execution of state machine {state_machine:?}")]
    Orchestrator {
        state_machine: String,
        #[source]
        source: BoxError,
    },
}
