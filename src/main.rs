use anyhow::{anyhow, Context, Result};
use aws_lambda_events::event::s3::S3Event;
use lambda_runtime::{run, service_fn, LambdaEvent};
use stackset_trigger::app::{self, Outcome};
use stackset_trigger::client;

/// Start a state machine execution with the configuration file
/// referenced by the S3 event.
async fn function_handler(event: LambdaEvent<S3Event>) -> Result<Outcome> {
    let clients = client::current();
    app::current()
        .handle(&event.payload, &clients.store, &clients.orchestrator)
        .await
        .with_context(|| {
            format!(
                "Failed to handle S3 notification in request {:?}",
                event.context.request_id
            )
        })
}

/// Run an AWS Lambda function that listens to S3 events announcing
/// uploaded configuration files, and that starts a Step Functions
/// execution for each of them.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();
    app::init()?;
    client::init().await?;

    run(service_fn(function_handler))
        .await
        .map_err(|e| anyhow!("{:?}", e))
}
