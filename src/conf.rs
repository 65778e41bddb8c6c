//! Defines configuration as read from the environment.

use aws_config::{from_env, SdkConfig};
use serde::Deserialize;
use std::env;
use tokio::sync::OnceCell;

/// The trigger is configured to start executions of a single state
/// machine. The configuration must be given as environment
/// variables.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// The ARN of the state machine started for each uploaded
    /// configuration file, read from `STATE_MACHINE`. It's not
    /// required at startup, but every invocation fails without it.
    #[serde(default)]
    pub state_machine: Option<String>,
}

/// Shared AWS configuration, loaded once per process.
static AWS_CONFIG: OnceCell<SdkConfig> = OnceCell::const_new();

/// Normalize an endpoint override so that it always carries a
/// scheme.
fn endpoint_with_scheme(endpoint_url: String) -> String {
    if endpoint_url.starts_with("http://") || endpoint_url.starts_with("https://") {
        endpoint_url
    } else {
        format!("https://{}", endpoint_url)
    }
}

/// Load the AWS configuration from the environment, honoring an
/// `AWS_ENDPOINT_URL` override.
async fn load_aws_config() -> SdkConfig {
    if let Ok(endpoint_url) = env::var("AWS_ENDPOINT_URL") {
        from_env()
            .endpoint_url(endpoint_with_scheme(endpoint_url))
            .region("us-east-1") // should be OK since the endpoint was overridden
            .load()
            .await
    } else {
        from_env().load().await
    }
}

/// Get the AWS configuration shared by every service client.
pub async fn aws_service_config() -> &'static SdkConfig {
    AWS_CONFIG.get_or_init(load_aws_config).await
}
