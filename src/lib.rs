//! Starts AWS Step Functions executions from YAML configuration files
//! uploaded to S3, copying shared fields onto each stack set entry.

pub mod app;
pub mod client;
pub mod conf;
pub mod document;
pub mod error;
pub mod notification;
pub mod yaml;
