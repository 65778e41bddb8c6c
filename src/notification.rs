//! Defines a _notification_, the location of the uploaded
//! configuration file as announced by the S3 event.

use crate::error::HandlerError;
use aws_lambda_events::event::s3::S3Event;
use percent_encoding::percent_decode_str;
use tracing::instrument;

/// The object that triggered the invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// The bucket holding the uploaded object.
    pub bucket: String,

    /// The decoded key of the uploaded object.
    pub key: String,
}

impl Notification {
    /// Extracts the bucket and object key from the first record of
    /// an S3 event. Subsequent records are ignored.
    #[instrument(skip(event))]
    pub fn from(event: &S3Event) -> Result<Self, HandlerError> {
        let record = event
            .records
            .first()
            .ok_or_else(|| HandlerError::Notification(String::from("event has no records")))?;
        let bucket = record.s3.bucket.name.clone().ok_or_else(|| {
            HandlerError::Notification(String::from("record is missing s3.bucket.name"))
        })?;
        let key = record.s3.object.key.as_deref().ok_or_else(|| {
            HandlerError::Notification(String::from("record is missing s3.object.key"))
        })?;
        Ok(Notification {
            bucket,
            key: decode_key(key),
        })
    }
}

/// Decodes an object key the way S3 encodes it in notifications:
/// form-encoded, with `+` standing for a space. Invalid UTF-8
/// sequences are replaced rather than rejected.
pub fn decode_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}
