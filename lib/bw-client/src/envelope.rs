//! Decoding of the `{success, message, data}` wrapper around backend replies.
//!
//! Both transports produce the same envelope (`bw serve` natively, the CLI
//! through `--response`), so decoding only ever sees bytes.

use crate::error::BwError;
use crate::models::Status;
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

/// Envelope whose data is never inspected
#[derive(Debug, Deserialize)]
struct Acknowledgment {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ListPayload<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatusPayload {
    Template { template: Status },
    Bare(Status),
}

/// Decode a single payload of type `T`.
///
/// With `success=false` the data is dropped unread and the backend message is
/// returned as [`BwError::Backend`].
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, BwError> {
    // The success flag is checked before `data` is typed, so a failed reply
    // with a well-formed payload can never leak through.
    let ack: Acknowledgment = serde_json::from_slice(body)?;
    if !ack.success {
        return Err(failure(ack.message));
    }

    let envelope: Envelope<T> = serde_json::from_slice(body)?;
    envelope
        .data
        .ok_or_else(|| BwError::Decode("successful response without data".to_string()))
}

/// Decode a list payload, accepting both a bare array and `{object: "list", data: [...]}`.
pub fn decode_list<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>, BwError> {
    match decode::<ListPayload<T>>(body)? {
        ListPayload::Bare(items) => Ok(items),
        ListPayload::Wrapped { data } => Ok(data),
    }
}

/// Decode a boolean-only acknowledgment.
///
/// Failures carry the backend message when there is one, otherwise a generic
/// "not successful" message. "Not found." is not special-cased here.
pub fn decode_ack(body: &[u8]) -> Result<(), BwError> {
    let ack: Acknowledgment = serde_json::from_slice(body)?;
    if ack.success {
        Ok(())
    } else {
        Err(failure(ack.message))
    }
}

/// Decode a status reply, unwrapping the REST `template` wrapper when present.
pub fn decode_status(body: &[u8]) -> Result<Status, BwError> {
    match decode::<StatusPayload>(body)? {
        StatusPayload::Template { template } => Ok(template),
        StatusPayload::Bare(status) => Ok(status),
    }
}

fn failure(message: Option<String>) -> BwError {
    match message {
        Some(m) if !m.is_empty() => BwError::backend(m),
        _ => BwError::backend("response was not successful"),
    }
}
