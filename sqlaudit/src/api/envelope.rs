//! Decoding of the backend's reply envelope.
//!
//! Review and datasource endpoints answer `{code, message, data}`; the user endpoints answer
//! `{success, data}`. Both shapes are read through [`Envelope`] and classified here, so every
//! client maps failures onto [`Error`] the same way:
//!
//! | HTTP status / envelope code | Error                  |
//! |-----------------------------|------------------------|
//! | 400, 422                    | `InvalidInput`         |
//! | 401, 403                    | `Unauthorized`         |
//! | 404                         | `NotFound`             |
//! | 409                         | `Conflict`             |
//! | anything else non-success   | `Backend`              |
//!
//! A non-2xx HTTP status wins over the envelope code; within a 2xx reply the envelope code decides
//! (200 and 0 mean success).

use crate::errors::{Error, Result};
use crate::http::HttpResponse;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

const MAX_MESSAGE_LEN: usize = 512;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, alias = "msg")]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// What the request was about, used to fill in `NotFound` errors.
#[derive(Debug, Clone)]
pub(crate) struct Subject {
    resource: &'static str,
    id: String,
}

impl Subject {
    pub(crate) fn new(resource: &'static str, id: impl ToString) -> Self {
        Self {
            resource,
            id: id.to_string(),
        }
    }
}

/// A successful reply with its data still optional.
#[derive(Debug)]
pub(crate) struct Reply<T> {
    pub code: i64,
    pub message: String,
    pub data: Option<T>,
}

impl<T> Reply<T> {
    /// The data, or `MalformedResponse` naming what was expected.
    pub fn require_data(self, what: &str) -> Result<T> {
        self.data
            .ok_or_else(|| Error::malformed(format!("Reply carried no {what} (code {}, message '{}')", self.code, self.message)))
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_MESSAGE_LEN {
        return text.to_string();
    }
    let mut end = MAX_MESSAGE_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

fn classify(status: u16, code: i64, message: String, subject: &Subject) -> Error {
    match code {
        400 | 422 => Error::InvalidInput { message },
        401 | 403 => Error::Unauthorized { message },
        404 => Error::NotFound {
            resource: subject.resource.to_string(),
            id: subject.id.clone(),
        },
        409 => Error::Conflict { message },
        _ => Error::Backend { status, code, message },
    }
}

/// Decode a reply, returning its data on success and a classified error otherwise.
pub(crate) fn decode<T: DeserializeOwned>(response: HttpResponse, subject: &Subject) -> Result<Reply<T>> {
    decode_with_data(response, subject).map_err(|failure| failure.error)
}

/// A failed reply, with whatever `data` it carried in the expected shape.
#[derive(Debug)]
pub(crate) struct Failure<T> {
    pub error: Error,
    pub data: Option<T>,
}

impl<T> From<Error> for Failure<T> {
    fn from(error: Error) -> Self {
        Self { error, data: None }
    }
}

/// Like [`decode`], but a failed reply keeps its `data` when it parses as `T`.
///
/// Used where the backend reports per-item results under an error code.
pub(crate) fn decode_with_data<T: DeserializeOwned>(response: HttpResponse, subject: &Subject) -> std::result::Result<Reply<T>, Failure<T>> {
    let status = response.status;
    let envelope = serde_json::from_str::<Envelope>(&response.body);

    if !response.is_success() {
        let (code, message, data) = match envelope {
            // Prefer a more specific envelope code only when the body actually carries one
            Ok(env) => (
                env.code.filter(|c| matches!(c, 400 | 401 | 403 | 404 | 409 | 422)).unwrap_or(status as i64),
                env.message.unwrap_or_default(),
                env.data,
            ),
            Err(_) => (status as i64, truncate(&response.body), None),
        };
        tracing::debug!(status, code, %message, "Backend returned an error status");
        return Err(Failure {
            error: classify(status, code, message, subject),
            data: parse_data(data).ok().flatten(),
        });
    }

    let envelope = envelope.map_err(|e| Error::malformed(format!("Reply is not a valid envelope: {e}; body: {}", truncate(&response.body))))?;
    let message = envelope.message.unwrap_or_default();

    let error = match (envelope.code, envelope.success) {
        (Some(code), _) if code != 0 && code != 200 => {
            tracing::debug!(code, %message, "Backend returned an error code");
            Some(classify(status, code, message.clone(), subject))
        }
        (None, Some(false)) => Some(Error::Backend {
            status,
            code: 0,
            message: message.clone(),
        }),
        _ => None,
    };
    if let Some(error) = error {
        return Err(Failure {
            error,
            data: parse_data(envelope.data).ok().flatten(),
        });
    }

    Ok(Reply {
        code: envelope.code.unwrap_or(200),
        message,
        data: parse_data(envelope.data)?,
    })
}

fn parse_data<T: DeserializeOwned>(data: Option<Value>) -> Result<Option<T>> {
    match data {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| Error::malformed(format!("Unexpected data shape: {e}"))),
    }
}
