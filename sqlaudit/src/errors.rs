use crate::crypto::EncryptionError;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Request content rejected before anything was sent (e.g. empty SQL text)
    #[error("{message}")]
    InvalidInput { message: String },

    /// A required datasource field is missing
    #[error("Missing required field: {field}")]
    Validation { field: &'static str },

    /// Backend refused the caller's privilege for this endpoint
    #[error("Not authorized: {message}")]
    Unauthorized { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Duplicate detected by the backend on create
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Credential protection failed, so the dependent call was never issued
    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    /// Network failure or unreachable backend, with the underlying cause
    #[error("Transport error: {0}")]
    Transport(#[source] anyhow::Error),

    /// Any other non-success reply
    #[error("Backend error (HTTP {status}, code {code}): {message}")]
    Backend { status: u16, code: i64, message: String },

    /// Reply could not be decoded into the expected shape
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },
}

/// Coarse classification of [`Error`], for presentation code that wants to pick a notice
/// without matching on every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    Validation,
    Unauthorized,
    NotFound,
    Conflict,
    Encryption,
    Transport,
    Backend,
    MalformedResponse,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput { .. } => ErrorKind::InvalidInput,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Conflict { .. } => ErrorKind::Conflict,
            Error::Encryption(_) => ErrorKind::Encryption,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Backend { .. } => ErrorKind::Backend,
            Error::MalformedResponse { .. } => ErrorKind::MalformedResponse,
        }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput { message: message.into() }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedResponse { message: message.into() }
    }

    /// Returns a message specific enough to render a targeted failure notice.
    ///
    /// Transport causes are flattened into a single line; encryption failures never include the
    /// secret being protected.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidInput { message } => message.clone(),
            Error::Validation { field } => format!("The field '{field}' is required"),
            Error::Unauthorized { message } => {
                if message.is_empty() {
                    "You are not allowed to use this endpoint".to_string()
                } else {
                    format!("You are not allowed to use this endpoint: {message}")
                }
            }
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Conflict { message } => format!("Already exists: {message}"),
            Error::Encryption(e) => format!("Could not protect the credential: {e}"),
            Error::Transport(e) => format!("Could not reach the review service: {e:#}"),
            Error::Backend { message, .. } => message.clone(),
            Error::MalformedResponse { .. } => "The review service returned an unexpected response".to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.into())
    }
}

/// Type alias for client operation results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Error::invalid_input("x").kind(), ErrorKind::InvalidInput);
        assert_eq!(Error::Validation { field: "host" }.kind(), ErrorKind::Validation);
        assert_eq!(Error::malformed("x").kind(), ErrorKind::MalformedResponse);
        assert_eq!(Error::Transport(anyhow::anyhow!("connection refused")).kind(), ErrorKind::Transport);
        assert_eq!(Error::Encryption(EncryptionError::EmptySecret).kind(), ErrorKind::Encryption);
    }

    #[test]
    fn test_transport_keeps_cause_chain() {
        let err = Error::Transport(anyhow::anyhow!("connection refused").context("POST review/ddl failed"));
        let source = std::error::Error::source(&err).expect("transport error should expose its cause");
        assert!(source.to_string().contains("POST review/ddl failed"));
        assert!(err.user_message().contains("connection refused"));
    }

    #[test]
    fn test_user_messages_are_specific() {
        let not_found = Error::NotFound {
            resource: "Datasource".to_string(),
            id: "42".to_string(),
        };
        assert_eq!(not_found.user_message(), "Datasource with ID 42 not found");
        assert_eq!(Error::Validation { field: "host" }.user_message(), "The field 'host' is required");
        assert_eq!(
            Error::Unauthorized { message: String::new() }.user_message(),
            "You are not allowed to use this endpoint"
        );
    }
}
