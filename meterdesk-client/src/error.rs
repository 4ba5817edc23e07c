use meterdesk_core::{ErrorCategory, PortalError};
use serde_json::Value;
use thiserror::Error;

use crate::Envelope;

/// Error type for backend calls.
///
/// `Clone` so that one failed fetch can be handed to every coalesced waiter.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("could not reach backend: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("backend returned error status {status}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("backend rejected the operation")]
    Rejected { message: Option<String> },

    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TransportError::Connect(_) | TransportError::Timeout => ErrorCategory::Connectivity,
            TransportError::Status { status, .. } => match status {
                401 => ErrorCategory::Unauthorized,
                403 => ErrorCategory::Forbidden,
                404 => ErrorCategory::NotFound,
                409 => ErrorCategory::Conflict,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Unknown,
            },
            TransportError::Decode(_) => ErrorCategory::Server,
            TransportError::Rejected { .. } => ErrorCategory::Conflict,
            TransportError::Other(_) => ErrorCategory::Unknown,
        }
    }

    fn backend_message(&self) -> Option<String> {
        match self {
            TransportError::Rejected { message } => message.clone(),
            TransportError::Status { body, .. } => serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|value| Envelope::from_value(&value).message),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

impl From<&TransportError> for PortalError {
    fn from(e: &TransportError) -> Self {
        match e.category() {
            ErrorCategory::Conflict => PortalError::conflict(e.backend_message().as_deref()),
            category => PortalError::from_category(category),
        }
    }
}

impl From<TransportError> for PortalError {
    fn from(e: TransportError) -> Self {
        PortalError::from(&e)
    }
}
