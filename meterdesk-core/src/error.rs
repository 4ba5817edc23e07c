use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse failure class. Presentation picks wording and affordances from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Connectivity,
    Server,
    NotFound,
    Unauthorized,
    Forbidden,
    Validation,
    Conflict,
    Unknown,
}

/// The only error shape allowed to cross into presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{title}: {message}")]
pub struct PortalError {
    pub title: String,
    pub message: String,
    pub category: ErrorCategory,
}

impl PortalError {
    /// Wording is chosen by category, never from the raw transport text.
    pub fn from_category(category: ErrorCategory) -> Self {
        let (title, message) = match category {
            ErrorCategory::Connectivity => (
                "Connection problem",
                "The server could not be reached. Check your connection and try again.",
            ),
            ErrorCategory::Server => (
                "Server error",
                "The server could not process the request. Please try again later.",
            ),
            ErrorCategory::NotFound => (
                "Not found",
                "The requested item does not exist or is no longer available.",
            ),
            ErrorCategory::Unauthorized => (
                "Session expired",
                "Your session is no longer valid. Please sign in again.",
            ),
            ErrorCategory::Forbidden => (
                "Access denied",
                "You are not allowed to access this resource.",
            ),
            ErrorCategory::Validation => ("Invalid request", "Some parameters are invalid."),
            ErrorCategory::Conflict => (
                "Operation failed",
                "The operation could not be completed.",
            ),
            ErrorCategory::Unknown => ("Unexpected error", "An unexpected error occurred."),
        };

        Self {
            title: title.to_string(),
            message: message.to_string(),
            category,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::from_category(ErrorCategory::Validation)
        }
    }

    /// Backend-provided text is shown verbatim when there is any.
    pub fn conflict(backend_message: Option<&str>) -> Self {
        let mut error = Self::from_category(ErrorCategory::Conflict);
        if let Some(message) = backend_message.map(str::trim)
            && !message.is_empty()
        {
            error.message = message.to_string();
        }
        error
    }
}
