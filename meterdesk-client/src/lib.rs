pub mod endpoints;
mod error;
mod http;
mod query;

use async_trait::async_trait;
use meterdesk_core::normalize::{Fields, top};
use serde_json::Value;

pub use error::TransportError;
pub use http::HttpBackend;
pub use query::QueryParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationMethod {
    Post,
    Put,
    Delete,
}

/// Answer of a mutation endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub success: bool,
    pub message: Option<String>,
}

impl Envelope {
    /// Parses the envelope the legacy backend returns on mutations.
    ///
    /// An empty or unrecognized body counts as success: only an explicit
    /// `Success: false` marks a failure, HTTP status is checked separately.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            return Self {
                success: true,
                message: None,
            };
        };
        let fields = Fields::new(object);

        Self {
            success: fields
                .flag(&[top("Success"), top("Succes"), top("Ok")])
                .unwrap_or(true),
            message: fields.optional_text(&[top("Message"), top("Erreur"), top("Error")]),
        }
    }
}

/// Opaque document returned by an export endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPayload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

/// The legacy backend, one call per endpoint.
///
/// Implemented over HTTP by [`HttpBackend`]; tests substitute fakes.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    async fn get_json(&self, path: &str, query: &QueryParams) -> Result<Value, TransportError>;

    async fn get_binary(
        &self,
        path: &str,
        query: &QueryParams,
    ) -> Result<BinaryPayload, TransportError>;

    /// Sends a mutation. A non-success envelope is returned as
    /// [`TransportError::Rejected`].
    async fn mutate(
        &self,
        method: MutationMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<Envelope, TransportError>;
}
