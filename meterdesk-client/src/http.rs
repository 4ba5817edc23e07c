use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, RequestBuilder, header};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    Backend, BinaryPayload, Envelope, MutationMethod, QueryParams, TransportError,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP implementation of [`Backend`] for the legacy portal API.
#[derive(Clone)]
pub struct HttpBackend {
    http: HttpClient,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    /// Create a backend with the given base URL and the default timeout.
    ///
    /// # Example
    /// ```no_run
    /// use meterdesk_client::HttpBackend;
    ///
    /// let backend = HttpBackend::new("http://localhost:8080").unwrap();
    /// ```
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self::with_http_client(http, base_url))
    }

    /// Create a backend with a custom reqwest client.
    ///
    /// This allows you to configure timeouts, TLS settings, etc.
    pub fn with_http_client(http: HttpClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Bearer token forwarded as-is on every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn get_json(&self, path: &str, query: &QueryParams) -> Result<Value, TransportError> {
        debug!(path, params = query.pairs().len(), "GET json");
        let response = self
            .request(Method::GET, path)
            .query(query.pairs())
            .send()
            .await?;

        let response = check_status(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn get_binary(
        &self,
        path: &str,
        query: &QueryParams,
    ) -> Result<BinaryPayload, TransportError> {
        debug!(path, "GET binary");
        let response = self
            .request(Method::GET, path)
            .query(query.pairs())
            .send()
            .await?;

        let response = check_status(response).await?;
        let headers = response.headers();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let file_name = headers
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_file_name);
        let bytes = response.bytes().await?.to_vec();

        info!(path, size = bytes.len(), "downloaded document");

        Ok(BinaryPayload {
            bytes,
            content_type,
            file_name,
        })
    }

    async fn mutate(
        &self,
        method: MutationMethod,
        path: &str,
        body: Option<Value>,
    ) -> Result<Envelope, TransportError> {
        let method = match method {
            MutationMethod::Post => Method::POST,
            MutationMethod::Put => Method::PUT,
            MutationMethod::Delete => Method::DELETE,
        };
        info!(%method, path, "sending mutation");

        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = check_status(request.send().await?).await?;

        let text = response.text().await?;
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))?
        };

        let envelope = Envelope::from_value(&value);
        if envelope.success {
            Ok(envelope)
        } else {
            Err(TransportError::Rejected {
                message: envelope.message,
            })
        }
    }
}

/// Helper to turn non-success statuses into our error type.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();

    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

/// `attachment; filename="factures.xlsx"` -> `factures.xlsx`.
fn disposition_file_name(disposition: &str) -> Option<String> {
    disposition
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}
