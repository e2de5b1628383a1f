//! Transport seam between provider adapters and the network.
//!
//! Every provider call in this crate is a single JSON POST, so the request type only
//! models that. Tests swap the transport for an in-memory one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AskError;

pub mod reqwest;

/// JSON POST request handed to an [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Upper bound for the whole exchange; `None` leaves it to the transport.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Creates a request carrying an already serialized JSON body.
    ///
    /// `Content-Type` and `Accept` are preset to `application/json`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kotoba_ask::http::HttpRequest;
    ///
    /// let request = HttpRequest::json("https://example.com/v1/chat/completions", b"{}".to_vec())
    ///     .with_header("Authorization", "Bearer sk-test");
    /// assert_eq!(request.headers["Content-Type"], "application/json");
    /// assert_eq!(request.headers["Authorization"], "Bearer sk-test");
    /// ```
    pub fn json(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::from([
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Accept".to_string(), "application/json".to_string()),
            ]),
            body,
            timeout: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Merges `headers` into the preset ones; later values win.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Fully buffered response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`AskError::Decode`] for invalid UTF-8.
    pub fn into_string(self) -> Result<String, AskError> {
        String::from_utf8(self.body)
            .map_err(|err| AskError::decode(format!("response body is not UTF-8: {err}")))
    }
}

/// Sends a request and waits for the complete response.
///
/// Implementations report network failures as [`AskError::Transport`] and an elapsed
/// [`HttpRequest::timeout`] as [`AskError::Timeout`]. Non-2xx statuses are returned as
/// ordinary responses; interpreting them is up to the provider.
///
/// # Examples
///
/// ```
/// # use async_trait::async_trait;
/// # use kotoba_ask::error::AskError;
/// # use kotoba_ask::http::{HttpRequest, HttpResponse, HttpTransport};
/// struct Canned(&'static str);
///
/// #[async_trait]
/// impl HttpTransport for Canned {
///     async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, AskError> {
///         Ok(HttpResponse { status: 200, headers: Default::default(), body: self.0.into() })
///     }
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let response = Canned(r#"{"choices":[]}"#)
///     .send(HttpRequest::json("https://example.com", Vec::new()))
///     .await
///     .unwrap();
/// assert!(response.is_success());
/// # });
/// ```
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AskError>;
}

/// Shared transport handle; one instance usually serves every provider.
pub type DynHttpTransport = Arc<dyn HttpTransport>;

/// Serializes `body` and posts it to `url` with the given extra headers.
///
/// # Errors
///
/// Returns [`AskError::Validation`] when `body` cannot be serialized, otherwise whatever
/// the transport reports.
pub async fn send_json<T: Serialize>(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
    body: &T,
    timeout: Option<Duration>,
) -> Result<HttpResponse, AskError> {
    let payload = serde_json::to_vec(body).map_err(|err| AskError::Validation {
        message: format!("failed to serialize request: {err}"),
    })?;
    let request = HttpRequest::json(url, payload)
        .with_headers(headers)
        .with_timeout(timeout);
    transport.send(request).await
}
