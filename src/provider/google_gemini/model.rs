use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::error::{AskError, parse_error_body};
use crate::http::{DynHttpTransport, send_json};
use crate::provider::AuthScheme;

use super::types::{GeminiGenerateContentRequest, GeminiGenerateContentResponse};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub(crate) const DEFAULT_KEY_HEADER: &str = "x-goog-api-key";

/// Client bound to one Gemini model, configured with an API key and a model name.
///
/// Mirrors the shape of Google's generative-model SDKs: build it once, then call
/// [`GenerativeModel::generate_content`] with a prompt and read the answer through
/// [`GenerateContentResponse::text`].
pub struct GenerativeModel {
    transport: DynHttpTransport,
    base_url: String,
    auth: AuthScheme,
    model_name: String,
    timeout: Option<Duration>,
}

impl GenerativeModel {
    /// Creates a client that targets the default Google Generative Language endpoint.
    pub fn new(
        transport: DynHttpTransport,
        model_name: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url: DEFAULT_BASE_URL.to_string(),
            auth: AuthScheme::Header {
                name: DEFAULT_KEY_HEADER.to_string(),
                value: api_key.into(),
            },
            model_name: model_name.into(),
            timeout: None,
        }
    }

    /// Overrides the base URL, making it easier to point at proxies or compatibility layers.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replaces the default `x-goog-api-key` header, e.g. for a proxy with its own key.
    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Builds the non-streaming endpoint URL for GenerateContent.
    pub(crate) fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let model_path = normalize_model(&self.model_name);
        if base.ends_with("/v1beta") {
            format!("{base}/{model_path}:generateContent")
        } else {
            format!("{base}/v1beta/{model_path}:generateContent")
        }
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        self.auth.apply(&mut headers);
        headers
    }

    /// Sends `prompt` as a single user turn.
    ///
    /// # Errors
    ///
    /// Returns [`AskError::Transport`] or [`AskError::Timeout`] when the request cannot be
    /// completed, [`AskError::HttpStatus`] for non-2xx answers and [`AskError::Decode`]
    /// when the body does not match the GenerateContent schema.
    pub async fn generate_content(&self, prompt: &str) -> Result<GenerateContentResponse, AskError> {
        let endpoint = self.endpoint();
        debug!(%endpoint, model = %self.model_name, "sending generateContent");
        let body = GeminiGenerateContentRequest::from_text(prompt);
        let response = send_json(
            self.transport.as_ref(),
            endpoint,
            self.build_headers(),
            &body,
            self.timeout,
        )
        .await?;

        let status = response.status;
        let success = response.is_success();
        let text = response.into_string()?;
        debug!(status, body = %text, "generateContent response");
        if !success {
            return Err(parse_error_body(status, &text));
        }

        let inner: GeminiGenerateContentResponse = serde_json::from_str(&text)
            .map_err(|err| AskError::decode(format!("failed to parse Gemini response: {err}")))?;
        Ok(GenerateContentResponse { inner })
    }
}

fn normalize_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

/// Decoded answer of one [`GenerativeModel::generate_content`] call.
#[derive(Debug, Clone)]
pub struct GenerateContentResponse {
    inner: GeminiGenerateContentResponse,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    ///
    /// `None` when there is no candidate or the candidate carries no text, which is what a
    /// safety-blocked prompt looks like.
    pub fn text(&self) -> Option<String> {
        let content = self.inner.candidates.first()?.content.as_ref()?;
        let texts: Vec<&str> = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.inner.candidates.first()?.finish_reason.as_deref()
    }

    /// Reason reported when the prompt itself was blocked.
    pub fn block_reason(&self) -> Option<&str> {
        self.inner.prompt_feedback.as_ref()?.block_reason.as_deref()
    }

    pub fn model_version(&self) -> Option<&str> {
        self.inner.model_version.as_deref()
    }
}
