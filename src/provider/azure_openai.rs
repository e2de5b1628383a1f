//! Azure OpenAI deployment adapter.
//!
//! Azure routes by deployment rather than model name: the request goes to
//! `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=...` and the
//! body carries no `model` field. The response uses the regular chat-completions shape.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::AskError;
use crate::http::{DynHttpTransport, send_json};
use crate::provider::openai_chat::response::decode_chat_completion;
use crate::provider::openai_chat::types::ChatCompletionRequest;
use crate::provider::{AnswerProvider, AuthScheme};
use crate::types::ProviderResponse;

pub(crate) const DEFAULT_API_VERSION: &str = "2023-05-15";
pub(crate) const DEFAULT_KEY_HEADER: &str = "api-key";

/// Chat completions against one Azure OpenAI deployment.
pub struct AzureOpenAiProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) name: String,
    pub(crate) endpoint: String,
    pub(crate) deployment: String,
    pub(crate) api_version: String,
    pub(crate) auth: AuthScheme,
    pub(crate) timeout: Option<Duration>,
}

impl AzureOpenAiProvider {
    /// Creates a provider for `deployment` hosted under the resource `endpoint`.
    ///
    /// The key is sent in the `api-key` header; use [`Self::with_auth`] to switch to an
    /// Entra ID bearer token instead.
    pub fn new(
        transport: DynHttpTransport,
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            name: "azure_openai".to_string(),
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            auth: AuthScheme::Header {
                name: DEFAULT_KEY_HEADER.to_string(),
                value: api_key.into(),
            },
            timeout: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        format!(
            "{base}/openai/deployments/{}/chat/completions?api-version={}",
            self.deployment, self.api_version
        )
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        self.auth.apply(&mut headers);
        headers
    }
}

#[async_trait]
impl AnswerProvider for AzureOpenAiProvider {
    async fn ask(&self, question: &str) -> Result<ProviderResponse, AskError> {
        let url = self.url();
        debug!(provider = %self.name, %url, "sending azure chat completion");
        let body = ChatCompletionRequest::single_turn(None, question);
        let response = send_json(
            self.transport.as_ref(),
            url,
            self.build_headers(),
            &body,
            self.timeout,
        )
        .await?;
        decode_chat_completion(&self.name, response)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
