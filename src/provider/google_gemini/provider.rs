use async_trait::async_trait;
use tracing::debug;

use crate::error::AskError;
use crate::provider::AnswerProvider;
use crate::types::ProviderResponse;

use super::model::GenerativeModel;

/// Google Gemini provider backed by a [`GenerativeModel`].
pub struct GoogleGeminiProvider {
    pub(crate) name: String,
    pub(crate) model: GenerativeModel,
}

impl GoogleGeminiProvider {
    /// Wraps an already configured model client.
    pub fn new(model: GenerativeModel) -> Self {
        Self {
            name: "google_gemini".to_string(),
            model,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl AnswerProvider for GoogleGeminiProvider {
    async fn ask(&self, question: &str) -> Result<ProviderResponse, AskError> {
        let response = self.model.generate_content(question).await?;
        if let Some(reason) = response.block_reason() {
            debug!(provider = %self.name, reason, "prompt blocked");
        }
        Ok(ProviderResponse::PlainText(response.text()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::provider::testing::RecordingTransport;

    #[tokio::test]
    async fn ask_normalizes_to_plain_text() {
        let transport = Arc::new(RecordingTransport::new(
            200,
            r#"{"candidates":[{"content":{"parts":[{"text":"4"}]}}]}"#,
        ));
        let provider =
            GoogleGeminiProvider::new(GenerativeModel::new(transport, "gemini-1.5-pro", "k"))
                .with_name("Gemini");

        assert_eq!(provider.name(), "Gemini");
        let response = provider.ask("What is 2+2?").await.expect("ask");
        assert_eq!(response, ProviderResponse::PlainText(Some("4".to_string())));
    }

    #[tokio::test]
    async fn no_candidates_yields_empty_plain_text() {
        let transport = Arc::new(RecordingTransport::new(200, r#"{"candidates":[]}"#));
        let provider =
            GoogleGeminiProvider::new(GenerativeModel::new(transport, "gemini-1.5-pro", "k"));

        let response = provider.ask("q").await.expect("ask");
        assert_eq!(response.into_answer(), Err(AskError::EmptyResponse));
    }
}
