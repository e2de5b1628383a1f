use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::AskError;
use crate::http::{DynHttpTransport, send_json};
use crate::provider::{AnswerProvider, AuthScheme};
use crate::types::ProviderResponse;

use super::response::decode_chat_completion;
use super::types::ChatCompletionRequest;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI Chat Completions Provider
pub struct OpenAiChatProvider {
    pub(crate) transport: DynHttpTransport,
    pub(crate) name: String,
    pub(crate) base_url: String,
    pub(crate) auth: AuthScheme,
    pub(crate) organization: Option<String>,
    pub(crate) model: String,
    pub(crate) timeout: Option<Duration>,
}

impl OpenAiChatProvider {
    /// 创建带默认 base_url 与 Bearer 鉴权的 Provider
    pub fn new(transport: DynHttpTransport, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            name: "openai_chat".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            auth: AuthScheme::Bearer(api_key.into()),
            organization: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: None,
        }
    }

    /// 设置展示名称 例如 `DeepSeek`
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 自定义 base_url 可指向任意兼容服务
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 替换鉴权方式
    pub fn with_auth(mut self, auth: AuthScheme) -> Self {
        self.auth = auth;
        self
    }

    /// 配置组织 ID
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// 设置模型
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// 单次 HTTP 请求超时
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    fn build_headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        self.auth.apply(&mut headers);
        if let Some(org) = &self.organization {
            headers.insert("OpenAI-Organization".to_string(), org.clone());
        }
        headers
    }
}

#[async_trait]
impl AnswerProvider for OpenAiChatProvider {
    async fn ask(&self, question: &str) -> Result<ProviderResponse, AskError> {
        let endpoint = self.endpoint();
        debug!(provider = %self.name, %endpoint, model = %self.model, "sending chat completion");
        let body = ChatCompletionRequest::single_turn(Some(&self.model), question);
        let response = send_json(
            self.transport.as_ref(),
            endpoint,
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::provider::testing::{FailingTransport, RecordingTransport};
    use serde_json::json;

    #[test]
    fn endpoint_handles_base_url_variants() {
        let transport = Arc::new(RecordingTransport::new(200, "{}"));
        let provider = OpenAiChatProvider::new(transport.clone(), "k");
        assert_eq!(
            provider.endpoint(),
            "https://api.openai.com/v1/chat/completions"
        );

        let provider = OpenAiChatProvider::new(transport.clone(), "k")
            .with_base_url("https://api.deepseek.com/v1/");
        assert_eq!(
            provider.endpoint(),
            "https://api.deepseek.com/v1/chat/completions"
        );

        let provider = OpenAiChatProvider::new(transport, "k")
            .with_base_url("http://localhost:8080/custom/chat/completions");
        assert_eq!(
            provider.endpoint(),
            "http://localhost:8080/custom/chat/completions"
        );
    }

    #[tokio::test]
    async fn ask_sends_single_user_message_with_bearer_auth() {
        let transport = Arc::new(RecordingTransport::new(
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"4"}}]}"#,
        ));
        let provider = OpenAiChatProvider::new(transport.clone(), "sk-test")
            .with_name("ChatGPT")
            .with_organization("org-1")
            .with_timeout(Some(Duration::from_secs(30)));

        let answer = provider.ask("What is 2+2?").await.expect("ask");
        assert_eq!(answer.into_answer(), Ok("4".to_string()));

        let request = transport.last_request();
        assert_eq!(request.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(
            request.headers.get("Authorization"),
            Some(&"Bearer sk-test".to_string())
        );
        assert_eq!(
            request.headers.get("OpenAI-Organization"),
            Some(&"org-1".to_string())
        );
        assert_eq!(request.timeout, Some(Duration::from_secs(30)));
        assert_eq!(
            transport.last_body_json(),
            json!({
                "model": "gpt-3.5-turbo",
                "messages": [{"role": "user", "content": "What is 2+2?"}]
            })
        );
    }

    #[tokio::test]
    async fn custom_header_auth_replaces_bearer() {
        let transport = Arc::new(RecordingTransport::new(200, r#"{"choices":[]}"#));
        let provider = OpenAiChatProvider::new(transport.clone(), "unused")
            .with_auth(AuthScheme::Header {
                name: "X-Api-Key".to_string(),
                value: "secret".to_string(),
            })
            .with_model("deepseek-chat");

        let answer = provider.ask("hi").await.expect("ask");
        assert_eq!(answer, ProviderResponse::Choices(Vec::new()));

        let request = transport.last_request();
        assert!(!request.headers.contains_key("Authorization"));
        assert_eq!(request.headers.get("X-Api-Key"), Some(&"secret".to_string()));
        assert_eq!(transport.last_body_json()["model"], json!("deepseek-chat"));
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let provider = OpenAiChatProvider::new(Arc::new(FailingTransport), "k");
        let err = provider.ask("hi").await.expect_err("must fail");
        assert_eq!(err, AskError::transport("connection refused"));
    }
}
