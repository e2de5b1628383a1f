use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AskError;
use crate::types::ProviderResponse;

pub mod azure_openai;
pub mod google_gemini;
pub mod openai_chat;

/// 统一的 Provider Trait 所有供应商实现该接口即可接入聚合器
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// 以单轮对话方式提交问题 返回原始形态的回答
    async fn ask(&self, question: &str) -> Result<ProviderResponse, AskError>;

    /// 展示用的供应商名称 例如 `ChatGPT`
    fn name(&self) -> &str;
}

/// 线程安全 Provider
pub type DynProvider = Arc<dyn AnswerProvider>;

/// 已解析的鉴权方式 由配置层根据 Credential 生成
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// 自定义 header 例如 Azure 的 `api-key`
    Header { name: String, value: String },
    /// 无需鉴权 例如本地兼容服务
    None,
}

impl AuthScheme {
    /// 将鉴权信息写入请求头
    pub(crate) fn apply(&self, headers: &mut HashMap<String, String>) {
        match self {
            Self::Bearer(token) => {
                headers.insert("Authorization".to_string(), format!("Bearer {token}"));
            }
            Self::Header { name, value } => {
                headers.insert(name.clone(), value.clone());
            }
            Self::None => {}
        }
    }
}

/// 从响应头中读取请求 ID 便于排查问题
pub(crate) fn request_id_from_headers(headers: &HashMap<String, String>) -> Option<&str> {
    headers
        .iter()
        .find(|(name, _)| {
            name.eq_ignore_ascii_case("x-request-id") || name.eq_ignore_ascii_case("apim-request-id")
        })
        .map(|(_, value)| value.as_str())
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transports shared by the provider unit tests.

    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::error::AskError;
    use crate::http::{HttpRequest, HttpResponse, HttpTransport};

    /// Returns a canned response and records every request it sees.
    pub(crate) struct RecordingTransport {
        status: u16,
        body: String,
        pub(crate) requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingTransport {
        pub(crate) fn new(status: u16, body: impl Into<String>) -> Self {
            Self {
                status,
                body: body.into(),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn last_request(&self) -> HttpRequest {
            self.requests
                .lock()
                .expect("lock")
                .last()
                .cloned()
                .expect("a request should have been sent")
        }

        pub(crate) fn last_body_json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.last_request().body).expect("json body")
        }
    }

    #[async_trait]
    impl HttpTransport for RecordingTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AskError> {
            self.requests.lock().expect("lock").push(request);
            Ok(HttpResponse {
                status: self.status,
                headers: Default::default(),
                body: self.body.clone().into_bytes(),
            })
        }
    }

    /// Always fails at the network layer.
    pub(crate) struct FailingTransport;

    #[async_trait]
    impl HttpTransport for FailingTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, AskError> {
            Err(AskError::transport("connection refused"))
        }
    }
}
