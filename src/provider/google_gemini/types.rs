use serde::{Deserialize, Serialize};

/// GenerateContent 请求体
#[derive(Debug, Clone, Serialize)]
pub(crate) struct GeminiGenerateContentRequest<'a> {
    pub(crate) contents: Vec<GeminiRequestContent<'a>>,
}

impl<'a> GeminiGenerateContentRequest<'a> {
    /// 单轮用户文本
    pub(crate) fn from_text(prompt: &'a str) -> Self {
        Self {
            contents: vec![GeminiRequestContent {
                role: "user",
                parts: vec![GeminiRequestPart { text: prompt }],
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GeminiRequestContent<'a> {
    pub(crate) role: &'a str,
    pub(crate) parts: Vec<GeminiRequestPart<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GeminiRequestPart<'a> {
    pub(crate) text: &'a str,
}

/// GenerateContentResponse 顶层结构
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GeminiGenerateContentResponse {
    /// 候选回答列表
    #[serde(default)]
    pub(crate) candidates: Vec<GeminiCandidate>,
    /// 与内容过滤相关的提示反馈
    #[serde(default, rename = "promptFeedback")]
    pub(crate) prompt_feedback: Option<GeminiPromptFeedback>,
    /// 实际使用的模型版本
    #[serde(default, rename = "modelVersion")]
    pub(crate) model_version: Option<String>,
}

/// 单个候选回答
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GeminiCandidate {
    #[serde(default)]
    pub(crate) content: Option<GeminiContent>,
    #[serde(default, rename = "finishReason")]
    pub(crate) finish_reason: Option<String>,
}

/// 候选内容
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GeminiContent {
    #[serde(default)]
    pub(crate) parts: Vec<GeminiPart>,
}

/// Content.part 只关心文本
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GeminiPart {
    #[serde(default)]
    pub(crate) text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GeminiPromptFeedback {
    #[serde(default, rename = "blockReason")]
    pub(crate) block_reason: Option<String>,
}
