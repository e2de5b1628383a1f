use serde::{Deserialize, Serialize};

/// Single-turn request body shared by OpenAI-compatible and Azure endpoints.
#[derive(Debug, Serialize, Clone)]
pub(crate) struct ChatCompletionRequest<'a> {
    /// Azure resolves the model from the deployment path and omits this field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) model: Option<&'a str>,
    pub(crate) messages: Vec<ChatMessage<'a>>,
}

impl<'a> ChatCompletionRequest<'a> {
    pub(crate) fn single_turn(model: Option<&'a str>, question: &'a str) -> Self {
        Self {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: question,
            }],
        }
    }
}

#[derive(Debug, Serialize, Clone)]
pub(crate) struct ChatMessage<'a> {
    pub(crate) role: &'a str,
    pub(crate) content: &'a str,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ChatCompletionResponse {
    #[serde(default)]
    pub(crate) id: Option<String>,
    #[serde(default)]
    pub(crate) model: Option<String>,
    pub(crate) choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ChatChoice {
    #[serde(default)]
    pub(crate) message: Option<ChatResponseMessage>,
    #[serde(default)]
    pub(crate) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ChatResponseMessage {
    #[serde(default)]
    pub(crate) content: Option<ChatMessageContent>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub(crate) enum ChatMessageContent {
    Text(String),
    Parts(Vec<ChatMessagePart>),
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ChatMessagePart {
    #[serde(rename = "type")]
    pub(crate) kind: String,
    #[serde(default)]
    pub(crate) text: Option<String>,
}
