//! OpenAI-compatible Chat Completions adapter.
//!
//! Works against `api.openai.com` as well as any service that mirrors the
//! `/v1/chat/completions` contract, such as DeepSeek.

mod provider;
pub(crate) mod response;
pub(crate) mod types;

pub use provider::OpenAiChatProvider;
