//! Google Gemini adapter built around a small `GenerativeModel` client.

mod model;
mod provider;
pub(crate) mod types;

pub(crate) use model::DEFAULT_KEY_HEADER;
pub use model::{GenerateContentResponse, GenerativeModel};
pub use provider::GoogleGeminiProvider;
