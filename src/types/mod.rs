//! Shared data structures describing provider answers and the observable aggregator state.
//!
//! Provider adapters speak in [`ProviderResponse`]; the aggregator normalizes it into a
//! [`ProviderResult`] and publishes [`AnswerSnapshot`] values to subscribers.

use serde::{Deserialize, Serialize};

use crate::error::AskError;

/// Outcome of one provider call within a dispatch cycle.
///
/// Every slot starts as [`ProviderResult::Pending`] and moves to exactly one terminal
/// variant per cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum ProviderResult {
    /// No call has resolved yet for the current cycle.
    Pending,
    /// The provider answered with text.
    Success(String),
    /// The call failed; the message is already labeled with the provider name.
    Failure(String),
}

impl ProviderResult {
    /// Returns `true` once the slot reached `Success` or `Failure`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Text carried by a terminal result.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Pending => None,
            Self::Success(text) | Self::Failure(text) => Some(text),
        }
    }
}

/// Raw answer shape as returned by a provider adapter.
///
/// Chat-completion style APIs return a list of choices while the generative-model client
/// returns a single optional text. Both collapse to one answer through
/// [`ProviderResponse::into_answer`].
///
/// # Examples
///
/// ```
/// use kotoba_ask::types::ProviderResponse;
///
/// let choices = ProviderResponse::Choices(vec![Some("4".into()), Some("four".into())]);
/// assert_eq!(choices.into_answer().unwrap(), "4");
///
/// let empty = ProviderResponse::PlainText(None);
/// assert!(empty.into_answer().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResponse {
    /// Message contents of every choice, in response order.
    Choices(Vec<Option<String>>),
    /// Plain text produced by a single generate-content call.
    PlainText(Option<String>),
}

impl ProviderResponse {
    /// Extracts the answer text.
    ///
    /// # Errors
    ///
    /// Returns [`AskError::EmptyResponse`] when there is no choice at all, when the first
    /// choice has no content, or when the plain-text variant carries nothing.
    pub fn into_answer(self) -> Result<String, AskError> {
        match self {
            // Only the first choice counts; a null content there means no answer.
            Self::Choices(choices) => choices
                .into_iter()
                .next()
                .flatten()
                .ok_or(AskError::EmptyResponse),
            Self::PlainText(text) => text.ok_or(AskError::EmptyResponse),
        }
    }
}

/// One provider's result slot, tagged with the provider name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSlot {
    pub provider: String,
    pub result: ProviderResult,
}

/// Observable state of an [`crate::aggregator::AnswerAggregator`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSnapshot {
    /// Question that will be sent on the next dispatch.
    pub question: String,
    /// `true` while at least one call of the current cycle is unresolved.
    pub busy: bool,
    /// One slot per registered provider, in registration order.
    pub results: Vec<ProviderSlot>,
}

impl AnswerSnapshot {
    /// Looks up the slot of the named provider.
    pub fn result_for(&self, provider: &str) -> Option<&ProviderResult> {
        self.results
            .iter()
            .find(|slot| slot.provider == provider)
            .map(|slot| &slot.result)
    }

    /// Returns `true` when every slot holds a terminal result.
    pub fn all_resolved(&self) -> bool {
        self.results.iter().all(|slot| slot.result.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_first_choice_is_empty_even_if_later_choices_exist() {
        let response = ProviderResponse::Choices(vec![None, Some("second".to_string())]);
        assert_eq!(response.into_answer(), Err(AskError::EmptyResponse));
    }

    #[test]
    fn zero_choices_is_empty_response() {
        let response = ProviderResponse::Choices(Vec::new());
        assert_eq!(response.into_answer(), Err(AskError::EmptyResponse));
    }

    #[test]
    fn snapshot_lookup_and_resolution() {
        let snapshot = AnswerSnapshot {
            question: "q".to_string(),
            busy: true,
            results: vec![
                ProviderSlot {
                    provider: "a".to_string(),
                    result: ProviderResult::Success("yes".to_string()),
                },
                ProviderSlot {
                    provider: "b".to_string(),
                    result: ProviderResult::Pending,
                },
            ],
        };
        assert_eq!(snapshot.result_for("a").and_then(|r| r.text()), Some("yes"));
        assert_eq!(snapshot.result_for("b"), Some(&ProviderResult::Pending));
        assert!(snapshot.result_for("c").is_none());
        assert!(!snapshot.all_resolved());
    }

    #[test]
    fn provider_result_serializes_with_state_tag() {
        let value = serde_json::to_value(ProviderResult::Failure("boom".to_string()))
            .expect("serialize");
        assert_eq!(value, serde_json::json!({"state": "failure", "text": "boom"}));
        let value = serde_json::to_value(ProviderResult::Pending).expect("serialize");
        assert_eq!(value, serde_json::json!({"state": "pending"}));
    }
}
