//! Ask one question to several LLM providers at once and collect every answer

pub mod aggregator;
pub mod config;
pub mod error;
pub mod http;
pub mod provider;
pub mod types;

pub use aggregator::{AnswerAggregator, DispatchOutcome, SkipReason};
pub use config::{AggregatorConfig, build_aggregator};
pub use error::AskError;
pub use provider::{AnswerProvider, DynProvider};
pub use types::*;
