//! Fan-out of a single question to every registered provider.
//!
//! The aggregator owns the observable [`AnswerSnapshot`]. A dispatch cycle marks the
//! snapshot busy, resets every slot to [`ProviderResult::Pending`], spawns one task per
//! provider and writes each slot as soon as its task resolves. The busy flag clears only
//! after the last task has been joined. Dropping the dispatch future aborts the calls
//! still in flight.

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::MessageTemplates;
use crate::error::AskError;
use crate::provider::{AnswerProvider, DynProvider};
use crate::types::{AnswerSnapshot, ProviderResult, ProviderSlot};

/// Why [`AnswerAggregator::dispatch`] returned without calling any provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The stored question is empty or whitespace only.
    BlankQuestion,
    /// A previous cycle has not finished yet.
    AlreadyRunning,
}

/// Result of one [`AnswerAggregator::dispatch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Skipped(SkipReason),
    /// Every slot of the cycle, all terminal, in registration order.
    Completed(Vec<ProviderSlot>),
}

struct Registered {
    provider: DynProvider,
    timeout: Option<Duration>,
}

/// Sends one question to several providers concurrently and exposes their answers.
///
/// # Examples
///
/// ```
/// # use std::sync::Arc;
/// # use async_trait::async_trait;
/// # use kotoba_ask::aggregator::{AnswerAggregator, DispatchOutcome};
/// # use kotoba_ask::error::AskError;
/// # use kotoba_ask::provider::AnswerProvider;
/// # use kotoba_ask::types::{ProviderResponse, ProviderResult};
/// struct Echo;
///
/// #[async_trait]
/// impl AnswerProvider for Echo {
///     async fn ask(&self, question: &str) -> Result<ProviderResponse, AskError> {
///         Ok(ProviderResponse::PlainText(Some(question.to_uppercase())))
///     }
///     fn name(&self) -> &str {
///         "echo"
///     }
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let aggregator = AnswerAggregator::builder()
///     .register(Arc::new(Echo))
///     .build()
///     .expect("unique names");
/// aggregator.set_question("hello");
/// let outcome = aggregator.dispatch().await;
/// assert!(matches!(outcome, DispatchOutcome::Completed(_)));
/// assert_eq!(
///     aggregator.result_for("echo"),
///     Some(ProviderResult::Success("HELLO".to_string()))
/// );
/// assert!(!aggregator.is_busy());
/// # });
/// ```
pub struct AnswerAggregator {
    providers: Vec<Registered>,
    messages: MessageTemplates,
    state: watch::Sender<AnswerSnapshot>,
}

impl AnswerAggregator {
    /// 创建 Builder 便于后续注册 Provider
    pub fn builder() -> AnswerAggregatorBuilder {
        AnswerAggregatorBuilder {
            providers: Vec::new(),
            messages: MessageTemplates::default(),
            default_timeout: None,
        }
    }

    /// Stores the question used by the next dispatch.
    pub fn set_question(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_modify(|state| state.question = text);
    }

    pub fn question(&self) -> String {
        self.state.borrow().question.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.state.borrow().busy
    }

    pub fn snapshot(&self) -> AnswerSnapshot {
        self.state.borrow().clone()
    }

    pub fn results(&self) -> Vec<ProviderSlot> {
        self.state.borrow().results.clone()
    }

    pub fn result_for(&self, provider: &str) -> Option<ProviderResult> {
        self.state.borrow().result_for(provider).cloned()
    }

    /// 返回当前已注册的 Provider 名称 按注册顺序
    pub fn providers(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|entry| entry.provider.name().to_string())
            .collect()
    }

    /// Subscribes to state changes; every slot resolution and busy transition is published.
    pub fn subscribe(&self) -> watch::Receiver<AnswerSnapshot> {
        self.state.subscribe()
    }

    /// Runs one dispatch cycle and waits until every provider call has resolved.
    ///
    /// Provider failures never escape: each is rendered into its own slot through the
    /// configured [`MessageTemplates`].
    pub async fn dispatch(&self) -> DispatchOutcome {
        let mut skipped = None;
        let mut question = String::new();
        self.state.send_if_modified(|state| {
            if state.question.trim().is_empty() {
                skipped = Some(SkipReason::BlankQuestion);
                return false;
            }
            if state.busy {
                skipped = Some(SkipReason::AlreadyRunning);
                return false;
            }
            question = state.question.clone();
            state.busy = true;
            for slot in &mut state.results {
                slot.result = ProviderResult::Pending;
            }
            true
        });
        if let Some(reason) = skipped {
            debug!(?reason, "dispatch skipped");
            return DispatchOutcome::Skipped(reason);
        }

        let mut cycle = CycleGuard {
            aggregator: self,
            closed: false,
        };
        let started = Instant::now();
        info!(providers = self.providers.len(), "dispatching question");

        let question: Arc<str> = Arc::from(question);
        // 声明在 cycle 之后 先于它被丢弃 未完成的调用随之中止
        let mut calls = JoinSet::new();
        for (index, entry) in self.providers.iter().enumerate() {
            let provider = entry.provider.clone();
            let question = question.clone();
            let timeout = entry.timeout;
            calls.spawn(async move {
                let call = call_provider(provider.as_ref(), &question, timeout);
                let outcome = AssertUnwindSafe(call)
                    .catch_unwind()
                    .await
                    .map_err(panic_message);
                (index, outcome)
            });
        }

        while let Some(joined) = calls.join_next().await {
            let (index, outcome) = match joined {
                Ok(done) => done,
                // runtime 关闭时才会出现 对应槽位由 cycle 收尾
                Err(err) => {
                    warn!(error = %err, "provider task cancelled");
                    continue;
                }
            };
            let name = self.providers[index].provider.name();
            let result = match outcome {
                Ok(outcome) => self.resolve(name, outcome),
                Err(panic) => {
                    warn!(provider = name, %panic, "provider panicked");
                    ProviderResult::Failure(
                        self.messages
                            .failure_for(name, &format!("task failed: {panic}")),
                    )
                }
            };
            self.state
                .send_modify(|state| state.results[index].result = result);
        }

        let results = cycle.close();
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dispatch completed"
        );
        DispatchOutcome::Completed(results)
    }

    fn resolve(&self, provider: &str, outcome: Result<String, AskError>) -> ProviderResult {
        match outcome {
            Ok(text) => ProviderResult::Success(text),
            Err(AskError::EmptyResponse) => {
                debug!(provider, "provider returned no answer");
                ProviderResult::Success(self.messages.no_answer_for(provider))
            }
            Err(err) => {
                warn!(provider, error = %err, "provider call failed");
                ProviderResult::Failure(self.messages.failure_for(provider, &err.to_string()))
            }
        }
    }
}

async fn call_provider(
    provider: &dyn AnswerProvider,
    question: &str,
    timeout: Option<Duration>,
) -> Result<String, AskError> {
    let call = provider.ask(question);
    let response = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| AskError::Timeout)??,
        None => call.await?,
    };
    response.into_answer()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

/// Ends a cycle even when the dispatch future is dropped halfway.
///
/// Slots that are still pending at that point resolve as failures so no slot stays
/// `Pending` once `busy` is cleared.
struct CycleGuard<'a> {
    aggregator: &'a AnswerAggregator,
    closed: bool,
}

impl CycleGuard<'_> {
    fn close(&mut self) -> Vec<ProviderSlot> {
        self.closed = true;
        let messages = &self.aggregator.messages;
        let mut results = Vec::new();
        self.aggregator.state.send_modify(|state| {
            for slot in &mut state.results {
                if !slot.result.is_terminal() {
                    slot.result = ProviderResult::Failure(
                        messages.failure_for(&slot.provider, "dispatch cancelled"),
                    );
                }
            }
            state.busy = false;
            results = state.results.clone();
        });
        results
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("dispatch dropped before completion");
            self.close();
        }
    }
}

/// 负责注册 Provider 的 Builder
pub struct AnswerAggregatorBuilder {
    providers: Vec<(DynProvider, Option<Duration>)>,
    messages: MessageTemplates,
    default_timeout: Option<Duration>,
}

impl AnswerAggregatorBuilder {
    /// 注册一个 Provider 使用默认超时
    pub fn register(mut self, provider: DynProvider) -> Self {
        self.providers.push((provider, None));
        self
    }

    /// 注册一个 Provider 并单独指定超时
    pub fn register_with_timeout(mut self, provider: DynProvider, timeout: Duration) -> Self {
        self.providers.push((provider, Some(timeout)));
        self
    }

    /// 替换提示语模板
    pub fn messages(mut self, messages: MessageTemplates) -> Self {
        self.messages = messages;
        self
    }

    /// 未单独指定超时的 Provider 使用该值
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// 构建最终的 AnswerAggregator
    ///
    /// # Errors
    ///
    /// Returns [`AskError::InvalidConfig`] when two providers share a name, since slots
    /// are looked up by name.
    pub fn build(self) -> Result<AnswerAggregator, AskError> {
        let mut seen = HashSet::new();
        for (provider, _) in &self.providers {
            if !seen.insert(provider.name()) {
                return Err(AskError::invalid_config(
                    "providers",
                    format!("duplicate provider name {}", provider.name()),
                ));
            }
        }

        let default_timeout = self.default_timeout;
        let providers: Vec<Registered> = self
            .providers
            .into_iter()
            .map(|(provider, timeout)| Registered {
                provider,
                timeout: timeout.or(default_timeout),
            })
            .collect();
        let results = providers
            .iter()
            .map(|entry| ProviderSlot {
                provider: entry.provider.name().to_string(),
                result: ProviderResult::Pending,
            })
            .collect();
        let (state, _) = watch::channel(AnswerSnapshot {
            question: String::new(),
            busy: false,
            results,
        });
        Ok(AnswerAggregator {
            providers,
            messages: self.messages,
            state,
        })
    }
}
