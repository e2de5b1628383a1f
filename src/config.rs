//! Declarative provider configuration.
//!
//! An [`AggregatorConfig`] can be written in TOML or built in code, then turned into a
//! ready [`AnswerAggregator`] with [`build_aggregator`]. Secrets are never stored in the
//! crate: each credential is either a literal or the name of an environment variable.
//!
//! ```toml
//! default_timeout_secs = 60
//!
//! [messages]
//! no_answer = "No answer received from {provider}."
//! failure = "Error calling {provider}: {error}"
//!
//! [[providers]]
//! name = "ChatGPT"
//! kind = "openai_chat"
//! model = "gpt-3.5-turbo"
//! credential = { type = "bearer", token = { env = "API_KEY_CHATGPT" } }
//!
//! [[providers]]
//! name = "Gemini"
//! kind = "google_gemini"
//! model = "gemini-1.5-pro"
//! credential = { type = "api_key", key = { env = "API_KEY_GEMINI" } }
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregator::AnswerAggregator;
use crate::error::AskError;
use crate::http::DynHttpTransport;
use crate::provider::azure_openai::{AzureOpenAiProvider, DEFAULT_API_VERSION, DEFAULT_KEY_HEADER};
use crate::provider::google_gemini::{
    DEFAULT_KEY_HEADER as GEMINI_KEY_HEADER, GenerativeModel, GoogleGeminiProvider,
};
use crate::provider::openai_chat::OpenAiChatProvider;
use crate::provider::{AuthScheme, DynProvider};

/// 聚合器整体配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// 未单独指定超时的 Provider 使用该值 留空则不设超时
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,
    #[serde(default)]
    pub messages: MessageTemplates,
    /// 按顺序注册的 Provider
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

/// 单个 Provider 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// 展示名称 例如 `ChatGPT` 同时用作结果槽位的标识
    pub name: String,
    pub kind: ProviderKind,
    /// 留空时使用 Provider 默认模型 Azure 不需要
    #[serde(default)]
    pub model: Option<String>,
    /// Azure api-version
    #[serde(default)]
    pub api_version: Option<String>,
    /// OpenAI 组织 ID
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub base_url: Option<SecretSource>,
    /// Azure 部署名
    #[serde(default)]
    pub deployment: Option<SecretSource>,
    pub credential: Credential,
}

/// 供应商类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI 以及兼容 `/v1/chat/completions` 的服务 例如 DeepSeek
    #[serde(rename = "openai_chat")]
    OpenAiChat,
    #[serde(rename = "azure_openai")]
    AzureOpenAi,
    GoogleGemini,
}

impl ProviderKind {
    fn label(self) -> &'static str {
        match self {
            Self::OpenAiChat => "openai_chat",
            Self::AzureOpenAi => "azure_openai",
            Self::GoogleGemini => "google_gemini",
        }
    }
}

/// 鉴权信息
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// Bearer Token
    Bearer { token: SecretSource },
    /// 简单 API Key
    ApiKey {
        /// header 名称 留空时按 provider 默认
        #[serde(default)]
        header: Option<String>,
        key: SecretSource,
    },
    /// 无需鉴权的本地 provider
    None,
}

/// 字面量或环境变量引用
///
/// In TOML either `"literal"` or `{ env = "VAR_NAME" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecretSource {
    Env { env: String },
    Literal(String),
}

impl SecretSource {
    pub fn env(name: impl Into<String>) -> Self {
        Self::Env { env: name.into() }
    }

    /// Resolves the value, reading the process environment when needed.
    ///
    /// # Errors
    ///
    /// Returns [`AskError::Auth`] when the variable is unset or blank.
    pub fn resolve(&self) -> Result<String, AskError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Env { env } => std::env::var(env)
                .ok()
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AskError::Auth {
                    message: format!("environment variable {env} is not set"),
                }),
        }
    }
}

/// User-facing messages written into result slots.
///
/// `{provider}` is replaced by the provider name, `{error}` by the error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplates {
    #[serde(default = "default_no_answer")]
    pub no_answer: String,
    #[serde(default = "default_failure")]
    pub failure: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            no_answer: default_no_answer(),
            failure: default_failure(),
        }
    }
}

fn default_no_answer() -> String {
    "No answer received from {provider}.".to_string()
}

fn default_failure() -> String {
    "Error calling {provider}: {error}".to_string()
}

impl MessageTemplates {
    pub fn no_answer_for(&self, provider: &str) -> String {
        render(&self.no_answer, provider, None)
    }

    pub fn failure_for(&self, provider: &str, error: &str) -> String {
        render(&self.failure, provider, Some(error))
    }
}

// 单次扫描替换 已代入的文本不会再被当作占位符
fn render(template: &str, provider: &str, error: Option<&str>) -> String {
    let mut out = String::with_capacity(template.len() + provider.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{provider}") {
            out.push_str(provider);
            rest = after;
        } else if let Some((error, after)) =
            error.and_then(|error| tail.strip_prefix("{error}").map(|after| (error, after)))
        {
            out.push_str(error);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

impl AggregatorConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`AskError::InvalidConfig`] when the document is not valid TOML or does not
    /// match the schema.
    pub fn from_toml_str(text: &str) -> Result<Self, AskError> {
        toml::from_str(text).map_err(|err| AskError::invalid_config("toml", err.to_string()))
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AskError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            AskError::invalid_config(path.display().to_string(), format!("cannot read file: {err}"))
        })?;
        Self::from_toml_str(&text)
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String, AskError> {
        toml::to_string_pretty(self).map_err(|err| AskError::invalid_config("toml", err.to_string()))
    }

    /// ChatGPT, Gemini, Azure OpenAI (shown as Bing) and DeepSeek, with keys read from
    /// `API_KEY_CHATGPT`, `API_KEY_GEMINI`, `API_KEY_BING` and `API_KEY_DEEPSEEK`.
    ///
    /// The Azure resource comes from `AZURE_OPENAI_ENDPOINT` and
    /// `AZURE_OPENAI_DEPLOYMENT`.
    pub fn preset() -> Self {
        Self {
            providers: vec![
                ProviderConfig {
                    name: "ChatGPT".to_string(),
                    kind: ProviderKind::OpenAiChat,
                    credential: Credential::Bearer {
                        token: SecretSource::env("API_KEY_CHATGPT"),
                    },
                    model: Some("gpt-3.5-turbo".to_string()),
                    base_url: None,
                    deployment: None,
                    api_version: None,
                    organization: None,
                    timeout_secs: None,
                },
                ProviderConfig {
                    name: "Gemini".to_string(),
                    kind: ProviderKind::GoogleGemini,
                    credential: Credential::ApiKey {
                        header: None,
                        key: SecretSource::env("API_KEY_GEMINI"),
                    },
                    model: Some("gemini-1.5-pro".to_string()),
                    base_url: None,
                    deployment: None,
                    api_version: None,
                    organization: None,
                    timeout_secs: None,
                },
                ProviderConfig {
                    name: "Bing".to_string(),
                    kind: ProviderKind::AzureOpenAi,
                    credential: Credential::ApiKey {
                        header: None,
                        key: SecretSource::env("API_KEY_BING"),
                    },
                    model: None,
                    base_url: Some(SecretSource::env("AZURE_OPENAI_ENDPOINT")),
                    deployment: Some(SecretSource::env("AZURE_OPENAI_DEPLOYMENT")),
                    api_version: Some(DEFAULT_API_VERSION.to_string()),
                    organization: None,
                    timeout_secs: None,
                },
                ProviderConfig {
                    name: "DeepSeek".to_string(),
                    kind: ProviderKind::OpenAiChat,
                    credential: Credential::Bearer {
                        token: SecretSource::env("API_KEY_DEEPSEEK"),
                    },
                    model: Some("deepseek-chat".to_string()),
                    base_url: Some(SecretSource::Literal("https://api.deepseek.com".to_string())),
                    deployment: None,
                    api_version: None,
                    organization: None,
                    timeout_secs: None,
                },
            ],
            messages: MessageTemplates::default(),
            default_timeout_secs: Some(60),
        }
    }

    /// Checks the structural rules that do not need secrets.
    ///
    /// # Errors
    ///
    /// Returns [`AskError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), AskError> {
        if self.providers.is_empty() {
            return Err(AskError::invalid_config(
                "providers",
                "at least one provider is required",
            ));
        }
        let mut seen = HashSet::new();
        for (index, provider) in self.providers.iter().enumerate() {
            if provider.name.trim().is_empty() {
                return Err(AskError::invalid_config(
                    format!("providers[{index}].name"),
                    "must not be empty",
                ));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(AskError::invalid_config(
                    format!("providers[{index}].name"),
                    format!("duplicate provider name {}", provider.name),
                ));
            }
            if provider.timeout_secs == Some(0) {
                return Err(AskError::invalid_config(
                    format!("providers[{index}].timeout_secs"),
                    "must be greater than zero",
                ));
            }
            if provider.kind == ProviderKind::AzureOpenAi {
                if provider.base_url.is_none() {
                    return Err(AskError::invalid_config(
                        format!("providers[{index}].base_url"),
                        "azure_openai requires the resource endpoint",
                    ));
                }
                if provider.deployment.is_none() {
                    return Err(AskError::invalid_config(
                        format!("providers[{index}].deployment"),
                        "azure_openai requires a deployment name",
                    ));
                }
            }
        }
        if self.default_timeout_secs == Some(0) {
            return Err(AskError::invalid_config(
                "default_timeout_secs",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// 根据配置构建 AnswerAggregator
///
/// # Errors
///
/// Returns [`AskError::InvalidConfig`] for structural problems and [`AskError::Auth`] when
/// a credential cannot be resolved.
pub fn build_aggregator(
    config: &AggregatorConfig,
    transport: DynHttpTransport,
) -> Result<AnswerAggregator, AskError> {
    config.validate()?;

    let mut builder = AnswerAggregator::builder().messages(config.messages.clone());
    if let Some(secs) = config.default_timeout_secs {
        builder = builder.default_timeout(Duration::from_secs(secs));
    }

    for provider_config in &config.providers {
        let timeout = provider_config
            .timeout_secs
            .or(config.default_timeout_secs)
            .map(Duration::from_secs);
        let provider = build_provider_from_config(provider_config, transport.clone(), timeout)?;
        debug!(provider = %provider_config.name, kind = provider_config.kind.label(), "provider registered");
        builder = match provider_config.timeout_secs {
            Some(secs) => builder.register_with_timeout(provider, Duration::from_secs(secs)),
            None => builder.register(provider),
        };
    }

    builder.build()
}

fn build_provider_from_config(
    config: &ProviderConfig,
    transport: DynHttpTransport,
    timeout: Option<Duration>,
) -> Result<DynProvider, AskError> {
    let provider: DynProvider = match config.kind {
        ProviderKind::OpenAiChat => {
            let auth = resolve_auth(&config.credential, "Authorization")?;
            let mut provider = OpenAiChatProvider::new(transport, String::new())
                .with_auth(auth)
                .with_name(config.name.clone())
                .with_timeout(timeout);

            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.resolve()?);
            }
            if let Some(model) = &config.model {
                provider = provider.with_model(model.clone());
            }
            if let Some(org) = &config.organization {
                provider = provider.with_organization(org.clone());
            }

            Arc::new(provider)
        }
        ProviderKind::AzureOpenAi => {
            let auth = resolve_auth(&config.credential, DEFAULT_KEY_HEADER)?;
            let endpoint = required(&config.base_url, "base_url")?.resolve()?;
            let deployment = required(&config.deployment, "deployment")?.resolve()?;
            let mut provider = AzureOpenAiProvider::new(transport, endpoint, deployment, String::new())
                .with_auth(auth)
                .with_name(config.name.clone())
                .with_timeout(timeout);

            if let Some(version) = &config.api_version {
                provider = provider.with_api_version(version.clone());
            }

            Arc::new(provider)
        }
        ProviderKind::GoogleGemini => {
            if matches!(config.credential, Credential::None) {
                return Err(AskError::Auth {
                    message: format!("provider {} requires credential", config.name),
                });
            }
            let auth = resolve_auth(&config.credential, GEMINI_KEY_HEADER)?;
            let model_name = config
                .model
                .clone()
                .unwrap_or_else(|| "gemini-1.5-pro".to_string());
            let mut model = GenerativeModel::new(transport, model_name, String::new())
                .with_auth(auth)
                .with_timeout(timeout);

            if let Some(base_url) = &config.base_url {
                model = model.with_base_url(base_url.resolve()?);
            }

            Arc::new(GoogleGeminiProvider::new(model).with_name(config.name.clone()))
        }
    };

    Ok(provider)
}

fn resolve_auth(credential: &Credential, default_header: &str) -> Result<AuthScheme, AskError> {
    match credential {
        Credential::Bearer { token } => Ok(AuthScheme::Bearer(token.resolve()?)),
        Credential::ApiKey { header, key } => {
            let value = key.resolve()?;
            let name = header
                .clone()
                .unwrap_or_else(|| default_header.to_string());
            if name.eq_ignore_ascii_case("authorization") {
                Ok(AuthScheme::Bearer(value))
            } else {
                Ok(AuthScheme::Header { name, value })
            }
        }
        Credential::None => Ok(AuthScheme::None),
    }
}

fn required<'a>(value: &'a Option<SecretSource>, field: &str) -> Result<&'a SecretSource, AskError> {
    value
        .as_ref()
        .ok_or_else(|| AskError::invalid_config(field, "missing"))
}
