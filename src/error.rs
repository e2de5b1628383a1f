use thiserror::Error;

/// Aggregates every failure mode a provider call or the configuration layer can produce.
///
/// Provider errors never escape [`crate::aggregator::AnswerAggregator::dispatch`]; they
/// are rendered into a provider-labeled `Failure` message instead. Configuration errors
/// surface earlier, from the config loaders and [`crate::config::build_aggregator`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AskError {
    /// Represents transport-layer or networking failures.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// The provider answered with a non-2xx status code.
    #[error("HTTP {status}: {message}")]
    HttpStatus {
        /// Status code returned by the upstream endpoint.
        status: u16,
        /// Error message extracted from the body, or the raw body when it is not JSON.
        message: String,
    },
    /// The response body could not be decoded into the expected shape.
    #[error("decode error: {message}")]
    Decode { message: String },
    /// A well-formed response that carried no completions at all.
    #[error("empty response")]
    EmptyResponse,
    /// The call did not resolve within the configured timeout.
    #[error("timeout")]
    Timeout,
    /// Reports invalid or missing credentials.
    #[error("auth failure: {message}")]
    Auth { message: String },
    /// Signals validation failures in the request payload.
    #[error("invalid request: {message}")]
    Validation { message: String },
    /// Raised when building or validating configuration fails.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig {
        /// Name of the configuration field that failed validation.
        field: String,
        /// Additional context explaining why the field is invalid.
        reason: String,
    },
}

impl AskError {
    /// Creates an [`AskError::Transport`] from a textual description.
    ///
    /// # Examples
    ///
    /// ```
    /// use kotoba_ask::error::AskError;
    ///
    /// let err = AskError::transport("dns lookup failed");
    /// assert_eq!(err.to_string(), "transport error: dns lookup failed");
    /// ```
    pub fn transport<T: Into<String>>(message: T) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates an [`AskError::Decode`] from a textual description.
    pub fn decode<T: Into<String>>(message: T) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an [`AskError::HttpStatus`] for the given status and message.
    ///
    /// # Examples
    ///
    /// ```
    /// use kotoba_ask::error::AskError;
    ///
    /// let err = AskError::http_status(503, "overloaded");
    /// assert_eq!(err.to_string(), "HTTP 503: overloaded");
    /// ```
    pub fn http_status<T: Into<String>>(status: u16, message: T) -> Self {
        Self::HttpStatus {
            status,
            message: message.into(),
        }
    }

    /// Creates an [`AskError::InvalidConfig`] for the named field.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Turns a non-2xx response body into an [`AskError::HttpStatus`].
///
/// Both OpenAI-compatible endpoints and Google wrap failures as
/// `{"error": {"message": ..., "code"/"status": ...}}`; the message (plus the code hint
/// when present) is kept, otherwise the trimmed raw body is used.
pub(crate) fn parse_error_body(status: u16, body: &str) -> AskError {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: Option<InnerError>,
    }
    #[derive(serde::Deserialize)]
    struct InnerError {
        message: Option<String>,
        code: Option<serde_json::Value>,
        status: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(error) = parsed.error {
            let mut message = error.message.unwrap_or_else(|| "unknown error".to_string());
            if let Some(hint) = error.status.filter(|s| !s.is_empty()) {
                message = format!("{message} ({hint})");
            } else if let Some(code) = error.code.filter(|c| !c.is_null()) {
                message = format!("{message} ({code})");
            }
            return AskError::http_status(status, message);
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        AskError::http_status(status, "empty body")
    } else {
        AskError::http_status(status, trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_openai_style_error_keeps_code() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        let err = parse_error_body(401, body);
        assert_eq!(
            err,
            AskError::http_status(401, "Incorrect API key provided (\"invalid_api_key\")")
        );
    }

    #[test]
    fn parse_google_style_error_prefers_status_hint() {
        let body = r#"{
  "error": {
    "code": 429,
    "message": "quota exhausted",
    "status": "RESOURCE_EXHAUSTED"
  }
}"#;
        let err = parse_error_body(429, body);
        assert_eq!(
            err.to_string(),
            "HTTP 429: quota exhausted (RESOURCE_EXHAUSTED)"
        );
    }

    #[test]
    fn parse_non_json_falls_back_to_raw_body() {
        let err = parse_error_body(502, "  bad gateway \n");
        assert_eq!(err, AskError::http_status(502, "bad gateway"));

        let err = parse_error_body(500, "");
        assert_eq!(err, AskError::http_status(500, "empty body"));
    }

    #[test]
    fn timeout_displays_bare_word() {
        assert_eq!(AskError::Timeout.to_string(), "timeout");
    }
}
