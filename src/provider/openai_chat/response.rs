use tracing::debug;

use crate::error::{AskError, parse_error_body};
use crate::http::HttpResponse;
use crate::provider::request_id_from_headers;
use crate::types::ProviderResponse;

use super::types::{ChatCompletionResponse, ChatMessageContent};

/// Checks the status, decodes the body and maps it to [`ProviderResponse::Choices`].
///
/// Shared by every endpoint that speaks the chat-completions wire format.
pub(crate) fn decode_chat_completion(
    provider: &str,
    response: HttpResponse,
) -> Result<ProviderResponse, AskError> {
    let status = response.status;
    let success = response.is_success();
    let request_id = request_id_from_headers(&response.headers).map(str::to_string);
    let text = response.into_string()?;
    debug!(provider, status, request_id = ?request_id, body = %text, "chat completion response");

    if !success {
        return Err(parse_error_body(status, &text));
    }

    let parsed: ChatCompletionResponse = serde_json::from_str(&text)
        .map_err(|err| AskError::decode(format!("failed to parse chat completion: {err}")))?;
    Ok(map_response(parsed))
}

pub(crate) fn map_response(resp: ChatCompletionResponse) -> ProviderResponse {
    if let Some(reason) = resp.choices.first().and_then(|c| c.finish_reason.as_deref()) {
        debug!(id = ?resp.id, model = ?resp.model, finish_reason = reason, "first choice finished");
    }
    let choices = resp
        .choices
        .into_iter()
        .map(|choice| {
            choice
                .message
                .and_then(|message| message.content)
                .map(content_text)
        })
        .collect();
    ProviderResponse::Choices(choices)
}

fn content_text(content: ChatMessageContent) -> String {
    match content {
        ChatMessageContent::Text(text) => text,
        // 多段内容只拼接 text 片段
        ChatMessageContent::Parts(parts) => parts
            .into_iter()
            .filter(|part| part.kind == "text")
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join(""),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn decodes_first_choice_text() {
        let body = r#"{
  "id": "chatcmpl-1",
  "object": "chat.completion",
  "model": "gpt-3.5-turbo",
  "choices": [
    {"index": 0, "message": {"role": "assistant", "content": "4"}, "finish_reason": "stop"},
    {"index": 1, "message": {"role": "assistant", "content": "four"}, "finish_reason": "stop"}
  ],
  "usage": {"prompt_tokens": 5, "completion_tokens": 1, "total_tokens": 6}
}"#;
        let mapped = decode_chat_completion("ChatGPT", response(200, body)).expect("decode");
        assert_eq!(
            mapped,
            ProviderResponse::Choices(vec![Some("4".to_string()), Some("four".to_string())])
        );
    }

    #[test]
    fn joins_text_parts_and_skips_other_parts() {
        let body = r#"{"choices":[{"message":{"content":[
            {"type":"text","text":"Hello, "},
            {"type":"image_url","image_url":{"url":"https://example.com/a.png"}},
            {"type":"text","text":"world"}
        ]}}]}"#;
        let mapped = decode_chat_completion("p", response(200, body)).expect("decode");
        assert_eq!(mapped.into_answer(), Ok("Hello, world".to_string()));
    }

    #[test]
    fn zero_choices_maps_to_empty_list() {
        let mapped =
            decode_chat_completion("p", response(200, r#"{"choices":[]}"#)).expect("decode");
        assert_eq!(mapped, ProviderResponse::Choices(Vec::new()));
    }

    #[test]
    fn missing_choices_field_is_decode_error() {
        let err = decode_chat_completion("p", response(200, r#"{"id":"x"}"#))
            .expect_err("choices is required");
        assert!(matches!(err, AskError::Decode { .. }), "{err:?}");
    }

    #[test]
    fn non_success_status_uses_error_envelope() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests","code":null}}"#;
        let err = decode_chat_completion("p", response(429, body)).expect_err("429");
        assert_eq!(err, AskError::http_status(429, "Rate limit reached"));
    }

    #[test]
    fn invalid_utf8_is_decode_error() {
        let resp = HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: vec![0xff, 0xfe],
        };
        let err = decode_chat_completion("p", resp).expect_err("utf8");
        assert!(matches!(err, AskError::Decode { .. }));
    }
}
