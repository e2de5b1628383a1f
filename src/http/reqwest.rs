use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::trace;

use crate::error::AskError;

use super::{DynHttpTransport, HttpRequest, HttpResponse, HttpTransport};

/// 基于 reqwest 的默认 HttpTransport
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// 复用调用方已有的 reqwest::Client 例如自定义代理或证书
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// 默认配置的 Client
    pub fn default_client() -> Result<Self, AskError> {
        Client::builder()
            .build()
            .map(Self::new)
            .map_err(|err| AskError::transport(format!("failed to create reqwest client: {err}")))
    }

    fn build_request(&self, request: HttpRequest) -> Result<reqwest::RequestBuilder, AskError> {
        let headers = to_header_map(request.headers)?;
        let mut builder = self
            .client
            .post(&request.url)
            .headers(headers)
            .body(request.body);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder)
    }
}

fn to_header_map(headers: HashMap<String, String>) -> Result<HeaderMap, AskError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|err| AskError::transport(format!("invalid header name {name:?}: {err}")))?;
        let header_value = HeaderValue::from_str(&value)
            .map_err(|err| AskError::transport(format!("invalid value for header {name}: {err}")))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

fn from_header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

// 超时单独归类 其余都算 Transport
fn map_reqwest_error(err: reqwest::Error) -> AskError {
    if err.is_timeout() {
        AskError::Timeout
    } else {
        AskError::transport(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AskError> {
        trace!(url = %request.url, bytes = request.body.len(), "http post");
        let response = self
            .build_request(request)?
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers = from_header_map(response.headers());
        let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// 便捷构造线程安全 Transport
pub fn default_dyn_transport() -> Result<DynHttpTransport, AskError> {
    Ok(Arc::new(ReqwestTransport::default_client()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_header_name_is_rejected_before_sending() {
        let transport = ReqwestTransport::default_client().expect("transport");
        let request = HttpRequest::json("https://example.com", Vec::new())
            .with_header("bad header", "x");

        match transport.build_request(request) {
            Err(AskError::Transport { message }) => {
                assert!(message.contains("invalid header name"), "{message}");
            }
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("expected invalid header error"),
        }
    }

    #[test]
    fn non_ascii_response_headers_are_skipped() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static("req-1"));
        headers.insert("x-odd", HeaderValue::from_bytes(b"\xff").expect("opaque value"));

        let map = from_header_map(&headers);
        assert_eq!(map.get("x-request-id").map(String::as_str), Some("req-1"));
        assert!(!map.contains_key("x-odd"));
    }

    #[tokio::test]
    async fn unreachable_host_maps_to_transport_error() {
        let transport = ReqwestTransport::default_client().expect("transport");
        let request = HttpRequest::json("http://127.0.0.1:9/unreachable", b"{}".to_vec());
        let err = transport.send(request).await.expect_err("connection must fail");
        assert!(matches!(err, AskError::Transport { .. } | AskError::Timeout));
    }
}
