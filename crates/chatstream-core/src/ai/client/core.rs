//! Core client: configuration, request building, error responses

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::ai::types::ChatRequest;
use crate::config::ClientConfig;
use crate::error::{StreamError, ValidationError, NO_BODY};

/// Path appended to the API base
const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// Attribution headers
const REFERER_HEADER: &str = "HTTP-Referer";
const TITLE_HEADER: &str = "X-Title";

/// Streaming chat-completion client
///
/// Cheap to clone; all clones share one connection pool and configuration.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl ChatClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_http_client(reqwest::Client::new(), config)
    }

    /// Use a preconfigured reqwest client (proxies, TLS roots, ...)
    pub fn with_http_client(http: reqwest::Client, config: ClientConfig) -> Self {
        Self {
            http,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Model used for this request
    pub(crate) fn resolve_model<'a>(&'a self, request: &'a ChatRequest) -> &'a str {
        request.model.as_deref().unwrap_or(&self.config.model)
    }

    /// `{base}/chat/completions`, with trailing slashes on the base trimmed
    pub(crate) fn endpoint(&self, request: &ChatRequest) -> Result<Url, ValidationError> {
        let base = request
            .base_url
            .as_deref()
            .unwrap_or(&self.config.base_url);
        let raw = format!("{}{}", base.trim_end_matches('/'), CHAT_COMPLETIONS_PATH);
        Url::parse(&raw).map_err(|e| ValidationError::InvalidEndpoint {
            url: raw.clone(),
            reason: e.to_string(),
        })
    }

    /// JSON body: standard fields, set sampling parameters only, then `extra`.
    ///
    /// An `extra` entry whose value is null removes that field.
    pub(crate) fn build_body(&self, request: &ChatRequest) -> Value {
        let mut body = serde_json::json!({
            "messages": request.messages,
            "model": self.resolve_model(request),
            "stream": true,
        });

        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(top_p) = request.top_p {
            body["top_p"] = serde_json::json!(top_p);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(stop) = &request.stop {
            body["stop"] = serde_json::json!(stop);
        }

        if let Some(map) = body.as_object_mut() {
            for (key, value) in &request.extra {
                if value.is_null() {
                    map.remove(key);
                } else {
                    map.insert(key.clone(), value.clone());
                }
            }
        }

        body
    }

    /// Validate the request and build the outbound HTTP request.
    ///
    /// Performs no I/O.
    pub(crate) fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<RequestBuilder, ValidationError> {
        request.validate()?;
        let url = self.endpoint(request)?;
        let body = self.build_body(request);
        debug!("Chat request to {} ({} messages)", url, request.messages.len());

        let mut authorization =
            header_value("authorization", &format!("Bearer {}", request.api_key))?;
        authorization.set_sensitive(true);

        let mut builder = self
            .http
            .post(url)
            .header(AUTHORIZATION, authorization)
            .json(&body);

        let site_url = request.site_url.as_ref().or(self.config.site_url.as_ref());
        if let Some(site_url) = site_url {
            builder = builder.header(REFERER_HEADER, header_value(REFERER_HEADER, site_url)?);
        }
        let app_name = request.app_name.as_ref().or(self.config.app_name.as_ref());
        if let Some(app_name) = app_name {
            builder = builder.header(TITLE_HEADER, header_value(TITLE_HEADER, app_name)?);
        }

        Ok(builder)
    }
}

/// Header values are checked here so bad ones fail before any I/O
fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, ValidationError> {
    HeaderValue::from_str(value).map_err(|e| ValidationError::InvalidHeader {
        name,
        reason: e.to_string(),
    })
}

/// Pass a streamable response through, or turn it into `StreamError::Http`.
///
/// A success status without a body (204, 205, `Content-Length: 0`) is an error too.
pub(crate) async fn handle_error_response(response: Response) -> Result<Response, StreamError> {
    let status = response.status();
    let bodyless = matches!(status, StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT)
        || response.content_length() == Some(0);

    if status.is_success() && !bodyless {
        return Ok(response);
    }

    let body = read_body_text(response).await;
    warn!("Chat stream request failed ({}): {}", status.as_u16(), body);
    Err(StreamError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Best-effort body text; never fails
async fn read_body_text(response: Response) -> String {
    match response.text().await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => NO_BODY.to_string(),
        Err(e) => {
            debug!("Failed to read error body: {}", e);
            NO_BODY.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::{ChatMessage, StopSequences};

    fn client() -> ChatClient {
        ChatClient::new(ClientConfig::default())
    }

    fn request() -> ChatRequest {
        ChatRequest::new(vec![ChatMessage::user("hi")], "sk-test")
    }

    #[test]
    fn test_body_omits_unset_fields() {
        let body = client().build_body(&request());
        assert_eq!(
            body,
            serde_json::json!({
                "messages": [{"role": "user", "content": "hi"}],
                "model": crate::config::DEFAULT_MODEL,
                "stream": true,
            })
        );
    }

    #[test]
    fn test_body_includes_sampling_and_extra() {
        let req = request()
            .with_model("test/model")
            .with_temperature(0.5)
            .with_top_p(0.25)
            .with_max_tokens(64)
            .with_stop(StopSequences::Many(vec!["END".to_string()]))
            .with_extra("seed", serde_json::json!(7))
            .with_extra("top_p", Value::Null);

        let body = client().build_body(&req);
        assert_eq!(body["model"], "test/model");
        assert_eq!(body["temperature"], 0.5);
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["stop"], serde_json::json!(["END"]));
        assert_eq!(body["seed"], 7);
        assert_eq!(body["stream"], true);
        assert!(body.get("top_p").is_none());
    }

    #[test]
    fn test_endpoint_trims_trailing_slashes() {
        let req = request().with_base_url("https://example.test/api/v1//");
        let url = client().endpoint(&req).unwrap();
        assert_eq!(url.as_str(), "https://example.test/api/v1/chat/completions");

        let default = client().endpoint(&request()).unwrap();
        assert_eq!(
            default.as_str(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let req = request().with_base_url("not a url");
        assert!(matches!(
            client().build_request(&req),
            Err(ValidationError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_build_request_headers() {
        let config = ClientConfig {
            site_url: Some("http://localhost:4321".to_string()),
            ..ClientConfig::default()
        };
        let req = request().with_app_name("Web98");
        let built = ChatClient::new(config)
            .build_request(&req)
            .unwrap()
            .build()
            .unwrap();

        let headers = built.headers();
        assert_eq!(headers["authorization"], "Bearer sk-test");
        assert_eq!(headers["content-type"], "application/json");
        assert_eq!(headers["http-referer"], "http://localhost:4321");
        assert_eq!(headers["x-title"], "Web98");
        assert_eq!(built.method(), reqwest::Method::POST);
    }

    #[test]
    fn test_invalid_header_values_rejected_before_io() {
        let bad_key = ChatRequest::new(vec![ChatMessage::user("hi")], "sk-test\nInjected: 1");
        assert!(matches!(
            client().build_request(&bad_key),
            Err(ValidationError::InvalidHeader {
                name: "authorization",
                ..
            })
        ));

        let bad_title = request().with_app_name("Web98\r\n");
        assert!(matches!(
            client().build_request(&bad_title),
            Err(ValidationError::InvalidHeader {
                name: TITLE_HEADER,
                ..
            })
        ));

        let config = ClientConfig {
            site_url: Some("http://localhost\n".to_string()),
            ..ClientConfig::default()
        };
        assert!(matches!(
            ChatClient::new(config).build_request(&request()),
            Err(ValidationError::InvalidHeader {
                name: REFERER_HEADER,
                ..
            })
        ));
    }

    #[test]
    fn test_build_request_validates_first() {
        let empty = ChatRequest::new(vec![], "sk-test");
        assert_eq!(
            client().build_request(&empty).err(),
            Some(ValidationError::EmptyMessages)
        );
    }
}
