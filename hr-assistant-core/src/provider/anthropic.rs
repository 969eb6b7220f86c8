// curl https://api.anthropic.com/v1/messages \
//      --header "x-api-key: $ANTHROPIC_API_KEY" \
//      --header "anthropic-version: 2023-06-01" \
//      --header "content-type: application/json" \
//      --data \
// '{
//     "model": "claude-3-5-sonnet-latest",
//     "max_tokens": 1024,
//     "system": "You are an HR assistant.",
//     "messages": [{"role": "user", "content": "Who is on leave this week?"}]
// }'

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace};

use crate::error::{Error, Result};
use crate::message::Role;
use crate::provider::{DispatchRequest, HTTPProvider};

pub const API_VERSION: &str = "2023-06-01";

/// Adapter for the Anthropic messages API
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    api_version: String,
}

impl Default for AnthropicProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AnthropicProvider {
    #[instrument(level = "debug")]
    pub fn new() -> Self {
        Self::with_api_version(API_VERSION)
    }

    #[instrument(level = "debug")]
    pub fn with_api_version(version: &str) -> Self {
        debug!("Creating Anthropic adapter");
        Self {
            api_version: version.to_string(),
        }
    }

    fn create_request_payload(&self, request: &DispatchRequest) -> AnthropicRequest {
        // Anthropic takes the system prompt out of band; stray system
        // messages in the history are folded into it.
        let mut system_parts: Vec<String> = request
            .system_prompt
            .iter()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect();
        let mut messages = Vec::with_capacity(request.messages.len());

        for msg in &request.messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.clone()),
                Role::User | Role::Assistant => messages.push(AnthropicMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                }),
            }
        }

        AnthropicRequest {
            model: request.model.clone(),
            max_tokens: request.max_output_tokens,
            system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
            messages,
        }
    }
}

impl HTTPProvider for AnthropicProvider {
    fn accept(&self, request: &DispatchRequest) -> Result<Request> {
        info!(model = %request.model, provider = %request.provider_id, "Creating messages request");

        let url = request.endpoint("messages")?;
        let mut http_request = Request::new(Method::POST, url);

        let key = HeaderValue::from_str(request.key_str()).map_err(|e| {
            error!("Invalid API key format: {}", e);
            Error::Authentication("Invalid API key format".into())
        })?;
        let version = HeaderValue::from_str(&self.api_version)
            .map_err(|_| Error::InvalidConfig(format!("bad anthropic-version {}", self.api_version)))?;

        let headers = http_request.headers_mut();
        headers.insert("x-api-key", key);
        headers.insert("anthropic-version", version);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let payload = self.create_request_payload(request);
        let body_bytes = serde_json::to_vec(&payload)?;
        debug!("Payload serialized ({} bytes)", body_bytes.len());
        *http_request.body_mut() = Some(body_bytes.into());

        Ok(http_request)
    }

    fn parse(&self, raw_response_text: String) -> Result<String> {
        trace!("Raw response: {}", raw_response_text);

        if let Ok(AnthropicErrorResponse { error: Some(error) }) =
            serde_json::from_str::<AnthropicErrorResponse>(&raw_response_text)
        {
            error!("Provider returned an error: {}", error.message);
            return Err(match error.error_type.as_str() {
                "authentication_error" | "permission_error" => {
                    Error::Authentication(error.message)
                }
                _ => Error::ProviderUnavailable(error.message),
            });
        }

        let response: AnthropicResponse = serde_json::from_str(&raw_response_text)?;
        let reply: Vec<String> = response
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .collect();

        if reply.is_empty() {
            return Err(Error::ProviderUnavailable(
                "response contained no text".into(),
            ));
        }
        Ok(reply.join(""))
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorResponse {
    error: Option<AnthropicError>,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}
