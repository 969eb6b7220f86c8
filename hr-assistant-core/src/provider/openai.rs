use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Request};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace};

use crate::error::{Error, Result};
use crate::provider::{DispatchRequest, HTTPProvider};

/// Adapter for the OpenAI chat completions API.
///
/// Mistral and self-hosted OpenAI-compatible endpoints accept the same
/// request shape, so they share this adapter.
#[derive(Debug, Clone, Default)]
pub struct OpenAIProvider;

impl OpenAIProvider {
    #[instrument(level = "debug")]
    pub fn new() -> Self {
        debug!("Creating OpenAI-compatible adapter");
        Self
    }

    /// Builds the JSON payload for a dispatch request
    fn create_request_payload(&self, request: &DispatchRequest) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if let Some(prompt) = request.system_prompt.as_deref().filter(|p| !p.is_empty()) {
            debug!("Adding system prompt");
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: Some(prompt.to_string()),
            });
        }

        for msg in &request.messages {
            messages.push(OpenAIMessage {
                role: msg.role.as_str().to_string(),
                content: Some(msg.content.clone()),
            });
        }

        // O-series models take max_completion_tokens instead of max_tokens
        let mut chars = request.model.chars();
        let is_o_series = chars.next() == Some('o') && chars.next().is_some_and(|c| c.is_ascii_digit());

        OpenAIRequest {
            model: request.model.clone(),
            messages,
            max_tokens: (!is_o_series).then_some(request.max_output_tokens),
            max_completion_tokens: is_o_series.then_some(request.max_output_tokens),
        }
    }
}

impl HTTPProvider for OpenAIProvider {
    fn accept(&self, request: &DispatchRequest) -> Result<Request> {
        info!(model = %request.model, provider = %request.provider_id, "Creating chat completions request");
        debug!("Messages in request: {}", request.messages.len());

        let url = request.endpoint("chat/completions")?;
        let mut http_request = Request::new(Method::POST, url);

        if request.api_key.is_some() {
            let auth_header = match HeaderValue::from_str(&format!("Bearer {}", request.key_str())) {
                Ok(header) => header,
                Err(e) => {
                    error!("Invalid API key format: {}", e);
                    return Err(Error::Authentication("Invalid API key format".into()));
                }
            };
            http_request.headers_mut().insert(AUTHORIZATION, auth_header);
        }

        http_request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let payload = self.create_request_payload(request);
        let body_bytes = serde_json::to_vec(&payload)?;
        debug!("Payload serialized ({} bytes)", body_bytes.len());
        *http_request.body_mut() = Some(body_bytes.into());

        Ok(http_request)
    }

    fn parse(&self, raw_response_text: String) -> Result<String> {
        trace!("Raw response: {}", raw_response_text);

        if let Ok(error_response) = serde_json::from_str::<OpenAIErrorResponse>(&raw_response_text)
        {
            if let Some(error) = error_response.error {
                error!("Provider returned an error: {}", error.message);
                if error.code.as_deref() == Some("invalid_api_key") {
                    return Err(Error::Authentication(error.message));
                }
                return Err(Error::ProviderUnavailable(error.message));
            }
        }

        let response: OpenAIResponse = serde_json::from_str(&raw_response_text).map_err(|e| {
            error!("Failed to deserialize response: {}", e);
            Error::Serialization(e)
        })?;

        if let Some(usage) = &response.usage {
            debug!(
                prompt = usage.prompt_tokens,
                completion = usage.completion_tokens,
                "Token usage"
            );
        }

        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::ProviderUnavailable("response contained no reply".into()))?;

        info!("Response parsed successfully");
        Ok(reply)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct OpenAIMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAIRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAIResponse {
    pub choices: Vec<OpenAIChoice>,
    pub usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAIChoice {
    pub message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAIUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAIErrorResponse {
    pub error: Option<OpenAIError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAIError {
    pub message: String,
    pub code: Option<String>,
}
