use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, error, info, trace};

use crate::error::{Error, Result};
use crate::provider::{DispatchRequest, adapter_for};

/// Anything that can turn a dispatch request into the assistant's reply.
///
/// The HTTP implementation talks to real providers; tests swap in
/// [`MockLlmService`].
#[async_trait]
pub trait LLMService: Send + Sync {
    /// Sends the request and returns the reply text
    async fn generate_reply(&self, request: &DispatchRequest) -> Result<String>;
}

/// An LLM service implementation that sends requests over HTTP.
///
/// The wire format is chosen per request from the provider's kind.
#[derive(Debug, Clone)]
pub struct HTTPLlmService {
    client: Client,
}

impl HTTPLlmService {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LLMService for HTTPLlmService {
    async fn generate_reply(&self, request: &DispatchRequest) -> Result<String> {
        let provider = adapter_for(request.kind);

        let http_request = match provider.accept(request) {
            Ok(req) => {
                debug!(
                    "Request created successfully: {} {}",
                    req.method(),
                    req.url()
                );
                req
            }
            Err(e) => {
                error!("Failed to create request: {}", e);
                return Err(e);
            }
        };

        debug!("Sending HTTP request");
        let response = match self.client.execute(http_request).await {
            Ok(resp) => {
                info!("Received response with status: {}", resp.status());
                resp
            }
            Err(e) => {
                error!("HTTP request failed: {}", e);
                return Err(e.into());
            }
        };

        let status = response.status();
        let response_text = match response.text().await {
            Ok(text) => {
                trace!("Response body: {}", text);
                text
            }
            Err(e) => {
                error!("Failed to read response body: {}", e);
                return Err(e.into());
            }
        };

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::Authentication(format!(
                "provider rejected the API key ({status})"
            )));
        }

        let parsed = provider.parse(response_text);
        if !status.is_success() {
            // prefer the provider's own error message when the body has one
            return Err(match parsed {
                Err(e) => e,
                Ok(_) => Error::ProviderUnavailable(format!("unexpected status {status}")),
            });
        }
        parsed
    }
}

/// A scripted LLM service for tests and offline demos.
///
/// Replies are served in order; once the script runs out every call fails
/// with a dispatch error. Every request is recorded.
#[derive(Debug, Default)]
pub struct MockLlmService {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<DispatchRequest>>,
}

impl MockLlmService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful reply
    #[must_use]
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.lock_script().push_back(Ok(text.into()));
        self
    }

    /// Queues a failure
    #[must_use]
    pub fn fail(self, reason: impl Into<String>) -> Self {
        self.lock_script().push_back(Err(reason.into()));
        self
    }

    /// Requests seen so far, oldest first
    pub fn requests(&self) -> Vec<DispatchRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<std::result::Result<String, String>>> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LLMService for MockLlmService {
    async fn generate_reply(&self, request: &DispatchRequest) -> Result<String> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());

        match self.lock_script().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(reason)) => Err(Error::Dispatch(reason)),
            None => Err(Error::Dispatch("no scripted reply left".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;

    fn request() -> DispatchRequest {
        DispatchRequest {
            provider_id: "openai".into(),
            kind: ProviderKind::OpenAi,
            base_url: "http://127.0.0.1:9".into(),
            model: "gpt-x".into(),
            system_prompt: None,
            messages: vec![],
            max_output_tokens: 16,
            api_key: None,
        }
    }

    #[tokio::test]
    async fn mock_serves_script_in_order() {
        let mock = MockLlmService::new().reply("one").fail("boom");
        assert_eq!(mock.generate_reply(&request()).await.unwrap(), "one");
        assert!(matches!(
            mock.generate_reply(&request()).await,
            Err(Error::Dispatch(reason)) if reason == "boom"
        ));
        assert!(mock.generate_reply(&request()).await.is_err());
        assert_eq!(mock.requests().len(), 3);
    }
}
