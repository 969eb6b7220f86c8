use reqwest::Request;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::message::WireMessage;
use crate::secret::Secret;

pub mod anthropic;
pub mod openai;

/// The closed set of wire protocols a provider can speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "mistral")]
    Mistral,
    /// Any endpoint implementing the OpenAI chat completions API
    #[serde(rename = "openai-compatible")]
    OpenAiCompatible,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Mistral => "mistral",
            ProviderKind::OpenAiCompatible => "openai-compatible",
        }
    }
}

fn default_true() -> bool {
    true
}

/// A configured AI provider: endpoint, models, and an optional stored key.
///
/// `encrypted_api_key` only ever holds a `SecretCodec` token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub id: String,
    pub name: String,
    pub kind: ProviderKind,
    pub base_url: String,
    pub models: Vec<String>,
    pub default_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_api_key: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub requires_api_key: bool,
}

impl ProviderConfig {
    /// Checks the record before it is admitted into the registry
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidConfig("provider id is empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::InvalidConfig(format!(
                "provider {} has an empty name",
                self.id
            )));
        }
        Url::parse(&self.base_url)?;
        if self.models.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "provider {} lists no models",
                self.id
            )));
        }
        if !self.supports_model(&self.default_model) {
            return Err(Error::UnsupportedModel {
                provider: self.id.clone(),
                model: self.default_model.clone(),
            });
        }
        Ok(())
    }

    pub fn supports_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    pub fn has_api_key(&self) -> bool {
        self.encrypted_api_key.is_some()
    }
}

/// Everything a provider adapter needs to build one chat request
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub provider_id: String,
    pub kind: ProviderKind,
    pub base_url: String,
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<WireMessage>,
    pub max_output_tokens: usize,
    /// `None` for providers that do not take a key
    pub api_key: Option<Secret<String>>,
}

impl DispatchRequest {
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url.trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    pub(crate) fn key_str(&self) -> &str {
        self.api_key.as_ref().map(|k| k.inner().as_str()).unwrap_or("")
    }
}

/// An `HTTPProvider` can take a dispatch request and turn it into an http request.
pub trait HTTPProvider: Send + Sync {
    /// Converts a dispatch request into an HTTP request
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid, the key cannot be put in
    /// a header, or serialization fails.
    fn accept(&self, request: &DispatchRequest) -> Result<Request>;

    /// Parses a raw HTTP response body into the assistant's reply text
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for the provider or if
    /// it carries an error object.
    fn parse(&self, raw_response_text: String) -> Result<String>;
}

/// Returns the adapter for a provider kind
pub fn adapter_for(kind: ProviderKind) -> Box<dyn HTTPProvider> {
    match kind {
        ProviderKind::Anthropic => Box::new(anthropic::AnthropicProvider::new()),
        ProviderKind::OpenAi | ProviderKind::Mistral | ProviderKind::OpenAiCompatible => {
            Box::new(openai::OpenAIProvider::new())
        }
    }
}
