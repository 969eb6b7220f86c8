//! Read-only view over the configured AI providers.
//!
//! Provider records live in an external store (the app database, a JSON
//! catalog on disk). [`ProviderSource`] is the seam to that store; the
//! registry only filters and orders what it returns.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::provider::{ProviderConfig, ProviderKind};

/// Where provider records come from
pub trait ProviderSource: Send + Sync {
    /// Returns every configured provider, active or not
    fn find_many(&self) -> Result<Vec<ProviderConfig>>;
}

/// An in-memory provider catalog, validated when built
#[derive(Debug, Clone, Default)]
pub struct CatalogSource {
    providers: Vec<ProviderConfig>,
}

impl CatalogSource {
    /// Builds a catalog, rejecting invalid records and duplicate ids
    pub fn new(providers: Vec<ProviderConfig>) -> Result<Self> {
        for (i, provider) in providers.iter().enumerate() {
            provider.validate()?;
            if providers[..i].iter().any(|p| p.id == provider.id) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate provider id {}",
                    provider.id
                )));
            }
        }
        Ok(Self { providers })
    }

    /// Loads a JSON array of provider records
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading provider catalog");
        let raw = std::fs::read_to_string(path)?;
        let providers: Vec<ProviderConfig> = serde_json::from_str(&raw)?;
        Self::new(providers)
    }

    /// The providers the HR app ships with
    pub fn builtin() -> Self {
        Self {
            providers: builtin_providers(),
        }
    }
}

impl ProviderSource for CatalogSource {
    fn find_many(&self) -> Result<Vec<ProviderConfig>> {
        Ok(self.providers.clone())
    }
}

fn builtin_providers() -> Vec<ProviderConfig> {
    let entry = |id: &str, name: &str, kind, base_url: &str, models: &[&str]| ProviderConfig {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        base_url: base_url.to_string(),
        models: models.iter().map(|m| m.to_string()).collect(),
        default_model: models[0].to_string(),
        encrypted_api_key: None,
        active: true,
        requires_api_key: true,
    };

    vec![
        entry(
            "openai",
            "OpenAI",
            ProviderKind::OpenAi,
            "https://api.openai.com/v1",
            &["gpt-4o-mini", "gpt-4o", "o3-mini"],
        ),
        entry(
            "anthropic",
            "Anthropic",
            ProviderKind::Anthropic,
            "https://api.anthropic.com/v1",
            &["claude-3-5-haiku-latest", "claude-3-5-sonnet-latest"],
        ),
        entry(
            "mistral",
            "Mistral",
            ProviderKind::Mistral,
            "https://api.mistral.ai/v1",
            &["mistral-small-latest", "mistral-large-latest"],
        ),
    ]
}

/// Filters and orders providers from a [`ProviderSource`]
pub struct ProviderRegistry<S: ProviderSource> {
    source: S,
}

impl<S: ProviderSource> ProviderRegistry<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Active providers, sorted by name ascending (case-insensitive)
    pub fn list_active_providers(&self) -> Result<Vec<ProviderConfig>> {
        let mut providers: Vec<ProviderConfig> = self
            .source
            .find_many()?
            .into_iter()
            .filter(|p| p.active)
            .collect();
        providers.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        debug!(count = providers.len(), "Listed active providers");
        Ok(providers)
    }

    /// Looks up one provider by id, active or not
    pub fn get_provider(&self, id: &str) -> Result<ProviderConfig> {
        self.source
            .find_many()?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| {
                warn!(provider = id, "Unknown provider");
                Error::provider_not_found(id)
            })
    }
}
