use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::registry::CatalogSource;
use crate::secret::{Secret, SecretCodec};

pub const ENCRYPTION_KEY_VAR: &str = "HR_ASSISTANT_ENCRYPTION_KEY";
pub const STATE_PATH_VAR: &str = "HR_ASSISTANT_STATE_PATH";
pub const PROVIDERS_VAR: &str = "HR_ASSISTANT_PROVIDERS";
pub const TIMEOUT_VAR: &str = "HR_ASSISTANT_TIMEOUT_SECS";
pub const USER_VAR: &str = "HR_ASSISTANT_USER";

const DEFAULT_STATE_PATH: &str = ".hr-assistant/state.json";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Assistant configuration, read from the environment
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Key for the API key codec
    pub encryption_key: Secret<String>,
    /// File backing the persistent chat state
    pub state_path: PathBuf,
    /// Optional JSON provider catalog; the built-in catalog otherwise
    pub providers_path: Option<PathBuf>,
    /// Timeout for provider HTTP calls
    pub request_timeout: Duration,
    /// Session user for the terminal client
    pub user: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            encryption_key: Secret(String::new()),
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            providers_path: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user: None,
        }
    }
}

impl AssistantConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let config = Self {
            encryption_key: Secret(env::var(ENCRYPTION_KEY_VAR).unwrap_or_default()),
            state_path: env::var(STATE_PATH_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_PATH)),
            providers_path: env::var(PROVIDERS_VAR).ok().map(PathBuf::from),
            request_timeout: env::var(TIMEOUT_VAR)
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            user: env::var(USER_VAR).ok().filter(|u| !u.is_empty()),
        };
        debug!("Encryption key set: {}", !config.encryption_key.inner().is_empty());
        debug!("State path: {}", config.state_path.display());
        debug!("Provider catalog: {:?}", config.providers_path);
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.encryption_key.inner().is_empty() {
            return Err(Error::InvalidConfig(format!("{ENCRYPTION_KEY_VAR} is not set")));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfig("request timeout must be positive".into()));
        }
        Ok(())
    }

    pub fn codec(&self) -> SecretCodec {
        SecretCodec::new(self.encryption_key.inner())
    }

    /// Loads the configured provider catalog
    pub fn provider_catalog(&self) -> Result<CatalogSource> {
        match &self.providers_path {
            Some(path) => CatalogSource::from_json_file(path),
            None => {
                info!("Using built-in provider catalog");
                Ok(CatalogSource::builtin())
            }
        }
    }
}
