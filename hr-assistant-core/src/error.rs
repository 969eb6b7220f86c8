use thiserror::Error;

/// What kind of entity a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Conversation,
    Provider,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Conversation => f.write_str("conversation"),
            EntityKind::Provider => f.write_str("provider"),
        }
    }
}

/// Represents errors that can occur in the HR assistant chat layer
#[derive(Error, Debug)]
pub enum Error {
    /// A conversation or provider id that does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// No provider is selected, or the selected one cannot be resolved
    #[error("No provider selected")]
    NoProviderSelected,

    /// The provider needs an API key and none could be recovered.
    ///
    /// Raised when no key is stored or when the stored key fails to decrypt.
    /// UI code should treat it like `NoProviderSelected`.
    #[error("No usable API key for provider: {0}")]
    MissingApiKey(String),

    /// A send is already awaiting a response
    #[error("A message is already being sent")]
    SendInFlight,

    /// Message content was empty after trimming
    #[error("Message content is empty")]
    EmptyMessage,

    /// The session collaborator reported no authenticated user
    #[error("No active session")]
    NoSession,

    /// The provider call failed in a way that is not covered below
    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    /// Error during serialization or deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error during HTTP request
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Couldn't parse base url")]
    BaseUrl(#[from] url::ParseError),

    /// Authentication error
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Provider returned an error body or an unexpected status
    #[error("Provider not available: {0}")]
    ProviderUnavailable(String),

    /// Model not offered by the provider
    #[error("Model {model} is not supported by provider {provider}")]
    UnsupportedModel { provider: String, model: String },

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Key-value storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn conversation_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: EntityKind::Conversation,
            id: id.into(),
        }
    }

    pub fn provider_not_found(id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: EntityKind::Provider,
            id: id.into(),
        }
    }

    /// True for errors the UI should answer by asking the user to pick a
    /// provider or enter a key.
    pub fn needs_provider_selection(&self) -> bool {
        matches!(self, Error::NoProviderSelected | Error::MissingApiKey(_))
    }
}

/// A Result type that uses our Error type
pub type Result<T> = std::result::Result<T, Error>;
