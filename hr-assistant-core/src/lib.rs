// Chat assistant core for the HR management app: provider registry,
// encrypted API keys, per-session conversation state and dispatch.

pub mod compactor;
pub mod config;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod llm_service;
pub mod message;
pub mod provider;
pub mod registry;
pub mod secret;
pub mod session;
pub mod storage;
pub mod store;
pub mod token;

// Re-export the main types for convenient usage
pub use compactor::{ChatHistoryCompactor, DropOldestCompactor};
pub use config::AssistantConfig;
pub use conversation::{Conversation, Phase, SendState};
pub use dispatcher::{ChatDispatcher, SendOutcome};
pub use error::{EntityKind, Error, Result};
pub use llm_service::{HTTPLlmService, LLMService, MockLlmService};
pub use message::{Message, Role, WireMessage};
pub use provider::{DispatchRequest, HTTPProvider, ProviderConfig, ProviderKind};
pub use registry::{CatalogSource, ProviderRegistry, ProviderSource};
pub use secret::{Secret, SecretCodec, decrypt, encrypt};
pub use session::{SessionProvider, SessionUser, StaticSession};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage, open_storage, restore_store};
pub use store::{ChatState, ConversationStore, PendingSend};
pub use token::TokenCounter;
