use std::fmt;

use chrono::{DateTime, Utc};
use hr_assistant_core::{ChatState, Conversation, ProviderConfig, Secret, SendOutcome};

/// A single user action against the chat state.
///
/// Every UI gesture maps to exactly one op; the pipeline answers each with
/// a [`ChatReply`].
#[derive(Clone)]
pub enum ChatOp {
    /// Start a conversation. Missing fields fall back to the current
    /// provider and its default model.
    CreateConversation {
        provider_id: Option<String>,
        model: Option<String>,
    },
    SwitchConversation { conversation_id: String },
    DeleteConversation { conversation_id: String },
    RenameConversation { conversation_id: String, title: String },
    SendMessage { conversation_id: String, content: String },
    SetProvider { provider_id: String },
    SetApiKey {
        provider_id: String,
        api_key: Secret<String>,
    },
    RemoveApiKey { provider_id: String },
    ListConversations,
    ListProviders,
    ClearError,
    Snapshot,
}

impl ChatOp {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            ChatOp::CreateConversation { .. } => "create_conversation",
            ChatOp::SwitchConversation { .. } => "switch_conversation",
            ChatOp::DeleteConversation { .. } => "delete_conversation",
            ChatOp::RenameConversation { .. } => "rename_conversation",
            ChatOp::SendMessage { .. } => "send_message",
            ChatOp::SetProvider { .. } => "set_provider",
            ChatOp::SetApiKey { .. } => "set_api_key",
            ChatOp::RemoveApiKey { .. } => "remove_api_key",
            ChatOp::ListConversations => "list_conversations",
            ChatOp::ListProviders => "list_providers",
            ChatOp::ClearError => "clear_error",
            ChatOp::Snapshot => "snapshot",
        }
    }

    /// Whether a successful run of this op changes persisted state
    pub fn is_mutating(&self) -> bool {
        !matches!(
            self,
            ChatOp::ListConversations | ChatOp::ListProviders | ChatOp::Snapshot
        )
    }
}

impl fmt::Debug for ChatOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // content is user text and may hold personnel data
            ChatOp::SendMessage {
                conversation_id,
                content,
            } => f
                .debug_struct("SendMessage")
                .field("conversation_id", conversation_id)
                .field("content_len", &content.len())
                .finish(),
            ChatOp::SetApiKey {
                provider_id,
                api_key,
            } => f
                .debug_struct("SetApiKey")
                .field("provider_id", provider_id)
                .field("api_key", api_key)
                .finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// Row in the conversation sidebar
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
    pub is_current: bool,
    pub failed: bool,
}

impl ConversationSummary {
    pub fn of(conversation: &Conversation, current: Option<&str>) -> Self {
        Self {
            id: conversation.id.clone(),
            title: conversation.title.clone(),
            message_count: conversation.len(),
            updated_at: conversation.updated_at,
            is_current: current == Some(conversation.id.as_str()),
            failed: conversation.failed_send().is_some(),
        }
    }
}

/// Row in the provider picker. Carries whether a key is stored, never the key.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSummary {
    pub id: String,
    pub name: String,
    pub models: Vec<String>,
    pub default_model: String,
    pub has_api_key: bool,
    pub requires_api_key: bool,
    pub is_current: bool,
}

impl ProviderSummary {
    pub fn of(provider: &ProviderConfig, current: Option<&str>) -> Self {
        Self {
            id: provider.id.clone(),
            name: provider.name.clone(),
            models: provider.models.clone(),
            default_model: provider.default_model.clone(),
            has_api_key: provider.has_api_key(),
            requires_api_key: provider.requires_api_key,
            is_current: current == Some(provider.id.as_str()),
        }
    }
}

/// What the pipeline answers a [`ChatOp`] with
#[derive(Debug, Clone)]
pub enum ChatReply {
    /// The id of a newly created conversation
    Created(String),
    /// The op was applied and has nothing to report
    Done,
    Sent(SendOutcome),
    Conversations(Vec<ConversationSummary>),
    Providers(Vec<ProviderSummary>),
    Snapshot(Box<ChatState>),
}
