//! Session-scoped chat state and the operations that mutate it.
//!
//! A [`ConversationStore`] is built when a user session starts and dropped
//! when it ends. It owns one [`ChatState`]; every mutation is synchronous and
//! goes through `&mut self`, so there is exactly one writer at a time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::compactor::{ChatHistoryCompactor, DropOldestCompactor};
use crate::conversation::{Conversation, SendState};
use crate::error::{Error, Result};
use crate::message::{Message, WireMessage};
use crate::provider::{DispatchRequest, ProviderConfig};
use crate::secret::{Secret, SecretCodec};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are the assistant built into an HR management \
application. Help with questions about employees, projects, tasks and salaries. Be concise \
and never invent personnel data you were not given.";
pub const DEFAULT_MAX_OUTPUT_TOKENS: usize = 1024;
pub const DEFAULT_CONTEXT_BUDGET: usize = 16_384;

/// The aggregate chat state for one user session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatState {
    current_conversation_id: Option<String>,
    conversations: HashMap<String, Conversation>,
    providers: Vec<ProviderConfig>,
    current_provider_id: Option<String>,
    #[serde(skip)]
    is_sending: bool,
    #[serde(skip)]
    error: Option<String>,
}

impl ChatState {
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        Self {
            providers,
            ..Self::default()
        }
    }

    pub fn current_conversation_id(&self) -> Option<&str> {
        self.current_conversation_id.as_deref()
    }

    pub fn conversations(&self) -> &HashMap<String, Conversation> {
        &self.conversations
    }

    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    pub fn current_provider_id(&self) -> Option<&str> {
        self.current_provider_id.as_deref()
    }

    pub fn is_sending(&self) -> bool {
        self.is_sending
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Repairs a state restored from storage.
    ///
    /// Dangling current ids are cleared, and sends that were pending when
    /// the state was saved are marked failed, since their replies are gone.
    pub fn normalize(&mut self) {
        if let Some(id) = &self.current_conversation_id {
            if !self.conversations.contains_key(id) {
                warn!(conversation = %id, "Dropping dangling current conversation");
                self.current_conversation_id = None;
            }
        }
        self.normalize_provider();
        for conversation in self.conversations.values_mut() {
            let interrupted = match &conversation.send_state {
                SendState::Pending { message_id } => Some(message_id.clone()),
                _ => None,
            };
            if let Some(message_id) = interrupted {
                conversation.send_state = SendState::Failed {
                    message_id,
                    error: "interrupted before a reply arrived".into(),
                };
            }
        }
        self.is_sending = false;
    }
}

/// A send that has been committed locally and awaits the provider's reply
#[derive(Debug, Clone)]
pub struct PendingSend {
    pub conversation_id: String,
    pub message_id: String,
    pub request: DispatchRequest,
}

/// Owns the chat state of one session and enforces its invariants
pub struct ConversationStore {
    state: ChatState,
    codec: SecretCodec,
    system_prompt: Option<String>,
    max_output_tokens: usize,
    context_budget: usize,
    compactor: Box<dyn ChatHistoryCompactor>,
}

impl ConversationStore {
    /// Creates a store with a fresh state over the given providers
    pub fn new(codec: SecretCodec, providers: Vec<ProviderConfig>) -> Self {
        Self::from_state(codec, ChatState::new(providers))
    }

    /// Wraps a state restored from storage
    pub fn from_state(codec: SecretCodec, mut state: ChatState) -> Self {
        state.normalize();
        Self {
            state,
            codec,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            context_budget: DEFAULT_CONTEXT_BUDGET,
            compactor: Box::<DropOldestCompactor>::default(),
        }
    }

    /// Sets system prompt and returns self for method chaining
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    #[must_use]
    pub fn with_max_output_tokens(mut self, n: usize) -> Self {
        self.max_output_tokens = n;
        self
    }

    #[must_use]
    pub fn with_context_budget(mut self, tokens: usize) -> Self {
        self.context_budget = tokens;
        self
    }

    #[must_use]
    pub fn with_compactor<C: ChatHistoryCompactor + 'static>(mut self, comp: C) -> Self {
        self.compactor = Box::new(comp);
        self
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn into_state(self) -> ChatState {
        self.state
    }

    // ---------------------------------------------------------------------
    // Conversations
    // ---------------------------------------------------------------------

    /// Allocates an empty conversation and makes it current
    pub fn create_conversation(
        &mut self,
        provider_id: impl Into<String>,
        model: impl Into<String>,
    ) -> String {
        let conversation = Conversation::new(Some(provider_id.into()), Some(model.into()));
        let id = conversation.id.clone();
        info!(
            conversation = %id,
            provider = ?conversation.provider_id,
            model = ?conversation.model,
            "Created conversation"
        );
        self.state.conversations.insert(id.clone(), conversation);
        self.state.current_conversation_id = Some(id.clone());
        id
    }

    pub fn switch_conversation(&mut self, conversation_id: &str) -> Result<()> {
        if !self.state.conversations.contains_key(conversation_id) {
            return Err(Error::conversation_not_found(conversation_id));
        }
        debug!(conversation = conversation_id, "Switched conversation");
        self.state.current_conversation_id = Some(conversation_id.to_string());
        Ok(())
    }

    /// Removes a conversation; if it was current, nothing is current afterwards
    pub fn delete_conversation(&mut self, conversation_id: &str) -> Result<Conversation> {
        let removed = self
            .state
            .conversations
            .remove(conversation_id)
            .ok_or_else(|| Error::conversation_not_found(conversation_id))?;
        if self.state.current_conversation_id.as_deref() == Some(conversation_id) {
            self.state.current_conversation_id = None;
        }
        info!(conversation = conversation_id, "Deleted conversation");
        Ok(removed)
    }

    pub fn rename_conversation(&mut self, conversation_id: &str, title: &str) -> Result<()> {
        self.conversation_mut(conversation_id)?.rename(title);
        Ok(())
    }

    /// Appends a message to a conversation
    pub fn add_message(&mut self, conversation_id: &str, message: Message) -> Result<()> {
        let conversation = self.conversation_mut(conversation_id)?;
        debug!(
            conversation = conversation_id,
            role = %message.role,
            position = conversation.len(),
            "Appending message"
        );
        conversation.push_message(message);
        Ok(())
    }

    pub fn conversation(&self, conversation_id: &str) -> Result<&Conversation> {
        self.state
            .conversations
            .get(conversation_id)
            .ok_or_else(|| Error::conversation_not_found(conversation_id))
    }

    pub fn current_conversation(&self) -> Option<&Conversation> {
        self.state
            .current_conversation_id
            .as_ref()
            .and_then(|id| self.state.conversations.get(id))
    }

    /// All conversations, most recently updated first
    pub fn list_conversations(&self) -> Vec<&Conversation> {
        let mut list: Vec<&Conversation> = self.state.conversations.values().collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    fn conversation_mut(&mut self, conversation_id: &str) -> Result<&mut Conversation> {
        self.state
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| Error::conversation_not_found(conversation_id))
    }

    // ---------------------------------------------------------------------
    // Providers and keys
    // ---------------------------------------------------------------------

    pub fn providers(&self) -> &[ProviderConfig] {
        &self.state.providers
    }

    pub fn current_provider(&self) -> Option<&ProviderConfig> {
        let id = self.state.current_provider_id.as_deref()?;
        self.state.providers.iter().find(|p| p.id == id)
    }

    /// Replaces the provider list with a fresh registry listing.
    ///
    /// Keys already stored in this state survive for providers that are
    /// still listed and come without a key of their own.
    pub fn sync_providers(&mut self, providers: Vec<ProviderConfig>) {
        let mut merged = providers;
        for provider in merged.iter_mut() {
            if provider.encrypted_api_key.is_none() {
                provider.encrypted_api_key = self
                    .state
                    .providers
                    .iter()
                    .find(|p| p.id == provider.id)
                    .and_then(|p| p.encrypted_api_key.clone());
            }
        }
        self.state.providers = merged;
        self.state.normalize_provider();
        debug!(count = self.state.providers.len(), "Synced providers");
    }

    pub fn set_provider(&mut self, provider_id: &str) -> Result<()> {
        self.provider(provider_id)?;
        info!(provider = provider_id, "Selected provider");
        self.state.current_provider_id = Some(provider_id.to_string());
        Ok(())
    }

    /// Stores an API key, encrypted, on the provider record
    pub fn set_api_key(&mut self, provider_id: &str, api_key: &str) -> Result<()> {
        let token = self.codec.encrypt(api_key);
        self.provider_mut(provider_id)?.encrypted_api_key = Some(token);
        info!(provider = provider_id, "Stored API key");
        Ok(())
    }

    pub fn remove_api_key(&mut self, provider_id: &str) -> Result<()> {
        self.provider_mut(provider_id)?.encrypted_api_key = None;
        info!(provider = provider_id, "Removed API key");
        Ok(())
    }

    /// Decrypts the stored key for a provider; `None` if absent or unreadable
    pub fn api_key(&self, provider_id: &str) -> Result<Option<Secret<String>>> {
        let provider = self.provider(provider_id)?;
        Ok(provider
            .encrypted_api_key
            .as_deref()
            .and_then(|token| self.codec.reveal(token)))
    }

    fn provider(&self, provider_id: &str) -> Result<&ProviderConfig> {
        self.state
            .providers
            .iter()
            .find(|p| p.id == provider_id)
            .ok_or_else(|| Error::provider_not_found(provider_id))
    }

    fn provider_mut(&mut self, provider_id: &str) -> Result<&mut ProviderConfig> {
        self.state
            .providers
            .iter_mut()
            .find(|p| p.id == provider_id)
            .ok_or_else(|| Error::provider_not_found(provider_id))
    }

    // ---------------------------------------------------------------------
    // Send cycle
    // ---------------------------------------------------------------------

    /// Commits the user's message and prepares the provider request.
    ///
    /// The conversation's own provider is used when it still resolves,
    /// otherwise the current provider. Precondition failures leave the state
    /// untouched. On success the user message is appended, the conversation
    /// moves to `Pending` and the in-flight flag is set.
    pub fn begin_send(&mut self, conversation_id: &str, content: &str) -> Result<PendingSend> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::EmptyMessage);
        }
        let conversation = self.conversation(conversation_id)?;
        if self.state.is_sending {
            return Err(Error::SendInFlight);
        }

        let resolve = |id: &str| self.state.providers.iter().find(|p| p.id == id);
        let (provider, model) = match conversation.provider_id.as_deref().and_then(resolve) {
            Some(own) => (
                own,
                conversation
                    .model
                    .clone()
                    .unwrap_or_else(|| own.default_model.clone()),
            ),
            None => {
                let current = self
                    .state
                    .current_provider_id
                    .as_deref()
                    .and_then(resolve)
                    .ok_or(Error::NoProviderSelected)?;
                (current, current.default_model.clone())
            }
        };

        let api_key = if provider.requires_api_key {
            let key = provider
                .encrypted_api_key
                .as_deref()
                .and_then(|token| self.codec.reveal(token))
                .ok_or_else(|| Error::MissingApiKey(provider.id.clone()))?;
            Some(key)
        } else {
            None
        };

        let message = Message::user(content).with_origin(provider.id.clone(), model.clone());
        let message_id = message.id.clone();

        let mut history: Vec<Message> = conversation.messages().to_vec();
        history.push(message.clone());
        let window = self.compactor.compact(&history, self.context_budget);

        let request = DispatchRequest {
            provider_id: provider.id.clone(),
            kind: provider.kind,
            base_url: provider.base_url.clone(),
            model,
            system_prompt: self.system_prompt.clone(),
            messages: window.iter().map(WireMessage::from).collect(),
            max_output_tokens: self.max_output_tokens,
            api_key,
        };

        let conversation = self.conversation_mut(conversation_id)?;
        conversation.push_message(message);
        conversation.send_state = SendState::Pending {
            message_id: message_id.clone(),
        };
        self.state.is_sending = true;
        self.state.error = None;

        info!(
            conversation = conversation_id,
            provider = %request.provider_id,
            model = %request.model,
            history = request.messages.len(),
            "Began send"
        );

        Ok(PendingSend {
            conversation_id: conversation_id.to_string(),
            message_id,
            request,
        })
    }

    /// Appends the assistant's reply and returns the conversation to `Idle`
    pub fn complete_send(&mut self, pending: &PendingSend, reply: String) -> Result<Message> {
        self.state.is_sending = false;
        let message = Message::assistant(reply)
            .with_origin(pending.request.provider_id.clone(), pending.request.model.clone());

        let conversation = self.conversation_mut(&pending.conversation_id).inspect_err(|_| {
            warn!(
                conversation = %pending.conversation_id,
                "Reply arrived for a deleted conversation"
            );
        })?;
        conversation.push_message(message.clone());
        conversation.send_state = SendState::Idle;
        self.state.error = None;

        info!(conversation = %pending.conversation_id, "Completed send");
        Ok(message)
    }

    /// Records a failed send. The user's message stays in place.
    pub fn fail_send(&mut self, pending: &PendingSend, error: impl Into<String>) {
        let error = error.into();
        warn!(conversation = %pending.conversation_id, error = %error, "Send failed");
        self.state.is_sending = false;
        if let Some(conversation) = self.state.conversations.get_mut(&pending.conversation_id) {
            conversation.send_state = SendState::Failed {
                message_id: pending.message_id.clone(),
                error: error.clone(),
            };
        }
        self.state.error = Some(error);
    }

    pub fn is_sending(&self) -> bool {
        self.state.is_sending
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error.as_deref()
    }

    /// Clears the last error and the current conversation's failed send
    pub fn clear_error(&mut self) {
        self.state.error = None;
        if let Some(id) = self.state.current_conversation_id.clone() {
            if let Some(conversation) = self.state.conversations.get_mut(&id) {
                if matches!(conversation.send_state, SendState::Failed { .. }) {
                    conversation.send_state = SendState::Idle;
                }
            }
        }
    }
}

impl ChatState {
    fn normalize_provider(&mut self) {
        if let Some(id) = &self.current_provider_id {
            if !self.providers.iter().any(|p| &p.id == id) {
                warn!(provider = %id, "Current provider no longer listed");
                self.current_provider_id = None;
            }
        }
    }
}
