use tracing::{info, instrument};

use crate::error::Result;
use crate::llm_service::LLMService;
use crate::message::Message;
use crate::store::{ConversationStore, PendingSend};

/// How a send ended once its preconditions were met
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The assistant's reply, already appended to the conversation
    Replied(Message),
    /// The provider call failed; the reason is also the store's last error
    Failed(String),
}

impl SendOutcome {
    pub fn reply(&self) -> Option<&Message> {
        match self {
            SendOutcome::Replied(msg) => Some(msg),
            SendOutcome::Failed(_) => None,
        }
    }
}

/// Sends user messages to the selected provider and records the outcome.
///
/// There is no retry: a failed send stays failed until the caller sends
/// again.
pub struct ChatDispatcher<L: LLMService> {
    service: L,
}

impl<L: LLMService> ChatDispatcher<L> {
    pub fn new(service: L) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &L {
        &self.service
    }

    /// Sends `content` on a conversation.
    ///
    /// Precondition failures (`NotFound`, `NoProviderSelected`,
    /// `MissingApiKey`, `SendInFlight`, `EmptyMessage`) come back as `Err`
    /// with the store untouched. Once the user message is appended, provider
    /// errors are captured into the store and reported as
    /// [`SendOutcome::Failed`].
    #[instrument(skip(self, store, content), level = "debug")]
    pub async fn send_message(
        &self,
        store: &mut ConversationStore,
        conversation_id: &str,
        content: &str,
    ) -> Result<SendOutcome> {
        let pending = store.begin_send(conversation_id, content)?;
        let result = self.dispatch(&pending).await;
        Self::finish(store, &pending, result)
    }

    /// Runs only the network leg of a send
    pub async fn dispatch(&self, pending: &PendingSend) -> Result<String> {
        self.service.generate_reply(&pending.request).await
    }

    /// Applies a dispatch result to the store
    pub fn finish(
        store: &mut ConversationStore,
        pending: &PendingSend,
        result: Result<String>,
    ) -> Result<SendOutcome> {
        match result {
            Ok(reply) => {
                let message = store.complete_send(pending, reply)?;
                info!(conversation = %pending.conversation_id, "Assistant replied");
                Ok(SendOutcome::Replied(message))
            }
            Err(e) => {
                let reason = e.to_string();
                store.fail_send(pending, reason.clone());
                Ok(SendOutcome::Failed(reason))
            }
        }
    }
}
