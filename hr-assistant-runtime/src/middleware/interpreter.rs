use std::sync::Arc;
use std::task::{Context, Poll};

use hr_assistant_core::error::{Error, Result};
use hr_assistant_core::{ChatDispatcher, ConversationStore, LLMService};
use tower_service::Service;
use tracing::{debug, info};

use crate::ops::{ChatOp, ChatReply, ConversationSummary, ProviderSummary};

use super::{BoxFuture, SharedStore, boxed};

/// The final service: applies ops to the shared store.
///
/// `SendMessage` runs in three steps so the store lock is never held across
/// the provider call: begin under the lock, dispatch without it, finish
/// under the lock again. Other sends are refused meanwhile by the store's
/// in-flight flag.
pub struct StoreInterpreter<L: LLMService> {
    store: SharedStore,
    dispatcher: Arc<ChatDispatcher<L>>,
}

impl<L: LLMService> StoreInterpreter<L> {
    pub fn new(store: SharedStore, service: L) -> Self {
        Self {
            store,
            dispatcher: Arc::new(ChatDispatcher::new(service)),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }
}

impl<L: LLMService> Clone for StoreInterpreter<L> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }
}

impl<L> Service<ChatOp> for StoreInterpreter<L>
where
    L: LLMService + 'static,
{
    type Response = ChatReply;
    type Error = Error;
    type Future = BoxFuture<Result<Self::Response>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: ChatOp) -> Self::Future {
        let store = self.store.clone();
        let dispatcher = self.dispatcher.clone();

        boxed(async move {
            match op {
                ChatOp::SendMessage {
                    conversation_id,
                    content,
                } => {
                    let pending = store.lock().await.begin_send(&conversation_id, &content)?;
                    let result = dispatcher.dispatch(&pending).await;
                    let mut store = store.lock().await;
                    let outcome = ChatDispatcher::<L>::finish(&mut store, &pending, result)?;
                    Ok(ChatReply::Sent(outcome))
                }
                other => {
                    let mut store = store.lock().await;
                    apply(&mut store, other)
                }
            }
        })
    }
}

/// Applies every op that does not touch the network
fn apply(store: &mut ConversationStore, op: ChatOp) -> Result<ChatReply> {
    debug!(op = ?op, "Applying op");
    match op {
        ChatOp::CreateConversation { provider_id, model } => {
            let provider = match provider_id.as_deref() {
                Some(id) => store
                    .providers()
                    .iter()
                    .find(|p| p.id == id)
                    .ok_or_else(|| Error::provider_not_found(id))?,
                None => store.current_provider().ok_or(Error::NoProviderSelected)?,
            };
            let model = match model {
                Some(model) if !provider.supports_model(&model) => {
                    return Err(Error::UnsupportedModel {
                        provider: provider.id.clone(),
                        model,
                    });
                }
                Some(model) => model,
                None => provider.default_model.clone(),
            };
            let provider_id = provider.id.clone();
            Ok(ChatReply::Created(store.create_conversation(provider_id, model)))
        }
        ChatOp::SwitchConversation { conversation_id } => {
            store.switch_conversation(&conversation_id)?;
            Ok(ChatReply::Done)
        }
        ChatOp::DeleteConversation { conversation_id } => {
            let removed = store.delete_conversation(&conversation_id)?;
            info!(conversation = %removed.id, messages = removed.len(), "Conversation removed");
            Ok(ChatReply::Done)
        }
        ChatOp::RenameConversation {
            conversation_id,
            title,
        } => {
            store.rename_conversation(&conversation_id, &title)?;
            Ok(ChatReply::Done)
        }
        ChatOp::SetProvider { provider_id } => {
            store.set_provider(&provider_id)?;
            Ok(ChatReply::Done)
        }
        ChatOp::SetApiKey {
            provider_id,
            api_key,
        } => {
            store.set_api_key(&provider_id, api_key.inner())?;
            Ok(ChatReply::Done)
        }
        ChatOp::RemoveApiKey { provider_id } => {
            store.remove_api_key(&provider_id)?;
            Ok(ChatReply::Done)
        }
        ChatOp::ListConversations => {
            let current = store.state().current_conversation_id();
            Ok(ChatReply::Conversations(
                store
                    .list_conversations()
                    .into_iter()
                    .map(|c| ConversationSummary::of(c, current))
                    .collect(),
            ))
        }
        ChatOp::ListProviders => {
            let current = store.state().current_provider_id();
            Ok(ChatReply::Providers(
                store
                    .providers()
                    .iter()
                    .map(|p| ProviderSummary::of(p, current))
                    .collect(),
            ))
        }
        ChatOp::ClearError => {
            store.clear_error();
            Ok(ChatReply::Done)
        }
        ChatOp::Snapshot => Ok(ChatReply::Snapshot(Box::new(store.state().clone()))),
        ChatOp::SendMessage { .. } => Err(Error::Other(
            "send_message must go through the dispatcher".into(),
        )),
    }
}
