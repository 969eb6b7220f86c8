//! HR Assistant Runtime
//!
//! Runs chat ops for one signed-in user through a Tower service stack:
//! session guard, then persistence, then the store interpreter.

pub mod middleware;
pub mod ops;

use std::sync::Arc;

use hr_assistant_core::error::Result;
use hr_assistant_core::session::require_user;
use hr_assistant_core::{
    AssistantConfig, ConversationStore, KeyValueStorage, LLMService, ProviderRegistry,
    SessionProvider, SessionUser, open_storage, restore_store,
};
use tower::ServiceExt;
use tracing::info;

use middleware::{
    PersistLayer, PersistMiddleware, ServiceBuilder, SessionGuardLayer, SessionGuardMiddleware,
    SharedStore, StoreInterpreter, shared_storage, shared_store,
};
use ops::{ChatOp, ChatReply};

// Re-export core types for convenience
pub use hr_assistant_core;

/// The full service stack for one session
pub type ChatPipeline<L> = SessionGuardMiddleware<PersistMiddleware<StoreInterpreter<L>>>;

/// A signed-in user's chat session: their store plus the pipeline over it.
///
/// Dropping the session drops the store; the last persisted state is what
/// the next session restores.
pub struct ChatSession<L: LLMService + 'static> {
    user: SessionUser,
    store: SharedStore,
    pipeline: ChatPipeline<L>,
}

impl<L: LLMService + 'static> ChatSession<L> {
    /// Starts a session from configuration: checks the session, loads the
    /// provider catalog and restores the user's saved state.
    pub fn start(
        config: &AssistantConfig,
        session: Arc<dyn SessionProvider>,
        service: L,
    ) -> Result<Self> {
        config.validate()?;
        let user = require_user(&*session)?;
        let registry = ProviderRegistry::new(config.provider_catalog()?);
        let providers = registry.list_active_providers()?;
        let storage = open_storage(&config.state_path);
        let store = restore_store(&*storage, &user.id, config.codec(), providers);

        info!(user = %user.id, "Chat session started");
        Ok(Self::from_parts(user, session, store, storage, service))
    }

    /// Assembles a session from already-built pieces
    pub fn from_parts(
        user: SessionUser,
        session: Arc<dyn SessionProvider>,
        store: ConversationStore,
        storage: Box<dyn KeyValueStorage>,
        service: L,
    ) -> Self {
        let store = shared_store(store);
        let pipeline = ServiceBuilder::new()
            .layer(SessionGuardLayer::new(session, user.id.clone()))
            .layer(PersistLayer::new(
                store.clone(),
                shared_storage(storage),
                user.id.clone(),
            ))
            .service(StoreInterpreter::new(store.clone(), service));

        Self {
            user,
            store,
            pipeline,
        }
    }

    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    /// Direct access to the store, for read-only views
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// A handle to the pipeline; clones share the same store
    pub fn pipeline(&self) -> ChatPipeline<L> {
        self.pipeline.clone()
    }

    /// Runs one op through the pipeline
    pub async fn run(&self, op: ChatOp) -> Result<ChatReply> {
        self.pipeline.clone().oneshot(op).await
    }
}
