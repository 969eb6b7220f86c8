use std::task::{Context, Poll};

use hr_assistant_core::error::{Error, Result};
use tower::Layer;
use tower_service::Service;
use tracing::{debug, warn};

use crate::ops::{ChatOp, ChatReply};

use super::{BoxFuture, SharedStorage, SharedStore};

/// Middleware that writes the chat state back to storage after every
/// successful mutating op.
///
/// A failed send still counts: its user message and `Failed` state were
/// committed before the provider call. Storage errors are logged and
/// swallowed so the UI keeps working on the in-memory state.
pub struct PersistMiddleware<S> {
    inner: S,
    store: SharedStore,
    storage: SharedStorage,
    user_id: String,
}

impl<S> PersistMiddleware<S> {
    pub fn new(
        inner: S,
        store: SharedStore,
        storage: SharedStorage,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            store,
            storage,
            user_id: user_id.into(),
        }
    }
}

impl<S> Service<ChatOp> for PersistMiddleware<S>
where
    S: Service<ChatOp, Response = ChatReply, Error = Error>,
    S::Future: Send + 'static,
{
    type Response = ChatReply;
    type Error = Error;
    type Future = BoxFuture<Result<Self::Response>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, op: ChatOp) -> Self::Future {
        let mutating = op.is_mutating();
        let name = op.name();
        let future = self.inner.call(op);
        let store = self.store.clone();
        let storage = self.storage.clone();
        let user_id = self.user_id.clone();

        Box::pin(async move {
            let reply = future.await?;
            if mutating {
                // snapshot under the store lock, write under the storage lock
                let state = store.lock().await.state().clone();
                let mut storage = storage.lock().await;
                match state.save(&mut **storage, &user_id) {
                    Ok(()) => debug!(op = name, "Persisted chat state"),
                    Err(e) => warn!(op = name, error = %e, "Failed to persist chat state"),
                }
            }
            Ok(reply)
        })
    }
}

impl<S: Clone> Clone for PersistMiddleware<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            store: self.store.clone(),
            storage: self.storage.clone(),
            user_id: self.user_id.clone(),
        }
    }
}

/// Builds [`PersistMiddleware`] inside a `ServiceBuilder`
#[derive(Clone)]
pub struct PersistLayer {
    store: SharedStore,
    storage: SharedStorage,
    user_id: String,
}

impl PersistLayer {
    pub fn new(store: SharedStore, storage: SharedStorage, user_id: impl Into<String>) -> Self {
        Self {
            store,
            storage,
            user_id: user_id.into(),
        }
    }
}

impl<S> Layer<S> for PersistLayer {
    type Service = PersistMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PersistMiddleware::new(
            inner,
            self.store.clone(),
            self.storage.clone(),
            self.user_id.clone(),
        )
    }
}
