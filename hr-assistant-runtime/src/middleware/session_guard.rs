use std::sync::Arc;
use std::task::{Context, Poll};

use hr_assistant_core::error::{Error, Result};
use hr_assistant_core::session::SessionProvider;
use tower::Layer;
use tower_service::Service;
use tracing::{debug, warn};

use crate::ops::{ChatOp, ChatReply};

use super::{BoxFuture, boxed};

/// Middleware that refuses every op unless the session owner is signed in.
///
/// A store belongs to the user it was restored for; if the session now
/// reports nobody, or somebody else, the op fails with `NoSession`.
pub struct SessionGuardMiddleware<S> {
    inner: S,
    session: Arc<dyn SessionProvider>,
    owner: String,
}

impl<S> SessionGuardMiddleware<S> {
    pub fn new(inner: S, session: Arc<dyn SessionProvider>, owner: impl Into<String>) -> Self {
        Self {
            inner,
            session,
            owner: owner.into(),
        }
    }
}

impl<S> Service<ChatOp> for SessionGuardMiddleware<S>
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
        match self.session.current_user() {
            Some(user) if user.id == self.owner => {
                debug!(op = op.name(), user = %user.id, "Session check passed");
                boxed(self.inner.call(op))
            }
            Some(user) => {
                warn!(op = op.name(), user = %user.id, owner = %self.owner, "Session user changed");
                boxed(async { Err(Error::NoSession) })
            }
            None => {
                warn!(op = op.name(), "No active session");
                boxed(async { Err(Error::NoSession) })
            }
        }
    }
}

impl<S: Clone> Clone for SessionGuardMiddleware<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            session: self.session.clone(),
            owner: self.owner.clone(),
        }
    }
}

/// Builds [`SessionGuardMiddleware`] inside a `ServiceBuilder`
#[derive(Clone)]
pub struct SessionGuardLayer {
    session: Arc<dyn SessionProvider>,
    owner: String,
}

impl SessionGuardLayer {
    pub fn new(session: Arc<dyn SessionProvider>, owner: impl Into<String>) -> Self {
        Self {
            session,
            owner: owner.into(),
        }
    }
}

impl<S> Layer<S> for SessionGuardLayer {
    type Service = SessionGuardMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionGuardMiddleware::new(inner, self.session.clone(), self.owner.clone())
    }
}
