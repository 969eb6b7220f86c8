use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The authenticated user behind a chat session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Supplies the current session, if any.
///
/// The chat layer trusts whatever this returns; `None` means signed out and
/// every stateful operation is refused.
pub trait SessionProvider: Send + Sync {
    fn current_user(&self) -> Option<SessionUser>;
}

/// A session fixed at construction time
#[derive(Debug, Clone, Default)]
pub struct StaticSession {
    user: Option<SessionUser>,
}

impl StaticSession {
    pub fn signed_in(user: SessionUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

impl SessionProvider for StaticSession {
    fn current_user(&self) -> Option<SessionUser> {
        self.user.clone()
    }
}

pub fn require_user(provider: &dyn SessionProvider) -> Result<SessionUser> {
    provider.current_user().ok_or(Error::NoSession)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_session_is_refused() {
        let session = StaticSession::anonymous();
        assert!(matches!(require_user(&session), Err(Error::NoSession)));
    }

    #[test]
    fn signed_in_session_yields_user() {
        let user = SessionUser {
            id: "u-1".into(),
            email: "hr@example.com".into(),
            name: None,
        };
        let session = StaticSession::signed_in(user.clone());
        assert_eq!(require_user(&session).unwrap(), user);
    }
}
