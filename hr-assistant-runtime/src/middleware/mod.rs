use std::pin::Pin;
use std::sync::Arc;

use futures::Future;
use hr_assistant_core::{ConversationStore, KeyValueStorage};
use tokio::sync::Mutex;

mod interpreter;
mod persist;
mod session_guard;

pub use interpreter::StoreInterpreter;
pub use persist::{PersistLayer, PersistMiddleware};
pub use session_guard::{SessionGuardLayer, SessionGuardMiddleware};

// Re-export tower types for convenience
pub use tower::ServiceBuilder;

/// Type alias for a pinned future with static lifetime
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// The session's store, shared by the services of one pipeline
pub type SharedStore = Arc<Mutex<ConversationStore>>;

/// Backing storage for persisted chat state
pub type SharedStorage = Arc<Mutex<Box<dyn KeyValueStorage>>>;

/// Helper function to convert a future into a BoxFuture
pub fn boxed<F, T>(future: F) -> BoxFuture<T>
where
    F: Future<Output = T> + Send + 'static,
{
    Box::pin(future)
}

pub fn shared_store(store: ConversationStore) -> SharedStore {
    Arc::new(Mutex::new(store))
}

pub fn shared_storage(storage: Box<dyn KeyValueStorage>) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}
