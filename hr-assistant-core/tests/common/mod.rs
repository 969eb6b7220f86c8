#![allow(dead_code)]

use hr_assistant_core::{ConversationStore, ProviderConfig, ProviderKind, SecretCodec};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, registry};

pub const TEST_ENCRYPTION_KEY: &str = "unit-test-encryption-key";

/// Helper function to set up tracing for tests
pub fn setup_tracing(level: Level) {
    let subscriber = registry()
        .with(fmt::layer().with_test_writer().with_ansi(false))
        .with(
            EnvFilter::from_default_env()
                .add_directive(level.into())
                .add_directive("hyper=info".parse().unwrap()),
        );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn provider(id: &str, name: &str, models: &[&str]) -> ProviderConfig {
    ProviderConfig {
        id: id.to_string(),
        name: name.to_string(),
        kind: ProviderKind::OpenAi,
        base_url: "https://api.openai.com/v1".to_string(),
        models: models.iter().map(|m| m.to_string()).collect(),
        default_model: models[0].to_string(),
        encrypted_api_key: None,
        active: true,
        requires_api_key: true,
    }
}

pub fn openai() -> ProviderConfig {
    provider("openai", "OpenAI", &["gpt-x", "gpt-y"])
}

pub fn codec() -> SecretCodec {
    SecretCodec::new(TEST_ENCRYPTION_KEY)
}

/// A store whose `openai` provider already holds a key
pub fn store_with_key() -> ConversationStore {
    let mut store = ConversationStore::new(codec(), vec![openai()]);
    store
        .set_api_key("openai", "sk-test-key")
        .expect("openai provider exists");
    store
}
