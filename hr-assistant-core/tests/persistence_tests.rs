mod common;

use common::{TEST_ENCRYPTION_KEY, codec, openai, provider, store_with_key};
use hr_assistant_core::storage::state_key;
use hr_assistant_core::{
    ChatState, FileStorage, KeyValueStorage, MemoryStorage, Message, SecretCodec, SendState,
    open_storage, restore_store,
};
use tokio_test::assert_ok;

#[test]
fn state_survives_a_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");

    let mut store = store_with_key();
    let id = store.create_conversation("openai", "gpt-x");
    assert_ok!(store.add_message(&id, Message::user("Who approved the budget?")));
    assert_ok!(store.add_message(&id, Message::assistant("The finance lead.")));
    assert_ok!(store.set_provider("openai"));

    {
        let mut storage = assert_ok!(FileStorage::open(&path));
        assert_ok!(store.state().save(&mut storage, "emp-1"));
    }
    assert!(path.exists());

    let storage = assert_ok!(FileStorage::open(&path));
    let restored = restore_store(&storage, "emp-1", codec(), vec![openai()]);

    assert_eq!(restored.state().current_conversation_id(), Some(id.as_str()));
    assert_eq!(restored.state().current_provider_id(), Some("openai"));
    let conversation = assert_ok!(restored.conversation(&id));
    assert_eq!(conversation.messages(), assert_ok!(store.conversation(&id)).messages());
    assert_eq!(
        assert_ok!(restored.api_key("openai")).map(|k| k.inner().clone()),
        Some("sk-test-key".to_string())
    );
}

#[test]
fn transient_fields_are_not_persisted() {
    let mut store = store_with_key();
    let id = store.create_conversation("openai", "gpt-x");
    let pending = assert_ok!(store.begin_send(&id, "hi"));
    store.fail_send(&pending, "boom");

    let json = assert_ok!(serde_json::to_value(store.state()));
    assert!(json.get("isSending").is_none());
    assert!(json.get("error").is_none());
    assert!(json.get("currentConversationId").is_some());
}

#[test]
fn pending_send_is_restored_as_failed() {
    let mut store = store_with_key();
    let id = store.create_conversation("openai", "gpt-x");
    let pending = assert_ok!(store.begin_send(&id, "hi"));

    let mut storage = MemoryStorage::new();
    assert_ok!(store.state().save(&mut storage, "emp-1"));

    let restored = assert_ok!(ChatState::load(&storage, "emp-1").ok_or("missing state"));
    assert!(!restored.is_sending());
    let conversation = &restored.conversations()[&id];
    assert!(matches!(
        &conversation.send_state,
        SendState::Failed { message_id, .. } if *message_id == pending.message_id
    ));
}

#[test]
fn users_do_not_see_each_other() {
    let mut storage = MemoryStorage::new();

    let mut alice = store_with_key();
    alice.create_conversation("openai", "gpt-x");
    assert_ok!(alice.state().save(&mut storage, "alice"));

    let bob = restore_store(&storage, "bob", codec(), vec![openai()]);
    assert!(bob.state().conversations().is_empty());
    assert!(storage.get_item(&state_key("alice")).is_some());
    assert!(storage.get_item(&state_key("bob")).is_none());
}

#[test]
fn restore_refreshes_providers_but_keeps_keys() {
    let mut storage = MemoryStorage::new();
    let mut store = store_with_key();
    assert_ok!(store.set_provider("openai"));
    assert_ok!(store.state().save(&mut storage, "emp-1"));

    let mut renamed = openai();
    renamed.name = "OpenAI (EU)".into();
    let restored = restore_store(
        &storage,
        "emp-1",
        codec(),
        vec![renamed, provider("mistral", "Mistral", &["m-small"])],
    );

    assert_eq!(restored.providers().len(), 2);
    assert_eq!(restored.providers()[0].name, "OpenAI (EU)");
    assert!(restored.providers()[0].has_api_key());
    assert!(!restored.providers()[1].has_api_key());

    // a provider that was dropped from the catalog can no longer be current
    let restored = restore_store(
        &storage,
        "emp-1",
        codec(),
        vec![provider("mistral", "Mistral", &["m-small"])],
    );
    assert_eq!(restored.state().current_provider_id(), None);
}

#[test]
fn rotated_encryption_key_leaves_keys_unusable() {
    let mut storage = MemoryStorage::new();
    assert_ok!(store_with_key().state().save(&mut storage, "emp-1"));

    let rotated = restore_store(
        &storage,
        "emp-1",
        SecretCodec::new(&format!("{TEST_ENCRYPTION_KEY}-rotated")),
        vec![openai()],
    );
    assert!(rotated.providers()[0].has_api_key());
    assert_eq!(assert_ok!(rotated.api_key("openai")), None);
}

#[test]
fn unopenable_path_falls_back_to_memory() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "file in the way").unwrap();

    let mut storage = open_storage(blocker.join("state.json"));
    assert_ok!(storage.set_item("k", "v"));
    assert_eq!(storage.get_item("k").as_deref(), Some("v"));
    assert_eq!(storage.length(), 1);
}

#[test]
fn corrupt_state_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, "{ definitely not json").unwrap();

    assert!(FileStorage::open(&path).is_err());
}
