mod common;

use common::{codec, openai, setup_tracing, store_with_key};
use hr_assistant_core::{
    ConversationStore, EntityKind, Error, Message, Phase, Role, SendState,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_test::{assert_err, assert_ok};
use tracing::Level;

fn assert_current_is_valid(store: &ConversationStore) {
    if let Some(id) = store.state().current_conversation_id() {
        assert!(
            store.state().conversations().contains_key(id),
            "current conversation {id} is not in the map"
        );
    }
}

#[test]
fn current_id_always_references_an_existing_conversation() {
    setup_tracing(Level::WARN);

    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut store = ConversationStore::new(codec(), vec![openai()]);
        let mut ids: Vec<String> = Vec::new();

        for _ in 0..200 {
            match rng.gen_range(0..4) {
                0 | 1 => ids.push(store.create_conversation("openai", "gpt-x")),
                2 if !ids.is_empty() => {
                    let id = ids.remove(rng.gen_range(0..ids.len()));
                    assert_ok!(store.delete_conversation(&id));
                }
                3 if !ids.is_empty() => {
                    let id = &ids[rng.gen_range(0..ids.len())];
                    assert_ok!(store.switch_conversation(id));
                }
                _ => {}
            }
            assert_current_is_valid(&store);
            assert_eq!(store.state().conversations().len(), ids.len());
        }
    }
}

#[test]
fn create_makes_the_new_conversation_current() {
    let mut store = ConversationStore::new(codec(), vec![openai()]);
    let first = store.create_conversation("openai", "gpt-x");
    let second = store.create_conversation("openai", "gpt-y");

    assert_ne!(first, second);
    assert_eq!(store.state().current_conversation_id(), Some(second.as_str()));

    let conversation = store.current_conversation().unwrap();
    assert_eq!(conversation.provider_id.as_deref(), Some("openai"));
    assert_eq!(conversation.model.as_deref(), Some("gpt-y"));
    assert_eq!(conversation.phase(), Phase::Empty);
}

#[test]
fn switching_to_a_missing_conversation_fails() {
    let mut store = ConversationStore::new(codec(), vec![openai()]);
    let id = store.create_conversation("openai", "gpt-x");

    let err = assert_err!(store.switch_conversation("missing"));
    assert!(matches!(
        err,
        Error::NotFound { kind: EntityKind::Conversation, ref id } if id == "missing"
    ));
    assert_eq!(store.state().current_conversation_id(), Some(id.as_str()));
}

#[test]
fn deleting_the_current_conversation_unsets_current() {
    let mut store = ConversationStore::new(codec(), vec![openai()]);
    let keep = store.create_conversation("openai", "gpt-x");
    let gone = store.create_conversation("openai", "gpt-x");

    assert_ok!(store.delete_conversation(&gone));
    assert_eq!(store.state().current_conversation_id(), None);

    assert_ok!(store.switch_conversation(&keep));
    let other = store.create_conversation("openai", "gpt-x");
    assert_ok!(store.delete_conversation(&keep));
    assert_eq!(store.state().current_conversation_id(), Some(other.as_str()));

    assert!(matches!(
        store.delete_conversation(&keep),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn add_message_is_append_only() {
    let mut store = ConversationStore::new(codec(), vec![openai()]);
    let id = store.create_conversation("openai", "gpt-x");

    let mut snapshots: Vec<Message> = Vec::new();
    for i in 0..10 {
        let msg = if i % 2 == 0 {
            Message::user(format!("question {i}"))
        } else {
            Message::assistant(format!("answer {i}"))
        };
        let before = store.conversation(&id).unwrap().len();
        assert_ok!(store.add_message(&id, msg.clone()));

        let conversation = store.conversation(&id).unwrap();
        assert_eq!(conversation.len(), before + 1);
        assert_eq!(&conversation.messages()[..before], snapshots.as_slice());
        snapshots.push(msg);
    }
    assert_eq!(store.conversation(&id).unwrap().phase(), Phase::Active);
}

#[test]
fn add_message_to_missing_conversation_fails() {
    let mut store = ConversationStore::new(codec(), vec![openai()]);
    let err = assert_err!(store.add_message("nope", Message::user("hi")));
    assert!(matches!(err, Error::NotFound { kind: EntityKind::Conversation, .. }));
}

#[test]
fn add_message_bumps_updated_at_and_listing_order() {
    let mut store = ConversationStore::new(codec(), vec![openai()]);
    let older = store.create_conversation("openai", "gpt-x");
    let newer = store.create_conversation("openai", "gpt-x");

    std::thread::sleep(std::time::Duration::from_millis(5));
    assert_ok!(store.add_message(&older, Message::user("bump me")));

    let listed: Vec<&str> = store
        .list_conversations()
        .into_iter()
        .map(|c| c.id.as_str())
        .collect();
    assert_eq!(listed, vec![older.as_str(), newer.as_str()]);
}

#[test]
fn provider_selection_requires_a_known_provider() {
    let mut store = ConversationStore::new(codec(), vec![openai()]);
    assert!(matches!(
        store.set_provider("anthropic"),
        Err(Error::NotFound { kind: EntityKind::Provider, .. })
    ));
    assert_ok!(store.set_provider("openai"));
    assert_eq!(store.current_provider().unwrap().id, "openai");
}

#[test]
fn api_key_never_persists_in_plaintext() {
    let mut store = ConversationStore::new(codec(), vec![openai()]);
    assert_ok!(store.set_api_key("openai", "sk-live-123456"));

    let json = serde_json::to_string(store.state()).unwrap();
    assert!(!json.contains("sk-live-123456"));
    assert!(json.contains("encryptedApiKey"));

    assert!(matches!(
        store.set_api_key("unknown", "sk"),
        Err(Error::NotFound { .. })
    ));
}

#[test]
fn failed_send_keeps_user_message_and_records_error() {
    let mut store = store_with_key();
    let id = store.create_conversation("openai", "gpt-x");
    let pending = store.begin_send(&id, "hello").unwrap();
    assert!(store.is_sending());

    store.fail_send(&pending, "connection reset");

    let conversation = store.conversation(&id).unwrap();
    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation.messages()[0].role, Role::User);
    assert_eq!(
        conversation.send_state,
        SendState::Failed {
            message_id: pending.message_id.clone(),
            error: "connection reset".into()
        }
    );
    assert_eq!(store.error(), Some("connection reset"));
    assert!(!store.is_sending());

    store.clear_error();
    assert_eq!(store.error(), None);
    assert_eq!(store.conversation(&id).unwrap().send_state, SendState::Idle);
}

#[test]
fn reply_for_deleted_conversation_clears_in_flight() {
    let mut store = store_with_key();
    let id = store.create_conversation("openai", "gpt-x");
    let pending = store.begin_send(&id, "hello").unwrap();
    assert_ok!(store.delete_conversation(&id));

    assert_err!(store.complete_send(&pending, "late reply".into()));
    assert!(!store.is_sending());
}

#[test]
fn conversation_provider_falls_back_to_current_provider() {
    let mut store = store_with_key();
    let id = store.create_conversation("retired-provider", "old-model");

    assert!(matches!(
        store.begin_send(&id, "hello"),
        Err(Error::NoProviderSelected)
    ));
    assert!(store.conversation(&id).unwrap().is_empty());

    assert_ok!(store.set_provider("openai"));
    let pending = store.begin_send(&id, "hello").unwrap();
    assert_eq!(pending.request.provider_id, "openai");
    assert_eq!(pending.request.model, "gpt-x");
}
