mod common;

use common::{codec, openai, store_with_key};
use hr_assistant_core::{
    ChatDispatcher, ConversationStore, Error, MockLlmService, Role, SendOutcome, SendState,
};
use tokio_test::{assert_err, assert_ok};
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn send_appends_user_then_assistant() {
    let mut store = store_with_key();
    let id = store.create_conversation("openai", "gpt-x");
    let dispatcher = ChatDispatcher::new(MockLlmService::new().reply("Hello!"));

    let outcome = assert_ok!(dispatcher.send_message(&mut store, &id, "hi").await);
    assert_eq!(outcome.reply().map(|m| m.content.as_str()), Some("Hello!"));

    let conversation = assert_ok!(store.conversation(&id));
    let turns: Vec<(Role, &str)> = conversation
        .messages()
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(turns, vec![(Role::User, "hi"), (Role::Assistant, "Hello!")]);

    let reply = &conversation.messages()[1];
    assert_eq!(reply.provider.as_deref(), Some("openai"));
    assert_eq!(reply.model.as_deref(), Some("gpt-x"));
    assert_eq!(conversation.send_state, SendState::Idle);
    assert!(!store.is_sending());
    assert_eq!(store.error(), None);

    assert!(logs_contain("Completed send"));
}

#[tokio::test]
async fn missing_key_fails_before_dispatch() {
    let mut store = ConversationStore::new(codec(), vec![openai()]);
    let id = store.create_conversation("openai", "gpt-x");
    let dispatcher = ChatDispatcher::new(MockLlmService::new().reply("unused"));

    let err = assert_err!(dispatcher.send_message(&mut store, &id, "hi").await);
    assert!(matches!(err, Error::MissingApiKey(ref p) if p == "openai"));
    assert!(err.needs_provider_selection());

    assert!(assert_ok!(store.conversation(&id)).is_empty());
    assert!(dispatcher.service().requests().is_empty());
    assert!(!store.is_sending());
}

#[tokio::test]
async fn provider_failure_keeps_user_message() {
    let mut store = store_with_key();
    let id = store.create_conversation("openai", "gpt-x");
    let dispatcher = ChatDispatcher::new(MockLlmService::new().fail("upstream 503"));

    let outcome = assert_ok!(dispatcher.send_message(&mut store, &id, "hi").await);
    let SendOutcome::Failed(reason) = outcome else {
        panic!("expected a failed send");
    };
    assert!(reason.contains("upstream 503"));

    let conversation = assert_ok!(store.conversation(&id));
    assert_eq!(conversation.len(), 1);
    assert_eq!(conversation.messages()[0].role, Role::User);
    assert!(matches!(conversation.send_state, SendState::Failed { .. }));
    assert_eq!(store.error(), Some(reason.as_str()));
    assert!(!store.is_sending());
}

#[tokio::test]
async fn next_send_after_failure_succeeds_and_clears_error() {
    let mut store = store_with_key();
    let id = store.create_conversation("openai", "gpt-x");
    let dispatcher = ChatDispatcher::new(
        MockLlmService::new()
            .fail("timeout")
            .reply("Second time lucky"),
    );

    let first = assert_ok!(dispatcher.send_message(&mut store, &id, "first").await);
    assert!(matches!(first, SendOutcome::Failed(_)));

    let second = assert_ok!(dispatcher.send_message(&mut store, &id, "second").await);
    assert!(matches!(second, SendOutcome::Replied(_)));
    assert_eq!(store.error(), None);

    let contents: Vec<&str> = assert_ok!(store.conversation(&id))
        .messages()
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(contents, vec!["first", "second", "Second time lucky"]);
}

#[tokio::test]
async fn request_carries_history_key_and_system_prompt() {
    let mut store = store_with_key();
    let id = store.create_conversation("openai", "gpt-y");
    let dispatcher = ChatDispatcher::new(MockLlmService::new().reply("one").reply("two"));

    assert_ok!(dispatcher.send_message(&mut store, &id, "How many vacation days?").await);
    assert_ok!(dispatcher.send_message(&mut store, &id, "And sick days?").await);

    let requests = dispatcher.service().requests();
    assert_eq!(requests.len(), 2);

    let second = &requests[1];
    assert_eq!(second.model, "gpt-y");
    assert_eq!(second.provider_id, "openai");
    assert_eq!(
        second.api_key.as_ref().map(|k| k.inner().as_str()),
        Some("sk-test-key")
    );
    assert!(second.system_prompt.is_some());

    let wire: Vec<(Role, &str)> = second
        .messages
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(
        wire,
        vec![
            (Role::User, "How many vacation days?"),
            (Role::Assistant, "one"),
            (Role::User, "And sick days?"),
        ]
    );
}

#[tokio::test]
async fn sends_are_rejected_while_one_is_in_flight() {
    let mut store = store_with_key();
    let id = store.create_conversation("openai", "gpt-x");
    let other = store.create_conversation("openai", "gpt-x");

    let pending = assert_ok!(store.begin_send(&id, "first"));
    assert!(store.is_sending());

    assert!(matches!(store.begin_send(&other, "second"), Err(Error::SendInFlight)));
    assert!(assert_ok!(store.conversation(&other)).is_empty());

    let dispatcher = ChatDispatcher::new(MockLlmService::new().reply("done"));
    let result = dispatcher.dispatch(&pending).await;
    let outcome = assert_ok!(ChatDispatcher::<MockLlmService>::finish(
        &mut store, &pending, result
    ));
    assert!(matches!(outcome, SendOutcome::Replied(_)));
    assert!(!store.is_sending());
    assert_ok!(store.begin_send(&other, "second"));
}

#[tokio::test]
async fn blank_content_is_rejected() {
    let mut store = store_with_key();
    let id = store.create_conversation("openai", "gpt-x");
    let dispatcher = ChatDispatcher::new(MockLlmService::new());

    let err = assert_err!(dispatcher.send_message(&mut store, &id, "   \n").await);
    assert!(matches!(err, Error::EmptyMessage));
    assert!(assert_ok!(store.conversation(&id)).is_empty());
}

#[tokio::test]
async fn unknown_conversation_is_not_found() {
    let mut store = store_with_key();
    let dispatcher = ChatDispatcher::new(MockLlmService::new());

    let err = assert_err!(dispatcher.send_message(&mut store, "ghost", "hi").await);
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn first_user_message_titles_the_conversation() {
    let mut store = store_with_key();
    let id = store.create_conversation("openai", "gpt-x");
    let dispatcher = ChatDispatcher::new(MockLlmService::new().reply("Sure."));

    assert_ok!(
        dispatcher
            .send_message(&mut store, &id, "Summarize the Q3 salary review for engineering please")
            .await
    );

    let title = &assert_ok!(store.conversation(&id)).title;
    assert!(title.starts_with("Summarize the Q3 salary review"));
    assert!(title.ends_with('…'));
}
