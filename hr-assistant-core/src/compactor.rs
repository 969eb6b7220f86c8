use std::collections::VecDeque;

use tracing::debug;

use crate::message::Message;
use crate::token::TokenCounter;

/// Picks the slice of a conversation that goes out with a request.
///
/// Implementations work on a copy: the stored conversation is append-only
/// and never trimmed.
pub trait ChatHistoryCompactor: Send + Sync {
    /// Returns the messages to send, oldest first, fitting `max_tokens`
    fn compact(&self, history: &[Message], max_tokens: usize) -> Vec<Message>;
}

/// Compactor that drops oldest messages first
///
/// The newest message is always kept, even if on its own it exceeds the budget,
/// so a request never goes out empty.
#[derive(Debug, Default, Clone)]
pub struct DropOldestCompactor {}

impl ChatHistoryCompactor for DropOldestCompactor {
    fn compact(&self, history: &[Message], max_tokens: usize) -> Vec<Message> {
        let mut counter = TokenCounter::default();
        let mut window: VecDeque<Message> = history.iter().cloned().collect();
        for msg in &window {
            counter.observe_message(msg);
        }

        while !counter.under_budget(max_tokens) && window.len() > 1 {
            if let Some(dropped) = window.pop_front() {
                counter.subtract_message(&dropped);
            }
        }

        if window.len() < history.len() {
            debug!(
                kept = window.len(),
                dropped = history.len() - window.len(),
                tokens = counter.total(),
                "Compacted request history"
            );
        }
        window.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_oldest_compactor() {
        let compactor = DropOldestCompactor::default();
        let history = vec![
            Message::user("First user message"),
            Message::assistant("First assistant message"),
            Message::user("Second user message"),
        ];

        // each message is 3 words + 4 overhead
        let window = compactor.compact(&history, 14);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "First assistant message");
        assert_eq!(window[1].content, "Second user message");
    }

    #[test]
    fn keeps_everything_under_budget() {
        let compactor = DropOldestCompactor::default();
        let history = vec![Message::user("hi"), Message::assistant("hello")];
        assert_eq!(compactor.compact(&history, 1_000), history);
    }

    #[test]
    fn newest_message_survives_tiny_budget() {
        let compactor = DropOldestCompactor::default();
        let history = vec![Message::user("a b c"), Message::user("d e f g h")];
        let window = compactor.compact(&history, 1);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].content, "d e f g h");
    }
}
