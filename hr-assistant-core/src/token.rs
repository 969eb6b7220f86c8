use crate::message::Message;

/// Fixed cost charged per message for role and framing
const MESSAGE_OVERHEAD: usize = 4;

/// A rough token counter used to size outgoing request history
///
/// Whitespace-separated words stand in for tokens. That is enough to keep a
/// request under a provider's context window with some margin; it is not
/// meant for billing.
///
/// # Examples
///
/// ```
/// use hr_assistant_core::TokenCounter;
///
/// let mut counter = TokenCounter::default();
/// counter.observe("Hello, world!");
/// assert_eq!(counter.total(), 2);
/// assert!(counter.under_budget(10));
/// ```
#[derive(Default, Clone, Debug)]
pub struct TokenCounter {
    total: usize,
}

impl TokenCounter {
    pub fn new() -> Self {
        Self { total: 0 }
    }

    /// Counts the tokens in a string
    pub fn count_tokens(text: &str) -> usize {
        text.split_whitespace().count()
    }

    /// Counts a message's content plus per-message overhead
    pub fn count_message(msg: &Message) -> usize {
        Self::count_tokens(&msg.content) + MESSAGE_OVERHEAD
    }

    pub fn observe(&mut self, text: &str) {
        self.total += Self::count_tokens(text);
    }

    pub fn observe_message(&mut self, msg: &Message) {
        self.total += Self::count_message(msg);
    }

    /// Saturates at zero
    pub fn subtract_message(&mut self, msg: &Message) {
        self.total = self.total.saturating_sub(Self::count_message(msg));
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn under_budget(&self, max: usize) -> bool {
        self.total <= max
    }
}
