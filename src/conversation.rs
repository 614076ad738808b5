use crate::types::Message;

use clap::ValueEnum;

/// Whether answered queries are remembered for the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum HistoryMode {
    /// Keep each user query and its final answer. Tool turns are dropped.
    #[default]
    Persist,
    /// Every query starts from an empty history.
    Reset,
}

/// The long-lived message log of one session. Only grows, in order.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    mode: HistoryMode,
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new(mode: HistoryMode) -> Self {
        Self {
            mode,
            messages: vec![],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Records a resolved query. In `Reset` mode nothing is kept.
    pub fn record_exchange(&mut self, query: &str, answer: &str) {
        if self.mode == HistoryMode::Persist {
            self.messages.push(Message::user(query));
            self.messages.push(Message::assistant(Some(answer.to_string()), vec![]));
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
