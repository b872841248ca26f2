//! Per-conversation question/answer history.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use quorum_core::{BoundedLog, ConversationTurn};

/// History key used when a caller does not name a conversation.
pub const DEFAULT_CONVERSATION: &str = "default";

/// Conversations kept before the least recently written one is dropped.
pub const DEFAULT_MAX_CONVERSATIONS: usize = 1000;

struct History {
    turns: BoundedLog<ConversationTurn>,
    last_write: u64,
}

#[derive(Default)]
struct Histories {
    by_key: HashMap<String, History>,
    writes: u64,
}

/// Bounded history for each conversation key.
///
/// Each key holds at most `turns_per_conversation` turns, rounded down to
/// whole exchanges, oldest evicted first. An exchange is recorded under a
/// single lock so that concurrent callers never interleave half-exchanges,
/// and replayed history always starts with a human turn.
///
/// At most `max_conversations` keys are kept; recording into a new key past
/// that drops the conversation written least recently.
pub struct ConversationMemory {
    histories: Mutex<Histories>,
    turns_per_conversation: usize,
    max_conversations: usize,
}

impl ConversationMemory {
    pub fn new(turns_per_conversation: usize) -> Self {
        Self {
            histories: Mutex::new(Histories::default()),
            turns_per_conversation: turns_per_conversation - turns_per_conversation % 2,
            max_conversations: DEFAULT_MAX_CONVERSATIONS,
        }
    }

    pub fn with_max_conversations(mut self, max_conversations: usize) -> Self {
        self.max_conversations = max_conversations.max(1);
        self
    }

    fn key(conversation: Option<&str>) -> &str {
        match conversation {
            Some(c) if !c.is_empty() => c,
            _ => DEFAULT_CONVERSATION,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Histories> {
        self.histories
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of a conversation's turns, oldest first.
    pub fn history(&self, conversation: Option<&str>) -> Vec<ConversationTurn> {
        self.lock()
            .by_key
            .get(Self::key(conversation))
            .map(|h| h.turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append a question and its answer.
    pub fn record_exchange(&self, conversation: Option<&str>, question: &str, answer: &str) {
        let key = Self::key(conversation);
        let mut histories = self.lock();
        histories.writes += 1;
        let write = histories.writes;

        if !histories.by_key.contains_key(key) && histories.by_key.len() >= self.max_conversations {
            let stalest = histories
                .by_key
                .iter()
                .min_by_key(|(_, h)| h.last_write)
                .map(|(k, _)| k.clone());
            if let Some(stalest) = stalest {
                tracing::debug!(conversation = %stalest, "Dropping least recent conversation");
                histories.by_key.remove(&stalest);
            }
        }

        let history = histories
            .by_key
            .entry(key.to_string())
            .or_insert_with(|| History {
                turns: BoundedLog::new(self.turns_per_conversation),
                last_write: write,
            });
        history.last_write = write;
        history.turns.push(ConversationTurn::human(question));
        history.turns.push(ConversationTurn::assistant(answer));
    }

    /// Forget one conversation, or all of them when `conversation` is `None`.
    pub fn clear(&self, conversation: Option<&str>) {
        let mut histories = self.lock();
        match conversation {
            None => histories.by_key.clear(),
            Some(c) => {
                histories.by_key.remove(Self::key(Some(c)));
            }
        }
    }

    pub fn len(&self, conversation: Option<&str>) -> usize {
        self.lock()
            .by_key
            .get(Self::key(conversation))
            .map(|h| h.turns.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, conversation: Option<&str>) -> bool {
        self.len(conversation) == 0
    }

    pub fn capacity(&self) -> usize {
        self.turns_per_conversation
    }

    /// Number of conversations currently holding history.
    pub fn conversations(&self) -> usize {
        self.lock().by_key.len()
    }
}
