//! In-memory interaction history replayed into every prompt.

use crate::error::HistoryError;

use serde::Serialize;

/// One completed exchange between a user and the bot.
///
/// Only ever created after a fully successful generation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionRecord {
    user_name: String,
    user_prompt: String,
    bot_response: String,
}

impl InteractionRecord {
    pub fn new(
        user_name: impl Into<String>,
        user_prompt: impl Into<String>,
        bot_response: impl Into<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            user_prompt: user_prompt.into(),
            bot_response: bot_response.into(),
        }
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn user_prompt(&self) -> &str {
        &self.user_prompt
    }

    pub fn bot_response(&self) -> &str {
        &self.bot_response
    }
}

/// Ordered interaction history, oldest first.
///
/// Grows without bound; only `pop_last` and `clear` shrink it.
#[derive(Debug, Clone, Default)]
pub struct History {
    records: Vec<InteractionRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: InteractionRecord) {
        self.records.push(record);
    }

    /// Remove and return the most recent record.
    pub fn pop_last(&mut self) -> Result<InteractionRecord, HistoryError> {
        self.records.pop().ok_or(HistoryError::Empty)
    }

    /// Empty the history, returning how many records were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.records.len();
        self.records.clear();
        removed
    }

    /// Up to the last `n` records, oldest of the window first.
    pub fn recent(&self, n: usize) -> Vec<InteractionRecord> {
        let start = self.records.len().saturating_sub(n);
        self.records[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in chronological order.
    pub fn iter(&self) -> std::slice::Iter<'_, InteractionRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[InteractionRecord] {
        &self.records
    }
}

#[cfg(test)]
mod tests {
    use super::{History, InteractionRecord};
    use crate::error::HistoryError;

    fn record(i: usize) -> InteractionRecord {
        InteractionRecord::new(format!("user{i}"), format!("prompt {i}"), format!("reply {i}"))
    }

    fn history_of(n: usize) -> History {
        let mut history = History::new();
        for i in 0..n {
            history.append(record(i));
        }
        history
    }

    #[test]
    fn appends_preserve_count_and_order() {
        let history = history_of(4);

        assert_eq!(history.len(), 4);
        let prompts: Vec<_> = history.iter().map(|r| r.user_prompt()).collect();
        assert_eq!(prompts, vec!["prompt 0", "prompt 1", "prompt 2", "prompt 3"]);
    }

    #[test]
    fn appends_never_deduplicate() {
        let mut history = History::new();
        history.append(record(1));
        history.append(record(1));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn pop_last_returns_most_recent() {
        let mut history = history_of(3);

        let popped = history.pop_last().expect("history has records");

        assert_eq!(popped, record(2));
        assert_eq!(history.len(), 2);
        assert_eq!(history.as_slice().last(), Some(&record(1)));
    }

    #[test]
    fn pop_last_on_empty_fails_without_change() {
        let mut history = History::new();

        assert_eq!(history.pop_last(), Err(HistoryError::Empty));
        assert!(history.is_empty());
    }

    #[test]
    fn clear_reports_prior_size() {
        let mut history = history_of(5);
        assert_eq!(history.clear(), 5);
        assert!(history.is_empty());
        assert_eq!(history.clear(), 0);
    }

    #[test]
    fn recent_is_chronological_window() {
        let history = history_of(5);

        let window = history.recent(2);

        assert_eq!(window, vec![record(3), record(4)]);
    }

    #[test]
    fn recent_larger_than_history_returns_all() {
        let history = history_of(3);
        assert_eq!(history.recent(10), vec![record(0), record(1), record(2)]);
        assert!(history.recent(0).is_empty());
        assert!(History::new().recent(3).is_empty());
    }
}
