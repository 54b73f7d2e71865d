//! Rolling window of aired scripts.
//!
//! [`ScriptHistory`] remembers the last few scripts the DJ spoke.  The most
//! recent ones are fed back into the next prompt so the writer does not
//! repeat itself, and the front-end shows them in the DJ stats.

use std::collections::VecDeque;

/// Scripts kept in the window.
pub const HISTORY_CAPACITY: usize = 10;

/// Scripts fed back into the next prompt.
pub const PROMPT_FEEDBACK: usize = 3;

#[derive(Debug, Clone)]
pub struct ScriptHistory {
    scripts: VecDeque<String>,
    capacity: usize,
}

impl ScriptHistory {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scripts: VecDeque::with_capacity(capacity + 1),
            capacity: capacity.max(1),
        }
    }

    /// Record an aired script, dropping the oldest beyond capacity.
    pub fn push(&mut self, script: String) {
        self.scripts.push_back(script);
        while self.scripts.len() > self.capacity {
            self.scripts.pop_front();
        }
    }

    /// The last `n` scripts, oldest first.
    pub fn recent(&self, n: usize) -> Vec<String> {
        let skip = self.scripts.len().saturating_sub(n);
        self.scripts.iter().skip(skip).cloned().collect()
    }

    /// Scripts to include in the next prompt.
    pub fn prompt_feedback(&self) -> Vec<String> {
        self.recent(PROMPT_FEEDBACK)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }
}

impl Default for ScriptHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let history = ScriptHistory::new();
        assert!(history.is_empty());
        assert!(history.prompt_feedback().is_empty());
    }

    #[test]
    fn window_caps_at_capacity() {
        let mut history = ScriptHistory::new();
        for i in 0..15 {
            history.push(format!("script {i}"));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert_eq!(history.recent(1), vec!["script 14".to_string()]);
        assert_eq!(history.recent(100).first().map(String::as_str), Some("script 5"));
    }

    #[test]
    fn feedback_is_last_three_oldest_first() {
        let mut history = ScriptHistory::new();
        for s in ["a", "b", "c", "d"] {
            history.push(s.to_string());
        }
        assert_eq!(history.prompt_feedback(), vec!["b", "c", "d"]);
    }
}
