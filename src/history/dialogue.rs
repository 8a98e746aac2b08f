//! Append-only dialogue log.
//!
//! [`DialogueHistory`] keeps every [`Turn`] of a session in conversational
//! order.  The whole log is replayed to the conversant on each exchange, so
//! order is significant and entries are never edited in place.
//!
//! By default the log is unbounded.  [`DialogueHistory::with_max_turns`]
//! caps the number of non-system turns; once the cap is exceeded the oldest
//! `user`/`assistant` turns are dropped while `system` turns are kept.  The
//! turn just appended is never dropped, so a snapshot taken right after an
//! append always ends with it, whatever the cap.

use std::collections::VecDeque;

use super::turn::{Role, Turn};

// ---------------------------------------------------------------------------
// DialogueHistory
// ---------------------------------------------------------------------------

/// Ordered log of role-tagged turns.
///
/// # Example
/// ```rust
/// use voice_chat::history::{DialogueHistory, Turn};
///
/// let mut history = DialogueHistory::new();
/// history.append(Turn::user("hello"));
/// history.append(Turn::assistant("hi there"));
///
/// let snapshot = history.snapshot();
/// history.append(Turn::user("still there?"));
///
/// // The snapshot does not observe later appends.
/// assert_eq!(snapshot.len(), 2);
/// assert_eq!(history.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DialogueHistory {
    turns: VecDeque<Turn>,
    max_turns: Option<usize>,
}

impl DialogueHistory {
    /// Create an empty, unbounded history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty history that holds at most `max_turns` non-system
    /// turns.
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns + 1),
            max_turns: Some(max_turns),
        }
    }

    /// Create a history from session settings: an optional cap and an
    /// optional system prompt seeded as the first turn.
    ///
    /// ```rust
    /// use voice_chat::history::{DialogueHistory, Role};
    ///
    /// let history = DialogueHistory::seeded(Some("Answer briefly."), Some(10));
    /// assert_eq!(history.len(), 1);
    /// assert_eq!(history.last().map(|t| t.role()), Some(Role::System));
    /// ```
    pub fn seeded(system_prompt: Option<&str>, max_turns: Option<usize>) -> Self {
        let mut history = match max_turns {
            Some(max) => Self::with_max_turns(max),
            None => Self::new(),
        };
        if let Some(prompt) = system_prompt.filter(|p| !p.trim().is_empty()) {
            history.append(Turn::system(prompt));
        }
        history
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Append `turn` at the end of the log.
    ///
    /// Never fails.  In bounded mode the oldest non-system turns are evicted
    /// until the cap holds again; `turn` itself always stays, even with a
    /// cap of zero.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push_back(turn);

        if let Some(max) = self.max_turns {
            while self.non_system_len() > max {
                let older = self.turns.len() - 1;
                match self
                    .turns
                    .iter()
                    .take(older)
                    .position(|t| t.role() != Role::System)
                {
                    Some(idx) => {
                        self.turns.remove(idx);
                    }
                    None => break,
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Owned copy of the full log, oldest first.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Iterate over the turns, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    /// Most recent turn, if any.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }

    /// Total number of turns, including system turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Configured cap on non-system turns, if any.
    pub fn max_turns(&self) -> Option<usize> {
        self.max_turns
    }

    fn non_system_len(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.role() != Role::System)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
