//! Role-tagged dialogue turns.
//!
//! A [`Turn`] serialises to the `{"role": …, "content": …}` shape expected by
//! OpenAI-compatible chat endpoints, so a history snapshot can be embedded in
//! a request body as-is.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Who produced a [`Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Standing instructions seeded at session start.
    System,
    /// Transcribed speech from the person talking.
    User,
    /// Reply produced by the conversant.
    Assistant,
}

impl Role {
    /// Wire name of the role (`"system"`, `"user"`, `"assistant"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// One exchange unit in a conversation.
///
/// Fields are private so a turn cannot be altered once it has been
/// appended to a [`DialogueHistory`](crate::history::DialogueHistory).
///
/// ```
/// use voice_chat::history::{Role, Turn};
///
/// let turn = Turn::user("hello");
/// assert_eq!(turn.role(), Role::User);
/// assert_eq!(turn.content(), "hello");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_to_chat_message_shape() {
        let json = serde_json::to_value(Turn::assistant("hi there")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "role": "assistant", "content": "hi there" })
        );
    }

    #[test]
    fn deserialises_lowercase_roles() {
        let turn: Turn =
            serde_json::from_str(r#"{"role":"system","content":"be brief"}"#).unwrap();
        assert_eq!(turn, Turn::system("be brief"));
    }

    #[test]
    fn role_display_matches_wire_name() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.as_str(), "assistant");
    }
}
