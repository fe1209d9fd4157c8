//! Conversation transcript: ordered turns plus the invariants tying them together

use serde::{Deserialize, Serialize};

/// Speaker role of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in the conversation. Immutable once appended; only the
/// leading system turn is ever replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Ordered sequence of turns for a single session.
///
/// Invariants: at most one system turn, always at index 0; user and
/// assistant turns alternate starting with user, though an in-flight
/// exchange may hold an unanswered trailing user turn.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Create a transcript seeded with a single system turn
    #[must_use]
    pub fn with_system(content: impl Into<String>) -> Self {
        Self { turns: vec![Turn::system(content)] }
    }

    /// Replace the leading system turn (inserting if absent) and drop all
    /// later turns. A system change invalidates prior exchange history.
    pub fn set_system_turn(&mut self, content: impl Into<String>) {
        self.turns.clear();
        self.turns.push(Turn::system(content));
    }

    /// Append a user turn
    pub fn append_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::user(content));
    }

    /// Append an assistant turn
    pub fn append_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::assistant(content));
    }

    /// Immutable copy of the full turn sequence, for handing to the
    /// inference client. Copying keeps the client's view stable if the
    /// transcript is reset while a request is in flight.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    /// Content of the leading system turn, empty if there is none
    #[must_use]
    pub fn system_content(&self) -> &str {
        match self.turns.first() {
            Some(turn) if turn.role == Role::System => &turn.content,
            _ => "",
        }
    }

    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::System, Role::User, Role::Assistant] {
            assert_eq!(Role::from_str(role.as_str()), Some(role));
        }
        assert_eq!(Role::from_str("narrator"), None);
    }

    #[test]
    fn test_system_turn_always_first() {
        let mut transcript = Transcript::with_system("be brief");
        transcript.append_user("hi");
        transcript.append_assistant("hello");
        transcript.set_system_turn("be verbose");

        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.turns()[0].role, Role::System);
        assert_eq!(transcript.system_content(), "be verbose");
    }

    #[test]
    fn test_set_system_turn_on_empty() {
        let mut transcript = Transcript::default();
        assert!(transcript.is_empty());

        transcript.set_system_turn("hello");
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.turns()[0], Turn::system("hello"));
    }

    #[test]
    fn test_appends_preserve_order() {
        let mut transcript = Transcript::with_system("sys");
        transcript.append_user("question");
        transcript.append_assistant("answer");

        let roles: Vec<Role> = transcript.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut transcript = Transcript::with_system("sys");
        transcript.append_user("question");

        let snapshot = transcript.snapshot();
        transcript.set_system_turn("other");

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1], Turn::user("question"));
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
