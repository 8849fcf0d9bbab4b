//! Conversation turns and the role normalization applied before every model call.
//!
//! The model API rejects two consecutive turns with the same role, so supplied history is
//! collapsed to alternate roles before it is sent.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "bot", alias = "assistant")]
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One message of a conversation.
///
/// Serialized in the Gemini shape `{ "role": "user", "parts": [{ "text": "..." }] }`.
/// Deserialization also accepts `{ "role", "text" }` and `{ "role", "content" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TurnWire", into = "TurnWire")]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PartWire {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Deserialize)]
struct TurnWire {
    role: Role,
    #[serde(default, alias = "content", skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default)]
    parts: Vec<PartWire>,
}

impl From<TurnWire> for Turn {
    fn from(w: TurnWire) -> Self {
        let text = match w.text {
            Some(t) => t,
            None => w
                .parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join(""),
        };
        Turn { role: w.role, text }
    }
}

impl From<Turn> for TurnWire {
    fn from(t: Turn) -> Self {
        TurnWire {
            role: t.role,
            text: None,
            parts: vec![PartWire { text: t.text }],
        }
    }
}

/// Drop every turn whose role equals the role of the turn kept before it.
/// Keeps the first turn of each same-role run; order is preserved.
pub fn collapse_roles(turns: impl IntoIterator<Item = Turn>) -> Vec<Turn> {
    let mut out: Vec<Turn> = Vec::new();
    for turn in turns {
        if out.last().map(|last| last.role) != Some(turn.role) {
            out.push(turn);
        }
    }
    out
}

/// Model contents for a new user message: collapsed prior history, minus a dangling
/// unanswered user turn, followed by the message itself.
pub fn prepare_contents(history: impl IntoIterator<Item = Turn>, message: &str) -> Vec<Turn> {
    let mut contents = collapse_roles(history);
    if contents.last().map(|t| t.role) == Some(Role::User) {
        contents.pop();
    }
    contents.push(Turn::user(message));
    contents
}
