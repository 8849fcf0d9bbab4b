//! History store: conversations kept as JSON documents in the `chats` tree.
//!
//! Key: conversation id (UUID v4 string). Value: the serialized [`Conversation`].
//! Turns are only ever appended; the title is the one field that can be rewritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::{Storage, StoreError};
use crate::turns::Turn;

const CHATS_TREE: &str = "chats";
const TITLE_PREFIX_CHARS: usize = 50;

/// Owner recorded when a conversation is created without a user id.
pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<Turn>,
    pub created_at: DateTime<Utc>,
}

/// Initial title for a conversation started from `prompt`: its first 50 characters plus "...".
pub fn title_from_prompt(prompt: &str) -> String {
    let head: String = prompt.chars().take(TITLE_PREFIX_CHARS).collect();
    format!("{}...", head)
}

pub struct HistoryStore {
    tree: sled::Tree,
}

impl HistoryStore {
    pub fn open(storage: &Storage) -> Result<Self, StoreError> {
        Ok(Self {
            tree: storage.tree(CHATS_TREE)?,
        })
    }

    /// Validate an externally supplied id. Anything that is not a UUID is a client error.
    pub fn parse_id(id: &str) -> Result<Uuid, StoreError> {
        Uuid::parse_str(id.trim()).map_err(|_| StoreError::InvalidId(id.to_string()))
    }

    /// Store a new conversation with its initial turns.
    pub fn create(
        &self,
        user_id: Option<&str>,
        title: Option<&str>,
        messages: Vec<Turn>,
    ) -> Result<Conversation, StoreError> {
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            user_id: user_id
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .unwrap_or(ANONYMOUS_USER)
                .to_string(),
            title: title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            messages,
            created_at: Utc::now(),
        };
        self.tree.insert(
            conversation.id.as_bytes(),
            serde_json::to_vec(&conversation)?,
        )?;
        tracing::debug!(chat_id = %conversation.id, user_id = %conversation.user_id, "conversation created");
        Ok(conversation)
    }

    pub fn get(&self, id: &str) -> Result<Option<Conversation>, StoreError> {
        let key = Self::parse_id(id)?.to_string();
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Append turns in order (user turn, then model turn) to an existing conversation.
    pub fn append_turns(&self, id: &str, turns: &[Turn]) -> Result<Conversation, StoreError> {
        self.modify(id, |c| c.messages.extend_from_slice(turns))
    }

    pub fn rename_title(&self, id: &str, title: &str) -> Result<Conversation, StoreError> {
        let title = title.trim().to_string();
        self.modify(id, move |c| c.title = Some(title.clone()))
    }

    /// Returns `false` when no conversation had this id.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let key = Self::parse_id(id)?.to_string();
        Ok(self.tree.remove(key.as_bytes())?.is_some())
    }

    /// Conversations owned by `user_id`, newest first.
    pub fn list_by_owner(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let mut owned: Vec<Conversation> = self
            .all()?
            .into_iter()
            .filter(|c| c.user_id == user_id)
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    /// Most recently created conversations across all users.
    pub fn recent(&self, limit: usize) -> Result<Vec<Conversation>, StoreError> {
        let mut all = self.all()?;
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    pub fn all(&self) -> Result<Vec<Conversation>, StoreError> {
        self.tree
            .iter()
            .values()
            .map(|v| -> Result<Conversation, StoreError> { Ok(serde_json::from_slice(&v?)?) })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.tree.len()
    }

    /// Read-modify-write with compare-and-swap so concurrent appends are not lost.
    fn modify(
        &self,
        id: &str,
        apply: impl Fn(&mut Conversation),
    ) -> Result<Conversation, StoreError> {
        let key = Self::parse_id(id)?.to_string();
        loop {
            let current = self
                .tree
                .get(key.as_bytes())?
                .ok_or_else(|| StoreError::NotFound(key.clone()))?;
            let mut conversation: Conversation = serde_json::from_slice(&current)?;
            apply(&mut conversation);
            let next = serde_json::to_vec(&conversation)?;
            match self
                .tree
                .compare_and_swap(key.as_bytes(), Some(&current), Some(next))?
            {
                Ok(()) => return Ok(conversation),
                Err(_) => {
                    tracing::debug!(chat_id = %key, "conversation changed concurrently, retrying");
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_prefix_with_ellipsis() {
        assert_eq!(title_from_prompt("Olá"), "Olá...");
        let long = "x".repeat(80);
        assert_eq!(title_from_prompt(&long), format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn title_counts_characters_not_bytes() {
        let accented = "ç".repeat(60);
        assert_eq!(title_from_prompt(&accented).chars().count(), 53);
    }

    #[test]
    fn malformed_id_is_rejected_before_lookup() {
        let store = HistoryStore::open(&Storage::temporary().unwrap()).unwrap();
        assert!(matches!(store.get("not-a-uuid"), Err(StoreError::InvalidId(_))));
        assert!(matches!(store.delete("123"), Err(StoreError::InvalidId(_))));
    }

    #[test]
    fn blank_owner_becomes_anonymous() {
        let store = HistoryStore::open(&Storage::temporary().unwrap()).unwrap();
        let c = store.create(Some("  "), None, vec![]).unwrap();
        assert_eq!(c.user_id, ANONYMOUS_USER);
        assert_eq!(c.title, None);
    }
}
