//! System instruction resolution: per-user override, then global admin override, then the
//! built-in default. A failing source is logged and skipped; resolution itself never fails.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::{Storage, StoreError};

pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "Você é um chatbot prestativo.";

const SETTINGS_TREE: &str = "settings";
const GLOBAL_INSTRUCTION_KEY: &[u8] = b"system_instruction";

/// First non-blank of `user` and `global`, else `default`.
pub fn resolve_instruction<'a>(
    user: Option<&'a str>,
    global: Option<&'a str>,
    default: &'a str,
) -> &'a str {
    [user, global]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .unwrap_or(default)
}

/// Source of per-user instruction overrides.
#[async_trait]
pub trait UserInstructionSource: Send + Sync {
    async fn user_instruction(&self, user_id: &str) -> Result<Option<String>, StoreError>;
}

/// Source of the admin-set global instruction.
#[async_trait]
pub trait GlobalInstructionSource: Send + Sync {
    async fn global_instruction(&self) -> Result<Option<String>, StoreError>;
}

/// Admin-set global instruction: persisted in the `settings` tree, cached in memory.
/// Loaded once when opened; every write goes to sled first, then to the cache.
pub struct GlobalInstruction {
    tree: sled::Tree,
    cached: RwLock<Option<String>>,
}

impl GlobalInstruction {
    pub fn open(storage: &Storage) -> Result<Self, StoreError> {
        let tree = storage.tree(SETTINGS_TREE)?;
        let cached = match tree.get(GLOBAL_INSTRUCTION_KEY)? {
            Some(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            None => None,
        };
        Ok(Self {
            tree,
            cached: RwLock::new(cached),
        })
    }

    pub async fn get(&self) -> Option<String> {
        self.cached.read().await.clone()
    }

    pub async fn set(&self, instruction: &str) -> Result<(), StoreError> {
        let mut guard = self.cached.write().await;
        self.tree
            .insert(GLOBAL_INSTRUCTION_KEY, instruction.as_bytes())?;
        *guard = Some(instruction.to_string());
        tracing::info!(chars = instruction.chars().count(), "global system instruction updated");
        Ok(())
    }

    /// Remove the override so resolution falls through to the default.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.cached.write().await;
        self.tree.remove(GLOBAL_INSTRUCTION_KEY)?;
        *guard = None;
        tracing::info!("global system instruction reset to default");
        Ok(())
    }
}

#[async_trait]
impl GlobalInstructionSource for GlobalInstruction {
    async fn global_instruction(&self) -> Result<Option<String>, StoreError> {
        Ok(self.get().await)
    }
}

pub struct InstructionResolver {
    users: Arc<dyn UserInstructionSource>,
    global: Arc<dyn GlobalInstructionSource>,
    default: String,
}

impl InstructionResolver {
    pub fn new(
        users: Arc<dyn UserInstructionSource>,
        global: Arc<dyn GlobalInstructionSource>,
    ) -> Self {
        Self {
            users,
            global,
            default: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = default.into();
        self
    }

    pub fn default_instruction(&self) -> &str {
        &self.default
    }

    /// Instruction for `user_id` (or for no particular user).
    pub async fn resolve(&self, user_id: Option<&str>) -> String {
        let user = match user_id {
            Some(id) => match self.users.user_instruction(id).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(user_id = id, error = %e, "user instruction unavailable, falling back");
                    None
                }
            },
            None => None,
        };
        let global = match self.global.global_instruction().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "global instruction unavailable, falling back");
                None
            }
        };
        resolve_instruction(user.as_deref(), global.as_deref(), &self.default).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_value_wins_over_global() {
        assert_eq!(resolve_instruction(Some("u"), Some("g"), "d"), "u");
        assert_eq!(resolve_instruction(Some("u"), None, "d"), "u");
    }

    #[test]
    fn global_value_when_user_blank_or_absent() {
        assert_eq!(resolve_instruction(None, Some("g"), "d"), "g");
        assert_eq!(resolve_instruction(Some(""), Some("g"), "d"), "g");
        assert_eq!(resolve_instruction(Some("   "), Some("g"), "d"), "g");
    }

    #[test]
    fn default_when_both_blank_or_absent() {
        assert_eq!(resolve_instruction(None, None, "d"), "d");
        assert_eq!(resolve_instruction(Some(""), Some(" \n"), "d"), "d");
    }

    #[tokio::test]
    async fn global_instruction_is_written_through_to_the_tree() {
        let storage = Storage::temporary().unwrap();
        let global = GlobalInstruction::open(&storage).unwrap();
        assert_eq!(global.get().await, None);
        global.set("Seja breve.").await.unwrap();

        let reloaded = GlobalInstruction::open(&storage).unwrap();
        assert_eq!(reloaded.get().await.as_deref(), Some("Seja breve."));

        global.clear().await.unwrap();
        assert_eq!(global.get().await, None);
        assert_eq!(GlobalInstruction::open(&storage).unwrap().get().await, None);
    }
}
