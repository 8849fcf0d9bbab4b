//! User directory: user records with their instruction override, persisted as a JSON file.
//!
//! There is no login; the gateway identifies the "logged-in" user by header or by a configured
//! default id. A missing file is seeded with two demo users and the admin record on first run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::instruction::UserInstructionSource;
use crate::storage::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    /// Empty means "use the global instruction".
    #[serde(default)]
    pub system_instruction: String,
}

pub struct UserDirectory {
    path: PathBuf,
    users: RwLock<BTreeMap<String, UserRecord>>,
}

impl UserDirectory {
    /// Load the directory file, creating it with seed users when it does not exist.
    /// An unreadable or corrupt file is logged and the directory starts empty (file untouched).
    pub async fn load_or_seed(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let users = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            match read_users(&path).await {
                Ok(users) => users,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "user directory unreadable, starting empty");
                    BTreeMap::new()
                }
            }
        } else {
            let seeded = seed_users();
            write_users(&path, &seeded).await?;
            tracing::info!(path = %path.display(), users = seeded.len(), "user directory seeded");
            seeded
        };
        Ok(Self {
            path,
            users: RwLock::new(users),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn find(&self, user_id: &str) -> Option<UserRecord> {
        self.users.read().await.get(user_id).cloned()
    }

    /// Set (trimmed) instruction override for an existing user and persist the file.
    /// Returns `None` when the user is unknown.
    pub async fn update_instruction(
        &self,
        user_id: &str,
        instruction: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let mut users = self.users.write().await;
        let updated = match users.get(user_id) {
            Some(user) => UserRecord {
                system_instruction: instruction.trim().to_string(),
                ..user.clone()
            },
            None => return Ok(None),
        };
        // The live map only changes once the file holds the new value.
        let mut next = users.clone();
        next.insert(user_id.to_string(), updated.clone());
        write_users(&self.path, &next).await?;
        *users = next;
        tracing::info!(user_id, "user system instruction updated");
        Ok(Some(updated))
    }
}

#[async_trait]
impl UserInstructionSource for UserDirectory {
    async fn user_instruction(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.find(user_id).await.map(|u| u.system_instruction))
    }
}

/// Instruction carried by the seeded admin record.
pub const ADMIN_SEED_INSTRUCTION: &str = "Você é um assistente de IA focado em criar flashcards para estudos. Sempre que o usuário pedir um tema, crie uma pergunta (com o emoji ❓ no final) e, em uma nova linha, a resposta (com o emoji 💡 no final), mas esconda a resposta. Apenas indique que a resposta está pronta.";

fn seed_users() -> BTreeMap<String, UserRecord> {
    [
        ("user123", "usuario_teste_1", ""),
        ("user456", "usuario_teste_2", ""),
        ("admin001", "admin", ADMIN_SEED_INSTRUCTION),
    ]
    .into_iter()
    .map(|(id, username, instruction)| {
        (
            id.to_string(),
            UserRecord {
                id: id.to_string(),
                username: username.to_string(),
                system_instruction: instruction.to_string(),
            },
        )
    })
    .collect()
}

async fn read_users(path: &Path) -> Result<BTreeMap<String, UserRecord>, StoreError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

async fn write_users(path: &Path, users: &BTreeMap<String, UserRecord>) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(users)?;
    tokio::fs::write(path, content).await?;
    Ok(())
}
