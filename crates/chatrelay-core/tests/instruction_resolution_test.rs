//! Integration test: InstructionResolver fallback chain.
//!
//! per-user override -> global override -> default, with failing sources skipped.

use async_trait::async_trait;
use chatrelay_core::{
    GlobalInstruction, GlobalInstructionSource, InstructionResolver, Storage, StoreError,
    UserDirectory, UserInstructionSource, DEFAULT_SYSTEM_INSTRUCTION,
};
use std::sync::Arc;

struct FailingSource;

#[async_trait]
impl UserInstructionSource for FailingSource {
    async fn user_instruction(&self, _user_id: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "directory offline",
        )))
    }
}

#[async_trait]
impl GlobalInstructionSource for FailingSource {
    async fn global_instruction(&self) -> Result<Option<String>, StoreError> {
        Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "settings offline",
        )))
    }
}

async fn setup() -> (tempfile::TempDir, Arc<UserDirectory>, Arc<GlobalInstruction>) {
    let dir = tempfile::tempdir().unwrap();
    let users = Arc::new(
        UserDirectory::load_or_seed(dir.path().join("users.json"))
            .await
            .unwrap(),
    );
    let storage = Storage::temporary().unwrap();
    let global = Arc::new(GlobalInstruction::open(&storage).unwrap());
    (dir, users, global)
}

#[tokio::test]
async fn per_user_value_wins_regardless_of_global() {
    let (_dir, users, global) = setup().await;
    users
        .update_instruction("user123", "Fale como um pirata.")
        .await
        .unwrap();
    global.set("Seja formal.").await.unwrap();
    let resolver = InstructionResolver::new(users.clone(), global.clone());

    assert_eq!(resolver.resolve(Some("user123")).await, "Fale como um pirata.");
    assert_eq!(resolver.resolve(Some("user456")).await, "Seja formal.");
}

#[tokio::test]
async fn global_then_default_when_user_has_no_override() {
    let (_dir, users, global) = setup().await;
    let resolver = InstructionResolver::new(users.clone(), global.clone());

    assert_eq!(resolver.resolve(Some("user123")).await, DEFAULT_SYSTEM_INSTRUCTION);
    assert_eq!(resolver.resolve(None).await, DEFAULT_SYSTEM_INSTRUCTION);
    assert_eq!(resolver.resolve(Some("unknown")).await, DEFAULT_SYSTEM_INSTRUCTION);

    global.set("Responda em inglês.").await.unwrap();
    assert_eq!(resolver.resolve(Some("user123")).await, "Responda em inglês.");
}

#[tokio::test]
async fn failing_sources_fall_through_to_next_link() {
    let (_dir, users, global) = setup().await;
    global.set("Global.").await.unwrap();

    let user_down = InstructionResolver::new(Arc::new(FailingSource), global.clone());
    assert_eq!(user_down.resolve(Some("user123")).await, "Global.");

    users.update_instruction("user123", "Pessoal.").await.unwrap();
    let global_down = InstructionResolver::new(users.clone(), Arc::new(FailingSource));
    assert_eq!(global_down.resolve(Some("user123")).await, "Pessoal.");
    assert_eq!(global_down.resolve(Some("user456")).await, DEFAULT_SYSTEM_INSTRUCTION);

    let all_down = InstructionResolver::new(Arc::new(FailingSource), Arc::new(FailingSource))
        .with_default("Padrão configurado.");
    assert_eq!(all_down.resolve(Some("user123")).await, "Padrão configurado.");
}
