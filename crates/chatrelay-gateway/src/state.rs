//! Process-wide handles shared by every request. Opened once at startup.

use std::sync::Arc;

use chatrelay_core::{
    AccessLogSink, ChatModel, ChatRelay, GlobalInstruction, HistoryStore, InMemoryRanking,
    InstructionResolver, RankingStore, Storage, StoreError, UserDirectory,
};

use crate::config::GatewayConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub history: Arc<HistoryStore>,
    pub access_log: Arc<AccessLogSink>,
    pub users: Arc<UserDirectory>,
    pub global_instruction: Arc<GlobalInstruction>,
    pub resolver: Arc<InstructionResolver>,
    pub ranking: Arc<dyn RankingStore>,
    pub relay: Arc<ChatRelay>,
    storages: Arc<Vec<Storage>>,
}

impl AppState {
    pub async fn initialize(
        config: GatewayConfig,
        model: Arc<dyn ChatModel>,
    ) -> Result<Self, StoreError> {
        let history_path = config.history_path();
        let logs_path = config.logs_path();

        let history_db = Storage::open(Some(&history_path))?;
        let logs_db = if config.logs_share_history_db() {
            history_db.clone()
        } else {
            Storage::open(Some(&logs_path))?
        };

        let history = Arc::new(HistoryStore::open(&history_db)?);
        let global_instruction = Arc::new(GlobalInstruction::open(&history_db)?);
        let access_log = Arc::new(AccessLogSink::open(&logs_db)?);
        let users = Arc::new(UserDirectory::load_or_seed(config.users_path()).await?);

        let mut resolver = InstructionResolver::new(users.clone(), global_instruction.clone());
        if let Some(default) = config
            .default_instruction
            .as_deref()
            .filter(|d| !d.trim().is_empty())
        {
            resolver = resolver.with_default(default);
        }
        let resolver = Arc::new(resolver);
        let relay = Arc::new(ChatRelay::new(history.clone(), resolver.clone(), model));

        tracing::info!(
            history = %history_path.display(),
            logs = %logs_path.display(),
            users = %users.path().display(),
            conversations = history.count(),
            "storage opened"
        );

        Ok(Self {
            config: Arc::new(config),
            history,
            access_log,
            users,
            global_instruction,
            resolver,
            ranking: Arc::new(InMemoryRanking::new()),
            relay,
            storages: Arc::new(vec![history_db, logs_db]),
        })
    }

    /// Flush every open database; called on shutdown.
    pub async fn flush(&self) {
        for storage in self.storages.iter() {
            if let Err(e) = storage.flush().await {
                tracing::warn!(error = %e, "flush on shutdown failed");
            }
        }
    }
}
