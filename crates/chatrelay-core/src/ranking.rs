//! Bot ranking: access counters per bot id. Lives for the process only.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    #[serde(rename = "botId")]
    pub bot_id: String,
    #[serde(rename = "nomeBot")]
    pub bot_name: String,
    #[serde(rename = "contagem")]
    pub count: u64,
    #[serde(rename = "ultimoAcesso")]
    pub last_access: DateTime<Utc>,
}

/// Store behind the ranking endpoints. Created at startup and shared through the gateway state.
pub trait RankingStore: Send + Sync {
    /// Count one access for `bot_id`; returns the updated entry.
    fn record_access(&self, bot_id: &str, bot_name: &str, at: DateTime<Utc>) -> RankingEntry;

    /// All entries, highest count first (ties by bot id).
    fn snapshot(&self) -> Vec<RankingEntry>;
}

#[derive(Default)]
pub struct InMemoryRanking {
    entries: DashMap<String, RankingEntry>,
}

impl InMemoryRanking {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RankingStore for InMemoryRanking {
    fn record_access(&self, bot_id: &str, bot_name: &str, at: DateTime<Utc>) -> RankingEntry {
        self.entries
            .entry(bot_id.to_string())
            .and_modify(|e| {
                e.count += 1;
                if at > e.last_access {
                    e.last_access = at;
                }
                if !bot_name.is_empty() {
                    e.bot_name = bot_name.to_string();
                }
            })
            .or_insert_with(|| RankingEntry {
                bot_id: bot_id.to_string(),
                bot_name: bot_name.to_string(),
                count: 1,
                last_access: at,
            })
            .clone()
    }

    fn snapshot(&self) -> Vec<RankingEntry> {
        let mut all: Vec<RankingEntry> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.bot_id.cmp(&b.bot_id)));
        all
    }
}
