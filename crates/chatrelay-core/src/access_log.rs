//! Access log sink: write-once audit records (ip, bot, action) in the `access_logs` tree.
//! Keys are `{unix_nanos:020}_{seq:010}` so iteration order is chronological.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::storage::{Storage, StoreError};

const ACCESS_LOG_TREE: &str = "access_logs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogEntry {
    /// `YYYY-MM-DD` (UTC).
    pub date: String,
    /// `HH:MM:SS` (UTC).
    pub time: String,
    pub ip: String,
    pub bot_name: String,
    pub action: String,
}

impl AccessLogEntry {
    pub fn new(ip: &str, bot_name: &str, action: &str, at: DateTime<Utc>) -> Self {
        Self {
            date: at.format("%Y-%m-%d").to_string(),
            time: at.format("%H:%M:%S").to_string(),
            ip: ip.to_string(),
            bot_name: bot_name.to_string(),
            action: action.to_string(),
        }
    }
}

pub struct AccessLogSink {
    tree: sled::Tree,
    seq: AtomicU64,
}

impl AccessLogSink {
    pub fn open(storage: &Storage) -> Result<Self, StoreError> {
        Ok(Self {
            tree: storage.tree(ACCESS_LOG_TREE)?,
            seq: AtomicU64::new(0),
        })
    }

    /// Persist one entry; returns its key.
    pub fn record(&self, entry: &AccessLogEntry) -> Result<String, StoreError> {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or(0).max(0);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let key = format!("{:020}_{:010}", nanos, seq);
        self.tree.insert(key.as_bytes(), serde_json::to_vec(entry)?)?;
        tracing::info!(ip = %entry.ip, bot = %entry.bot_name, action = %entry.action, "access logged");
        Ok(key)
    }

    /// Newest entries first.
    pub fn recent(&self, limit: usize) -> Result<Vec<AccessLogEntry>, StoreError> {
        self.tree
            .iter()
            .values()
            .rev()
            .take(limit)
            .map(|v| -> Result<AccessLogEntry, StoreError> { Ok(serde_json::from_slice(&v?)?) })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.tree.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn entry_splits_date_and_time() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let e = AccessLogEntry::new("10.0.0.1", "Flashcards", "open", at);
        assert_eq!(e.date, "2024-03-09");
        assert_eq!(e.time, "14:05:07");
    }

    #[test]
    fn recent_is_newest_first() {
        let sink = AccessLogSink::open(&Storage::temporary().unwrap()).unwrap();
        for action in ["first", "second", "third"] {
            sink.record(&AccessLogEntry::new("ip", "bot", action, Utc::now()))
                .unwrap();
        }
        let recent = sink.recent(2).unwrap();
        let actions: Vec<&str> = recent.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["third", "second"]);
        assert_eq!(sink.count(), 3);
    }
}
