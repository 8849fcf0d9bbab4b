//! Admin dashboard: engagement depth, most active users and inconclusive-reply analysis,
//! computed over the stored conversations.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

use crate::history::Conversation;
use crate::turns::Role;

/// Conversations with at most this many turns count as short.
const SHORT_CONVERSATION_MAX_TURNS: usize = 3;
const TOP_USERS_LIMIT: usize = 5;

/// Model replies that signal the bot did not manage to help.
static INCONCLUSIVE_REPLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)não entendi|não posso ajudar com isso|pode reformular|desculpe, não compreendi")
        .expect("static pattern")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMetrics {
    pub average_message_count: f64,
    pub short_conversations: usize,
    pub long_conversations: usize,
    pub total_conversations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUser {
    pub user_id: String,
    pub chat_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedConversation {
    pub title: Option<String>,
    pub user_id: String,
    /// Matching model replies joined with `" | "`.
    pub messages: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureAnalysis {
    pub inconclusive_responses_count: usize,
    pub failed_conversations: Vec<FailedConversation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub engagement_metrics: EngagementMetrics,
    pub top_users: Vec<TopUser>,
    pub failure_analysis: FailureAnalysis,
}

pub fn is_inconclusive_reply(text: &str) -> bool {
    INCONCLUSIVE_REPLY.is_match(text)
}

pub fn build_dashboard(conversations: &[Conversation]) -> Dashboard {
    Dashboard {
        engagement_metrics: engagement(conversations),
        top_users: top_users(conversations, TOP_USERS_LIMIT),
        failure_analysis: failures(conversations),
    }
}

fn engagement(conversations: &[Conversation]) -> EngagementMetrics {
    let total = conversations.len();
    let turns: usize = conversations.iter().map(|c| c.messages.len()).sum();
    let short = conversations
        .iter()
        .filter(|c| c.messages.len() <= SHORT_CONVERSATION_MAX_TURNS)
        .count();
    EngagementMetrics {
        average_message_count: if total == 0 {
            0.0
        } else {
            turns as f64 / total as f64
        },
        short_conversations: short,
        long_conversations: total - short,
        total_conversations: total,
    }
}

fn top_users(conversations: &[Conversation], limit: usize) -> Vec<TopUser> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for c in conversations {
        *counts.entry(c.user_id.as_str()).or_default() += 1;
    }
    let mut users: Vec<TopUser> = counts
        .into_iter()
        .map(|(user_id, chat_count)| TopUser {
            user_id: user_id.to_string(),
            chat_count,
        })
        .collect();
    users.sort_by(|a, b| b.chat_count.cmp(&a.chat_count).then_with(|| a.user_id.cmp(&b.user_id)));
    users.truncate(limit);
    users
}

fn failures(conversations: &[Conversation]) -> FailureAnalysis {
    let failed: Vec<FailedConversation> = conversations
        .iter()
        .filter_map(|c| {
            let hits: Vec<&str> = c
                .messages
                .iter()
                .filter(|t| t.role == Role::Model && is_inconclusive_reply(&t.text))
                .map(|t| t.text.as_str())
                .collect();
            if hits.is_empty() {
                None
            } else {
                Some(FailedConversation {
                    title: c.title.clone(),
                    user_id: c.user_id.clone(),
                    messages: hits.join(" | "),
                })
            }
        })
        .collect();
    FailureAnalysis {
        inconclusive_responses_count: failed.len(),
        failed_conversations: failed,
    }
}
