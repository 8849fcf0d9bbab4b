//! Load probe: concurrent clients against a running gateway, mixing chat turns with bot
//! ranking hits, then a summary of success rate and latency.
//! Run with the gateway up: cargo run --bin load_probe
//! Target: PROBE_BASE_URL (default http://127.0.0.1:3000).

use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
const CONCURRENT_CLIENTS: usize = 10;
const TURNS_PER_CLIENT: usize = 5;

const PROMPTS: &[&str] = &[
    "Olá, tudo bem?",
    "Qual a capital da França?",
    "Me explique o que é uma API REST.",
    "Pode resumir a conversa até agora?",
    "Obrigado pela ajuda!",
];

const USERS: &[&str] = &["user123", "user456"];
const BOTS: &[(&str, &str)] = &[("bot-suporte", "Suporte"), ("bot-vendas", "Vendas")];

#[derive(Default)]
struct Tally {
    success: AtomicU32,
    failure: AtomicU32,
    latencies_ms: RwLock<Vec<u64>>,
}

impl Tally {
    async fn record(&self, ok: bool, elapsed_ms: u64) {
        if ok {
            self.success.fetch_add(1, Ordering::Relaxed);
            self.latencies_ms.write().await.push(elapsed_ms);
        } else {
            self.failure.fetch_add(1, Ordering::Relaxed);
        }
    }
}

async fn post(client: &Client, url: &str, body: &Value) -> (bool, u64, Option<Value>) {
    let start = Instant::now();
    let res = client.post(url).json(body).send().await;
    let elapsed_ms = start.elapsed().as_millis() as u64;
    match res {
        Ok(resp) if resp.status().is_success() => (true, elapsed_ms, resp.json().await.ok()),
        Ok(resp) => {
            eprintln!("[load_probe] {} -> {}", url, resp.status());
            (false, elapsed_ms, None)
        }
        Err(e) => {
            eprintln!("[load_probe] {} -> {}", url, e);
            (false, elapsed_ms, None)
        }
    }
}

#[tokio::main]
async fn main() {
    let base_url = std::env::var("PROBE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    let base_url = base_url.trim_end_matches('/').to_string();
    println!(
        "[load_probe] {} clients x {} turns against {}",
        CONCURRENT_CLIENTS, TURNS_PER_CLIENT, base_url
    );

    let chat = Arc::new(Tally::default());
    let ranking = Arc::new(Tally::default());
    let client = Client::new();

    let mut handles = Vec::new();
    for client_id in 0..CONCURRENT_CLIENTS {
        let client = client.clone();
        let base_url = base_url.clone();
        let chat = Arc::clone(&chat);
        let ranking = Arc::clone(&ranking);

        handles.push(tokio::spawn(async move {
            let user = USERS[client_id % USERS.len()];
            let (bot_id, bot_name) = BOTS[client_id % BOTS.len()];
            let mut chat_id: Option<String> = None;

            for turn in 0..TURNS_PER_CLIENT {
                let (ok, ms, _) = post(
                    &client,
                    &format!("{}/api/ranking/registrar-acesso-bot", base_url),
                    &json!({ "botId": bot_id, "nomeBot": bot_name }),
                )
                .await;
                ranking.record(ok, ms).await;

                let mut body = json!({
                    "message": PROMPTS[(client_id + turn) % PROMPTS.len()],
                    "userId": user,
                });
                if let Some(id) = &chat_id {
                    body["chatId"] = Value::String(id.clone());
                }
                let (ok, ms, reply) = post(&client, &format!("{}/api/chat", base_url), &body).await;
                chat.record(ok, ms).await;
                if let Some(id) = reply
                    .as_ref()
                    .and_then(|r| r.get("chatId"))
                    .and_then(|v| v.as_str())
                {
                    chat_id = Some(id.to_string());
                }
            }
        }));
    }

    for h in handles {
        let _ = h.await;
    }

    for (label, tally) in [("chat", &chat), ("ranking", &ranking)] {
        let s = tally.success.load(Ordering::Relaxed);
        let f = tally.failure.load(Ordering::Relaxed);
        let total = s + f;
        let success_rate = if total > 0 {
            (s as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        let latencies = tally.latencies_ms.read().await;
        let avg_latency_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<u64>() as f64 / latencies.len() as f64
        };
        println!(
            "[load_probe] {:<8} total {:>3} | ok {:>3} | failed {:>3} | {:.1}% | avg {:.0}ms",
            label, total, s, f, success_rate, avg_latency_ms
        );
    }
}
