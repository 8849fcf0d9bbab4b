//! Gateway configuration: defaults, then an optional TOML file, then environment variables.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | PORT | 3000 | HTTP listen port. |
//! | STORAGE_PATH | ./data | Base directory for the sled databases and the user directory. |
//! | HISTORY_DB_PATH | {STORAGE_PATH}/history | Conversations + settings database. |
//! | LOGS_DB_PATH | {STORAGE_PATH}/logs | Access log database. |
//! | USERS_FILE | {STORAGE_PATH}/users.json | User directory (per-user instruction overrides). |
//! | DEFAULT_USER_ID | user123 | User assumed when a request names none. |
//! | ADMIN_PASSWORD | admin123 | Shared secret expected in `x-admin-password`. |
//! | BUNDLE_URL_FRONTEND | (any) | Allowed CORS origin. |
//! | LLM_PROVIDER | gemini | `gemini` or `openai`. |
//! | GEMINI_API_KEY / GEMINI_MODEL | - / gemini-1.5-flash | Gemini credentials. |
//! | OPENAI_API_KEY / OPENAI_MODEL / OPENAI_BASE_URL | - / gpt-4o-mini / api.openai.com | OpenAI-compatible credentials. |
//! | LLM_TIMEOUT_SECS | 60 | Model request timeout. |
//! | DEFAULT_INSTRUCTION | built-in sentence | Last link of the instruction fallback chain. |

use chatrelay_core::{ModelSettings, Provider};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub port: u16,
    pub storage_path: String,
    #[serde(default)]
    pub history_db_path: Option<String>,
    #[serde(default)]
    pub logs_db_path: Option<String>,
    #[serde(default)]
    pub users_file: Option<String>,
    pub default_user_id: String,
    pub admin_password: String,
    #[serde(default)]
    pub bundle_url_frontend: Option<String>,
    pub llm_provider: String,
    #[serde(default)]
    pub gemini_api_key: String,
    pub gemini_model: String,
    #[serde(default)]
    pub openai_api_key: String,
    pub openai_model: String,
    #[serde(default)]
    pub openai_base_url: Option<String>,
    pub llm_timeout_secs: u64,
    #[serde(default)]
    pub default_instruction: Option<String>,
}

impl GatewayConfig {
    /// Precedence: environment > `CHATRELAY_CONFIG` file (default `config/chatrelay.toml`) > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CHATRELAY_CONFIG").unwrap_or_else(|_| "config/chatrelay.toml".to_string());
        let builder = config::Config::builder()
            .set_default("port", 3000_i64)?
            .set_default("storage_path", "./data")?
            .set_default("default_user_id", "user123")?
            .set_default("admin_password", DEFAULT_ADMIN_PASSWORD)?
            .set_default("llm_provider", "gemini")?
            .set_default("gemini_model", "gemini-1.5-flash")?
            .set_default("openai_model", "gpt-4o-mini")?
            .set_default("llm_timeout_secs", 60_i64)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        builder
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }

    pub fn history_path(&self) -> PathBuf {
        self.history_db_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new(&self.storage_path).join("history"))
    }

    pub fn logs_path(&self) -> PathBuf {
        self.logs_db_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new(&self.storage_path).join("logs"))
    }

    /// True when the access log lives in the history database. Relative spellings of the
    /// same directory (`./data/h` and `data/h`) compare equal.
    pub fn logs_share_history_db(&self) -> bool {
        same_location(&self.history_path(), &self.logs_path())
    }

    pub fn users_path(&self) -> PathBuf {
        self.users_file
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new(&self.storage_path).join("users.json"))
    }

    pub fn uses_default_admin_password(&self) -> bool {
        self.admin_password == DEFAULT_ADMIN_PASSWORD
    }

    pub fn model_settings(&self) -> Result<ModelSettings, String> {
        let provider: Provider = self.llm_provider.parse()?;
        let (api_key, model, base_url) = match provider {
            Provider::Gemini => (self.gemini_api_key.clone(), self.gemini_model.clone(), None),
            Provider::OpenAi => (
                self.openai_api_key.clone(),
                self.openai_model.clone(),
                self.openai_base_url.clone().filter(|u| !u.trim().is_empty()),
            ),
        };
        Ok(ModelSettings {
            provider,
            api_key,
            model,
            base_url,
            timeout: Duration::from_secs(self.llm_timeout_secs.max(1)),
        })
    }
}

fn same_location(a: &Path, b: &Path) -> bool {
    match (std::path::absolute(a), std::path::absolute(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
pub fn test_config(storage: &Path) -> GatewayConfig {
    GatewayConfig {
        port: 0,
        storage_path: storage.to_string_lossy().into_owned(),
        history_db_path: None,
        logs_db_path: None,
        users_file: None,
        default_user_id: "user123".to_string(),
        admin_password: "s3cret".to_string(),
        bundle_url_frontend: None,
        llm_provider: "gemini".to_string(),
        gemini_api_key: String::new(),
        gemini_model: "gemini-1.5-flash".to_string(),
        openai_api_key: String::new(),
        openai_model: "gpt-4o-mini".to_string(),
        openai_base_url: None,
        llm_timeout_secs: 5,
        default_instruction: None,
    }
}
