//! chatrelay core library.
//! Conversation history, instruction resolution, access log, ranking and the model bridge
//! behind the chat gateway.

pub mod access_log;
pub mod analytics;
pub mod history;
pub mod instruction;
pub mod llm;
pub mod preferences;
pub mod ranking;
pub mod relay;
pub mod storage;
pub mod turns;

pub use access_log::{AccessLogEntry, AccessLogSink};
pub use analytics::{build_dashboard, Dashboard};
pub use history::{title_from_prompt, Conversation, HistoryStore, ANONYMOUS_USER};
pub use instruction::{
    resolve_instruction, GlobalInstruction, GlobalInstructionSource, InstructionResolver,
    UserInstructionSource, DEFAULT_SYSTEM_INSTRUCTION,
};
pub use llm::{build_model, ChatModel, LlmError, ModelSettings, Provider};
pub use preferences::{UserDirectory, UserRecord, ADMIN_SEED_INSTRUCTION};
pub use ranking::{InMemoryRanking, RankingEntry, RankingStore};
pub use relay::{ChatOutcome, ChatRelay, ChatRequest, RelayError};
pub use storage::{Storage, StoreError};
pub use turns::{collapse_roles, prepare_contents, Role, Turn};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
