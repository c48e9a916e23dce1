//! Parley LLM - the reasoning backend behind delegated decisions
//!
//! A provider abstraction (local Ollama, any OpenAI-compatible server,
//! or a deterministic offline fallback), an env-driven router, and the
//! planner that turns an incoming envelope plus conversation history
//! into an untrusted candidate `Plan`. Plans are never sent as-is: the
//! conversation pipeline revalidates every one of them.

pub mod plan;
pub mod planner;
pub mod providers;
pub mod router;
pub mod types;

pub use plan::Plan;
pub use planner::{peers_excerpt, LlmPeerPicker, Planner};
pub use providers::{
    DeterministicProvider, LlmProvider, OllamaConfig, OllamaProvider, OpenAICompatConfig,
    OpenAICompatProvider,
};
pub use router::LlmRouter;
pub use types::{
    ChatMessage, CompletionRequest, CompletionResponse, LlmError, MessageRole, ProviderKind,
    Result,
};
