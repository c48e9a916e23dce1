//! Provider selection

use std::sync::Arc;

use crate::providers::*;
use crate::types::*;

/// Selects and wraps the configured reasoning-backend provider.
pub struct LlmRouter {
    provider: Arc<dyn LlmProvider>,
    kind: ProviderKind,
}

impl LlmRouter {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        let kind = provider.kind();
        Self { provider, kind }
    }

    /// Create a router from environment variables.
    ///
    /// Reads `PARLEY_LLM_PROVIDER` to select the provider:
    /// - `ollama` (default): local Ollama instance
    /// - `openai_compat`: any OpenAI-compatible server
    /// - `deterministic`: no LLM, canned fallback
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let provider_name =
            std::env::var("PARLEY_LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string());
        let kind = ProviderKind::parse(&provider_name).unwrap_or_else(|| {
            tracing::warn!(%provider_name, "unknown provider, defaulting to ollama");
            ProviderKind::Ollama
        });
        Self::from_kind(kind)
    }

    pub fn from_kind(kind: ProviderKind) -> Self {
        let provider: Arc<dyn LlmProvider> = match kind {
            ProviderKind::Ollama => Arc::new(OllamaProvider::from_env()),
            ProviderKind::OpenAICompat => Arc::new(OpenAICompatProvider::from_env()),
            ProviderKind::Deterministic => Arc::new(DeterministicProvider::new()),
        };
        Self { provider, kind }
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub async fn is_available(&self) -> bool {
        self.provider.is_available().await
    }

    pub async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.provider.complete(request).await
    }
}

impl Default for LlmRouter {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatMessage;

    #[tokio::test]
    async fn deterministic_router_completes_offline() {
        let router = LlmRouter::from_kind(ProviderKind::Deterministic);
        assert!(router.is_available().await);
        assert_eq!(router.kind(), ProviderKind::Deterministic);

        let request = CompletionRequest::new(vec![ChatMessage::user("hello")]);
        let response = router.complete(request).await.unwrap();
        assert!(!response.content.is_empty());
    }
}
