use wavelength_core::error::CoreError;
use wavelength_db::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// An agent invocation failed or returned something unusable.
    #[error("Agent {persona} failed: {message}")]
    Agent { persona: String, message: String },

    /// An external data provider failed.
    #[error("Provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    #[error("{label} timed out after {timeout_ms}ms")]
    Timeout { label: String, timeout_ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn provider(provider: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: err.to_string(),
        }
    }

    pub fn agent(persona: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Agent {
            persona: persona.into(),
            message: err.to_string(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
