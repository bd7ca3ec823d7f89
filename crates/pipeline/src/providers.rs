//! Collaborator seams: agent invocation and external data providers.
//!
//! The pipeline owns the fallback chain and caching policy around these
//! calls; the protocols behind them live in [`crate::http`] or in test
//! doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wavelength_core::phases::Persona;
use wavelength_core::scoring::Dimension;

use crate::error::PipelineResult;

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Structured input for one persona.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRequest {
    pub persona: Persona,
    pub model: String,
    /// Dimension the agent must score, `None` for synthesis.
    pub dimension: Option<Dimension>,
    pub project: serde_json::Value,
    pub context: serde_json::Value,
    /// Outputs of earlier phases keyed by stage key.
    pub prior_outputs: serde_json::Map<String, serde_json::Value>,
}

/// Raw score as reported by an agent, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedScore {
    pub dimension: String,
    pub score: f64,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub markdown: String,
    #[serde(default)]
    pub score: Option<ReportedScore>,
    #[serde(default)]
    pub tokens_used: i64,
}

#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, request: &AgentRequest) -> PipelineResult<AgentOutput>;
}

// ---------------------------------------------------------------------------
// Data providers
// ---------------------------------------------------------------------------

/// Labor-market facts for one occupation and location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntelData {
    /// Free-form intel text injected into prompts.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tables_used: Vec<String>,
    #[serde(default)]
    pub facts: serde_json::Value,
}

impl IntelData {
    /// Prompt block built from the intel text.
    pub fn format_block(&self) -> String {
        if self.text.trim().is_empty() {
            return String::new();
        }
        format!("## Verified Labor Market Intelligence\n\n{}", self.text.trim())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployerOpenings {
    pub name: String,
    pub openings: i64,
}

/// Job-posting volume as returned by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobsData {
    pub count: i64,
    #[serde(default)]
    pub top_employers: Vec<EmployerOpenings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelQuery {
    pub occupation: String,
    pub location: String,
    pub program_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobsQuery {
    pub occupation: String,
    pub location: String,
}

#[async_trait]
pub trait IntelProvider: Send + Sync {
    async fn fetch(&self, query: &IntelQuery) -> PipelineResult<IntelData>;
}

#[async_trait]
pub trait JobsProvider: Send + Sync {
    async fn fetch(&self, query: &JobsQuery) -> PipelineResult<JobsData>;
}

/// Agent invoker used when no agent endpoint is configured. Every call
/// fails.
pub struct UnconfiguredAgents;

#[async_trait]
impl AgentInvoker for UnconfiguredAgents {
    async fn invoke(&self, request: &AgentRequest) -> PipelineResult<AgentOutput> {
        Err(crate::error::PipelineError::agent(
            request.persona.id(),
            "AGENT_ENDPOINT_URL is not configured",
        ))
    }
}
