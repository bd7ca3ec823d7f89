//! Versioned configuration snapshot stored on each pipeline run.
//!
//! Earlier runs stored an unversioned camelCase JSON object. Those rows are
//! migrated on read by [`RunConfig::from_stored`]; new rows always carry
//! `schema_version`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model_profile::ModelProfile;
use crate::phases::{Phase, Persona};

/// Current schema version written by this code.
pub const RUN_CONFIG_VERSION: u32 = 1;

/// One citation fix made by the citation reviewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationCorrection {
    #[serde(alias = "componentType")]
    pub component_type: String,
    pub original: String,
    pub corrected: String,
    pub reason: String,
}

/// Full citation review output, kept for admin review only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationDetails {
    #[serde(default)]
    pub corrections: Vec<CitationCorrection>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, alias = "dataSources")]
    pub data_sources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub schema_version: u32,
    pub agents_enabled: Vec<Persona>,
    pub synthesis_enabled: bool,
    pub citation_agent_enabled: bool,
    pub intel_context_enabled: bool,
    pub model: String,
    pub model_profile: Option<ModelProfile>,
    /// Persona set used by the synthesis panel.
    #[serde(default)]
    pub personas: Vec<String>,
    /// Agent names from legacy rows that no longer map to a persona.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub legacy_agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_details: Option<CitationDetails>,
}

/// Unversioned shape written before `schema_version` existed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRunConfig {
    #[serde(default)]
    agents_enabled: Vec<String>,
    #[serde(default)]
    citation_agent_enabled: bool,
    #[serde(default)]
    intel_context_enabled: bool,
    model: Option<String>,
    model_profile: Option<String>,
    tiger_team_personas: Option<Vec<String>>,
    citation_details: Option<CitationDetails>,
}

impl RunConfig {
    /// Standard configuration: every phase enabled, intel context on.
    pub fn standard(model: impl Into<String>, model_profile: Option<ModelProfile>) -> Self {
        Self {
            schema_version: RUN_CONFIG_VERSION,
            agents_enabled: Phase::SEQUENCE.iter().map(|p| p.persona()).collect(),
            synthesis_enabled: true,
            citation_agent_enabled: false,
            intel_context_enabled: true,
            model: model.into(),
            model_profile,
            personas: Vec::new(),
            legacy_agents: Vec::new(),
            citation_details: None,
        }
    }

    /// Whether `phase` runs under this configuration.
    pub fn phase_enabled(&self, phase: Phase) -> bool {
        if phase == Phase::Synthesis {
            return self.synthesis_enabled;
        }
        self.agents_enabled.contains(&phase.persona())
    }

    /// Persona ids, as recorded in the run's `agents_run` column.
    pub fn agent_ids(&self) -> Vec<String> {
        self.agents_enabled.iter().map(|p| p.id().to_string()).collect()
    }

    /// Parse a stored config, migrating legacy rows to the current version.
    pub fn from_stored(value: &serde_json::Value) -> Result<Self, CoreError> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::Validation("Run config must be a JSON object".into()))?;

        match obj.get("schema_version").and_then(serde_json::Value::as_u64) {
            None => Self::from_legacy(value),
            Some(v) if v == u64::from(RUN_CONFIG_VERSION) => serde_json::from_value(value.clone())
                .map_err(|e| CoreError::Validation(format!("Invalid run config: {e}"))),
            Some(v) => Err(CoreError::Validation(format!(
                "Unsupported run config schema version {v}"
            ))),
        }
    }

    fn from_legacy(value: &serde_json::Value) -> Result<Self, CoreError> {
        let legacy: LegacyRunConfig = serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Validation(format!("Invalid legacy run config: {e}")))?;

        let mut agents_enabled = Vec::new();
        let mut legacy_agents = Vec::new();
        for name in legacy.agents_enabled {
            match name.parse::<Persona>() {
                Ok(persona) => agents_enabled.push(persona),
                Err(_) => legacy_agents.push(name),
            }
        }

        Ok(Self {
            schema_version: RUN_CONFIG_VERSION,
            synthesis_enabled: agents_enabled.contains(&Persona::TigerTeam)
                || legacy.tiger_team_personas.is_some(),
            agents_enabled,
            citation_agent_enabled: legacy.citation_agent_enabled,
            intel_context_enabled: legacy.intel_context_enabled,
            model: legacy.model.unwrap_or_default(),
            model_profile: legacy.model_profile.and_then(|p| p.parse().ok()),
            personas: legacy.tiger_team_personas.unwrap_or_default(),
            legacy_agents,
            citation_details: legacy.citation_details,
        })
    }

    pub fn to_value(&self) -> serde_json::Value {
        // Serializing plain data into a Value cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
