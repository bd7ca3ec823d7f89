//! Named model profiles and per-model cost rates.
//!
//! Operators pick a profile (`economy`, `balanced`, `premium`) when resuming
//! a run instead of typing a concrete model identifier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default model when neither an override nor a profile is given.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-6";

/// Blended rate used when a model is not in [`MODEL_RATES`].
pub const FALLBACK_USD_PER_MILLION_TOKENS: f64 = 6.0;

/// Blended (input + output) USD cost per million tokens for known models.
pub const MODEL_RATES: &[(&str, f64)] = &[
    ("claude-haiku-4-5", 1.6),
    ("claude-sonnet-4-6", 6.0),
    ("claude-sonnet-4-5", 6.0),
    ("claude-opus-4-6", 30.0),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProfile {
    Economy,
    Balanced,
    Premium,
}

impl ModelProfile {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Economy => "economy",
            Self::Balanced => "balanced",
            Self::Premium => "premium",
        }
    }

    /// Concrete model identifier for this profile.
    pub fn model(self) -> &'static str {
        match self {
            Self::Economy => "claude-haiku-4-5",
            Self::Balanced => "claude-sonnet-4-6",
            Self::Premium => "claude-opus-4-6",
        }
    }
}

impl fmt::Display for ModelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelProfile {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "economy" => Ok(Self::Economy),
            "balanced" => Ok(Self::Balanced),
            "premium" => Ok(Self::Premium),
            other => Err(CoreError::Validation(format!(
                "Unknown model profile '{other}'. Must be one of: economy, balanced, premium"
            ))),
        }
    }
}

/// Pick the model for a run.
///
/// An explicit model wins over a profile; a profile wins over `default`.
pub fn resolve_model(
    override_model: Option<&str>,
    override_profile: Option<ModelProfile>,
    default: &str,
) -> String {
    if let Some(model) = override_model.map(str::trim).filter(|m| !m.is_empty()) {
        return model.to_string();
    }
    match override_profile {
        Some(profile) => profile.model().to_string(),
        None => default.to_string(),
    }
}

/// Estimated USD cost of `tokens` on `model`, rounded to cents.
pub fn estimate_cost_usd(model: &str, tokens: i64) -> f64 {
    let rate = MODEL_RATES
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, rate)| *rate)
        .unwrap_or(FALLBACK_USD_PER_MILLION_TOKENS);
    let cost = tokens.max(0) as f64 / 1_000_000.0 * rate;
    (cost * 100.0).round() / 100.0
}
