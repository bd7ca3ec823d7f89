//! Pipeline settings loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use wavelength_core::model_profile::DEFAULT_MODEL;

/// Read `key` and parse it, falling back to `default` when unset or invalid.
pub(crate) fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Run metadata and stage execution policy.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub pipeline_version: String,
    pub prompt_version: Option<String>,
    pub report_template: String,
    pub default_model: String,
    /// Attempts per stage, at least 1.
    pub stage_max_attempts: u32,
    /// Backoff before retry `n` is `stage_retry_backoff * n`.
    pub stage_retry_backoff: Duration,
    pub stage_timeout: Duration,
    pub jobs_primary_ttl_hours: i64,
    pub jobs_fallback_ttl_hours: i64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            pipeline_version: "2.0.0".into(),
            prompt_version: None,
            report_template: "validation-v2".into(),
            default_model: DEFAULT_MODEL.into(),
            stage_max_attempts: 2,
            stage_retry_backoff: Duration::from_millis(2000),
            stage_timeout: Duration::from_secs(600),
            jobs_primary_ttl_hours: 168,
            jobs_fallback_ttl_hours: 24,
        }
    }
}

impl PipelineSettings {
    /// Load settings from the environment.
    ///
    /// | Env Var                             | Default             |
    /// |-------------------------------------|---------------------|
    /// | `PIPELINE_VERSION`                  | `2.0.0`             |
    /// | `PROMPT_VERSION`                    | unset               |
    /// | `REPORT_TEMPLATE`                   | `validation-v2`     |
    /// | `DEFAULT_MODEL`                     | `claude-sonnet-4-6` |
    /// | `VALIDATION_STAGE_MAX_ATTEMPTS`     | `2`                 |
    /// | `VALIDATION_STAGE_RETRY_BACKOFF_MS` | `2000`              |
    /// | `STAGE_TIMEOUT_SECS`                | `600`               |
    /// | `JOBS_PRIMARY_TTL_HOURS`            | `168`               |
    /// | `JOBS_FALLBACK_TTL_HOURS`           | `24`                |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            pipeline_version: env_opt("PIPELINE_VERSION").unwrap_or(defaults.pipeline_version),
            prompt_version: env_opt("PROMPT_VERSION"),
            report_template: env_opt("REPORT_TEMPLATE").unwrap_or(defaults.report_template),
            default_model: env_opt("DEFAULT_MODEL").unwrap_or(defaults.default_model),
            stage_max_attempts: env_or("VALIDATION_STAGE_MAX_ATTEMPTS", 2u32).max(1),
            stage_retry_backoff: Duration::from_millis(env_or(
                "VALIDATION_STAGE_RETRY_BACKOFF_MS",
                2000u64,
            )),
            stage_timeout: Duration::from_secs(env_or("STAGE_TIMEOUT_SECS", 600u64)),
            jobs_primary_ttl_hours: env_or("JOBS_PRIMARY_TTL_HOURS", 168i64),
            jobs_fallback_ttl_hours: env_or("JOBS_FALLBACK_TTL_HOURS", 24i64),
        }
    }
}

/// Base URLs of the HTTP collaborators. An unset URL leaves that
/// collaborator unconfigured.
#[derive(Debug, Clone, Default)]
pub struct ProviderEndpoints {
    pub agent_url: Option<String>,
    pub intel_url: Option<String>,
    pub jobs_primary_url: Option<String>,
    pub jobs_fallback_url: Option<String>,
    pub timeout: Duration,
}

impl ProviderEndpoints {
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `AGENT_ENDPOINT_URL`    | unset   |
    /// | `INTEL_ENDPOINT_URL`    | unset   |
    /// | `JOBS_PRIMARY_URL`      | unset   |
    /// | `JOBS_FALLBACK_URL`     | unset   |
    /// | `PROVIDER_TIMEOUT_SECS` | `120`   |
    pub fn from_env() -> Self {
        Self {
            agent_url: env_opt("AGENT_ENDPOINT_URL"),
            intel_url: env_opt("INTEL_ENDPOINT_URL"),
            jobs_primary_url: env_opt("JOBS_PRIMARY_URL"),
            jobs_fallback_url: env_opt("JOBS_FALLBACK_URL"),
            timeout: Duration::from_secs(env_or("PROVIDER_TIMEOUT_SECS", 120u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = PipelineSettings::default();
        assert_eq!(s.stage_max_attempts, 2);
        assert_eq!(s.stage_retry_backoff, Duration::from_millis(2000));
        assert_eq!(s.jobs_primary_ttl_hours, 168);
        assert_eq!(s.jobs_fallback_ttl_hours, 24);
        assert_eq!(s.default_model, "claude-sonnet-4-6");
    }

    #[test]
    fn unparsable_value_falls_back_to_default() {
        assert_eq!(env_or("WAVELENGTH_TEST_UNSET_VARIABLE", 7u32), 7);
    }
}
