//! Shared per-run context: external facts fetched once and read by every
//! phase.
//!
//! Intel and job postings are fetched concurrently. Job postings walk a
//! fallback chain (primary source, then fallback source, then an explicit
//! [`JobsSource::None`] result); a missing jobs signal is a valid state, not
//! an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use wavelength_core::occupation::{derive_location, derive_occupation};
use wavelength_db::models::project::ValidationProject;

use crate::cache::ApiCache;
use crate::providers::{
    EmployerOpenings, IntelData, IntelProvider, IntelQuery, JobsProvider, JobsQuery,
};
use crate::settings::PipelineSettings;

/// Cache namespace for the primary job-postings source.
pub const JOBS_PRIMARY_CACHE: &str = "pipeline_jobs";
/// Cache namespace for the fallback job-postings source.
pub const JOBS_FALLBACK_CACHE: &str = "pipeline_jobs_brave";
/// Maximum employers kept in the context.
pub const TOP_EMPLOYER_LIMIT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobsSource {
    Primary,
    Fallback,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobsSearchResult {
    pub count: i64,
    pub top_employers: Vec<EmployerOpenings>,
    pub source: JobsSource,
}

impl JobsSearchResult {
    pub fn none() -> Self {
        Self {
            count: 0,
            top_employers: Vec::new(),
            source: JobsSource::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineContext {
    pub intel: IntelData,
    pub intel_block: String,
    pub jobs: JobsSearchResult,
    pub target_occupation: String,
    pub location: String,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// One named job-postings source with its cache TTL.
#[derive(Clone)]
pub struct JobsSourceConfig {
    pub cache_name: &'static str,
    pub ttl_hours: i64,
    pub provider: Arc<dyn JobsProvider>,
}

#[derive(Clone)]
pub struct ContextBuilder {
    cache: ApiCache,
    intel: Option<Arc<dyn IntelProvider>>,
    primary: Option<JobsSourceConfig>,
    fallback: Option<JobsSourceConfig>,
}

impl ContextBuilder {
    pub fn new(cache: ApiCache) -> Self {
        Self {
            cache,
            intel: None,
            primary: None,
            fallback: None,
        }
    }

    pub fn with_intel(mut self, provider: Arc<dyn IntelProvider>) -> Self {
        self.intel = Some(provider);
        self
    }

    pub fn with_primary_jobs(mut self, provider: Arc<dyn JobsProvider>, ttl_hours: i64) -> Self {
        self.primary = Some(JobsSourceConfig {
            cache_name: JOBS_PRIMARY_CACHE,
            ttl_hours,
            provider,
        });
        self
    }

    pub fn with_fallback_jobs(mut self, provider: Arc<dyn JobsProvider>, ttl_hours: i64) -> Self {
        self.fallback = Some(JobsSourceConfig {
            cache_name: JOBS_FALLBACK_CACHE,
            ttl_hours,
            provider,
        });
        self
    }

    /// Builder wired with both jobs sources at the configured TTLs.
    pub fn from_providers(
        cache: ApiCache,
        settings: &PipelineSettings,
        intel: Option<Arc<dyn IntelProvider>>,
        primary: Option<Arc<dyn JobsProvider>>,
        fallback: Option<Arc<dyn JobsProvider>>,
    ) -> Self {
        let mut builder = Self::new(cache);
        if let Some(intel) = intel {
            builder = builder.with_intel(intel);
        }
        if let Some(primary) = primary {
            builder = builder.with_primary_jobs(primary, settings.jobs_primary_ttl_hours);
        }
        if let Some(fallback) = fallback {
            builder = builder.with_fallback_jobs(fallback, settings.jobs_fallback_ttl_hours);
        }
        builder
    }

    /// Fetch everything a run needs about `project`.
    ///
    /// Never fails: an intel failure yields empty intel and a jobs failure
    /// walks the fallback chain down to [`JobsSearchResult::none`].
    pub async fn build(&self, project: &ValidationProject, include_intel: bool) -> PipelineContext {
        let target_occupation = derive_occupation(
            project.target_occupation.as_deref(),
            project.program_name.as_deref(),
        );
        let location = derive_location(project.geographic_area.as_deref());

        let intel_query = IntelQuery {
            occupation: target_occupation.clone(),
            location: location.clone(),
            program_name: project.program_name.clone(),
        };
        let jobs_query = JobsQuery {
            occupation: target_occupation.clone(),
            location: location.clone(),
        };

        let (intel, jobs) = tokio::join!(
            self.fetch_intel(&intel_query, include_intel),
            self.fetch_jobs(&jobs_query),
        );

        PipelineContext {
            intel_block: intel.format_block(),
            intel,
            jobs,
            target_occupation,
            location,
        }
    }

    async fn fetch_intel(&self, query: &IntelQuery, enabled: bool) -> IntelData {
        let Some(provider) = self.intel.as_ref().filter(|_| enabled) else {
            return IntelData::default();
        };
        match provider.fetch(query).await {
            Ok(intel) => intel,
            Err(e) => {
                tracing::warn!(occupation = %query.occupation, error = %e, "Intel fetch failed");
                IntelData::default()
            }
        }
    }

    async fn fetch_jobs(&self, query: &JobsQuery) -> JobsSearchResult {
        let chain = [
            (self.primary.as_ref(), JobsSource::Primary),
            (self.fallback.as_ref(), JobsSource::Fallback),
        ];

        for (config, source) in chain {
            let Some(config) = config else { continue };
            let provider = config.provider.clone();
            let fetched = self
                .cache
                .get_or_fetch(config.cache_name, query, config.ttl_hours, || async move {
                    provider.fetch(query).await
                })
                .await;

            match fetched {
                Ok(data) if !data.top_employers.is_empty() => {
                    tracing::info!(
                        source = config.cache_name,
                        count = data.count,
                        "Job postings fetched"
                    );
                    let mut top_employers = data.top_employers;
                    top_employers.truncate(TOP_EMPLOYER_LIMIT);
                    return JobsSearchResult {
                        count: data.count,
                        top_employers,
                        source,
                    };
                }
                Ok(_) => {
                    tracing::info!(source = config.cache_name, "Job postings source returned no employers");
                }
                Err(e) => {
                    tracing::warn!(source = config.cache_name, error = %e, "Job postings source failed");
                }
            }
        }

        tracing::info!(occupation = %query.occupation, "No job postings data available");
        JobsSearchResult::none()
    }
}

// ---------------------------------------------------------------------------
// Project handle
// ---------------------------------------------------------------------------

/// A project loaded for one run, carrying its context once built.
pub struct ProjectHandle {
    pub project: ValidationProject,
    context: OnceCell<PipelineContext>,
}

impl ProjectHandle {
    pub fn new(project: ValidationProject) -> Self {
        Self {
            project,
            context: OnceCell::new(),
        }
    }

    /// The run's context, built on first access and shared afterwards.
    pub async fn context(&self, builder: &ContextBuilder, include_intel: bool) -> &PipelineContext {
        self.context
            .get_or_init(|| builder.build(&self.project, include_intel))
            .await
    }

    /// The context if it has already been built.
    pub fn cached_context(&self) -> Option<&PipelineContext> {
        self.context.get()
    }
}
