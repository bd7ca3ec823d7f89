//! Wiring of the pipeline components shared by the worker and the API.

use std::sync::Arc;

use wavelength_db::store::Stores;
use wavelength_events::RunTelemetry;

use crate::cache::ApiCache;
use crate::checkpoints::PhaseCheckpoints;
use crate::context::ContextBuilder;
use crate::error::{PipelineError, PipelineResult};
use crate::http::{build_client, HttpAgentClient, HttpIntelProvider, HttpJobsProvider};
use crate::orchestrator::{Orchestrator, ValidationOrchestrator};
use crate::providers::{AgentInvoker, IntelProvider, JobsProvider, UnconfiguredAgents};
use crate::queue::JobQueue;
use crate::settings::{PipelineSettings, ProviderEndpoints};
use crate::tracker::RunTracker;

#[derive(Clone)]
pub struct PipelineServices {
    pub stores: Stores,
    pub telemetry: RunTelemetry,
    pub settings: Arc<PipelineSettings>,
    pub tracker: RunTracker,
    pub checkpoints: PhaseCheckpoints,
    pub orchestrator: Arc<dyn Orchestrator>,
    pub queue: Arc<JobQueue>,
}

impl PipelineServices {
    /// Assemble the services around an existing orchestrator.
    pub fn new(
        stores: Stores,
        telemetry: RunTelemetry,
        settings: Arc<PipelineSettings>,
        orchestrator: Arc<dyn Orchestrator>,
    ) -> Self {
        let tracker = RunTracker::new(stores.clone(), telemetry.clone(), settings.clone());
        let checkpoints = PhaseCheckpoints::new(stores.checkpoints.clone());
        let queue = Arc::new(JobQueue::new(&stores, telemetry.clone(), orchestrator.clone()));
        Self {
            stores,
            telemetry,
            settings,
            tracker,
            checkpoints,
            orchestrator,
            queue,
        }
    }

    /// Assemble the services with a [`ValidationOrchestrator`] over the
    /// given collaborators.
    pub fn with_collaborators(
        stores: Stores,
        telemetry: RunTelemetry,
        settings: Arc<PipelineSettings>,
        agents: Arc<dyn AgentInvoker>,
        context: ContextBuilder,
    ) -> Self {
        let tracker = RunTracker::new(stores.clone(), telemetry.clone(), settings.clone());
        let orchestrator: Arc<dyn Orchestrator> = Arc::new(ValidationOrchestrator::new(
            stores.clone(),
            tracker,
            context,
            agents,
            settings.clone(),
        ));
        Self::new(stores, telemetry, settings, orchestrator)
    }

    /// Assemble the services with HTTP collaborators from `endpoints`.
    pub fn from_endpoints(
        stores: Stores,
        telemetry: RunTelemetry,
        settings: Arc<PipelineSettings>,
        endpoints: &ProviderEndpoints,
    ) -> PipelineResult<Self> {
        let client = build_client(endpoints.timeout).map_err(|e| PipelineError::provider("http", e))?;

        let agents: Arc<dyn AgentInvoker> = match &endpoints.agent_url {
            Some(url) => Arc::new(HttpAgentClient::with_client(client.clone(), url.clone())),
            None => {
                tracing::warn!("AGENT_ENDPOINT_URL not set, runs will fail at the first phase");
                Arc::new(UnconfiguredAgents)
            }
        };
        let intel = endpoints.intel_url.as_ref().map(|url| {
            Arc::new(HttpIntelProvider::with_client(client.clone(), url.clone())) as Arc<dyn IntelProvider>
        });
        let primary = endpoints.jobs_primary_url.as_ref().map(|url| {
            Arc::new(HttpJobsProvider::with_client("jobs_primary", client.clone(), url.clone()))
                as Arc<dyn JobsProvider>
        });
        let fallback = endpoints.jobs_fallback_url.as_ref().map(|url| {
            Arc::new(HttpJobsProvider::with_client("jobs_fallback", client.clone(), url.clone()))
                as Arc<dyn JobsProvider>
        });

        let context = ContextBuilder::from_providers(
            ApiCache::new(stores.cache.clone()),
            &settings,
            intel,
            primary,
            fallback,
        );
        Ok(Self::with_collaborators(stores, telemetry, settings, agents, context))
    }
}
