use std::sync::Arc;

use lo_core::config::OpsConfig;
use lo_harness::alerts::AlertManager;
use lo_harness::rate_limiter::ApiGate;
use lo_harness::trace_store::TraceStore;
use lo_harness::url_guard::UrlGuard;
use lo_workflows::client::{WorkflowApi, WorkflowApiError, WorkflowClient};
use lo_workflows::dispatch::Dispatcher;
use lo_workflows::health::{HealthChecker, HealthError};

use crate::agents::AgentRegistry;
use crate::chat::{ChatAlertSink, ChatApi, ChatClient, ChatError};
use crate::verify::{InteractionVerifier, VerifyError};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("bad chat public key: {0}")]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Workflow(#[from] WorkflowApiError),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Health(#[from] HealthError),
}

/// Everything the router and handlers share. Built once at startup; all
/// contained state is process-local and dropped on restart.
pub struct AppState {
    pub config: OpsConfig,
    pub verifier: Option<InteractionVerifier>,
    pub traces: TraceStore,
    pub alerts: AlertManager,
    pub guard: UrlGuard,
    pub workflow_api: Arc<dyn WorkflowApi>,
    pub dispatcher: Dispatcher,
    pub chat: Arc<dyn ChatApi>,
    pub health: HealthChecker,
    pub agents: AgentRegistry,
}

impl AppState {
    /// Production wiring: real workflow and chat clients behind the shared
    /// rate gate.
    pub fn from_config(config: OpsConfig) -> Result<Arc<Self>, StateError> {
        let gate = Arc::new(ApiGate::min_interval(config.workflow_min_interval()));
        let workflow_api: Arc<dyn WorkflowApi> = Arc::new(WorkflowClient::new(&config, gate)?);
        let chat: Arc<dyn ChatApi> = Arc::new(ChatClient::new(&config)?);
        Self::assemble(config, workflow_api, chat)
    }

    /// Wiring with injected outbound surfaces; tests pass fakes here.
    pub fn with_parts(
        config: OpsConfig,
        workflow_api: Arc<dyn WorkflowApi>,
        chat: Arc<dyn ChatApi>,
    ) -> Result<Arc<Self>, StateError> {
        Self::assemble(config, workflow_api, chat)
    }

    fn assemble(
        config: OpsConfig,
        workflow_api: Arc<dyn WorkflowApi>,
        chat: Arc<dyn ChatApi>,
    ) -> Result<Arc<Self>, StateError> {
        let verifier = config
            .chat_public_key
            .as_deref()
            .map(InteractionVerifier::from_hex)
            .transpose()?;

        let alerts = AlertManager::new(
            config.enable_alerts,
            config.alert_channel_id.clone(),
            config.alert_dedup_window(),
            Arc::new(ChatAlertSink(Arc::clone(&chat))),
        );

        let guard = UrlGuard::new();

        Ok(Arc::new(Self {
            traces: TraceStore::new(config.trace_capacity),
            alerts,
            health: HealthChecker::new(guard.clone())?,
            guard,
            dispatcher: Dispatcher::new(Arc::clone(&workflow_api)),
            workflow_api,
            chat,
            agents: AgentRegistry::builtin(),
            verifier,
            config,
        }))
    }
}
