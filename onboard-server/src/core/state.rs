//! Shared application state

use std::sync::Arc;

use crate::BoxError;
use crate::approval::ApprovalOrchestrator;
use crate::core::Config;
use crate::identity::{HttpIdentityClient, IdentityClient};
use crate::onboarding::OnboardingService;
use crate::store::{DocumentStore, MemoryStore, SurrealStore};

/// State handed to every HTTP handler
///
/// Collaborators are wired once here and passed by constructor.
#[derive(Clone)]
pub struct AppState {
    pub onboarding: OnboardingService,
    pub orchestrator: Arc<ApprovalOrchestrator>,
    pub identity: Arc<dyn IdentityClient>,
    pub started_at: std::time::Instant,
}

impl AppState {
    /// Connect the store and identity client described by `config`
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let store: Arc<dyn DocumentStore> = if config.uses_memory_store() {
            tracing::warn!("Using in-process memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(
                SurrealStore::connect(
                    &config.store_url,
                    &config.store_namespace,
                    &config.store_database,
                )
                .await?,
            )
        };

        let identity: Arc<dyn IdentityClient> = Arc::new(HttpIdentityClient::new(
            config.identity_service_url.clone(),
            config.identity_timeout(),
        )?);

        Ok(Self::with_parts(store, identity))
    }

    pub fn with_parts(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityClient>) -> Self {
        let onboarding = OnboardingService::new(store);
        let orchestrator = Arc::new(ApprovalOrchestrator::new(
            onboarding.clone(),
            identity.clone(),
        ));
        Self {
            onboarding,
            orchestrator,
            identity,
            started_at: std::time::Instant::now(),
        }
    }
}
