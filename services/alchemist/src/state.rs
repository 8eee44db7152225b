//! services/alchemist/src/state.rs
//!
//! Defines the application's shared state, created once at startup.

use book_alchemist_core::{GenerationController, GenerationSettings, TokioSleeper};
use std::sync::Arc;
use tracing::info;

use crate::adapters::{ProviderSessionFactory, WorkspaceStore};
use crate::config::Config;
use crate::error::AppError;

/// Configuration, the persisted workspace, and the generation controller
/// that writes into it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<WorkspaceStore>,
    pub controller: Arc<GenerationController>,
}

impl AppState {
    /// Loads the workspace and wires the controller to the real backends.
    pub async fn build(config: Arc<Config>) -> Result<Self, AppError> {
        let store = Arc::new(WorkspaceStore::load(&config.data_dir).await?);

        if store.current_api_config().await.is_none() {
            if let Some(api) = config.env_api_config() {
                info!(provider = %api.provider, "Using API key from the environment.");
                store.set_api_config(Some(api)).await?;
            }
        }

        let factory = Arc::new(ProviderSessionFactory::new(config.clone())?);
        let controller = Arc::new(GenerationController::new(
            store.clone(),
            factory,
            Arc::new(TokioSleeper),
            GenerationSettings::default(),
        ));

        Ok(Self {
            config,
            store,
            controller,
        })
    }
}
