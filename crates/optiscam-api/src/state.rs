//! Application state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use optiscam_ml_client::MlClient;
use optiscam_worker::JobManager;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub jobs: JobManager,
    /// Sidecar client, used by the readiness check
    pub ml: Arc<MlClient>,
    models_loaded: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(config: ApiConfig, jobs: JobManager, ml: Arc<MlClient>) -> Self {
        Self {
            config: Arc::new(config),
            jobs,
            ml,
            models_loaded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the sidecar has reported its models loaded at least once.
    pub fn models_loaded(&self) -> bool {
        self.models_loaded.load(Ordering::Relaxed)
    }

    pub fn set_models_loaded(&self, loaded: bool) {
        self.models_loaded.store(loaded, Ordering::Relaxed);
    }
}
