use std::sync::Arc;

use ngas_core::coordinator::ArchiveCoordinator;
use ngas_core::ServerContext;

use crate::config::Config;

/// Everything a handler needs, cloned cheaply into every request (Axum
/// extracts this via `State<AppState>`).
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ArchiveCoordinator>,
    pub context: Arc<ServerContext>,
    pub config: Arc<Config>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
