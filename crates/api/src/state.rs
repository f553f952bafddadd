use std::sync::Arc;

use pixeltrace_core::auth::CallbackAuthenticator;
use pixeltrace_db::JobStore;
use pixeltrace_provider::ComputeProvider;

use crate::config::ServerConfig;
use crate::engine::{JobCoordinator, JobDispatcher, StatusQuery};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Job store backend (in-memory or PostgreSQL).
    pub store: Arc<dyn JobStore>,
    pub dispatcher: Arc<JobDispatcher>,
    pub coordinator: Arc<JobCoordinator>,
    pub status: Arc<StatusQuery>,
    /// Checks the `X-Callback-Secret` header on runner callbacks.
    pub authenticator: Arc<CallbackAuthenticator>,
}

impl AppState {
    /// Wire the engine components around one store and one provider.
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn JobStore>,
        provider: Arc<dyn ComputeProvider>,
    ) -> Self {
        let coordinator = Arc::new(JobCoordinator::new(Arc::clone(&store)));
        let dispatcher = Arc::new(JobDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&coordinator),
            provider,
            config.callback_url(),
        ));
        let status = Arc::new(StatusQuery::new(Arc::clone(&store)));
        let authenticator = Arc::new(CallbackAuthenticator::new(config.callback_secret.as_deref()));

        Self {
            config: Arc::new(config),
            store,
            dispatcher,
            coordinator,
            status,
            authenticator,
        }
    }
}
