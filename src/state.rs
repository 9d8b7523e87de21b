//! Shared application state for all routes.

use crate::config::ResolvedModel;
use crate::storage::ObjectStore;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Resolved once at startup; immutable afterwards.
    pub model: Arc<ResolvedModel>,
    pub store: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(pool: PgPool, model: ResolvedModel, store: Arc<dyn ObjectStore>) -> Self {
        AppState {
            pool,
            model: Arc::new(model),
            store,
        }
    }
}
