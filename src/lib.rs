//! HR console: schema-driven admin backend for HR, payroll and fleet records.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod render;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod storage;

pub use config::{resolve, ResolvedEntity, ResolvedModel};
pub use error::{AppError, ConfigError};
pub use migration::apply_migrations;
pub use routes::{common_routes, console_routes};
pub use service::CrudService;
pub use settings::Settings;
pub use state::AppState;
pub use storage::{MemoryStore, ObjectStore, S3Store};

use axum::{extract::DefaultBodyLimit, Router};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Upper bound of one request body; covers a 5 MB document plus form fields.
pub const MAX_BODY_BYTES: usize = 6 * 1024 * 1024;

/// The full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(common_routes())
        .merge(console_routes())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
