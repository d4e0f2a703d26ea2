//! HTTP route handlers for the Resonance worker

pub mod tasks;

pub use tasks::tasks_router;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::tasks::TaskManager;

/// Full worker router
pub fn router(manager: TaskManager) -> Router {
    Router::new()
        .nest("/tasks", tasks_router(manager))
        .route("/health", axum::routing::get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
}
