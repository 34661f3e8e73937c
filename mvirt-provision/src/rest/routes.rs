use axum::{
    Router,
    routing::{get, patch},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};

pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/version", get(handlers::get_version))
        .route("/provisions", get(handlers::list_provisions))
        .route(
            "/namespaces/{namespace}/provisions",
            get(handlers::list_namespaced_provisions),
        )
        .route(
            "/namespaces/{namespace}/provisions/{name}",
            get(handlers::get_provision)
                .put(handlers::apply_provision)
                .delete(handlers::delete_provision),
        )
        .route(
            "/namespaces/{namespace}/provisions/{name}/phase",
            patch(handlers::set_phase),
        );

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
