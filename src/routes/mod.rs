pub mod chat;
pub mod collection;
pub mod health;
pub mod papers;

use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::services::AppState;

/// Request timeout. Generous because a collection run awaits every
/// selected provider jointly.
const REQUEST_TIMEOUT_SECS: u64 = 120;

pub fn create_router(state: AppState, metrics_router: Router) -> Router {
    let api_routes = Router::new()
        .route("/collect", post(collection::run_collection))
        .route("/collect/auto", post(collection::run_auto_collection))
        .route("/chat", post(chat::chat))
        .route("/papers/:id/suggest-tags", post(papers::suggest_tags))
        .route("/papers/:id/summary", post(papers::generate_summary))
        .route(
            "/papers/:id/tags",
            post(papers::add_tag).delete(papers::remove_tag),
        )
        .with_state(state);

    Router::new()
        .merge(api_routes)
        .route("/health", get(health::health_check))
        .merge(metrics_router)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
                .layer(CorsLayer::permissive()),
        )
}
