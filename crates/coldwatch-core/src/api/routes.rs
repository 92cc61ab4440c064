//! API routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{self, AppState};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))

        // Readings
        .route(
            "/api/v1/readings",
            post(handlers::record_reading).get(handlers::list_readings),
        )
        .route("/api/v1/readings/statistics", get(handlers::get_statistics))
        .route("/api/v1/readings/trends", get(handlers::get_trends))

        // Alerts
        .route("/api/v1/alerts", get(handlers::list_alerts))
        .route("/api/v1/alerts/:alert_id", get(handlers::get_alert))
        .route("/api/v1/alerts/:alert_id/acknowledge", post(handlers::acknowledge_alert))
        .route("/api/v1/alerts/:alert_id/resolve", post(handlers::resolve_alert))
        .route("/api/v1/alerts/:alert_id/comments", post(handlers::comment_alert))

        // Thresholds
        .route("/api/v1/thresholds", get(handlers::get_threshold))

        .with_state(state)
}
