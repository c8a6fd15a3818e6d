use crate::handlers::{
    admin_history::{
        delete_all_history, delete_log, delete_user_history, export_csv, get_history, update_log,
    },
    admin_stock::{get_stock, update_stock},
    admin_system::{recent_errors, send_test_email},
    admin_users::{
        consume_on_behalf, create_user, delete_user, get_user_stats, get_users, update_user,
    },
    auth::{approve_registration, login, me, register, reject_registration},
    coffee::{consume, history, stock_status},
    events::stream_dashboard,
    health::health_check,
};
use crate::schemas::{ApiDoc, AppState};
use axum::http::HeaderValue;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Restrict CORS to the configured origin, or stay permissive when none
/// is set (local development).
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    match origin {
        Some(raw) => match raw.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(value)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                warn!("Invalid CORS_ORIGIN '{}', falling back to permissive", raw);
                CorsLayer::permissive()
            }
        },
        None => CorsLayer::permissive(),
    }
}

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(state.cors_origin.as_deref());

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Auth routes
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/registration/approve", get(approve_registration))
        .route("/api/auth/registration/reject", get(reject_registration))
        .route("/api/auth/me", get(me))
        // Coffee routes
        .route("/api/coffee/status", get(stock_status))
        .route("/api/coffee/consume", post(consume))
        .route("/api/coffee/history", get(history))
        // Admin: users
        .route("/api/admin/users", get(get_users))
        .route("/api/admin/users", post(create_user))
        .route("/api/admin/users/:user_id", put(update_user))
        .route("/api/admin/users/:user_id", delete(delete_user))
        .route("/api/admin/users/:user_id/consume", post(consume_on_behalf))
        .route("/api/admin/stats", get(get_user_stats))
        // Admin: stock settings
        .route("/api/admin/stock", get(get_stock))
        .route("/api/admin/stock", put(update_stock))
        // Admin: history
        .route("/api/admin/history", get(get_history))
        .route("/api/admin/history", delete(delete_all_history))
        .route("/api/admin/history/:log_id", put(update_log))
        .route("/api/admin/history/:log_id", delete(delete_log))
        .route(
            "/api/admin/history/user/:user_id",
            delete(delete_user_history),
        )
        .route("/api/admin/export.csv", get(export_csv))
        // Admin: system
        .route("/api/admin/test-email", post(send_test_email))
        .route("/api/admin/errors", get(recent_errors))
        .route("/api/admin/events", get(stream_dashboard))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(30)))
                .layer(cors),
        )
        .with_state(state)
}
