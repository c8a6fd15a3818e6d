use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::auth::TokenKeys;
use crate::errors::RuntimeErrorLog;
use crate::events::DashboardEvents;
use crate::notify::Mailer;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Signing and verification keys for bearer and action tokens
    pub tokens: TokenKeys,
    /// Outbound mail client; `None` disables all email paths
    pub mailer: Option<Mailer>,
    /// Broadcast channel feeding the admin dashboard stream
    pub events: DashboardEvents,
    /// Ring of recent runtime errors from detached work
    pub errors: RuntimeErrorLog,
    /// Resolved storage namespace, reported by the health endpoint
    pub namespace: String,
    /// Allowed CORS origin; `None` means permissive
    pub cors_origin: Option<String>,
    /// Base URL used when building links for outbound emails
    pub public_base_url: String,
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
    /// Resolved storage namespace
    pub namespace: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::login,
        crate::handlers::auth::register,
        crate::handlers::auth::approve_registration,
        crate::handlers::auth::reject_registration,
        crate::handlers::auth::me,
        crate::handlers::coffee::stock_status,
        crate::handlers::coffee::consume,
        crate::handlers::coffee::history,
        crate::handlers::admin_users::get_users,
        crate::handlers::admin_users::create_user,
        crate::handlers::admin_users::update_user,
        crate::handlers::admin_users::delete_user,
        crate::handlers::admin_users::consume_on_behalf,
        crate::handlers::admin_users::get_user_stats,
        crate::handlers::admin_stock::get_stock,
        crate::handlers::admin_stock::update_stock,
        crate::handlers::admin_history::get_history,
        crate::handlers::admin_history::update_log,
        crate::handlers::admin_history::delete_log,
        crate::handlers::admin_history::delete_all_history,
        crate::handlers::admin_history::delete_user_history,
        crate::handlers::admin_history::export_csv,
        crate::handlers::admin_system::send_test_email,
        crate::handlers::admin_system::recent_errors,
    ),
    components(
        schemas(
            ApiResponse<crate::handlers::auth::LoginResponse>,
            ApiResponse<crate::handlers::auth::UserResponse>,
            ApiResponse<Vec<crate::handlers::auth::UserResponse>>,
            ApiResponse<crate::handlers::coffee::StockStatusResponse>,
            ApiResponse<crate::handlers::coffee::ConsumeResponse>,
            ApiResponse<Vec<crate::handlers::coffee::HistoryRowResponse>>,
            ApiResponse<crate::handlers::admin_stock::AdminStockResponse>,
            ApiResponse<Vec<crate::handlers::admin_users::UserStatsResponse>>,
            ApiResponse<Vec<crate::errors::RuntimeError>>,
            ApiResponse<String>,
            ErrorResponse,
            HealthResponse,
            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::LoginResponse,
            crate::handlers::auth::RegisterRequest,
            crate::handlers::auth::UserResponse,
            crate::handlers::auth::UserRole,
            crate::handlers::coffee::StockStatusResponse,
            crate::handlers::coffee::ConsumeResponse,
            crate::handlers::coffee::HistoryRowResponse,
            crate::handlers::admin_users::CreateUserRequest,
            crate::handlers::admin_users::UpdateUserRequest,
            crate::handlers::admin_users::UserStatsResponse,
            crate::handlers::admin_stock::AdminStockResponse,
            crate::handlers::admin_stock::UpdateStockRequest,
            crate::handlers::admin_history::UpdateLogRequest,
            accounting::StockDerived,
            crate::errors::RuntimeError,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Login, registration and identity"),
        (name = "coffee", description = "Stock status and consumption"),
        (name = "admin", description = "Administration surface"),
    ),
    info(
        title = "BeanCounter API",
        description = "Shared office coffee counter - stock ledger, per-user consumption log and notifications",
        version = "0.1.0",
    )
)]
pub struct ApiDoc;
