use axum::{extract::State, response::Json};
use tracing::{info, instrument};

use crate::auth::AdminUser;
use crate::errors::{ApiError, RuntimeError};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Send a test email to the requesting admin
///
/// Unlike the consumption broadcast, this call runs on the request path
/// on purpose: it exists to check the mail transport, so a provider
/// failure comes straight back to the caller.
#[utoipa::path(
    post,
    path = "/api/admin/test-email",
    tag = "admin",
    responses(
        (status = 200, description = "Test email sent", body = ApiResponse<String>),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 502, description = "Mail transport failed", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn send_test_email(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let Some(mailer) = &state.mailer else {
        return Err(ApiError::MailDelivery(
            "Mailer is not configured".to_string(),
        ));
    };

    let recipients = vec![admin.email.clone()];
    mailer
        .send(
            &recipients,
            "Coffee counter test email",
            "If you can read this, the mail transport works.",
        )
        .await
        .map_err(|e| ApiError::MailDelivery(e.to_string()))?;

    info!("Test email sent to admin {}", admin.id);
    Ok(Json(ApiResponse {
        data: format!("Test email sent to {}", admin.email),
        message: "Test email sent successfully".to_string(),
        success: true,
    }))
}

/// Recent runtime errors from detached work
#[utoipa::path(
    get,
    path = "/api/admin/errors",
    tag = "admin",
    responses(
        (status = 200, description = "Recent runtime errors", body = ApiResponse<Vec<RuntimeError>>),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn recent_errors(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<RuntimeError>>> {
    let errors = state.errors.recent();
    Json(ApiResponse {
        data: errors,
        message: "Runtime errors retrieved successfully".to_string(),
        success: true,
    })
}
