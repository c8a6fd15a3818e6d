use accounting::{derive_stock, StockDerived};
use axum::{extract::State, response::Json};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, Set};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::AdminUser;
use crate::errors::ApiError;
use crate::events::RefreshReason;
use crate::ledger;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Stock settings as the admin dashboard sees them
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminStockResponse {
    pub initial_stock: i32,
    pub current_stock: i32,
    pub min_stock: i32,
    pub updated_by: Option<i32>,
    pub updated_at: DateTime<Utc>,
    pub derived: StockDerived,
}

/// Request body for (re)initializing the stock settings
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateStockRequest {
    #[validate(range(min = 0))]
    pub initial_stock: i32,
    /// Defaults to `initial_stock` when omitted
    #[validate(range(min = 0))]
    pub current_stock: Option<i32>,
    #[validate(range(min = 0))]
    pub min_stock: i32,
}

/// Current stock settings with derived quantities
#[utoipa::path(
    get,
    path = "/api/admin/stock",
    tag = "admin",
    responses(
        (status = 200, description = "Stock settings", body = ApiResponse<AdminStockResponse>),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 404, description = "Stock not initialized", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn get_stock(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AdminStockResponse>>, ApiError> {
    let settings = ledger::load_settings(&state.db).await?;
    let total = ledger::consumed_total(&state.db).await?;
    let derived = derive_stock(
        i64::from(settings.initial_stock),
        i64::from(settings.current_stock),
        i64::from(settings.min_stock),
        total,
    );

    Ok(Json(ApiResponse {
        data: AdminStockResponse {
            initial_stock: settings.initial_stock,
            current_stock: settings.current_stock,
            min_stock: settings.min_stock,
            updated_by: settings.updated_by,
            updated_at: settings.updated_at,
            derived,
        },
        message: "Stock settings retrieved successfully".to_string(),
        success: true,
    }))
}

/// (Re)initialize the stock settings
///
/// Setting `current_stock` away from `initial_stock - consumed_total`
/// is legitimate; the divergence shows up as `manual_delta`.
#[utoipa::path(
    put,
    path = "/api/admin/stock",
    tag = "admin",
    request_body = UpdateStockRequest,
    responses(
        (status = 200, description = "Stock settings updated", body = ApiResponse<AdminStockResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    ),
)]
#[instrument(skip(request))]
pub async fn update_stock(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(request): Json<UpdateStockRequest>,
) -> Result<Json<ApiResponse<AdminStockResponse>>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let settings = ledger::ensure_stock_row(&state.db).await?;

    let mut active: model::entities::stock_settings::ActiveModel = settings.into();
    active.initial_stock = Set(request.initial_stock);
    active.current_stock = Set(request.current_stock.unwrap_or(request.initial_stock));
    active.min_stock = Set(request.min_stock);
    active.updated_by = Set(Some(admin.id));
    active.updated_at = Set(Utc::now());
    let updated = active.update(&state.db).await?;

    info!(
        "Stock settings updated by admin {}: initial {}, current {}, min {}",
        admin.id, updated.initial_stock, updated.current_stock, updated.min_stock
    );
    state.events.publish(RefreshReason::StockInit, None);

    let total = ledger::consumed_total(&state.db).await?;
    let derived = derive_stock(
        i64::from(updated.initial_stock),
        i64::from(updated.current_stock),
        i64::from(updated.min_stock),
        total,
    );

    Ok(Json(ApiResponse {
        data: AdminStockResponse {
            initial_stock: updated.initial_stock,
            current_stock: updated.current_stock,
            min_stock: updated.min_stock,
            updated_by: updated.updated_by,
            updated_at: updated.updated_at,
            derived,
        },
        message: "Stock settings updated successfully".to_string(),
        success: true,
    }))
}
