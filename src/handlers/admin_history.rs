use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use model::entities::{coffee_log, user};

use crate::auth::AdminUser;
use crate::errors::ApiError;
use crate::events::RefreshReason;
use crate::handlers::coffee::HistoryRowResponse;
use crate::ledger;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Request body for editing a log row
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateLogRequest {
    /// New cup count for the row
    #[validate(range(min = 1))]
    pub delta: Option<i32>,
    /// New consumption timestamp (UTC)
    pub consumed_at: Option<DateTime<Utc>>,
}

/// Query parameters for the admin history listing
#[derive(Debug, Deserialize)]
pub struct AdminHistoryQuery {
    /// Maximum rows to return; omitted means everything
    pub limit: Option<u64>,
}

/// Full consumption history across all users
#[utoipa::path(
    get,
    path = "/api/admin/history",
    tag = "admin",
    params(("limit" = Option<u64>, Query, description = "Maximum rows to return")),
    responses(
        (status = 200, description = "History rows", body = ApiResponse<Vec<HistoryRowResponse>>),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn get_history(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<AdminHistoryQuery>,
) -> Result<Json<ApiResponse<Vec<HistoryRowResponse>>>, ApiError> {
    let mut select = coffee_log::Entity::find()
        .find_also_related(user::Entity)
        .order_by_desc(coffee_log::Column::ConsumedAt);
    if let Some(limit) = query.limit {
        select = select.limit(limit);
    }

    let rows = select.all(&state.db).await?;
    debug!("Returning {} history row(s)", rows.len());

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(HistoryRowResponse::from).collect(),
        message: "History retrieved successfully".to_string(),
        success: true,
    }))
}

/// Edit a log row
///
/// Only the old-to-new difference of `delta` is applied to the stock
/// counter, and the owner's cap is re-validated against the adjusted
/// total before anything is written.
#[utoipa::path(
    put,
    path = "/api/admin/history/{log_id}",
    tag = "admin",
    params(("log_id" = i32, Path, description = "Log row ID")),
    request_body = UpdateLogRequest,
    responses(
        (status = 200, description = "Log row updated", body = ApiResponse<HistoryRowResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 404, description = "Log row not found", body = ErrorResponse),
        (status = 409, description = "Edit would exceed the owner's cap", body = ErrorResponse)
    ),
)]
#[instrument(skip(request))]
pub async fn update_log(
    AdminUser(admin): AdminUser,
    Path(log_id): Path<i32>,
    State(state): State<AppState>,
    Json(request): Json<UpdateLogRequest>,
) -> Result<Json<ApiResponse<HistoryRowResponse>>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let row = coffee_log::Entity::find_by_id(log_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Log row {log_id} not found")))?;
    let owner = user::Entity::find_by_id(row.user_id).one(&state.db).await?;

    let old_delta = row.delta;
    let new_delta = request.delta.unwrap_or(old_delta);

    if new_delta != old_delta {
        // Re-validate the owner's cap against the total this edit would
        // produce, before any counter moves.
        if let Some(owner) = &owner {
            if let Some(cap) = owner.max_coffees {
                let owner_total = ledger::consumed_count_for(&state.db, owner.id).await?
                    - i64::from(old_delta)
                    + i64::from(new_delta);
                if owner_total > i64::from(cap) {
                    warn!(
                        "Edit of log {} would put user {} over their cap of {}",
                        log_id, owner.id, cap
                    );
                    return Err(ApiError::cap_reached(cap));
                }
            }
        }

        // Apply only the difference: raising the delta removes the extra
        // cups from stock (floored at zero), lowering it credits them back.
        let diff = new_delta - old_delta;
        if diff > 0 {
            ledger::debit_stock_clamped(&state.db, diff).await?;
        } else {
            ledger::credit_stock(&state.db, -diff).await?;
        }
    }

    let mut active: coffee_log::ActiveModel = row.into();
    if let Some(delta) = request.delta {
        active.delta = Set(delta);
    }
    if let Some(consumed_at) = request.consumed_at {
        active.consumed_at = Set(consumed_at);
    }
    let updated = active.update(&state.db).await?;

    info!("Log row {} updated by admin {}", log_id, admin.id);
    state
        .events
        .publish(RefreshReason::HistoryUpdateLog, Some(updated.user_id));

    Ok(Json(ApiResponse {
        data: HistoryRowResponse::from((updated, owner)),
        message: "Log row updated successfully".to_string(),
        success: true,
    }))
}

/// Delete a log row, crediting its delta back to stock
#[utoipa::path(
    delete,
    path = "/api/admin/history/{log_id}",
    tag = "admin",
    params(("log_id" = i32, Path, description = "Log row ID")),
    responses(
        (status = 200, description = "Log row deleted", body = ApiResponse<String>),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 404, description = "Log row not found", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn delete_log(
    AdminUser(admin): AdminUser,
    Path(log_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let row = coffee_log::Entity::find_by_id(log_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Log row {log_id} not found")))?;

    ledger::credit_stock(&state.db, row.delta).await?;
    coffee_log::Entity::delete_by_id(log_id).exec(&state.db).await?;

    info!(
        "Log row {} (delta {}) deleted by admin {}",
        log_id, row.delta, admin.id
    );
    state
        .events
        .publish(RefreshReason::HistoryDeleteLog, Some(row.user_id));

    Ok(Json(ApiResponse {
        data: format!("Log row {log_id} deleted"),
        message: "Log row deleted successfully".to_string(),
        success: true,
    }))
}

/// Delete the entire history, crediting all deltas back to stock
#[utoipa::path(
    delete,
    path = "/api/admin/history",
    tag = "admin",
    responses(
        (status = 200, description = "History cleared", body = ApiResponse<String>),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn delete_all_history(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let total = ledger::consumed_total(&state.db).await?;
    let credited = i32::try_from(total).unwrap_or(i32::MAX);

    ledger::credit_stock(&state.db, credited).await?;
    let result = coffee_log::Entity::delete_many().exec(&state.db).await?;

    info!(
        "All {} history row(s) deleted by admin {}, {} cup(s) credited back",
        result.rows_affected, admin.id, credited
    );
    state.events.publish(RefreshReason::HistoryDeleteAll, None);

    Ok(Json(ApiResponse {
        data: format!("{} log row(s) deleted", result.rows_affected),
        message: "History cleared successfully".to_string(),
        success: true,
    }))
}

/// Delete one user's history, crediting their deltas back to stock
#[utoipa::path(
    delete,
    path = "/api/admin/history/user/{user_id}",
    tag = "admin",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User history cleared", body = ApiResponse<String>),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn delete_user_history(
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {user_id} not found")))?;

    let user_total = ledger::consumed_count_for(&state.db, user_id).await?;
    let credited = i32::try_from(user_total).unwrap_or(i32::MAX);

    ledger::credit_stock(&state.db, credited).await?;
    let result = coffee_log::Entity::delete_many()
        .filter(coffee_log::Column::UserId.eq(user_id))
        .exec(&state.db)
        .await?;

    info!(
        "{} history row(s) of user {} deleted by admin {}, {} cup(s) credited back",
        result.rows_affected, user_id, admin.id, credited
    );
    state
        .events
        .publish(RefreshReason::HistoryDeleteUser, Some(user_id));

    Ok(Json(ApiResponse {
        data: format!("{} log row(s) deleted", result.rows_affected),
        message: "User history cleared successfully".to_string(),
        success: true,
    }))
}

/// Flat CSV export of all log rows joined to user identity
#[utoipa::path(
    get,
    path = "/api/admin/export.csv",
    tag = "admin",
    responses(
        (status = 200, description = "CSV export", content_type = "text/csv", body = String),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn export_csv(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<([(&'static str, &'static str); 2], String), ApiError> {
    let rows = coffee_log::Entity::find()
        .find_also_related(user::Entity)
        .order_by_asc(coffee_log::Column::ConsumedAt)
        .all(&state.db)
        .await?;

    let mut out = String::from("id,user_id,user_email,user_name,delta,consumed_at\n");
    for (log, owner) in rows {
        let email = owner.as_ref().map(|u| u.email.as_str()).unwrap_or("");
        let name = owner.as_ref().map(|u| u.name.as_str()).unwrap_or("");
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            csv_escape(&log.id.to_string()),
            csv_escape(&log.user_id.to_string()),
            csv_escape(email),
            csv_escape(name),
            csv_escape(&log.delta.to_string()),
            csv_escape(&log.consumed_at.to_rfc3339()),
        ));
    }

    Ok((
        [
            ("content-type", "text/csv; charset=utf-8"),
            (
                "content-disposition",
                "attachment; filename=\"coffee_logs.csv\"",
            ),
        ],
        out,
    ))
}

/// Quote a CSV field, doubling any embedded quotes.
fn csv_escape(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_fields_are_quoted() {
        assert_eq!(csv_escape("alice@office.test"), "\"alice@office.test\"");
        assert_eq!(csv_escape(""), "\"\"");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn commas_and_newlines_stay_inside_the_quotes() {
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("line1\nline2"), "\"line1\nline2\"");
    }
}
