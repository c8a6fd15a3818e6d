use accounting::remaining_allowance;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, FromQueryResult, QueryFilter, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use model::entities::{coffee_log, user};

use crate::auth::{hash_password, AdminUser};
use crate::errors::ApiError;
use crate::handlers::auth::{UserResponse, UserRole};
use crate::handlers::coffee::{consume_for_user, ConsumeOrigin, ConsumeResponse};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Request body for creating a new user
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 8))]
    pub password: String,
    /// Role; defaults to a regular user
    pub role: Option<UserRole>,
    /// Personal consumption cap; omit for unlimited
    #[validate(range(min = 0))]
    pub max_coffees: Option<i32>,
    pub notify_on_consumption: Option<bool>,
    /// Defaults to active
    pub is_active: Option<bool>,
}

/// Request body for updating a user
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(min = 8))]
    pub password: Option<String>,
    pub role: Option<UserRole>,
    #[validate(range(min = 0))]
    pub max_coffees: Option<i32>,
    /// Set to drop an existing cap entirely
    pub clear_max_coffees: Option<bool>,
    pub notify_on_consumption: Option<bool>,
    pub is_active: Option<bool>,
}

/// Per-user consumption statistics
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserStatsResponse {
    pub user_id: i32,
    pub email: String,
    pub name: String,
    pub consumed_count: i64,
    /// Cups still allowed under the cap; absent means unlimited
    pub remaining: Option<i64>,
    pub last_consumed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromQueryResult)]
struct UserAggRow {
    user_id: i32,
    consumed: Option<i64>,
    last_consumed_at: Option<DateTime<Utc>>,
}

/// Get all users
#[utoipa::path(
    get,
    path = "/api/admin/users",
    tag = "admin",
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn get_users(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    let users = user::Entity::find().all(&state.db).await?;
    let user_count = users.len();
    debug!("Retrieved {} users from database", user_count);

    Ok(Json(ApiResponse {
        data: users.into_iter().map(UserResponse::from).collect(),
        message: "Users retrieved successfully".to_string(),
        success: true,
    }))
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/api/admin/users",
    tag = "admin",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
)]
#[instrument(skip(request))]
pub async fn create_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    debug!("Admin {} creating user {}", admin.id, request.email);

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(request.email.as_str()))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::email_exists(&request.email));
    }

    let created = user::ActiveModel {
        email: Set(request.email.clone()),
        name: Set(request.name.clone()),
        password_hash: Set(hash_password(&request.password)?),
        role: Set(request.role.unwrap_or(UserRole::User).into()),
        is_active: Set(request.is_active.unwrap_or(true)),
        max_coffees: Set(request.max_coffees),
        notify_on_consumption: Set(request.notify_on_consumption.unwrap_or(false)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("User created with ID {} by admin {}", created.id, admin.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: UserResponse::from(created),
            message: "User created successfully".to_string(),
            success: true,
        }),
    ))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/api/admin/users/{user_id}",
    tag = "admin",
    params(("user_id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    ),
)]
#[instrument(skip(request))]
pub async fn update_user(
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    Json(request): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let existing = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {user_id} not found")))?;

    if let Some(email) = &request.email {
        if *email != existing.email {
            let taken = user::Entity::find()
                .filter(user::Column::Email.eq(email.as_str()))
                .one(&state.db)
                .await?;
            if taken.is_some() {
                return Err(ApiError::email_exists(email));
            }
        }
    }

    let mut active: user::ActiveModel = existing.into();
    if let Some(email) = request.email {
        active.email = Set(email);
    }
    if let Some(name) = request.name {
        active.name = Set(name);
    }
    if let Some(password) = request.password {
        active.password_hash = Set(hash_password(&password)?);
    }
    if let Some(role) = request.role {
        active.role = Set(role.into());
    }
    if request.clear_max_coffees.unwrap_or(false) {
        active.max_coffees = Set(None);
    } else if let Some(cap) = request.max_coffees {
        active.max_coffees = Set(Some(cap));
    }
    if let Some(notify) = request.notify_on_consumption {
        active.notify_on_consumption = Set(notify);
    }
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
    }

    let updated = active.update(&state.db).await?;
    info!("User {} updated by admin {}", updated.id, admin.id);

    Ok(Json(ApiResponse {
        data: UserResponse::from(updated),
        message: "User updated successfully".to_string(),
        success: true,
    }))
}

/// Delete a user (their log rows cascade)
#[utoipa::path(
    delete,
    path = "/api/admin/users/{user_id}",
    tag = "admin",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted successfully", body = ApiResponse<String>),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Admins cannot delete their own account", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    if user_id == admin.id {
        warn!("Admin {} attempted to delete their own account", admin.id);
        return Err(ApiError::Conflict {
            message: "Admins cannot delete their own account".to_string(),
            code: "SELF_DELETE",
        });
    }

    let result = user::Entity::delete_by_id(user_id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound(format!("User {user_id} not found")));
    }

    info!("User {} deleted by admin {}", user_id, admin.id);
    Ok(Json(ApiResponse {
        data: format!("User {user_id} deleted"),
        message: "User deleted successfully".to_string(),
        success: true,
    }))
}

/// Log a consumption on behalf of a user
///
/// Runs the exact same state machine as the self-serve endpoint; only
/// the dashboard refresh reason differs.
#[utoipa::path(
    post,
    path = "/api/admin/users/{user_id}/consume",
    tag = "admin",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 201, description = "Consumption logged", body = ApiResponse<ConsumeResponse>),
        (status = 403, description = "Administrator role required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Stock exhausted, cap reached or user inactive", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn consume_on_behalf(
    AdminUser(admin): AdminUser,
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ApiResponse<ConsumeResponse>>), ApiError> {
    let target = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {user_id} not found")))?;

    if !target.is_active {
        return Err(ApiError::Conflict {
            message: format!("User {user_id} is deactivated"),
            code: "USER_INACTIVE",
        });
    }

    debug!("Admin {} consuming on behalf of user {}", admin.id, user_id);
    let outcome = consume_for_user(&state, &target, ConsumeOrigin::AdminOnBehalf).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: outcome,
            message: "Consumption logged successfully".to_string(),
            success: true,
        }),
    ))
}

/// Per-user consumption statistics
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "admin",
    responses(
        (status = 200, description = "Statistics retrieved successfully", body = ApiResponse<Vec<UserStatsResponse>>),
        (status = 403, description = "Administrator role required", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn get_user_stats(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<UserStatsResponse>>>, ApiError> {
    let users = user::Entity::find().all(&state.db).await?;

    let aggregates: Vec<UserAggRow> = coffee_log::Entity::find()
        .select_only()
        .column(coffee_log::Column::UserId)
        .column_as(coffee_log::Column::Delta.sum(), "consumed")
        .column_as(coffee_log::Column::ConsumedAt.max(), "last_consumed_at")
        .group_by(coffee_log::Column::UserId)
        .into_model()
        .all(&state.db)
        .await?;

    let stats: Vec<UserStatsResponse> = users
        .into_iter()
        .map(|u| {
            let agg = aggregates.iter().find(|row| row.user_id == u.id);
            let consumed_count = agg.and_then(|row| row.consumed).unwrap_or(0);
            UserStatsResponse {
                user_id: u.id,
                email: u.email,
                name: u.name,
                consumed_count,
                remaining: remaining_allowance(u.max_coffees.map(i64::from), consumed_count),
                last_consumed_at: agg.and_then(|row| row.last_consumed_at),
            }
        })
        .collect();

    Ok(Json(ApiResponse {
        data: stats,
        message: "Statistics retrieved successfully".to_string(),
        success: true,
    }))
}
