use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use model::entities::user;

use crate::auth::{hash_password, verify_password, AuthUser, TokenKind};
use crate::errors::ApiError;
use crate::notify::spawn_registration_notice;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// API-facing role name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl From<user::Role> for UserRole {
    fn from(role: user::Role) -> Self {
        match role {
            user::Role::Admin => Self::Admin,
            user::Role::User => Self::User,
        }
    }
}

impl From<UserRole> for user::Role {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Admin => Self::Admin,
            UserRole::User => Self::User,
        }
    }
}

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    /// Personal consumption cap; absent means unlimited
    pub max_coffees: Option<i32>,
    pub notify_on_consumption: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            role: model.role.into(),
            is_active: model.is_active,
            max_coffees: model.max_coffees,
            notify_on_consumption: model.notify_on_consumption,
            created_at: model.created_at,
        }
    }
}

/// Request body for logging in
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Login response: a session token plus the resolved user
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Request body for self-registration
#[derive(Debug, Deserialize, Serialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 8))]
    pub password: String,
}

/// Query carrying a registration action token from an emailed link
#[derive(Debug, Deserialize)]
pub struct ActionTokenQuery {
    pub token: String,
}

/// Authenticate with email and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
#[instrument(skip(request))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    debug!("Login attempt for {}", request.email);

    let user = user::Entity::find()
        .filter(user::Column::Email.eq(request.email.as_str()))
        .one(&state.db)
        .await?;

    let Some(user) = user else {
        warn!("Login failed: unknown email {}", request.email);
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    };

    if !verify_password(&request.password, &user.password_hash) {
        warn!("Login failed: bad password for {}", request.email);
        return Err(ApiError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    if !user.is_active {
        warn!("Login refused for deactivated account {}", request.email);
        return Err(ApiError::Unauthorized(
            "Account has been deactivated".to_string(),
        ));
    }

    let token = state.tokens.issue_session(&user)?;
    info!("User {} logged in", user.id);

    Ok(Json(ApiResponse {
        data: LoginResponse {
            token,
            user: UserResponse::from(user),
        },
        message: "Login successful".to_string(),
        success: true,
    }))
}

/// Return the authenticated user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn me(AuthUser(user): AuthUser) -> Json<ApiResponse<UserResponse>> {
    Json(ApiResponse {
        data: UserResponse::from(user),
        message: "User retrieved successfully".to_string(),
        success: true,
    })
}

/// Submit a registration request
///
/// Creates a deactivated account and mails every admin an approve and a
/// reject link. The account stays locked out until someone decides.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration submitted", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
#[instrument(skip(request))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    debug!("Registration request from {}", request.email);

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(request.email.as_str()))
        .one(&state.db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::email_exists(&request.email));
    }

    let pending = user::ActiveModel {
        email: Set(request.email.clone()),
        name: Set(request.name.clone()),
        password_hash: Set(hash_password(&request.password)?),
        role: Set(user::Role::User),
        is_active: Set(false),
        max_coffees: Set(None),
        notify_on_consumption: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Registration pending for user {}", pending.id);
    spawn_registration_notice(state.clone(), pending.clone());

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: UserResponse::from(pending),
            message: "Registration submitted; an administrator will review it".to_string(),
            success: true,
        }),
    ))
}

/// Approve a pending registration via an emailed action link
#[utoipa::path(
    get,
    path = "/api/auth/registration/approve",
    tag = "auth",
    params(("token" = String, Query, description = "Registration action token")),
    responses(
        (status = 200, description = "Registration approved", body = ApiResponse<UserResponse>),
        (status = 401, description = "Invalid or mistyped token", body = ErrorResponse),
        (status = 404, description = "Pending user no longer exists", body = ErrorResponse),
        (status = 409, description = "Registration already decided", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn approve_registration(
    State(state): State<AppState>,
    Query(query): Query<ActionTokenQuery>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let pending = resolve_pending(&state, &query.token).await?;

    let mut active: user::ActiveModel = pending.into();
    active.is_active = Set(true);
    let user = active.update(&state.db).await?;

    info!("Registration approved for user {}", user.id);
    Ok(Json(ApiResponse {
        data: UserResponse::from(user),
        message: "Registration approved".to_string(),
        success: true,
    }))
}

/// Reject a pending registration via an emailed action link
#[utoipa::path(
    get,
    path = "/api/auth/registration/reject",
    tag = "auth",
    params(("token" = String, Query, description = "Registration action token")),
    responses(
        (status = 200, description = "Registration rejected", body = ApiResponse<String>),
        (status = 401, description = "Invalid or mistyped token", body = ErrorResponse),
        (status = 404, description = "Pending user no longer exists", body = ErrorResponse),
        (status = 409, description = "Registration already decided", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn reject_registration(
    State(state): State<AppState>,
    Query(query): Query<ActionTokenQuery>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let pending = resolve_pending(&state, &query.token).await?;
    let pending_id = pending.id;

    user::Entity::delete_by_id(pending_id).exec(&state.db).await?;

    info!("Registration rejected for user {}", pending_id);
    Ok(Json(ApiResponse {
        data: format!("Registration for user {pending_id} rejected"),
        message: "Registration rejected".to_string(),
        success: true,
    }))
}

/// Verify the action token (session tokens are refused by the type tag)
/// and fetch the still-pending user it refers to.
async fn resolve_pending(state: &AppState, token: &str) -> Result<user::Model, ApiError> {
    let claims = state.tokens.verify(token, TokenKind::RegistrationAction)?;

    let user = user::Entity::find_by_id(claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("Pending registration no longer exists".to_string())
        })?;

    if user.is_active {
        return Err(ApiError::Conflict {
            message: "Registration has already been decided".to_string(),
            code: "REGISTRATION_ALREADY_DECIDED",
        });
    }
    Ok(user)
}
