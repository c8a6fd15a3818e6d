use accounting::{derive_stock, remaining_allowance, StockDerived};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use model::entities::{coffee_log, user};

use crate::auth::AuthUser;
use crate::errors::ApiError;
use crate::events::RefreshReason;
use crate::ledger;
use crate::notify::spawn_consumption_broadcast;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Default and ceiling for the history page size.
const DEFAULT_HISTORY_LIMIT: u64 = 50;
const MAX_HISTORY_LIMIT: u64 = 500;

/// Stock snapshot plus everything derived from it
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StockStatusResponse {
    pub initial_stock: i32,
    pub current_stock: i32,
    pub min_stock: i32,
    pub updated_at: DateTime<Utc>,
    pub derived: StockDerived,
    /// Cups the caller has consumed so far
    pub my_consumed: i64,
    /// Cups the caller may still take; absent means unlimited
    pub my_remaining: Option<i64>,
}

/// Result of a successful consumption
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConsumeResponse {
    pub log_id: i32,
    pub user_id: i32,
    pub consumed_at: DateTime<Utc>,
    pub current_stock: i32,
    pub derived: StockDerived,
    /// Cups the consuming user may still take; absent means unlimited
    pub remaining: Option<i64>,
}

/// One consumption log row joined to its owner's identity
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryRowResponse {
    pub id: i32,
    pub user_id: i32,
    /// Owner email; absent if the owner row vanished mid-query
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub delta: i32,
    pub consumed_at: DateTime<Utc>,
}

impl From<(coffee_log::Model, Option<user::Model>)> for HistoryRowResponse {
    fn from((log, owner): (coffee_log::Model, Option<user::Model>)) -> Self {
        Self {
            id: log.id,
            user_id: log.user_id,
            user_email: owner.as_ref().map(|u| u.email.clone()),
            user_name: owner.map(|u| u.name),
            delta: log.delta,
            consumed_at: log.consumed_at,
        }
    }
}

/// Query parameters for the history endpoint
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// 1 (default) scopes to the caller; 0 requests all rows (admin only)
    pub mine: Option<u8>,
    /// Maximum number of rows to return
    pub limit: Option<u64>,
}

/// Where a consumption request came from; decides the dashboard reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOrigin {
    SelfServe,
    AdminOnBehalf,
}

/// The consumption state machine, shared verbatim by the self-serve
/// endpoint and the admin-on-behalf endpoint so the two can never
/// drift apart.
///
/// Order matters: the log row is appended only after the guarded
/// decrement is confirmed, so a log row always has a matching decrement.
/// The decrement and the insert are two statements, not one transaction;
/// an insert failure leaves the counter reduced but unlogged (see
/// DESIGN.md).
pub(crate) async fn consume_for_user(
    state: &AppState,
    target: &user::Model,
    origin: ConsumeOrigin,
) -> Result<ConsumeResponse, ApiError> {
    // Cap check first: a capped-out user gets a conflict even with stock
    // on the shelf, and nothing is mutated.
    let consumed_count = ledger::consumed_count_for(&state.db, target.id).await?;
    if let Some(cap) = target.max_coffees {
        if consumed_count >= i64::from(cap) {
            warn!("User {} hit their cap of {}", target.id, cap);
            return Err(ApiError::cap_reached(cap));
        }
    }

    // Cheap pre-check; the decrement below re-checks inside the statement.
    let settings = ledger::load_settings(&state.db).await?;
    if settings.current_stock <= 0 {
        return Err(ApiError::stock_exhausted());
    }

    if !ledger::try_consume_one(&state.db).await? {
        // Lost the race against a concurrent consumer.
        warn!("User {} lost the decrement race", target.id);
        return Err(ApiError::stock_exhausted());
    }

    let entry = coffee_log::ActiveModel {
        user_id: Set(target.id),
        delta: Set(1),
        consumed_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    let after = ledger::load_settings(&state.db).await?;
    let total = ledger::consumed_total(&state.db).await?;
    let derived = derive_stock(
        i64::from(after.initial_stock),
        i64::from(after.current_stock),
        i64::from(after.min_stock),
        total,
    );
    let remaining =
        remaining_allowance(target.max_coffees.map(i64::from), consumed_count + 1);

    info!(
        "User {} consumed one cup; {} remain",
        target.id, after.current_stock
    );

    let reason = match origin {
        ConsumeOrigin::SelfServe => RefreshReason::HistoryAddUser,
        ConsumeOrigin::AdminOnBehalf => RefreshReason::AdminConsume,
    };
    state.events.publish(reason, Some(target.id));

    // Detached: never blocks or fails the consumption response.
    spawn_consumption_broadcast(state.clone(), target.clone(), after.current_stock);

    Ok(ConsumeResponse {
        log_id: entry.id,
        user_id: target.id,
        consumed_at: entry.consumed_at,
        current_stock: after.current_stock,
        derived,
        remaining,
    })
}

/// Current stock snapshot with derived quantities
#[utoipa::path(
    get,
    path = "/api/coffee/status",
    tag = "coffee",
    responses(
        (status = 200, description = "Stock status", body = ApiResponse<StockStatusResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "Stock not initialized", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn stock_status(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StockStatusResponse>>, ApiError> {
    let settings = ledger::load_settings(&state.db).await?;
    let total = ledger::consumed_total(&state.db).await?;
    let my_consumed = ledger::consumed_count_for(&state.db, user.id).await?;

    let derived = derive_stock(
        i64::from(settings.initial_stock),
        i64::from(settings.current_stock),
        i64::from(settings.min_stock),
        total,
    );
    let my_remaining = remaining_allowance(user.max_coffees.map(i64::from), my_consumed);

    debug!(
        "Status for user {}: {} in stock, manual delta {}",
        user.id, settings.current_stock, derived.manual_delta
    );

    Ok(Json(ApiResponse {
        data: StockStatusResponse {
            initial_stock: settings.initial_stock,
            current_stock: settings.current_stock,
            min_stock: settings.min_stock,
            updated_at: settings.updated_at,
            derived,
            my_consumed,
            my_remaining,
        },
        message: "Stock status retrieved successfully".to_string(),
        success: true,
    }))
}

/// Take one cup
#[utoipa::path(
    post,
    path = "/api/coffee/consume",
    tag = "coffee",
    responses(
        (status = 201, description = "Consumption logged", body = ApiResponse<ConsumeResponse>),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 409, description = "Stock exhausted or cap reached", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn consume(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ApiResponse<ConsumeResponse>>), ApiError> {
    let outcome = consume_for_user(&state, &user, ConsumeOrigin::SelfServe).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: outcome,
            message: "Consumption logged successfully".to_string(),
            success: true,
        }),
    ))
}

/// Consumption history
///
/// Self-scoped by default. `mine=0` widens to every user's rows, but
/// only for admins; non-admins asking for everything still get their
/// own rows.
#[utoipa::path(
    get,
    path = "/api/coffee/history",
    tag = "coffee",
    params(
        ("mine" = Option<u8>, Query, description = "1 (default) for own rows, 0 for all rows (admin only)"),
        ("limit" = Option<u64>, Query, description = "Maximum rows to return"),
    ),
    responses(
        (status = 200, description = "History rows", body = ApiResponse<Vec<HistoryRowResponse>>),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
)]
#[instrument(skip_all)]
pub async fn history(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<HistoryRowResponse>>>, ApiError> {
    let all_rows = user.role == user::Role::Admin && query.mine == Some(0);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);

    let mut select = coffee_log::Entity::find()
        .find_also_related(user::Entity)
        .order_by_desc(coffee_log::Column::ConsumedAt)
        .limit(limit);
    if !all_rows {
        select = select.filter(coffee_log::Column::UserId.eq(user.id));
    }

    let rows = select.all(&state.db).await?;
    let row_count = rows.len();
    let data: Vec<HistoryRowResponse> = rows.into_iter().map(HistoryRowResponse::from).collect();

    debug!(
        "Returning {} history row(s) for user {} (all_rows: {})",
        row_count, user.id, all_rows
    );

    Ok(Json(ApiResponse {
        data,
        message: "History retrieved successfully".to_string(),
        success: true,
    }))
}
