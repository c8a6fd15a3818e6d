use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
};
use tracing::debug;

use model::entities::stock_settings::{self, STOCK_ROW_ID};
use model::entities::coffee_log;

use crate::errors::ApiError;

/// Load the singleton stock row.
pub async fn load_settings(db: &DatabaseConnection) -> Result<stock_settings::Model, ApiError> {
    stock_settings::Entity::find_by_id(STOCK_ROW_ID)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Stock has not been initialized".to_string()))
}

/// Make sure the singleton stock row exists, creating an all-zero one if
/// it does not. Called once at startup.
pub async fn ensure_stock_row(db: &DatabaseConnection) -> Result<stock_settings::Model, ApiError> {
    if let Some(existing) = stock_settings::Entity::find_by_id(STOCK_ROW_ID).one(db).await? {
        return Ok(existing);
    }
    debug!("Creating empty stock settings row");
    let row = stock_settings::ActiveModel {
        id: Set(STOCK_ROW_ID),
        initial_stock: Set(0),
        current_stock: Set(0),
        min_stock: Set(0),
        updated_by: Set(None),
        updated_at: Set(Utc::now()),
    }
    .insert(db)
    .await?;
    Ok(row)
}

/// Attempt to take one cup off the counter.
///
/// The decrement is conditioned on `current_stock > 0` inside the
/// statement itself, so two requests racing past an earlier read cannot
/// drive the counter negative. After the statement we re-read the row and
/// require that it actually dropped below the pre-decrement snapshot;
/// a request that lost the race reports `false` and must not log
/// anything.
pub async fn try_consume_one(db: &DatabaseConnection) -> Result<bool, ApiError> {
    let before = load_settings(db).await?;
    if before.current_stock <= 0 {
        return Ok(false);
    }

    let result = stock_settings::Entity::update_many()
        .col_expr(
            stock_settings::Column::CurrentStock,
            Expr::col(stock_settings::Column::CurrentStock).sub(1),
        )
        .filter(stock_settings::Column::Id.eq(STOCK_ROW_ID))
        .filter(stock_settings::Column::CurrentStock.gt(0))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        debug!("Guarded decrement matched no row; stock already exhausted");
        return Ok(false);
    }

    let after = load_settings(db).await?;
    Ok(after.current_stock < before.current_stock)
}

/// Credit stock back, e.g. after a history deletion. Uncapped: crediting
/// may push `current_stock` above `initial_stock`.
pub async fn credit_stock(db: &DatabaseConnection, amount: i32) -> Result<(), ApiError> {
    if amount <= 0 {
        return Ok(());
    }
    stock_settings::Entity::update_many()
        .col_expr(
            stock_settings::Column::CurrentStock,
            Expr::col(stock_settings::Column::CurrentStock).add(amount),
        )
        .filter(stock_settings::Column::Id.eq(STOCK_ROW_ID))
        .exec(db)
        .await?;
    Ok(())
}

/// Remove stock with a floor at zero, used when a history edit increases
/// a row's delta. The clamp lives in the statement so concurrent writers
/// cannot push the counter negative between a read and a write.
pub async fn debit_stock_clamped(db: &DatabaseConnection, amount: i32) -> Result<(), ApiError> {
    if amount <= 0 {
        return Ok(());
    }
    stock_settings::Entity::update_many()
        .col_expr(
            stock_settings::Column::CurrentStock,
            Expr::cust_with_values(
                "CASE WHEN current_stock >= ? THEN current_stock - ? ELSE 0 END",
                [amount, amount],
            ),
        )
        .filter(stock_settings::Column::Id.eq(STOCK_ROW_ID))
        .exec(db)
        .await?;
    Ok(())
}

/// Sum of all log deltas.
pub async fn consumed_total(db: &DatabaseConnection) -> Result<i64, ApiError> {
    let total: Option<Option<i64>> = coffee_log::Entity::find()
        .select_only()
        .column_as(coffee_log::Column::Delta.sum(), "total")
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0))
}

/// Sum of one user's log deltas.
pub async fn consumed_count_for(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<i64, ApiError> {
    let total: Option<Option<i64>> = coffee_log::Entity::find()
        .select_only()
        .column_as(coffee_log::Column::Delta.sum(), "total")
        .filter(coffee_log::Column::UserId.eq(user_id))
        .into_tuple()
        .one(db)
        .await?;
    Ok(total.flatten().unwrap_or(0))
}
