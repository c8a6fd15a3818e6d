use sea_orm::entity::prelude::*;

use super::user;

/// The id of the one and only stock settings row.
pub const STOCK_ROW_ID: i32 = 1;

/// Singleton row holding the shared stock counter.
///
/// `current_stock` never goes below zero; every decrement is conditioned
/// on the remaining stock inside the SQL statement itself. It may drift
/// away from `initial_stock - sum(deltas)` through manual admin edits;
/// that drift is derived at read time, never stored.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "stock_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub initial_stock: i32,
    pub current_stock: i32,
    /// Threshold below which the dashboard shows a low-stock warning.
    pub min_stock: i32,
    /// The admin who last touched the settings, if still around.
    pub updated_by: Option<i32>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::UpdatedBy",
        to = "user::Column::Id",
        on_delete = "SetNull"
    )]
    User,
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
