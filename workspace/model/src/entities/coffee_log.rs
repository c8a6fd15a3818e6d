use sea_orm::entity::prelude::*;

use super::user;

/// One consumption event. Rows are immutable in the normal flow; only an
/// admin edit or delete touches them after insert, and those paths
/// re-balance `stock_settings.current_stock` by the net delta change.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "coffee_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// The user this consumption belongs to.
    pub user_id: i32,
    /// Number of cups taken in this event. Positive, defaults to one.
    #[sea_orm(default_value = "1")]
    pub delta: i32,
    pub consumed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::UserId",
        to = "user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
