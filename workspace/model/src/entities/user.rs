use sea_orm::entity::prelude::*;

/// Role gate for the API. Exactly two roles exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Role {
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "user")]
    User,
}

/// Represents a member of the office sharing the coffee stock.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    /// Deactivated users keep their rows and history but lose API access
    /// on their very next request.
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
    /// Personal consumption cap. `None` means unlimited.
    pub max_coffees: Option<i32>,
    /// Opt-in for the consumption broadcast emails.
    #[sea_orm(default_value = "false")]
    pub notify_on_consumption: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A user owns many consumption log rows; they go when the user goes.
    #[sea_orm(has_many = "super::coffee_log::Entity")]
    CoffeeLog,
}

impl Related<super::coffee_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CoffeeLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
