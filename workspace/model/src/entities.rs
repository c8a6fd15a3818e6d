//! This file serves as the root for all SeaORM entity modules.
//! We define the data models for the shared coffee counter here: the
//! people drinking the coffee, the singleton stock row, and the
//! per-event consumption log.

pub mod coffee_log;
pub mod stock_settings;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::coffee_log::Entity as CoffeeLog;
    pub use super::stock_settings::Entity as StockSettings;
    pub use super::user::Entity as User;
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
        EntityTrait, QueryFilter, Set,
    };

    use super::*;
    use prelude::*;
    use stock_settings::STOCK_ROW_ID;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        // Connect to the SQLite database
        let db = Database::connect("sqlite::memory:").await?;

        // Enable foreign keys
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;

        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    #[tokio::test]
    async fn test_entity_integration() -> Result<(), DbErr> {
        let db = setup_db().await?;

        let admin = user::ActiveModel {
            email: Set("admin@office.test".to_string()),
            name: Set("Admin".to_string()),
            password_hash: Set("$2b$12$hash".to_string()),
            role: Set(user::Role::Admin),
            is_active: Set(true),
            max_coffees: Set(None),
            notify_on_consumption: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let drinker = user::ActiveModel {
            email: Set("drinker@office.test".to_string()),
            name: Set("Drinker".to_string()),
            password_hash: Set("$2b$12$hash".to_string()),
            role: Set(user::Role::User),
            is_active: Set(true),
            max_coffees: Set(Some(2)),
            notify_on_consumption: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        stock_settings::ActiveModel {
            id: Set(STOCK_ROW_ID),
            initial_stock: Set(40),
            current_stock: Set(40),
            min_stock: Set(5),
            updated_by: Set(Some(admin.id)),
            updated_at: Set(Utc::now()),
        }
        .insert(&db)
        .await?;

        coffee_log::ActiveModel {
            user_id: Set(drinker.id),
            delta: Set(1),
            consumed_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        coffee_log::ActiveModel {
            user_id: Set(drinker.id),
            delta: Set(2),
            consumed_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let users = User::find().all(&db).await?;
        assert_eq!(users.len(), 2);
        assert!(users.iter().any(|u| u.role == user::Role::Admin));

        let settings = StockSettings::find_by_id(STOCK_ROW_ID)
            .one(&db)
            .await?
            .expect("stock row must exist");
        assert_eq!(settings.current_stock, 40);
        assert_eq!(settings.updated_by, Some(admin.id));

        let logs = CoffeeLog::find()
            .filter(coffee_log::Column::UserId.eq(drinker.id))
            .all(&db)
            .await?;
        assert_eq!(logs.len(), 2);

        // Deleting the user cascades to their log rows.
        User::delete_by_id(drinker.id).exec(&db).await?;
        let logs = CoffeeLog::find().all(&db).await?;
        assert!(logs.is_empty());

        // Deleting the admin nulls out the settings attribution.
        User::delete_by_id(admin.id).exec(&db).await?;
        let settings = StockSettings::find_by_id(STOCK_ROW_ID)
            .one(&db)
            .await?
            .expect("stock row must survive user deletion");
        assert_eq!(settings.updated_by, None);

        Ok(())
    }
}
