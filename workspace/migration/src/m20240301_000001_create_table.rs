use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string(Users::Email).unique_key())
                    .col(string(Users::Name))
                    .col(string(Users::PasswordHash))
                    .col(string_len(Users::Role, 16))
                    .col(boolean(Users::IsActive).default(true))
                    .col(integer_null(Users::MaxCoffees))
                    .col(timestamp_with_time_zone(Users::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // Create stock_settings table (a single row with a fixed id)
        manager
            .create_table(
                Table::create()
                    .table(StockSettings::Table)
                    .if_not_exists()
                    .col(integer(StockSettings::Id).primary_key())
                    .col(integer(StockSettings::InitialStock).default(0))
                    .col(integer(StockSettings::CurrentStock).default(0))
                    .col(integer(StockSettings::MinStock).default(0))
                    .col(integer_null(StockSettings::UpdatedBy))
                    .col(timestamp_with_time_zone(StockSettings::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_stock_settings_updated_by")
                            .from(StockSettings::Table, StockSettings::UpdatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create coffee_logs table
        manager
            .create_table(
                Table::create()
                    .table(CoffeeLogs::Table)
                    .if_not_exists()
                    .col(pk_auto(CoffeeLogs::Id))
                    .col(integer(CoffeeLogs::UserId))
                    .col(integer(CoffeeLogs::Delta).default(1))
                    .col(timestamp_with_time_zone(CoffeeLogs::ConsumedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_coffee_logs_user")
                            .from(CoffeeLogs::Table, CoffeeLogs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // History queries are always scoped by user and ordered by time.
        manager
            .create_index(
                Index::create()
                    .name("idx_coffee_logs_user_consumed_at")
                    .table(CoffeeLogs::Table)
                    .col(CoffeeLogs::UserId)
                    .col(CoffeeLogs::ConsumedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CoffeeLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StockSettings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    Name,
    PasswordHash,
    Role,
    IsActive,
    MaxCoffees,
    CreatedAt,
}

#[derive(DeriveIden)]
enum StockSettings {
    Table,
    Id,
    InitialStock,
    CurrentStock,
    MinStock,
    UpdatedBy,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum CoffeeLogs {
    Table,
    Id,
    UserId,
    Delta,
    ConsumedAt,
}
