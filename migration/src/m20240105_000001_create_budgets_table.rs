use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Budgets::Table)
                .if_not_exists()
                .col(ColumnDef::new(Budgets::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(Budgets::UserId).string().not_null())
                .col(ColumnDef::new(Budgets::MonthYear).string_len(7).not_null())
                .col(ColumnDef::new(Budgets::BudgetAmount).decimal_len(16, 2).not_null())
                .col(ColumnDef::new(Budgets::AmountSpent).decimal_len(16, 2).not_null().default(0))
                .col(ColumnDef::new(Budgets::LastAlertLevel).integer().not_null().default(0))
                .col(
                    ColumnDef::new(Budgets::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(Budgets::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_budgets_user_month")
                .table(Budgets::Table)
                .col(Budgets::UserId)
                .col(Budgets::MonthYear)
                .unique()
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Budgets::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Budgets {
    Table,
    Id,
    UserId,
    MonthYear,
    BudgetAmount,
    AmountSpent,
    LastAlertLevel,
    CreatedAt,
    UpdatedAt,
}
