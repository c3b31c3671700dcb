use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(SpendingEvents::Table)
                .if_not_exists()
                .col(ColumnDef::new(SpendingEvents::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(SpendingEvents::UserId).string().not_null())
                .col(ColumnDef::new(SpendingEvents::MonthYear).string_len(7).not_null())
                .col(ColumnDef::new(SpendingEvents::Category).string_len(20).not_null())
                .col(ColumnDef::new(SpendingEvents::Amount).decimal_len(16, 2).not_null())
                .col(ColumnDef::new(SpendingEvents::TransactionId).uuid().not_null())
                .col(
                    ColumnDef::new(SpendingEvents::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_spending_events_user_month")
                .table(SpendingEvents::Table)
                .col(SpendingEvents::UserId)
                .col(SpendingEvents::MonthYear)
                .to_owned()
        ).await?;

        // A transaction feeds the accumulator at most once
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_spending_events_transaction_id")
                .table(SpendingEvents::Table)
                .col(SpendingEvents::TransactionId)
                .unique()
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(SpendingEvents::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum SpendingEvents {
    Table,
    Id,
    UserId,
    MonthYear,
    Category,
    Amount,
    TransactionId,
    CreatedAt,
}
