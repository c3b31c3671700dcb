use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Transactions::Table)
                .if_not_exists()
                .col(ColumnDef::new(Transactions::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(Transactions::WalletId).uuid().not_null())
                .col(ColumnDef::new(Transactions::UserId).string().not_null())
                .col(ColumnDef::new(Transactions::TxType).string_len(30).not_null())
                .col(ColumnDef::new(Transactions::Amount).decimal_len(16, 2).not_null())
                .col(ColumnDef::new(Transactions::BalanceBefore).decimal_len(16, 2).not_null())
                .col(ColumnDef::new(Transactions::BalanceAfter).decimal_len(16, 2).not_null())
                .col(ColumnDef::new(Transactions::Status).string_len(20).not_null())
                .col(ColumnDef::new(Transactions::Reference).string_len(64).not_null())
                .col(ColumnDef::new(Transactions::PhoneNumber).string_len(11).null())
                .col(ColumnDef::new(Transactions::Network).string_len(10).null())
                .col(ColumnDef::new(Transactions::PlanId).string_len(50).null())
                .col(ColumnDef::new(Transactions::ProviderReference).string().null())
                .col(ColumnDef::new(Transactions::FailureReason).text().null())
                .col(ColumnDef::new(Transactions::ScheduleId).uuid().null())
                .col(
                    ColumnDef::new(Transactions::ReconciliationRequired)
                        .boolean()
                        .not_null()
                        .default(false)
                )
                .col(
                    ColumnDef::new(Transactions::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(ColumnDef::new(Transactions::CompletedAt).timestamp_with_time_zone().null())
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_transactions_wallet")
                        .from(Transactions::Table, Transactions::WalletId)
                        .to(Wallets::Table, Wallets::Id)
                        .on_delete(ForeignKeyAction::Cascade)
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_transactions_wallet_id")
                .table(Transactions::Table)
                .col(Transactions::WalletId)
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_transactions_reference")
                .table(Transactions::Table)
                .col(Transactions::Reference)
                .unique()
                .to_owned()
        ).await?;

        // Reconciliation sweep scans pending rows by age
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_transactions_status_created_at")
                .table(Transactions::Table)
                .col(Transactions::Status)
                .col(Transactions::CreatedAt)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Transactions::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    WalletId,
    UserId,
    TxType,
    Amount,
    BalanceBefore,
    BalanceAfter,
    Status,
    Reference,
    PhoneNumber,
    Network,
    PlanId,
    ProviderReference,
    FailureReason,
    ScheduleId,
    ReconciliationRequired,
    CreatedAt,
    CompletedAt,
}

#[derive(DeriveIden)]
enum Wallets {
    Table,
    Id,
}
