use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(ScheduledTopups::Table)
                .if_not_exists()
                .col(ColumnDef::new(ScheduledTopups::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(ScheduledTopups::UserId).string().not_null())
                .col(ColumnDef::new(ScheduledTopups::BeneficiaryId).uuid().null())
                .col(ColumnDef::new(ScheduledTopups::PhoneNumber).string_len(11).not_null())
                .col(ColumnDef::new(ScheduledTopups::Network).string_len(10).not_null())
                .col(ColumnDef::new(ScheduledTopups::PurchaseType).string_len(10).not_null())
                .col(ColumnDef::new(ScheduledTopups::Amount).decimal_len(16, 2).not_null())
                .col(ColumnDef::new(ScheduledTopups::PlanId).string_len(50).null())
                .col(ColumnDef::new(ScheduledTopups::ScheduleType).string_len(20).not_null())
                .col(ColumnDef::new(ScheduledTopups::ScheduledAt).timestamp_with_time_zone().null())
                .col(ColumnDef::new(ScheduledTopups::TimeOfDay).string_len(8).null())
                .col(ColumnDef::new(ScheduledTopups::DayOfWeek).integer().null())
                .col(ColumnDef::new(ScheduledTopups::DayOfMonth).integer().null())
                .col(ColumnDef::new(ScheduledTopups::MaxExecutions).integer().null())
                .col(
                    ColumnDef::new(ScheduledTopups::TotalExecutions)
                        .integer()
                        .not_null()
                        .default(0)
                )
                .col(
                    ColumnDef::new(ScheduledTopups::NextExecutionAt)
                        .timestamp_with_time_zone()
                        .null()
                )
                .col(ColumnDef::new(ScheduledTopups::Status).string_len(20).not_null())
                .col(
                    ColumnDef::new(ScheduledTopups::LastExecutedAt)
                        .timestamp_with_time_zone()
                        .null()
                )
                .col(ColumnDef::new(ScheduledTopups::LastError).text().null())
                .col(ColumnDef::new(ScheduledTopups::ClaimedUntil).timestamp_with_time_zone().null())
                .col(
                    ColumnDef::new(ScheduledTopups::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(ScheduledTopups::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_scheduled_topups_user_id")
                .table(ScheduledTopups::Table)
                .col(ScheduledTopups::UserId)
                .to_owned()
        ).await?;

        // Due-selection: status = active and next_execution_at <= now
        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_scheduled_topups_status_next")
                .table(ScheduledTopups::Table)
                .col(ScheduledTopups::Status)
                .col(ScheduledTopups::NextExecutionAt)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ScheduledTopups::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum ScheduledTopups {
    Table,
    Id,
    UserId,
    BeneficiaryId,
    PhoneNumber,
    Network,
    PurchaseType,
    Amount,
    PlanId,
    ScheduleType,
    ScheduledAt,
    TimeOfDay,
    DayOfWeek,
    DayOfMonth,
    MaxExecutions,
    TotalExecutions,
    NextExecutionAt,
    Status,
    LastExecutedAt,
    LastError,
    ClaimedUntil,
    CreatedAt,
    UpdatedAt,
}
