use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(ScheduleExecutionLogs::Table)
                .if_not_exists()
                .col(ColumnDef::new(ScheduleExecutionLogs::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(ScheduleExecutionLogs::ScheduleId).uuid().not_null())
                .col(ColumnDef::new(ScheduleExecutionLogs::UserId).string().not_null())
                .col(ColumnDef::new(ScheduleExecutionLogs::TransactionId).uuid().null())
                .col(ColumnDef::new(ScheduleExecutionLogs::Outcome).string_len(20).not_null())
                .col(ColumnDef::new(ScheduleExecutionLogs::FailureReason).text().null())
                .col(ColumnDef::new(ScheduleExecutionLogs::Amount).decimal_len(16, 2).not_null())
                .col(
                    ColumnDef::new(ScheduleExecutionLogs::ScheduledFor)
                        .timestamp_with_time_zone()
                        .not_null()
                )
                .col(
                    ColumnDef::new(ScheduleExecutionLogs::ExecutedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .foreign_key(
                    ForeignKey::create()
                        .name("fk_execution_logs_schedule")
                        .from(ScheduleExecutionLogs::Table, ScheduleExecutionLogs::ScheduleId)
                        .to(ScheduledTopups::Table, ScheduledTopups::Id)
                        .on_delete(ForeignKeyAction::Cascade)
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_execution_logs_schedule_occurrence")
                .table(ScheduleExecutionLogs::Table)
                .col(ScheduleExecutionLogs::ScheduleId)
                .col(ScheduleExecutionLogs::ScheduledFor)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(ScheduleExecutionLogs::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum ScheduleExecutionLogs {
    Table,
    Id,
    ScheduleId,
    UserId,
    TransactionId,
    Outcome,
    FailureReason,
    Amount,
    ScheduledFor,
    ExecutedAt,
}

#[derive(DeriveIden)]
enum ScheduledTopups {
    Table,
    Id,
}
