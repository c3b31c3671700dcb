use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Notifications::Table)
                .if_not_exists()
                .col(ColumnDef::new(Notifications::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(Notifications::UserId).string().not_null())
                .col(ColumnDef::new(Notifications::Title).string_len(150).not_null())
                .col(ColumnDef::new(Notifications::Message).text().not_null())
                .col(ColumnDef::new(Notifications::Severity).string_len(20).not_null())
                .col(ColumnDef::new(Notifications::Category).string_len(30).not_null())
                .col(ColumnDef::new(Notifications::Metadata).text().null())
                .col(ColumnDef::new(Notifications::IsRead).boolean().not_null().default(false))
                .col(
                    ColumnDef::new(Notifications::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_notifications_user_id")
                .table(Notifications::Table)
                .col(Notifications::UserId)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Notifications::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    Id,
    UserId,
    Title,
    Message,
    Severity,
    Category,
    Metadata,
    IsRead,
    CreatedAt,
}
