use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(
            Table::create()
                .table(Beneficiaries::Table)
                .if_not_exists()
                .col(ColumnDef::new(Beneficiaries::Id).uuid().not_null().primary_key())
                .col(ColumnDef::new(Beneficiaries::UserId).string().not_null())
                .col(ColumnDef::new(Beneficiaries::Label).string_len(100).not_null())
                .col(ColumnDef::new(Beneficiaries::PhoneNumber).string_len(11).not_null())
                .col(ColumnDef::new(Beneficiaries::Network).string_len(10).not_null())
                .col(
                    ColumnDef::new(Beneficiaries::CreatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .col(
                    ColumnDef::new(Beneficiaries::UpdatedAt)
                        .timestamp_with_time_zone()
                        .not_null()
                        .default(Expr::current_timestamp())
                )
                .to_owned()
        ).await?;

        manager.create_index(
            Index::create()
                .if_not_exists()
                .name("idx_beneficiaries_user_id")
                .table(Beneficiaries::Table)
                .col(Beneficiaries::UserId)
                .to_owned()
        ).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Beneficiaries::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Beneficiaries {
    Table,
    Id,
    UserId,
    Label,
    PhoneNumber,
    Network,
    CreatedAt,
    UpdatedAt,
}
