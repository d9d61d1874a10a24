//! Create room table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Room::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Room::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Room::Code).string_len(64).not_null())
                    .col(ColumnDef::new(Room::Name).string_len(256).not_null())
                    .col(
                        ColumnDef::new(Room::AllowedEmails)
                            .json()
                            .not_null()
                            .default(Expr::cust("'[]'::json")),
                    )
                    .col(
                        ColumnDef::new(Room::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: join code (case-sensitive)
        manager
            .create_index(
                Index::create()
                    .name("idx_room_code")
                    .table(Room::Table)
                    .col(Room::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Room::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Room {
    Table,
    Id,
    Code,
    Name,
    AllowedEmails,
    CreatedAt,
}
