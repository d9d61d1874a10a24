//! Create candidate table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Candidate::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Candidate::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Candidate::RoomId).string_len(32).not_null())
                    .col(ColumnDef::new(Candidate::Name).string_len(256).not_null())
                    .col(
                        ColumnDef::new(Candidate::Votes)
                            .integer()
                            .not_null()
                            .default(0)
                            .check(Expr::col(Candidate::Votes).gte(0)),
                    )
                    .col(
                        ColumnDef::new(Candidate::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_candidate_room")
                            .from(Candidate::Table, Candidate::RoomId)
                            .to(Room::Table, Room::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: room_id (candidate listing)
        manager
            .create_index(
                Index::create()
                    .name("idx_candidate_room_id")
                    .table(Candidate::Table)
                    .col(Candidate::RoomId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Candidate::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Candidate {
    Table,
    Id,
    RoomId,
    Name,
    Votes,
    CreatedAt,
}

#[derive(Iden)]
enum Room {
    Table,
    Id,
}
