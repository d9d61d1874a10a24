//! Create vote receipt table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VoteReceipt::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(VoteReceipt::RoomId).string_len(32).not_null())
                    .col(ColumnDef::new(VoteReceipt::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(VoteReceipt::CandidateId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(VoteReceipt::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    // One receipt per (room, user)
                    .primary_key(
                        Index::create()
                            .name("pk_vote_receipt")
                            .col(VoteReceipt::RoomId)
                            .col(VoteReceipt::UserId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_receipt_room")
                            .from(VoteReceipt::Table, VoteReceipt::RoomId)
                            .to(Room::Table, Room::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_receipt_user")
                            .from(VoteReceipt::Table, VoteReceipt::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_receipt_candidate")
                            .from(VoteReceipt::Table, VoteReceipt::CandidateId)
                            .to(Candidate::Table, Candidate::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: candidate_id (tally reconciliation)
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_receipt_candidate_id")
                    .table(VoteReceipt::Table)
                    .col(VoteReceipt::CandidateId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VoteReceipt::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum VoteReceipt {
    Table,
    RoomId,
    UserId,
    CandidateId,
    CreatedAt,
}

#[derive(Iden)]
enum Room {
    Table,
    Id,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}

#[derive(Iden)]
enum Candidate {
    Table,
    Id,
}
