use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Rooms::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Rooms::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Rooms::Language).string_len(2).not_null())
                    .col(ColumnDef::new(Rooms::Status).string().not_null())
                    .col(ColumnDef::new(Rooms::CurrentRound).integer().null())
                    .col(
                        ColumnDef::new(Rooms::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Status lookups for the retention job
        manager
            .create_index(
                Index::create()
                    .name("idx_rooms_status")
                    .table(Rooms::Table)
                    .col(Rooms::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoomPlayers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RoomPlayers::RoomId).uuid().not_null())
                    .col(ColumnDef::new(RoomPlayers::PlayerId).uuid().not_null())
                    .col(ColumnDef::new(RoomPlayers::Position).integer().not_null())
                    .col(
                        ColumnDef::new(RoomPlayers::Score)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .col(RoomPlayers::RoomId)
                            .col(RoomPlayers::PlayerId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_room_players_room")
                            .from(RoomPlayers::Table, RoomPlayers::RoomId)
                            .to(Rooms::Table, Rooms::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Rounds::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Rounds::RoomId).uuid().not_null())
                    .col(ColumnDef::new(Rounds::Number).integer().not_null())
                    .col(ColumnDef::new(Rounds::TargetWord).string().not_null())
                    .col(ColumnDef::new(Rounds::MaxAttempts).integer().not_null())
                    .col(ColumnDef::new(Rounds::Status).string().not_null())
                    .col(
                        ColumnDef::new(Rounds::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Rounds::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .primary_key(Index::create().col(Rounds::RoomId).col(Rounds::Number))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_rounds_room")
                            .from(Rounds::Table, Rounds::RoomId)
                            .to(Rooms::Table, Rooms::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RoundPlayers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(RoundPlayers::RoomId).uuid().not_null())
                    .col(ColumnDef::new(RoundPlayers::RoundNumber).integer().not_null())
                    .col(ColumnDef::new(RoundPlayers::PlayerId).uuid().not_null())
                    .col(ColumnDef::new(RoundPlayers::Status).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(RoundPlayers::RoomId)
                            .col(RoundPlayers::RoundNumber)
                            .col(RoundPlayers::PlayerId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_round_players_round")
                            .from(RoundPlayers::Table, (RoundPlayers::RoomId, RoundPlayers::RoundNumber))
                            .to(Rounds::Table, (Rounds::RoomId, Rounds::Number))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One row per attempt; the key makes attempt numbers unique per (round, player)
        manager
            .create_table(
                Table::create()
                    .table(Guesses::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Guesses::RoomId).uuid().not_null())
                    .col(ColumnDef::new(Guesses::RoundNumber).integer().not_null())
                    .col(ColumnDef::new(Guesses::PlayerId).uuid().not_null())
                    .col(ColumnDef::new(Guesses::AttemptNumber).integer().not_null())
                    .col(ColumnDef::new(Guesses::Sequence).integer().not_null())
                    .col(ColumnDef::new(Guesses::Word).string().not_null())
                    .col(ColumnDef::new(Guesses::Letters).text().not_null())
                    .col(
                        ColumnDef::new(Guesses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(Guesses::RoomId)
                            .col(Guesses::RoundNumber)
                            .col(Guesses::PlayerId)
                            .col(Guesses::AttemptNumber),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_guesses_round")
                            .from(Guesses::Table, (Guesses::RoomId, Guesses::RoundNumber))
                            .to(Rounds::Table, (Rounds::RoomId, Rounds::Number))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Guesses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoundPlayers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Rounds::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RoomPlayers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Rooms::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Rooms {
    Table,
    Id,
    Language,
    Status,
    CurrentRound,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RoomPlayers {
    Table,
    RoomId,
    PlayerId,
    Position,
    Score,
}

#[derive(DeriveIden)]
enum Rounds {
    Table,
    RoomId,
    Number,
    TargetWord,
    MaxAttempts,
    Status,
    StartedAt,
    FinishedAt,
}

#[derive(DeriveIden)]
enum RoundPlayers {
    Table,
    RoomId,
    RoundNumber,
    PlayerId,
    Status,
}

#[derive(DeriveIden)]
enum Guesses {
    Table,
    RoomId,
    RoundNumber,
    PlayerId,
    AttemptNumber,
    Sequence,
    Word,
    Letters,
    CreatedAt,
}
