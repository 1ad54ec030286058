use sea_orm_migration::prelude::*;

use crate::m20240101_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Games::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Games::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Games::Title).string_len(128).not_null())
                    .col(ColumnDef::new(Games::Slug).string_len(128).not_null())
                    .col(ColumnDef::new(Games::Tagline).string_len(150).null())
                    .col(ColumnDef::new(Games::Description).text().null())
                    .col(ColumnDef::new(Games::CoverFilepath).string_len(512).null())
                    .col(
                        ColumnDef::new(Games::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Games::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Games::UserId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-games-user_id")
                            .from(Games::Table, Games::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-games-created_at")
                    .table(Games::Table)
                    .col(Games::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Uploads::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Uploads::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Uploads::Filepath).string_len(512).not_null())
                    .col(ColumnDef::new(Uploads::Size).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Uploads::IsWebBuild)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Uploads::GameId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-uploads-game_id")
                            .from(Uploads::Table, Uploads::GameId)
                            .to(Games::Table, Games::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Screenshots::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Screenshots::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Screenshots::Filepath)
                            .string_len(512)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Screenshots::Order).integer().not_null())
                    .col(ColumnDef::new(Screenshots::GameId).integer().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-screenshots-game_id")
                            .from(Screenshots::Table, Screenshots::GameId)
                            .to(Games::Table, Games::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Screenshots::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Uploads::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Games::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Games {
    Table,
    Id,
    Title,
    Slug,
    Tagline,
    Description,
    CoverFilepath,
    CreatedAt,
    UpdatedAt,
    UserId,
}

#[derive(DeriveIden)]
enum Uploads {
    Table,
    Id,
    Filepath,
    Size,
    IsWebBuild,
    GameId,
}

#[derive(DeriveIden)]
enum Screenshots {
    Table,
    Id,
    Filepath,
    Order,
    GameId,
}
