use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Movies::Table)
                    .if_not_exists()
                    .col(uuid(Movies::Id).primary_key())
                    .col(string(Movies::Title))
                    .col(integer_null(Movies::ReleaseYear))
                    .col(string_null(Movies::PosterUrl))
                    .col(text_null(Movies::Synopsis))
                    .col(integer_null(Movies::RuntimeMinutes))
                    .col(integer_null(Movies::TmdbId))
                    .col(string_null(Movies::ImdbId))
                    .col(text_null(Movies::MetadataJson))
                    .col(big_integer(Movies::CreatedAt))
                    .col(big_integer(Movies::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // NULLs never collide, so movies added without a catalog id are unaffected.
        manager
            .create_index(
                Index::create()
                    .name("idx_movies_tmdb_id_unique")
                    .table(Movies::Table)
                    .col(Movies::TmdbId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Persons::Table)
                    .if_not_exists()
                    .col(uuid(Persons::Id).primary_key())
                    .col(string(Persons::Code))
                    .col(string(Persons::Name))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_persons_code_unique")
                    .table(Persons::Table)
                    .col(Persons::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Entries::Table)
                    .if_not_exists()
                    .col(uuid(Entries::Id).primary_key())
                    .col(uuid(Entries::MovieId))
                    .col(integer(Entries::GroupNumber))
                    .col(string_null(Entries::WatchedOn))
                    .col(big_integer(Entries::AddedAt))
                    .col(text_null(Entries::Notes))
                    .col(uuid_null(Entries::PickedById))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_entries_movie")
                            .from(Entries::Table, Entries::MovieId)
                            .to(Movies::Table, Movies::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_entries_picked_by")
                            .from(Entries::Table, Entries::PickedById)
                            .to(Persons::Table, Persons::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_entries_movie_group_unique")
                    .table(Entries::Table)
                    .col(Entries::MovieId)
                    .col(Entries::GroupNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_entries_group_added_at")
                    .table(Entries::Table)
                    .col(Entries::GroupNumber)
                    .col(Entries::AddedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Ratings::Table)
                    .if_not_exists()
                    .col(uuid(Ratings::Id).primary_key())
                    .col(uuid(Ratings::PersonId))
                    .col(uuid(Ratings::EntryId))
                    .col(double(Ratings::Score))
                    .col(big_integer(Ratings::CreatedAt))
                    .col(big_integer(Ratings::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ratings_person")
                            .from(Ratings::Table, Ratings::PersonId)
                            .to(Persons::Table, Persons::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ratings_entry")
                            .from(Ratings::Table, Ratings::EntryId)
                            .to(Entries::Table, Entries::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ratings_person_entry_unique")
                    .table(Ratings::Table)
                    .col(Ratings::PersonId)
                    .col(Ratings::EntryId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ratings_entry")
                    .table(Ratings::Table)
                    .col(Ratings::EntryId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Ratings::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Entries::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Persons::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Movies::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Movies {
    Table,
    Id,
    Title,
    ReleaseYear,
    PosterUrl,
    Synopsis,
    RuntimeMinutes,
    TmdbId,
    ImdbId,
    MetadataJson,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Persons {
    Table,
    Id,
    Code,
    Name,
}

#[derive(DeriveIden)]
enum Entries {
    Table,
    Id,
    MovieId,
    GroupNumber,
    WatchedOn,
    AddedAt,
    Notes,
    PickedById,
}

#[derive(DeriveIden)]
enum Ratings {
    Table,
    Id,
    PersonId,
    EntryId,
    Score,
    CreatedAt,
    UpdatedAt,
}
