use sea_orm_migration::prelude::*;
use uuid::Uuid;

use crate::m20250301_000001_create_tables::Persons;

/// Rating participants, ordered by display code.
const PERSONS: [(&str, &str); 4] =
    [("A", "Aiden"), ("C", "Caleb"), ("D", "Daniel"), ("J", "Jennifer")];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (code, name) in PERSONS {
            manager
                .exec_stmt(
                    Query::insert()
                        .into_table(Persons::Table)
                        .columns([Persons::Id, Persons::Code, Persons::Name])
                        .values_panic([Uuid::new_v4().into(), code.into(), name.into()])
                        .on_conflict(OnConflict::column(Persons::Code).do_nothing().to_owned())
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let codes = PERSONS.iter().map(|(code, _)| *code);
        manager
            .exec_stmt(
                Query::delete()
                    .from_table(Persons::Table)
                    .and_where(Expr::col(Persons::Code).is_in(codes))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}
