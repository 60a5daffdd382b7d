use std::collections::HashMap;

use jiff::civil::Date;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait, sea_query::Expr,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    entities::{entry, movie, person, rating},
    error::{AppError, AppResult, is_unique_violation},
    persons::PersonDirectory,
    models::{
        Entry, EntryDetails, EntryUpdate, Person, PersonRating, PickedBy, now_micros,
        validate_group_number,
    },
};

pub const DEFAULT_GROUP: i32 = 1;

#[derive(Clone)]
pub struct EntryStore {
    db: DatabaseConnection,
}

impl EntryStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Places a movie into a group. Adding the same movie to the same group twice returns the
    /// entry that already exists.
    pub async fn create(&self, movie_id: Uuid, group_number: i32) -> AppResult<Entry> {
        let group_number = validate_group_number(group_number)?;

        let model = entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            movie_id: Set(movie_id),
            group_number: Set(group_number),
            watched_on: Set(None),
            added_at: Set(now_micros()),
            notes: Set(None),
            picked_by_id: Set(None),
        };

        match model.insert(&self.db).await {
            Ok(created) => {
                debug!(entry_id = %created.id, %movie_id, group_number, "entry created");
                Ok(created.into())
            },
            Err(err) if is_unique_violation(&err) => {
                debug!(%movie_id, group_number, "entry already exists, re-reading");
                self.find_by_movie_and_group(movie_id, group_number)
                    .await?
                    .ok_or(AppError::Storage(err))
            },
            Err(err) => Err(err.into()),
        }
    }

    pub async fn find_by_movie_and_group(
        &self,
        movie_id: Uuid,
        group_number: i32,
    ) -> AppResult<Option<Entry>> {
        let found = entry::Entity::find()
            .filter(entry::Column::MovieId.eq(movie_id))
            .filter(entry::Column::GroupNumber.eq(group_number))
            .one(&self.db)
            .await?;
        Ok(found.map(Entry::from))
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Option<EntryDetails>> {
        let Some((found, movie)) = entry::Entity::find_by_id(id)
            .find_also_related(movie::Entity)
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let Some(movie) = movie else {
            return Ok(None);
        };

        let picked_by = match found.picked_by_id {
            Some(person_id) => person::Entity::find_by_id(person_id).one(&self.db).await?,
            None => None,
        };
        let mut ratings = self.ratings_for_entries(&[id]).await?;

        Ok(Some(EntryDetails {
            entry: found.into(),
            movie: movie.into(),
            ratings: ratings.remove(&id).unwrap_or_default(),
            picked_by: picked_by.map(Person::from),
        }))
    }

    /// Entries of one group, most recently added first, with movies and ratings attached.
    pub async fn list_by_group(&self, group_number: i32) -> AppResult<Vec<EntryDetails>> {
        let rows = entry::Entity::find()
            .filter(entry::Column::GroupNumber.eq(group_number))
            .find_also_related(movie::Entity)
            .order_by_desc(entry::Column::AddedAt)
            .order_by_desc(entry::Column::Id)
            .all(&self.db)
            .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|(e, _)| e.id).collect();
        let mut ratings = self.ratings_for_entries(&ids).await?;
        let persons = PersonDirectory::new(self.db.clone()).by_id().await?;

        let entries = rows
            .into_iter()
            .filter_map(|(e, m)| {
                let movie = m?;
                let picked_by = e.picked_by_id.and_then(|p| persons.get(&p).cloned());
                Some(EntryDetails {
                    ratings: ratings.remove(&e.id).unwrap_or_default(),
                    entry: e.into(),
                    movie: movie.into(),
                    picked_by,
                })
            })
            .collect();

        Ok(entries)
    }

    /// Distinct group numbers that have at least one entry, ascending.
    pub async fn list_group_numbers(&self) -> AppResult<Vec<i32>> {
        let groups: Vec<i32> = entry::Entity::find()
            .select_only()
            .column(entry::Column::GroupNumber)
            .distinct()
            .order_by_asc(entry::Column::GroupNumber)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(groups)
    }

    /// Highest group with an entry, or the first group when the library is empty.
    pub async fn current_group(&self) -> AppResult<i32> {
        let highest: Option<i32> = entry::Entity::find()
            .select_only()
            .column(entry::Column::GroupNumber)
            .order_by_desc(entry::Column::GroupNumber)
            .limit(1)
            .into_tuple()
            .one(&self.db)
            .await?;
        Ok(highest.unwrap_or(DEFAULT_GROUP))
    }

    /// Applies only the fields present in `changes`.
    pub async fn update(&self, id: Uuid, changes: EntryUpdate) -> AppResult<()> {
        if changes.is_empty() {
            return self.ensure_exists(id).await;
        }

        let mut query = entry::Entity::update_many().filter(entry::Column::Id.eq(id));

        if let Some(group_number) = changes.group_number {
            let group_number = validate_group_number(group_number)?;
            query = query.col_expr(entry::Column::GroupNumber, Expr::value(group_number));
        }

        if let Some(notes) = changes.notes {
            let notes = Some(notes.trim().to_string()).filter(|n| !n.is_empty());
            query = query.col_expr(entry::Column::Notes, Expr::value(notes));
        }

        match changes.picked_by {
            PickedBy::NoChange => {},
            PickedBy::Clear => {
                query = query.col_expr(entry::Column::PickedById, Expr::value(None::<Uuid>));
            },
            PickedBy::SetTo(person_id) => {
                if person::Entity::find_by_id(person_id).one(&self.db).await?.is_none() {
                    return Err(AppError::validation("picked-by person does not exist"));
                }
                query = query.col_expr(entry::Column::PickedById, Expr::value(Some(person_id)));
            },
        }

        let result = match query.exec(&self.db).await {
            Ok(result) => result,
            Err(err) if is_unique_violation(&err) => {
                return Err(AppError::validation("this movie is already in that group"));
            },
            Err(err) => return Err(err.into()),
        };

        if result.rows_affected == 0 {
            return Err(AppError::not_found(format!("entry {id}")));
        }
        debug!(entry_id = %id, "entry updated");
        Ok(())
    }

    pub async fn set_watched(&self, id: Uuid, date: Date) -> AppResult<()> {
        self.write_watched(id, Some(date.to_string())).await
    }

    pub async fn clear_watched(&self, id: Uuid) -> AppResult<()> {
        self.write_watched(id, None).await
    }

    /// Removes the entry together with its ratings. Deleting a missing entry is a no-op.
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let txn = self.db.begin().await?;

        rating::Entity::delete_many()
            .filter(rating::Column::EntryId.eq(id))
            .exec(&txn)
            .await?;
        let result = entry::Entity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        debug!(entry_id = %id, deleted = result.rows_affected, "entry deleted");
        Ok(())
    }

    async fn write_watched(&self, id: Uuid, watched_on: Option<String>) -> AppResult<()> {
        let result = entry::Entity::update_many()
            .col_expr(entry::Column::WatchedOn, Expr::value(watched_on))
            .filter(entry::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::not_found(format!("entry {id}")));
        }
        Ok(())
    }

    async fn ensure_exists(&self, id: Uuid) -> AppResult<()> {
        match entry::Entity::find_by_id(id).one(&self.db).await? {
            Some(_) => Ok(()),
            None => Err(AppError::not_found(format!("entry {id}"))),
        }
    }

    /// Ratings for all `entry_ids` in a single query, grouped by entry and ordered by person code.
    async fn ratings_for_entries(
        &self,
        entry_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, Vec<PersonRating>>> {
        let mut by_entry: HashMap<Uuid, Vec<PersonRating>> = HashMap::with_capacity(entry_ids.len());
        if entry_ids.is_empty() {
            return Ok(by_entry);
        }

        let rows = rating::Entity::find()
            .filter(rating::Column::EntryId.is_in(entry_ids.iter().copied()))
            .find_also_related(person::Entity)
            .order_by_asc(person::Column::Code)
            .all(&self.db)
            .await?;

        for (r, p) in rows {
            let Some(p) = p else {
                continue;
            };
            by_entry
                .entry(r.entry_id)
                .or_default()
                .push(PersonRating { person: p.into(), rating: r.into() });
        }

        Ok(by_entry)
    }
}
