use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
    sea_query::OnConflict,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    entities::{entry, person, rating},
    error::{AppError, AppResult},
    models::{Rating, Score, mean, now_micros},
};

#[derive(Clone)]
pub struct RatingStore {
    db: DatabaseConnection,
}

impl RatingStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records `person_id`'s score for an entry, replacing any earlier score.
    pub async fn upsert(&self, person_id: Uuid, entry_id: Uuid, score: Score) -> AppResult<Rating> {
        if person::Entity::find_by_id(person_id).one(&self.db).await?.is_none() {
            return Err(AppError::not_found(format!("person {person_id}")));
        }
        if entry::Entity::find_by_id(entry_id).one(&self.db).await?.is_none() {
            return Err(AppError::not_found(format!("entry {entry_id}")));
        }

        let now = now_micros();
        let model = rating::ActiveModel {
            id: Set(Uuid::new_v4()),
            person_id: Set(person_id),
            entry_id: Set(entry_id),
            score: Set(score.value()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        rating::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([rating::Column::PersonId, rating::Column::EntryId])
                    .update_columns([rating::Column::Score, rating::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        debug!(%person_id, %entry_id, score = score.value(), "rating saved");

        self.find(person_id, entry_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("rating for entry {entry_id}")))
    }

    pub async fn find(&self, person_id: Uuid, entry_id: Uuid) -> AppResult<Option<Rating>> {
        let found = rating::Entity::find()
            .filter(rating::Column::PersonId.eq(person_id))
            .filter(rating::Column::EntryId.eq(entry_id))
            .one(&self.db)
            .await?;
        Ok(found.map(Rating::from))
    }

    /// Deleting a rating that does not exist is not an error.
    pub async fn delete(&self, person_id: Uuid, entry_id: Uuid) -> AppResult<()> {
        let result = rating::Entity::delete_many()
            .filter(rating::Column::PersonId.eq(person_id))
            .filter(rating::Column::EntryId.eq(entry_id))
            .exec(&self.db)
            .await?;
        debug!(%person_id, %entry_id, deleted = result.rows_affected, "rating deleted");
        Ok(())
    }

    /// Unrounded mean of the entry's scores, `None` when nobody has rated it.
    pub async fn average_for_entry(&self, entry_id: Uuid) -> AppResult<Option<f64>> {
        let scores: Vec<f64> = rating::Entity::find()
            .select_only()
            .column(rating::Column::Score)
            .filter(rating::Column::EntryId.eq(entry_id))
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(mean(scores))
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::PaginatorTrait;

    use super::*;
    use crate::{
        db::test_db, entries::EntryStore, movies::MovieStore, persons::PersonDirectory,
        tmdb::MovieDetails,
    };

    struct Fixture {
        db: DatabaseConnection,
        ratings: RatingStore,
        persons: PersonDirectory,
        entry_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let db = test_db().await;
        let movie = MovieStore::new(db.clone())
            .get_or_create_by_tmdb_id(603, |id| async move {
                Ok(Some(MovieDetails {
                    id,
                    title: "The Matrix".to_string(),
                    release_date: "1999-03-30".to_string(),
                    runtime: Some(136),
                    overview: String::new(),
                    poster_path: None,
                    imdb_id: None,
                    raw: "{}".to_string(),
                }))
            })
            .await
            .unwrap();
        let entry = EntryStore::new(db.clone()).create(movie.id, 1).await.unwrap();

        Fixture {
            ratings: RatingStore::new(db.clone()),
            persons: PersonDirectory::new(db.clone()),
            db,
            entry_id: entry.id,
        }
    }

    async fn rating_rows(db: &DatabaseConnection) -> u64 {
        rating::Entity::find().count(db).await.unwrap()
    }

    #[tokio::test]
    async fn upsert_then_average() {
        let f = fixture().await;
        let d = f.persons.get_by_code("D").await.unwrap().unwrap();

        let saved = f.ratings.upsert(d.id, f.entry_id, Score::new(7.5).unwrap()).await.unwrap();
        assert_eq!(saved.score, 7.5);
        assert_eq!(f.ratings.average_for_entry(f.entry_id).await.unwrap(), Some(7.5));
    }

    #[tokio::test]
    async fn second_upsert_overwrites() {
        let f = fixture().await;
        let j = f.persons.get_by_code("J").await.unwrap().unwrap();

        let first = f.ratings.upsert(j.id, f.entry_id, Score::new(3.0).unwrap()).await.unwrap();
        let second = f.ratings.upsert(j.id, f.entry_id, Score::new(9.0).unwrap()).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.score, 9.0);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(rating_rows(&f.db).await, 1);
    }

    #[tokio::test]
    async fn average_is_not_rounded() {
        let f = fixture().await;
        for (code, score) in [("A", 7.0), ("C", 8.0), ("D", 8.0)] {
            let p = f.persons.get_by_code(code).await.unwrap().unwrap();
            f.ratings.upsert(p.id, f.entry_id, Score::new(score).unwrap()).await.unwrap();
        }
        let avg = f.ratings.average_for_entry(f.entry_id).await.unwrap().unwrap();
        assert!((avg - 23.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn delete_only_rating_clears_average() {
        let f = fixture().await;
        let a = f.persons.get_by_code("A").await.unwrap().unwrap();
        f.ratings.upsert(a.id, f.entry_id, Score::new(5.0).unwrap()).await.unwrap();

        f.ratings.delete(a.id, f.entry_id).await.unwrap();
        assert_eq!(f.ratings.average_for_entry(f.entry_id).await.unwrap(), None);
        assert!(f.ratings.find(a.id, f.entry_id).await.unwrap().is_none());

        // Nothing left to delete.
        f.ratings.delete(a.id, f.entry_id).await.unwrap();
    }

    #[tokio::test]
    async fn unknown_person_or_entry_is_not_found() {
        let f = fixture().await;
        let d = f.persons.get_by_code("D").await.unwrap().unwrap();
        let score = Score::new(5.0).unwrap();

        let err = f.ratings.upsert(Uuid::new_v4(), f.entry_id, score).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = f.ratings.upsert(d.id, Uuid::new_v4(), score).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(rating_rows(&f.db).await, 0);
    }
}
