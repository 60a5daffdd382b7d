use std::future::Future;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    entities::movie,
    error::{AppError, AppResult, is_unique_violation},
    models::{Movie, now_micros},
    tmdb::{self, MovieDetails},
};

#[derive(Clone)]
pub struct MovieStore {
    db: DatabaseConnection,
}

impl MovieStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Movie>> {
        let movie = movie::Entity::find_by_id(id).one(&self.db).await?;
        Ok(movie.map(Movie::from))
    }

    pub async fn find_by_tmdb_id(&self, tmdb_id: i32) -> AppResult<Option<Movie>> {
        let movie = movie::Entity::find()
            .filter(movie::Column::TmdbId.eq(tmdb_id))
            .one(&self.db)
            .await?;
        Ok(movie.map(Movie::from))
    }

    /// Which of the given catalog ids already have a movie in the library.
    pub async fn known_tmdb_ids(&self, tmdb_ids: &[i32]) -> AppResult<Vec<i32>> {
        if tmdb_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Option<i32>> = movie::Entity::find()
            .select_only()
            .column(movie::Column::TmdbId)
            .filter(movie::Column::TmdbId.is_in(tmdb_ids.iter().copied()))
            .order_by_asc(movie::Column::TmdbId)
            .into_tuple()
            .all(&self.db)
            .await?;
        Ok(ids.into_iter().flatten().collect())
    }

    /// Returns the library movie for `tmdb_id`, fetching and inserting it on first sight.
    ///
    /// An existing record is returned untouched and `fetch` is not called. When a concurrent
    /// request inserts the same id first, the unique index rejects our row and the winner's
    /// record is returned instead.
    pub async fn get_or_create_by_tmdb_id<F, Fut>(&self, tmdb_id: i32, fetch: F) -> AppResult<Movie>
    where
        F: FnOnce(i32) -> Fut,
        Fut: Future<Output = AppResult<Option<MovieDetails>>>,
    {
        if let Some(existing) = self.find_by_tmdb_id(tmdb_id).await? {
            debug!(tmdb_id, movie_id = %existing.id, "movie already in library");
            return Ok(existing);
        }

        let Some(details) = fetch(tmdb_id).await? else {
            return Err(AppError::not_found(format!("catalog movie {tmdb_id}")));
        };

        match new_movie(tmdb_id, details).insert(&self.db).await {
            Ok(model) => {
                debug!(tmdb_id, movie_id = %model.id, "movie added to library");
                Ok(model.into())
            },
            Err(err) if is_unique_violation(&err) => {
                debug!(tmdb_id, "movie inserted concurrently, re-reading");
                self.find_by_tmdb_id(tmdb_id).await?.ok_or(AppError::Storage(err))
            },
            Err(err) => Err(err.into()),
        }
    }
}

fn new_movie(tmdb_id: i32, details: MovieDetails) -> movie::ActiveModel {
    let now = now_micros();
    let synopsis = Some(details.overview.trim().to_string()).filter(|s| !s.is_empty());

    movie::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(details.title),
        release_year: Set(tmdb::release_year(&details.release_date)),
        poster_url: Set(details
            .poster_path
            .as_deref()
            .and_then(|p| tmdb::poster_url(p, tmdb::POSTER_SIZE))),
        synopsis: Set(synopsis),
        runtime_minutes: Set(details.runtime.filter(|m| *m > 0)),
        tmdb_id: Set(Some(tmdb_id)),
        imdb_id: Set(details.imdb_id.filter(|s| !s.is_empty())),
        metadata_json: Set(Some(details.raw)),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::db::test_db;

    fn details(id: i32, release_date: &str) -> MovieDetails {
        let raw = format!(r#"{{"id":{id},"title":"Arrival"}}"#);
        MovieDetails {
            id,
            title: "Arrival".to_string(),
            release_date: release_date.to_string(),
            runtime: Some(116),
            overview: "Linguist meets heptapods.".to_string(),
            poster_path: Some("/arrival.jpg".to_string()),
            imdb_id: Some("tt2543164".to_string()),
            raw,
        }
    }

    #[tokio::test]
    async fn creates_once_per_tmdb_id() {
        let movies = MovieStore::new(test_db().await);
        let calls = AtomicUsize::new(0);
        let fetch = |id| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(Some(details(id, "2016-11-10"))) }
        };

        let first = movies.get_or_create_by_tmdb_id(329865, fetch).await.unwrap();
        let second = movies.get_or_create_by_tmdb_id(329865, fetch).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.release_year, Some(2016));
        assert_eq!(first.runtime_minutes, Some(116));
        assert_eq!(
            first.poster_url.as_deref(),
            Some("https://image.tmdb.org/t/p/w500/arrival.jpg")
        );
        assert_eq!(first.metadata_json.as_deref(), Some(r#"{"id":329865,"title":"Arrival"}"#));
    }

    #[tokio::test]
    async fn unparseable_release_date_has_no_year() {
        let movies = MovieStore::new(test_db().await);
        let movie = movies
            .get_or_create_by_tmdb_id(7, |id| async move { Ok(Some(details(id, "TBD"))) })
            .await
            .unwrap();
        assert_eq!(movie.release_year, None);
    }

    #[tokio::test]
    async fn catalog_miss_is_not_found() {
        let movies = MovieStore::new(test_db().await);
        let err = movies.get_or_create_by_tmdb_id(1, |_| async { Ok(None) }).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(movies.find_by_tmdb_id(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn catalog_failure_propagates() {
        let movies = MovieStore::new(test_db().await);
        let err = movies
            .get_or_create_by_tmdb_id(1, |_| async {
                Err(AppError::CatalogUnavailable("503 from upstream".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CatalogUnavailable(_)));
    }

    #[tokio::test]
    async fn concurrent_creates_converge_on_one_movie() {
        use sea_orm::PaginatorTrait;
        use tokio::sync::Barrier;

        let db = test_db().await;
        let movies = MovieStore::new(db.clone());
        let fetches = AtomicUsize::new(0);
        // Both callers pass the lookup before either inserts, so one insert must lose.
        let barrier = Barrier::new(2);
        let fetch = |id| {
            let (fetches, barrier) = (&fetches, &barrier);
            async move {
                fetches.fetch_add(1, Ordering::SeqCst);
                barrier.wait().await;
                Ok(Some(details(id, "1977-05-25")))
            }
        };

        let (a, b) = tokio::join!(
            movies.get_or_create_by_tmdb_id(11, fetch),
            movies.get_or_create_by_tmdb_id(11, fetch),
        );

        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.id, b.id);
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
        assert_eq!(movie::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reports_known_tmdb_ids() {
        let movies = MovieStore::new(test_db().await);
        for id in [3, 5] {
            movies
                .get_or_create_by_tmdb_id(id, |id| async move { Ok(Some(details(id, "2000"))) })
                .await
                .unwrap();
        }
        assert_eq!(movies.known_tmdb_ids(&[1, 3, 5, 8]).await.unwrap(), vec![3, 5]);
        assert!(movies.known_tmdb_ids(&[]).await.unwrap().is_empty());
    }
}
