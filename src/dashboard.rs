use std::future::Future;

use futures::{StreamExt, stream};
use tracing::{error, warn};

use crate::{
    entries::{DEFAULT_GROUP, EntryStore},
    error::AppResult,
    models::{Dashboard, EntryDetails, GroupListing},
    persons::PersonDirectory,
};

/// Builds the best-effort overview shown on the home page.
#[derive(Clone)]
pub struct DashboardAggregator {
    entries: EntryStore,
    persons: PersonDirectory,
    max_concurrent: usize,
}

impl DashboardAggregator {
    pub fn new(entries: EntryStore, persons: PersonDirectory, max_concurrent: usize) -> Self {
        Self { entries, persons, max_concurrent: max_concurrent.max(1) }
    }

    /// Every group newest first. A group that fails to load is logged and left out, and a failed
    /// current-group lookup falls back to the first group.
    pub async fn build(&self) -> AppResult<Dashboard> {
        let numbers = self.entries.list_group_numbers().await?;
        let persons = self.persons.all().await?;

        let entries = &self.entries;
        let groups =
            collect_groups(numbers, self.max_concurrent, |number| entries.list_by_group(number))
                .await;

        let current_group = current_group_or_default(self.entries.current_group().await);

        Ok(Dashboard { groups, persons, current_group })
    }
}

fn current_group_or_default(result: AppResult<i32>) -> i32 {
    match result {
        Ok(number) => number,
        Err(err) => {
            error!(error = %err, "failed to determine current group, using {DEFAULT_GROUP}");
            DEFAULT_GROUP
        },
    }
}

async fn collect_groups<F, Fut>(numbers: Vec<i32>, concurrency: usize, list: F) -> Vec<GroupListing>
where
    F: Fn(i32) -> Fut,
    Fut: Future<Output = AppResult<Vec<EntryDetails>>>,
{
    let mut groups: Vec<GroupListing> = stream::iter(numbers)
        .map(|number| {
            let listing = list(number);
            async move { (number, listing.await) }
        })
        .buffered(concurrency)
        .filter_map(|(number, result)| async move {
            match result {
                Ok(entries) => Some(GroupListing { number, entries }),
                Err(err) => {
                    warn!(group = number, error = %err, "failed to list group, skipping");
                    None
                },
            }
        })
        .collect()
        .await;

    groups.sort_by(|a, b| b.number.cmp(&a.number));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_db, error::AppError, movies::MovieStore, tmdb::MovieDetails};

    async fn add(movies: &MovieStore, entries: &EntryStore, tmdb_id: i32, group: i32) {
        let movie = movies
            .get_or_create_by_tmdb_id(tmdb_id, |id| async move {
                Ok(Some(MovieDetails {
                    id,
                    title: format!("Movie {id}"),
                    release_date: String::new(),
                    runtime: None,
                    overview: String::new(),
                    poster_path: None,
                    imdb_id: None,
                    raw: "{}".to_string(),
                }))
            })
            .await
            .unwrap();
        entries.create(movie.id, group).await.unwrap();
    }

    #[tokio::test]
    async fn empty_library() {
        let db = test_db().await;
        let dashboard =
            DashboardAggregator::new(EntryStore::new(db.clone()), PersonDirectory::new(db), 4)
                .build()
                .await
                .unwrap();

        assert!(dashboard.groups.is_empty());
        assert_eq!(dashboard.current_group, 1);
        assert_eq!(dashboard.persons.len(), 4);
    }

    #[tokio::test]
    async fn groups_are_newest_first() {
        let db = test_db().await;
        let movies = MovieStore::new(db.clone());
        let entries = EntryStore::new(db.clone());
        add(&movies, &entries, 1, 1).await;
        add(&movies, &entries, 2, 3).await;
        add(&movies, &entries, 3, 3).await;
        add(&movies, &entries, 4, 2).await;

        let dashboard = DashboardAggregator::new(entries, PersonDirectory::new(db), 2)
            .build()
            .await
            .unwrap();

        let numbers: Vec<i32> = dashboard.groups.iter().map(|g| g.number).collect();
        assert_eq!(numbers, [3, 2, 1]);
        assert_eq!(dashboard.groups[0].entries.len(), 2);
        assert_eq!(dashboard.current_group, 3);
    }

    #[test]
    fn current_group_falls_back_to_first() {
        assert_eq!(current_group_or_default(Ok(7)), 7);
        let failed = Err(AppError::Storage(sea_orm::DbErr::Custom("disk I/O error".to_string())));
        assert_eq!(current_group_or_default(failed), 1);
    }

    #[tokio::test]
    async fn failed_group_is_skipped() {
        let groups = collect_groups(vec![1, 2, 3], 2, |number| async move {
            if number == 2 {
                Err(AppError::CatalogUnavailable("boom".to_string()))
            } else {
                Ok(Vec::new())
            }
        })
        .await;

        let numbers: Vec<i32> = groups.iter().map(|g| g.number).collect();
        assert_eq!(numbers, [3, 1]);
    }
}
