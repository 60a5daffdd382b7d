use std::{collections::HashSet, sync::Arc};

use axum::{
    extract::{Form, Path, Query, State},
    response::{Html, Redirect},
};
use jiff::civil::Date;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppState,
    error::{AppError, AppResult},
    models::{EntryUpdate, GroupListing, PickedBy, Score, validate_group_number},
    templates,
};

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn dashboard(State(state): State<Arc<AppState>>) -> AppResult<Html<String>> {
    let dashboard = state.dashboard.build().await?;
    Ok(Html(templates::dashboard_page(&state.assets, &dashboard)))
}

pub async fn group(
    State(state): State<Arc<AppState>>,
    Path(number): Path<i32>,
) -> AppResult<Html<String>> {
    let number = validate_group_number(number)?;
    let entries = state.entries.list_by_group(number).await?;
    if entries.is_empty() {
        return Err(AppError::not_found(format!("group {number}")));
    }

    let persons = state.persons.all().await?;
    let current_group = state.entries.current_group().await?;
    let listing = GroupListing { number, entries };
    Ok(Html(templates::group_page(&state.assets, &listing, &persons, current_group)))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Html<String>> {
    let q = query.q.trim();
    if q.is_empty() {
        return Ok(Html(templates::dashboard_page(&state.assets, &state.dashboard.build().await?)));
    }

    let results = state.tmdb.search(q).await?;
    let ids: Vec<i32> = results.iter().map(|r| r.id).collect();
    let known: HashSet<i32> = state.movies.known_tmdb_ids(&ids).await?.into_iter().collect();
    let current_group = state.entries.current_group().await?;

    Ok(Html(templates::search_page(&state.assets, q, &results, &known, current_group)))
}

#[derive(Debug, Deserialize)]
pub struct AddMovieForm {
    tmdb_id: i32,
    group_number: Option<String>,
}

pub async fn add_movie(
    State(state): State<Arc<AppState>>,
    Form(form): Form<AddMovieForm>,
) -> AppResult<Redirect> {
    let group_number = match parse_group(form.group_number.as_deref())? {
        Some(number) => number,
        None => state.entries.current_group().await?,
    };

    let tmdb = state.tmdb.clone();
    let movie = state
        .movies
        .get_or_create_by_tmdb_id(form.tmdb_id, |id| async move { tmdb.fetch_details(id).await })
        .await?;
    let entry = state.entries.create(movie.id, group_number).await?;

    info!(title = %movie.title, group_number, entry_id = %entry.id, "movie added");
    Ok(Redirect::to(&format!("/entries/{}", entry.id)))
}

pub async fn entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Html<String>> {
    let Some(details) = state.entries.get_by_id(id).await? else {
        return Err(AppError::not_found(format!("entry {id}")));
    };
    let persons = state.persons.all().await?;
    let current_group = state.entries.current_group().await?;

    Ok(Html(templates::entry_page(&state.assets, &details, &persons, current_group)))
}

#[derive(Debug, Deserialize)]
pub struct EntryForm {
    group_number: Option<String>,
    notes: Option<String>,
    picked_by_person_id: Option<String>,
}

impl EntryForm {
    fn into_update(self) -> AppResult<EntryUpdate> {
        Ok(EntryUpdate {
            group_number: parse_group(self.group_number.as_deref())?,
            notes: self.notes,
            picked_by: PickedBy::from_form(self.picked_by_person_id.as_deref())?,
        })
    }
}

pub async fn update_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Form(form): Form<EntryForm>,
) -> AppResult<Redirect> {
    state.entries.update(id, form.into_update()?).await?;
    Ok(Redirect::to(&format!("/entries/{id}")))
}

pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Redirect> {
    state.entries.delete(id).await?;
    info!(entry_id = %id, "entry deleted");
    Ok(Redirect::to("/"))
}

#[derive(Debug, Deserialize)]
pub struct WatchedForm {
    watched_on: Option<String>,
}

pub async fn mark_watched(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Form(form): Form<WatchedForm>,
) -> AppResult<Redirect> {
    let date = match form.watched_on.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<Date>()
            .map_err(|_| AppError::validation("watched date must be YYYY-MM-DD"))?,
        None => jiff::Zoned::now().date(),
    };

    state.entries.set_watched(id, date).await?;
    Ok(Redirect::to(&format!("/entries/{id}")))
}

pub async fn mark_unwatched(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Redirect> {
    state.entries.clear_watched(id).await?;
    Ok(Redirect::to(&format!("/entries/{id}")))
}

#[derive(Debug, Deserialize)]
pub struct RatingForm {
    entry_id: String,
    person_id: String,
    score: String,
}

pub async fn rate(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RatingForm>,
) -> AppResult<Redirect> {
    let entry_id = parse_id(&form.entry_id, "entry")?;
    let person_id = parse_id(&form.person_id, "person")?;
    let score = Score::parse(&form.score)?;
    let Some(person) = state.persons.get_by_id(person_id).await? else {
        return Err(AppError::not_found(format!("person {person_id}")));
    };

    let rating = state.ratings.upsert(person.id, entry_id, score).await?;
    info!(person = %person.code, %entry_id, score = rating.score, "rating saved");
    Ok(Redirect::to(&format!("/entries/{entry_id}")))
}

pub async fn delete_rating(
    State(state): State<Arc<AppState>>,
    Path((entry_id, person_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Redirect> {
    state.ratings.delete(person_id, entry_id).await?;
    Ok(Redirect::to(&format!("/entries/{entry_id}")))
}

/// Blank means "not given"; anything else must be a positive integer.
fn parse_group(raw: Option<&str>) -> AppResult<Option<i32>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let number: i32 =
        raw.parse().map_err(|_| AppError::validation("group number must be a positive integer"))?;
    validate_group_number(number).map(Some)
}

fn parse_id(raw: &str, what: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::validation(format!("invalid {what} id")))
}
