use jiff::{Timestamp, civil::Date};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    entities::{entry, movie, person, rating},
    error::{AppError, AppResult},
};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub release_year: Option<i32>,
    pub poster_url: Option<String>,
    pub synopsis: Option<String>,
    pub runtime_minutes: Option<i32>,
    pub tmdb_id: Option<i32>,
    pub imdb_id: Option<String>,
    #[serde(skip)]
    pub metadata_json: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Movie {
    pub fn formatted_runtime(&self) -> String {
        let Some(total) = self.runtime_minutes.filter(|m| *m > 0) else {
            return String::new();
        };
        let (hours, minutes) = (total / 60, total % 60);
        match (hours, minutes) {
            (0, m) => format!("{m}m"),
            (h, 0) => format!("{h}h"),
            (h, m) => format!("{h}h {m}m"),
        }
    }
}

impl From<movie::Model> for Movie {
    fn from(m: movie::Model) -> Self {
        Self {
            id: m.id,
            title: m.title,
            release_year: m.release_year,
            poster_url: m.poster_url,
            synopsis: m.synopsis,
            runtime_minutes: m.runtime_minutes,
            tmdb_id: m.tmdb_id,
            imdb_id: m.imdb_id,
            metadata_json: m.metadata_json,
            created_at: timestamp_from_micros(m.created_at),
            updated_at: timestamp_from_micros(m.updated_at),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Person {
    pub id: Uuid,
    /// Short display code, e.g. `D`.
    pub code: String,
    pub name: String,
}

impl From<person::Model> for Person {
    fn from(p: person::Model) -> Self {
        Self { id: p.id, code: p.code, name: p.name }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Entry {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub group_number: i32,
    pub watched_on: Option<Date>,
    pub added_at: Timestamp,
    pub notes: Option<String>,
    pub picked_by_id: Option<Uuid>,
}

impl Entry {
    pub fn is_watched(&self) -> bool {
        self.watched_on.is_some()
    }
}

impl From<entry::Model> for Entry {
    fn from(e: entry::Model) -> Self {
        Self {
            id: e.id,
            movie_id: e.movie_id,
            group_number: e.group_number,
            watched_on: e.watched_on.and_then(|d| d.parse().ok()),
            added_at: timestamp_from_micros(e.added_at),
            notes: e.notes,
            picked_by_id: e.picked_by_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Rating {
    pub id: Uuid,
    pub person_id: Uuid,
    pub entry_id: Uuid,
    pub score: f64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Rating {
    pub fn band(&self) -> ScoreBand {
        ScoreBand::of(self.score)
    }
}

impl From<rating::Model> for Rating {
    fn from(r: rating::Model) -> Self {
        Self {
            id: r.id,
            person_id: r.person_id,
            entry_id: r.entry_id,
            score: r.score,
            created_at: timestamp_from_micros(r.created_at),
            updated_at: timestamp_from_micros(r.updated_at),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PersonRating {
    pub person: Person,
    pub rating: Rating,
}

/// An entry with its movie, ratings (ordered by person code) and picker resolved.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntryDetails {
    pub entry: Entry,
    pub movie: Movie,
    pub ratings: Vec<PersonRating>,
    pub picked_by: Option<Person>,
}

impl EntryDetails {
    pub fn average_rating(&self) -> Option<f64> {
        mean(self.ratings.iter().map(|r| r.rating.score))
    }

    pub fn rating_count(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_fully_rated(&self, persons: &[Person]) -> bool {
        self.ratings.len() == persons.len()
    }

    pub fn rating_for(&self, person_id: Uuid) -> Option<&Rating> {
        self.ratings.iter().find(|r| r.person.id == person_id).map(|r| &r.rating)
    }
}

/// A validated rating score in `[0.0, 10.0]`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize)]
pub struct Score(f64);

impl Score {
    pub fn new(value: f64) -> AppResult<Self> {
        if !value.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&value) {
            return Err(AppError::validation("score must be between 0.0 and 10.0"));
        }
        Ok(Self(value))
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| AppError::validation("score must be a number between 0.0 and 10.0"))?;
        Self::new(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum ScoreBand {
    Low,
    Mid,
    High,
}

impl ScoreBand {
    pub fn of(score: f64) -> Self {
        if score < 4.0 {
            ScoreBand::Low
        } else if score < 7.0 {
            ScoreBand::Mid
        } else {
            ScoreBand::High
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            ScoreBand::Low => "rating-low",
            ScoreBand::Mid => "rating-mid",
            ScoreBand::High => "rating-high",
        }
    }
}

/// Change to an entry's picker: leave it, clear it, or point it at a person.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PickedBy {
    #[default]
    NoChange,
    Clear,
    SetTo(Uuid),
}

impl PickedBy {
    /// Absent field keeps the current picker, an empty one clears it.
    pub fn from_form(raw: Option<&str>) -> AppResult<Self> {
        match raw.map(str::trim) {
            None => Ok(PickedBy::NoChange),
            Some("") => Ok(PickedBy::Clear),
            Some(s) => Uuid::parse_str(s)
                .map(PickedBy::SetTo)
                .map_err(|_| AppError::validation("invalid picked-by person id")),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntryUpdate {
    pub group_number: Option<i32>,
    /// Blank notes clear the field.
    pub notes: Option<String>,
    pub picked_by: PickedBy,
}

impl EntryUpdate {
    pub fn is_empty(&self) -> bool {
        self.group_number.is_none() && self.notes.is_none() && self.picked_by == PickedBy::NoChange
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupListing {
    pub number: i32,
    pub entries: Vec<EntryDetails>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dashboard {
    pub groups: Vec<GroupListing>,
    pub persons: Vec<Person>,
    pub current_group: i32,
}

pub fn validate_group_number(group: i32) -> AppResult<i32> {
    if group < 1 {
        return Err(AppError::validation("group number must be a positive integer"));
    }
    Ok(group)
}

pub fn mean(scores: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = scores.into_iter().fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

pub fn now_micros() -> i64 {
    Timestamp::now().as_microsecond()
}

fn timestamp_from_micros(micros: i64) -> Timestamp {
    Timestamp::from_microsecond(micros).unwrap_or(Timestamp::UNIX_EPOCH)
}
