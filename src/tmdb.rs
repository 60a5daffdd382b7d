use std::{num::NonZeroU32, sync::Arc};

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::{AppError, AppResult};

const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";
pub const POSTER_SIZE: &str = "w500";

pub struct TmdbClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
}

impl TmdbClient {
    pub fn new(client: reqwest::Client, access_token: String, base_url: String, rps: u32) -> Self {
        // Warn once on app load if using mock data
        if access_token.trim().is_empty() {
            tracing::warn!("Using mock TMDB data - no TMDB_ACCESS_TOKEN provided");
        }

        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(
            NonZeroU32::new(rps.max(1)).unwrap_or(NonZeroU32::MIN),
        )));
        Self { client, access_token, base_url, limiter }
    }

    fn is_mock(&self) -> bool {
        self.access_token.trim().is_empty()
    }

    /// First page of catalog matches for `query`.
    pub async fn search(&self, query: &str) -> AppResult<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        if self.is_mock() {
            return Ok(mock_search(query));
        }

        self.limiter.until_ready().await;

        let url = format!("{}/search/movie", self.base_url.trim_end_matches('/'));
        let resp: SearchResponse = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("query", query), ("include_adult", "false")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::debug!(query = %query, results = resp.results.len(), "catalog search");
        Ok(resp.results)
    }

    /// Full details for one movie, `None` when the catalog does not know the id.
    pub async fn fetch_details(&self, tmdb_id: i32) -> AppResult<Option<MovieDetails>> {
        if self.is_mock() {
            return Ok(Some(mock_details(tmdb_id)));
        }

        self.limiter.until_ready().await;

        let url = format!("{}/movie/{}", self.base_url.trim_end_matches('/'), tmdb_id);
        let resp = self.client.get(url).bearer_auth(&self.access_token).send().await?;

        if resp.status() == StatusCode::NOT_FOUND {
            tracing::debug!(tmdb_id, "movie not found in catalog");
            return Ok(None);
        }

        let raw = resp.error_for_status()?.text().await?;
        MovieDetails::from_raw(raw).map(Some)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SearchResult {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
}

impl SearchResult {
    pub fn release_year(&self) -> Option<i32> {
        self.release_date.as_deref().and_then(release_year)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct MovieDetails {
    pub id: i32,
    pub title: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub runtime: Option<i32>,
    #[serde(default)]
    pub overview: String,
    pub poster_path: Option<String>,
    pub imdb_id: Option<String>,
    /// The response body exactly as the catalog sent it.
    #[serde(skip)]
    pub raw: String,
}

impl MovieDetails {
    pub fn from_raw(raw: String) -> AppResult<Self> {
        let mut details: MovieDetails = serde_json::from_str(&raw).map_err(|e| {
            AppError::CatalogUnavailable(format!("could not decode movie details: {e}"))
        })?;
        details.raw = raw;
        Ok(details)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

/// Year from a catalog date such as `2021-05-14`; anything without four leading digits has none.
pub fn release_year(release_date: &str) -> Option<i32> {
    let digits = release_date.as_bytes().get(..4)?;
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    digits.iter().try_fold(0i32, |acc, d| Some(acc * 10 + i32::from(d - b'0')))
}

pub fn poster_url(path: &str, size: &str) -> Option<String> {
    let path = path.trim();
    (!path.is_empty()).then(|| format!("{IMAGE_BASE_URL}/{size}{path}"))
}

fn mock_search(query: &str) -> Vec<SearchResult> {
    vec![SearchResult {
        id: 550,
        title: format!("Fight Club ({query})"),
        overview: "Mock search result".to_string(),
        release_date: Some("1999-10-15".to_string()),
        poster_path: None,
    }]
}

fn mock_details(tmdb_id: i32) -> MovieDetails {
    let raw = serde_json::json!({
        "id": tmdb_id,
        "title": "Fight Club",
        "release_date": "1999-10-15",
        "runtime": 139,
        "overview": "Mock movie details",
        "poster_path": null,
        "imdb_id": "tt0137523",
    })
    .to_string();

    MovieDetails {
        id: tmdb_id,
        title: "Fight Club".to_string(),
        release_date: "1999-10-15".to_string(),
        runtime: Some(139),
        overview: "Mock movie details".to_string(),
        poster_path: None,
        imdb_id: Some("tt0137523".to_string()),
        raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_year_from_date() {
        assert_eq!(release_year("2021-05-14"), Some(2021));
        assert_eq!(release_year("1999"), Some(1999));
        assert_eq!(release_year("TBD"), None);
        assert_eq!(release_year("20"), None);
        assert_eq!(release_year(""), None);
        assert_eq!(release_year("20x1-01-01"), None);
    }

    #[test]
    fn poster_url_uses_size() {
        assert_eq!(
            poster_url("/abc.jpg", POSTER_SIZE).as_deref(),
            Some("https://image.tmdb.org/t/p/w500/abc.jpg")
        );
        assert_eq!(poster_url("", POSTER_SIZE), None);
    }

    #[test]
    fn details_keep_raw_payload() {
        let raw = r#"{"id":27205,"title":"Inception","release_date":"2010-07-15","runtime":148,
            "overview":"Dreams.","poster_path":"/x.jpg","imdb_id":"tt1375666","budget":160000000}"#;
        let details = MovieDetails::from_raw(raw.to_string()).unwrap();
        assert_eq!(details.id, 27205);
        assert_eq!(details.runtime, Some(148));
        assert_eq!(details.raw, raw);
    }

    #[test]
    fn undecodable_details_are_catalog_errors() {
        let err = MovieDetails::from_raw("not json".to_string()).unwrap_err();
        assert!(matches!(err, AppError::CatalogUnavailable(_)));
    }

    #[tokio::test]
    async fn stalled_catalog_is_unavailable() {
        use std::time::Duration;

        use axum::response::IntoResponse;

        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let http = reqwest::Client::builder().timeout(Duration::from_millis(200)).build().unwrap();
        let client = TmdbClient::new(http, "token".to_string(), format!("http://{addr}"), 50);

        let err = client.fetch_details(550).await.unwrap_err();
        assert!(matches!(err, AppError::CatalogUnavailable(_)), "got {err:?}");

        let resp = err.into_response();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(!body.is_empty());

        server.abort();
    }

    #[tokio::test]
    async fn mock_mode_without_token() {
        let client = TmdbClient::new(reqwest::Client::new(), String::new(), String::new(), 4);
        assert!(client.search("  ").await.unwrap().is_empty());
        assert_eq!(client.search("fight").await.unwrap().len(), 1);

        let details = client.fetch_details(42).await.unwrap().unwrap();
        assert_eq!(details.id, 42);
        assert_eq!(release_year(&details.release_date), Some(1999));
    }
}
