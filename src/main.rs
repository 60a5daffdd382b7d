mod assets;
mod auth;
mod config;
mod dashboard;
mod db;
mod entities;
mod entries;
mod error;
mod models;
mod movies;
mod persons;
mod ratings;
mod routes;
mod templates;
mod tmdb;

use std::{sync::Arc, time::Duration};

use axum::{
    Router, middleware,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    assets::Assets, auth::AuthConfig, config::Config, dashboard::DashboardAggregator,
    entries::EntryStore, movies::MovieStore, persons::PersonDirectory, ratings::RatingStore,
    tmdb::TmdbClient,
};

pub struct AppState {
    pub config: Arc<Config>,
    pub tmdb: Arc<TmdbClient>,
    pub movies: MovieStore,
    pub entries: EntryStore,
    pub ratings: RatingStore,
    pub persons: PersonDirectory,
    pub dashboard: DashboardAggregator,
    pub assets: Assets,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: DatabaseConnection, tmdb: TmdbClient, assets: Assets) -> Self {
        let entries = EntryStore::new(db.clone());
        let persons = PersonDirectory::new(db.clone());
        let dashboard =
            DashboardAggregator::new(entries.clone(), persons.clone(), config.max_concurrent);
        let auth = AuthConfig {
            api_token: config.api_token.clone(),
            secure_cookies: config.secure_cookies,
        };

        Self {
            tmdb: Arc::new(tmdb),
            movies: MovieStore::new(db.clone()),
            ratings: RatingStore::new(db),
            entries,
            persons,
            dashboard,
            assets,
            auth,
            config,
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/", get(routes::dashboard))
        .route("/groups/{number}", get(routes::group))
        .route("/search", get(routes::search))
        .route("/movies", post(routes::add_movie))
        .route("/entries/{id}", get(routes::entry).post(routes::update_entry))
        .route("/entries/{id}/delete", post(routes::delete_entry))
        .route("/entries/{id}/watched", post(routes::mark_watched))
        .route("/entries/{id}/unwatched", post(routes::mark_unwatched))
        .route("/ratings", post(routes::rate))
        .route("/ratings/{entry_id}/{person_id}/delete", post(routes::delete_rating))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .merge(protected)
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/healthz", get(routes::healthz))
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .with_state(state.clone())
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,seenema=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let http = reqwest::Client::builder()
        .user_agent("seenema/0.1")
        .timeout(Duration::from_secs(10))
        .build()?;

    let db = db::connect_and_migrate(&config.database_url).await?;
    let assets = Assets::fingerprint(&config.static_dir, &assets::FINGERPRINTED)?;

    let tmdb = TmdbClient::new(
        http,
        config.tmdb_access_token.clone(),
        config.tmdb_base_url.clone(),
        config.tmdb_rps,
    );

    let state = Arc::new(AppState::new(config.clone(), db, tmdb, assets));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, asset_version = %state.assets.version(), "listening");
    axum::serve(listener, app(state)).with_graceful_shutdown(shutdown_signal()).await?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(err) => tracing::error!(error = %err, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
pub(crate) fn test_state(db: DatabaseConnection, api_token: &str) -> Arc<AppState> {
    use std::path::PathBuf;

    let config = Config {
        addr: ([127, 0, 0, 1], 0).into(),
        api_token: api_token.to_string(),
        tmdb_access_token: String::new(),
        tmdb_base_url: String::new(),
        database_url: "sqlite::memory:".to_string(),
        tmdb_rps: 4,
        max_concurrent: 2,
        request_timeout: Duration::from_secs(5),
        secure_cookies: false,
        static_dir: PathBuf::from("static"),
    };
    let assets = Assets::fingerprint(&config.static_dir, &assets::FINGERPRINTED)
        .expect("fingerprint static assets");
    let tmdb = TmdbClient::new(reqwest::Client::new(), String::new(), String::new(), 4);

    Arc::new(AppState::new(Arc::new(config), db, tmdb, assets))
}
