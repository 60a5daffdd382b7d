use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, bail};

const SECRETS_DIR: &str = "/run/secrets";

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub api_token: String,
    pub tmdb_access_token: String,
    pub tmdb_base_url: String,
    pub database_url: String,
    pub tmdb_rps: u32,
    pub max_concurrent: usize,
    pub request_timeout: Duration,
    pub secure_cookies: bool,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok(), Path::new(SECRETS_DIR))
    }

    fn from_lookup(
        env: impl Fn(&str) -> Option<String>,
        secrets_dir: &Path,
    ) -> anyhow::Result<Self> {
        let host = env("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = env("PORT").unwrap_or_else(|| "4600".to_string()).parse().context("PORT")?;

        let Some(api_token) = secret(&env, secrets_dir, "API_TOKEN")? else {
            bail!("API_TOKEN is required");
        };
        let tmdb_access_token = secret(&env, secrets_dir, "TMDB_ACCESS_TOKEN")?.unwrap_or_default();
        let tmdb_base_url =
            env("TMDB_BASE_URL").unwrap_or_else(|| "https://api.themoviedb.org/3".to_string());

        let database_url = secret(&env, secrets_dir, "DATABASE_URL")?
            .unwrap_or_else(|| "sqlite://seenema.db?mode=rwc".to_string());

        let tmdb_rps: u32 = env("TMDB_RPS").and_then(|s| s.parse().ok()).unwrap_or(4);

        let max_concurrent: usize =
            env("MAX_CONCURRENT_REQUESTS").and_then(|s| s.parse().ok()).unwrap_or(4);

        let request_timeout_secs: u64 =
            env("REQUEST_TIMEOUT_SECS").and_then(|s| s.parse().ok()).unwrap_or(15);

        let secure_cookies =
            env("SECURE_COOKIES").is_none_or(|v| !v.trim().eq_ignore_ascii_case("false"));

        let static_dir = PathBuf::from(env("STATIC_DIR").unwrap_or_else(|| "static".to_string()));

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            api_token,
            tmdb_access_token,
            tmdb_base_url,
            database_url,
            tmdb_rps,
            max_concurrent,
            request_timeout: Duration::from_secs(request_timeout_secs),
            secure_cookies,
            static_dir,
        })
    }
}

/// Resolves `key` from the environment, then `<KEY>_FILE`, then the default secrets mount.
fn secret(
    env: &impl Fn(&str) -> Option<String>,
    secrets_dir: &Path,
    key: &str,
) -> anyhow::Result<Option<String>> {
    if let Some(value) = env(key).filter(|v| !v.trim().is_empty()) {
        return Ok(Some(value));
    }

    if let Some(path) = env(&format!("{key}_FILE")).filter(|p| !p.trim().is_empty()) {
        return read_secret_file(Path::new(path.trim())).map(Some);
    }

    let default_path = secrets_dir.join(format!("seenema_{}", key.to_ascii_lowercase()));
    if !default_path.exists() {
        return Ok(None);
    }
    read_secret_file(&default_path).map(Some)
}

fn read_secret_file(path: &Path) -> anyhow::Result<String> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading secret file {}", path.display()))?;
    let value = contents.trim();
    if value.is_empty() {
        bail!("secret file {} is empty", path.display());
    }
    Ok(value.to_string())
}
