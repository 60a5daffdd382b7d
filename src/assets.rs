use std::path::Path;

use anyhow::Context;
use sha2::{Digest, Sha256};

/// Files whose contents determine the cache-busting version.
pub const FINGERPRINTED: [&str; 2] = ["app.css", "app.js"];

const VERSION_LEN: usize = 12;

/// Static asset versioning, computed once at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assets {
    version: String,
}

impl Assets {
    pub fn fingerprint(dir: &Path, files: &[&str]) -> anyhow::Result<Self> {
        let mut hasher = Sha256::new();
        for file in files {
            let path = dir.join(file);
            let bytes =
                std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            hasher.update(file.as_bytes());
            hasher.update(&bytes);
        }

        let mut version = hex::encode(hasher.finalize());
        version.truncate(VERSION_LEN);
        tracing::debug!(%version, "static assets fingerprinted");
        Ok(Self { version })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn url(&self, path: &str) -> String {
        let sep = if path.contains('?') { '&' } else { '?' };
        format!("{path}{sep}v={}", self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_tracks_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.css"), "body{}").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();

        let first = Assets::fingerprint(dir.path(), &FINGERPRINTED).unwrap();
        assert_eq!(first.version().len(), 12);
        assert!(first.version().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(first, Assets::fingerprint(dir.path(), &FINGERPRINTED).unwrap());

        std::fs::write(dir.path().join("app.css"), "body{color:red}").unwrap();
        assert_ne!(first, Assets::fingerprint(dir.path(), &FINGERPRINTED).unwrap());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Assets::fingerprint(dir.path(), &["nope.css"]).is_err());
    }

    #[test]
    fn url_appends_version() {
        let assets = Assets { version: "abc123def456".to_string() };
        assert_eq!(assets.url("/static/app.css"), "/static/app.css?v=abc123def456");
        assert_eq!(assets.url("/static/app.js?x=1"), "/static/app.js?x=1&v=abc123def456");
    }
}
