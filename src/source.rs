use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};

const REQUEST_TIMEOUT_SECS: u64 = 10;
const SNAPSHOT_INCLUDES: &str = "periods;statistics;events";

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Where raw snapshot JSON comes from. Implementations must be shareable
/// across the batch worker threads.
pub trait SnapshotSource: Sync {
    fn fetch_snapshot(&self, match_id: u64) -> Result<String>;
}

pub fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    base_url: String,
    token: String,
}

impl HttpSnapshotSource {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        }
    }

    pub fn snapshot_url(&self, match_id: u64) -> String {
        format!(
            "{}/v3/football/fixtures/{match_id}?api_token={}&include={SNAPSHOT_INCLUDES}",
            self.base_url, self.token
        )
    }
}

impl SnapshotSource for HttpSnapshotSource {
    fn fetch_snapshot(&self, match_id: u64) -> Result<String> {
        let client = http_client()?;
        let resp = client
            .get(self.snapshot_url(match_id))
            .header(USER_AGENT, "matchday-ledger")
            .header(ACCEPT, "application/json")
            .send()
            .with_context(|| format!("request for match {match_id} failed"))?;
        let status = resp.status();
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow::anyhow!("http {}: {}", status, body));
        }
        Ok(body)
    }
}

/// Reads `{dir}/{match_id}.json`; used for replays and offline runs.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    dir: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn snapshot_path(&self, match_id: u64) -> PathBuf {
        self.dir.join(format!("{match_id}.json"))
    }
}

impl SnapshotSource for FileSnapshotSource {
    fn fetch_snapshot(&self, match_id: u64) -> Result<String> {
        let path = self.snapshot_path(match_id);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_url_shape() {
        let source = HttpSnapshotSource::new("https://api.sportmonks.com/", " abc ");
        assert_eq!(
            source.snapshot_url(19000001),
            "https://api.sportmonks.com/v3/football/fixtures/19000001?api_token=abc&include=periods;statistics;events"
        );
    }

    #[test]
    fn file_source_reports_missing_files() {
        let source = FileSnapshotSource::new("/nonexistent/snapshots");
        assert_eq!(
            source.snapshot_path(7),
            PathBuf::from("/nonexistent/snapshots/7.json")
        );
        assert!(source.fetch_snapshot(7).is_err());
    }
}
