use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::catalog::TypeCatalog;
use crate::momentum::{DEFAULT_WINDOW, MomentumConfig};
use crate::source::{FileSnapshotSource, HttpSnapshotSource, SnapshotSource};
use crate::store;

const DEFAULT_API_BASE_URL: &str = "https://api.sportmonks.com";
const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PARALLELISM: usize = 4;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub store_timeout: Duration,
    pub momentum_window: usize,
    pub poll_parallelism: usize,
    pub snapshot_dir: Option<PathBuf>,
    pub api_base_url: String,
    pub api_token: Option<String>,
}

impl Config {
    /// Reads `.env.local`, then `.env`, then the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |key: &str| text(key).and_then(|v| v.parse::<u64>().ok());

        Self {
            db_path: text("LEDGER_DB_PATH").map(PathBuf::from),
            catalog_path: text("TYPE_CATALOG_PATH").map(PathBuf::from),
            store_timeout: Duration::from_millis(
                number("STORE_TIMEOUT_MS")
                    .unwrap_or(DEFAULT_TIMEOUT_MS)
                    .clamp(100, 60_000),
            ),
            momentum_window: number("MOMENTUM_WINDOW")
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_WINDOW)
                .clamp(1, 30),
            poll_parallelism: number("POLL_PARALLELISM")
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_PARALLELISM)
                .clamp(1, 32),
            snapshot_dir: text("SNAPSHOT_DIR").map(PathBuf::from),
            api_base_url: text("API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_token: text("API_TOKEN"),
        }
    }

    /// `--db` wins over `LEDGER_DB_PATH`, which wins over the cache dir.
    pub fn resolve_db_path(&self, cli_override: Option<PathBuf>) -> Result<PathBuf> {
        cli_override
            .or_else(|| self.db_path.clone())
            .or_else(store::default_db_path)
            .context("unable to resolve sqlite path")
    }

    pub fn load_catalog(&self) -> Result<TypeCatalog> {
        TypeCatalog::load(self.catalog_path.as_deref()).context("failed to load type catalog")
    }

    pub fn momentum(&self) -> MomentumConfig {
        MomentumConfig {
            window: self.momentum_window,
            ..MomentumConfig::default()
        }
    }

    /// Local snapshot files when `SNAPSHOT_DIR` is set, otherwise the vendor API.
    pub fn snapshot_source(&self) -> Result<Box<dyn SnapshotSource>> {
        if let Some(dir) = &self.snapshot_dir {
            return Ok(Box::new(FileSnapshotSource::new(dir.clone())));
        }
        let token = self
            .api_token
            .as_deref()
            .ok_or_else(|| anyhow!("API_TOKEN is required when SNAPSHOT_DIR is unset"))?;
        Ok(Box::new(HttpSnapshotSource::new(&self.api_base_url, token)))
    }
}

/// Value of `--name=value` or `--name value`, blank values ignored.
pub fn arg_value(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("--{name}=");
    let flag = format!("--{name}");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

pub fn parse_db_path_arg(args: &[String]) -> Option<PathBuf> {
    arg_value(args, "db").map(PathBuf::from)
}

/// Comma, semicolon or space separated ids; zeros and duplicates dropped.
pub fn parse_ids(raw: &str) -> Vec<u64> {
    let mut out = Vec::new();
    for id in raw
        .split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<u64>().ok())
        .filter(|id| *id != 0)
    {
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}
