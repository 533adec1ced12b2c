use std::path::Path;
use std::time::Duration;

use rayon::prelude::*;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::TypeCatalog;
use crate::error::PollError;
use crate::normalize::{DataQualityWarning, GameFlags, Normalized, normalize_json};
use crate::notify::{self, NotificationBatch};
use crate::reconcile::{NewOccurrence, ReconcileOutcome, reconcile};
use crate::source::SnapshotSource;
use crate::store;

#[derive(Debug, Clone, Serialize)]
pub struct PollReport {
    pub match_id: u64,
    pub minute: u16,
    pub half: u8,
    pub flags: GameFlags,
    pub outcome: ReconcileOutcome,
    pub warnings: Vec<DataQualityWarning>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollOutcome {
    /// Pre-kickoff snapshot; nothing was written.
    NotStarted { match_id: u64 },
    Reconciled(PollReport),
}

impl PollOutcome {
    pub fn match_id(&self) -> u64 {
        match self {
            PollOutcome::NotStarted { match_id } => *match_id,
            PollOutcome::Reconciled(report) => report.match_id,
        }
    }

    pub fn new_goals(&self) -> &[NewOccurrence] {
        match self {
            PollOutcome::NotStarted { .. } => &[],
            PollOutcome::Reconciled(report) => &report.outcome.new_goals,
        }
    }

    pub fn notification(&self) -> Option<NotificationBatch> {
        notify::batch_for(self.match_id(), self.new_goals())
    }

    /// True once the vendor marks the match finished; the scheduler can
    /// retire the match's trigger.
    pub fn game_over(&self) -> bool {
        match self {
            PollOutcome::NotStarted { .. } => false,
            PollOutcome::Reconciled(report) => report.flags.game_over,
        }
    }
}

/// One poll cycle for one match, from raw payload to committed rows.
pub fn process_snapshot(
    conn: &mut Connection,
    catalog: &TypeCatalog,
    match_id: u64,
    raw: &str,
) -> Result<PollOutcome, PollError> {
    let snapshot = match normalize_json(raw, match_id, catalog)? {
        Normalized::NotStarted { match_id } => {
            info!(match_id, "match not started, skipping write");
            return Ok(PollOutcome::NotStarted { match_id });
        }
        Normalized::Ready(snapshot) => snapshot,
    };

    let outcome = reconcile(conn, &snapshot)?;
    Ok(PollOutcome::Reconciled(PollReport {
        match_id,
        minute: snapshot.period.minute,
        half: snapshot.period.half,
        flags: snapshot.flags,
        outcome,
        warnings: snapshot.warnings,
    }))
}

pub fn poll_match(
    conn: &mut Connection,
    catalog: &TypeCatalog,
    source: &dyn SnapshotSource,
    match_id: u64,
) -> Result<PollOutcome, PollError> {
    let raw = source
        .fetch_snapshot(match_id)
        .map_err(|err| PollError::Source(format!("{err:#}")))?;
    process_snapshot(conn, catalog, match_id, &raw)
}

#[derive(Debug)]
pub struct MatchPollResult {
    pub match_id: u64,
    pub result: Result<PollOutcome, PollError>,
}

/// Polls every match independently on a bounded pool, one connection per
/// match. A failing match never affects the others.
pub fn run_batch(
    db_path: &Path,
    timeout: Duration,
    catalog: &TypeCatalog,
    source: &dyn SnapshotSource,
    match_ids: &[u64],
    parallelism: usize,
) -> Vec<MatchPollResult> {
    let pool = build_poll_pool(parallelism);
    with_poll_pool(&pool, || {
        match_ids
            .par_iter()
            .map(|match_id| {
                let result = store::open_db(db_path, timeout)
                    .and_then(|mut conn| poll_match(&mut conn, catalog, source, *match_id));
                if let Err(err) = &result {
                    warn!(
                        match_id = *match_id,
                        retryable = err.is_retryable(),
                        error = %err,
                        "poll failed"
                    );
                }
                MatchPollResult {
                    match_id: *match_id,
                    result,
                }
            })
            .collect()
    })
}

fn build_poll_pool(parallelism: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(parallelism.clamp(1, 32))
        .build()
        .ok()
}

fn with_poll_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}
