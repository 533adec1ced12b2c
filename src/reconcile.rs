use std::collections::{HashMap, HashSet};

use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::error::PollError;
use crate::model::{MinuteKey, MinuteStat, MinuteStatChoice, OccurrenceKind};
use crate::normalize::NormalizedSnapshot;
use crate::store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MinuteStatAction {
    Inserted,
    Replaced,
    KeptExisting,
}

/// A goal-type occurrence stored for the first time by this poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOccurrence {
    pub event_id: u64,
    pub match_id: u64,
    pub team_id: u64,
    pub player_name: Option<String>,
    pub minute: u16,
    pub half: u8,
    pub kind: OccurrenceKind,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileOutcome {
    pub minute_stats: Vec<(MinuteKey, MinuteStatAction)>,
    pub occurrences_inserted: usize,
    pub occurrences_skipped: usize,
    /// Ordered by (half, minute, event id); never holds the same id twice.
    pub new_goals: Vec<NewOccurrence>,
}

impl ReconcileOutcome {
    pub fn rows_written(&self) -> usize {
        self.minute_stats
            .iter()
            .filter(|(_, action)| *action != MinuteStatAction::KeptExisting)
            .count()
    }
}

/// Merges one normalized snapshot into the store.
///
/// Runs as a single immediate transaction: either every row of the snapshot
/// lands or none does, and the goal report only exists for a commit.
pub fn reconcile(
    conn: &mut Connection,
    snapshot: &NormalizedSnapshot,
) -> Result<ReconcileOutcome, PollError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    match apply(&tx, snapshot) {
        Ok(outcome) => {
            tx.commit()?;
            info!(
                match_id = snapshot.match_id,
                minute = snapshot.period.minute,
                half = snapshot.period.half,
                rows_written = outcome.rows_written(),
                occurrences_inserted = outcome.occurrences_inserted,
                new_goals = outcome.new_goals.len(),
                "snapshot reconciled"
            );
            Ok(outcome)
        }
        Err(err) => {
            error!(match_id = snapshot.match_id, error = %err, "reconcile failed, rolling back");
            // Dropping an uncommitted transaction rolls it back.
            drop(tx);
            Err(err)
        }
    }
}

fn apply(conn: &Connection, snapshot: &NormalizedSnapshot) -> Result<ReconcileOutcome, PollError> {
    let match_id = snapshot.match_id;
    if store::load_match(conn, match_id)?.is_none() {
        return Err(PollError::MatchNotSeeded(match_id));
    }

    let mut outcome = ReconcileOutcome::default();

    // Minute rows first: every occurrence needs one to point at.
    let mut row_ids: HashMap<MinuteKey, i64> = HashMap::new();
    for row in &snapshot.minute_stats {
        let (id, action) = upsert_minute_stat(conn, row)?;
        row_ids.insert(row.key(), id);
        outcome.minute_stats.push((row.key(), action));
    }
    let current_id = match snapshot.current_minute_stat() {
        Some(row) => row_ids.get(&row.key()).copied(),
        None => None,
    };

    let known_goals = store::known_goal_ids(conn, match_id)?;

    for occurrence in &snapshot.occurrences {
        for player in [&occurrence.player, &occurrence.related].into_iter().flatten() {
            store::ensure_player(conn, player)?;
        }
        store::ensure_event_type(conn, occurrence.vendor_type_id, occurrence.kind)?;

        let key = occurrence.key();
        let minute_stat_id = match row_ids.get(&key) {
            Some(id) => Some(*id),
            None => store::minute_stat_id(conn, match_id, key)?.or(current_id),
        };
        let Some(minute_stat_id) = minute_stat_id else {
            return Err(PollError::InputShape(format!(
                "occurrence {} has no minute row to attach to",
                occurrence.event_id
            )));
        };

        if store::insert_occurrence(conn, occurrence, minute_stat_id)? {
            outcome.occurrences_inserted += 1;
        } else {
            outcome.occurrences_skipped += 1;
        }
    }

    outcome.new_goals = new_goals(snapshot, &known_goals);
    Ok(outcome)
}

fn upsert_minute_stat(
    conn: &Connection,
    incoming: &MinuteStat,
) -> Result<(i64, MinuteStatAction), PollError> {
    let Some((id, existing)) = store::find_minute_stat(conn, incoming.match_id, incoming.key())?
    else {
        let id = store::insert_minute_stat(conn, incoming)?;
        return Ok((id, MinuteStatAction::Inserted));
    };

    match MinuteStat::prefer_complete(&existing, incoming) {
        MinuteStatChoice::TakeIncoming => {
            store::replace_minute_stat(conn, id, incoming)?;
            Ok((id, MinuteStatAction::Replaced))
        }
        MinuteStatChoice::KeepExisting => {
            debug!(
                match_id = incoming.match_id,
                minute = incoming.minute,
                half = incoming.half,
                "stored minute row is at least as complete, keeping it"
            );
            Ok((id, MinuteStatAction::KeptExisting))
        }
    }
}

/// Goal-type occurrences absent from the store before this poll started.
fn new_goals(snapshot: &NormalizedSnapshot, known: &HashSet<u64>) -> Vec<NewOccurrence> {
    let mut seen = HashSet::new();
    let mut out = snapshot
        .occurrences
        .iter()
        .filter(|occ| occ.kind.is_goal())
        .filter(|occ| !known.contains(&occ.event_id))
        .filter(|occ| seen.insert(occ.event_id))
        .map(|occ| NewOccurrence {
            event_id: occ.event_id,
            match_id: occ.match_id,
            team_id: occ.team_id,
            player_name: occ.player_name().map(str::to_string),
            minute: occ.minute,
            half: occ.half,
            kind: occ.kind,
        })
        .collect::<Vec<_>>();
    out.sort_by_key(|goal| (goal.half, goal.minute, goal.event_id));
    out
}
