use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::error::PollError;
use crate::model::{
    MinuteKey, MinuteStat, Occurrence, OccurrenceKind, PlayerRef, StatColumn,
};
use crate::seed::MatchSeed;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const CACHE_DIR: &str = "matchday_ledger";
const DB_FILE: &str = "ledger.sqlite";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub match_id: u64,
    pub home_team_id: u64,
    pub away_team_id: u64,
    pub match_date: String,
    pub competition_id: Option<u64>,
    pub season_id: Option<u64>,
}

pub fn app_cache_dir() -> Option<PathBuf> {
    // Prefer XDG cache.
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

/// Opens (creating if needed) the ledger database. Lock waits are bounded by
/// `timeout`; past it the caller gets `PollError::Timeout`.
pub fn open_db(path: &Path, timeout: Duration) -> Result<Connection, PollError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn = Connection::open(path)?;
    configure(&conn, timeout)?;
    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection, PollError> {
    let conn = Connection::open_in_memory()?;
    configure(&conn, DEFAULT_TIMEOUT)?;
    init_schema(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection, timeout: Duration) -> Result<(), PollError> {
    conn.busy_timeout(timeout)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(())
}

pub fn init_schema(conn: &Connection) -> Result<(), PollError> {
    let stat_columns = StatColumn::all()
        .into_iter()
        .map(|c| format!("            {} REAL NULL,", c.name()))
        .collect::<Vec<_>>()
        .join("\n");

    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS team (
            team_id INTEGER PRIMARY KEY,
            team_name TEXT NOT NULL,
            team_code TEXT NULL,
            logo_url TEXT NULL
        );

        CREATE TABLE IF NOT EXISTS competition (
            competition_id INTEGER PRIMARY KEY,
            competition_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS season (
            season_id INTEGER PRIMARY KEY,
            season_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY,
            home_team_id INTEGER NOT NULL REFERENCES team(team_id),
            away_team_id INTEGER NOT NULL REFERENCES team(team_id),
            match_date TEXT NOT NULL,
            competition_id INTEGER NULL REFERENCES competition(competition_id),
            season_id INTEGER NULL REFERENCES season(season_id)
        );

        CREATE TABLE IF NOT EXISTS event_type (
            event_type_id INTEGER PRIMARY KEY,
            type_name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS player (
            player_id INTEGER PRIMARY KEY,
            player_name TEXT NULL
        );

        CREATE TABLE IF NOT EXISTS match_minute_stats (
            minute_stat_id INTEGER PRIMARY KEY AUTOINCREMENT,
            match_id INTEGER NOT NULL REFERENCES matches(match_id),
            match_minute INTEGER NOT NULL,
            half INTEGER NOT NULL,
{stat_columns}
            updated_at TEXT NOT NULL,
            UNIQUE(match_id, match_minute, half)
        );

        CREATE TABLE IF NOT EXISTS match_event (
            match_event_id INTEGER PRIMARY KEY,
            match_id INTEGER NOT NULL REFERENCES matches(match_id),
            minute_stat_id INTEGER NOT NULL REFERENCES match_minute_stats(minute_stat_id),
            event_type_id INTEGER NOT NULL REFERENCES event_type(event_type_id),
            team_id INTEGER NOT NULL REFERENCES team(team_id),
            match_minute INTEGER NOT NULL,
            extra_minute INTEGER NULL,
            half INTEGER NOT NULL,
            player_id INTEGER NULL REFERENCES player(player_id),
            related_player_id INTEGER NULL REFERENCES player(player_id),
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_match_event_match ON match_event(match_id);
        CREATE INDEX IF NOT EXISTS idx_minute_stats_match ON match_minute_stats(match_id);
        "#
    ))?;
    Ok(())
}

/// Inserts teams, competition, season and match, leaving existing rows alone.
/// Returns whether the match row itself was new.
pub fn seed_match(conn: &mut Connection, seed: &MatchSeed) -> Result<bool, PollError> {
    let tx = conn.transaction()?;
    for team in [&seed.home, &seed.away] {
        tx.execute(
            "INSERT INTO team (team_id, team_name, team_code, logo_url)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(team_id) DO NOTHING",
            params![sql_id(team.team_id)?, team.name, team.code, team.logo_url],
        )?;
    }
    if let Some(competition) = &seed.competition {
        tx.execute(
            "INSERT INTO competition (competition_id, competition_name) VALUES (?1, ?2)
             ON CONFLICT(competition_id) DO NOTHING",
            params![sql_id(competition.id)?, competition.name],
        )?;
    }
    if let Some(season) = &seed.season {
        tx.execute(
            "INSERT INTO season (season_id, season_name) VALUES (?1, ?2)
             ON CONFLICT(season_id) DO NOTHING",
            params![sql_id(season.id)?, season.name],
        )?;
    }
    let inserted = tx.execute(
        "INSERT INTO matches (match_id, home_team_id, away_team_id, match_date, competition_id, season_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(match_id) DO NOTHING",
        params![
            sql_id(seed.match_id)?,
            sql_id(seed.home.team_id)?,
            sql_id(seed.away.team_id)?,
            seed.kickoff.to_rfc3339(),
            seed.competition.as_ref().map(|c| sql_id(c.id)).transpose()?,
            seed.season.as_ref().map(|s| sql_id(s.id)).transpose()?,
        ],
    )?;
    tx.commit()?;
    Ok(inserted == 1)
}

pub fn load_match(conn: &Connection, match_id: u64) -> Result<Option<MatchRecord>, PollError> {
    let record = conn
        .query_row(
            "SELECT match_id, home_team_id, away_team_id, match_date, competition_id, season_id
             FROM matches WHERE match_id = ?1",
            params![sql_id(match_id)?],
            |row| {
                Ok(MatchRecord {
                    match_id: row.get::<_, u64>(0)?,
                    home_team_id: row.get::<_, u64>(1)?,
                    away_team_id: row.get::<_, u64>(2)?,
                    match_date: row.get(3)?,
                    competition_id: row.get::<_, Option<u64>>(4)?,
                    season_id: row.get::<_, Option<u64>>(5)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

/// Vendor ids are unsigned; SQLite integers are not.
pub fn sql_id(id: u64) -> Result<i64, PollError> {
    i64::try_from(id)
        .map_err(|_| PollError::InputShape(format!("id {id} does not fit a SQLite integer")))
}

fn minute_stat_select_sql(filter: &str) -> String {
    let columns = StatColumn::all()
        .into_iter()
        .map(|c| c.name())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT minute_stat_id, match_id, match_minute, half, {columns}
         FROM match_minute_stats
         WHERE {filter}"
    )
}

fn read_minute_stat(row: &Row<'_>, columns: &[StatColumn]) -> rusqlite::Result<(i64, MinuteStat)> {
    let id: i64 = row.get(0)?;
    let mut stat = MinuteStat::empty(
        row.get::<_, u64>(1)?,
        row.get::<_, u16>(2)?,
        row.get::<_, u8>(3)?,
    );
    for (offset, column) in columns.iter().enumerate() {
        let value: Option<f64> = row.get(4 + offset)?;
        stat.side_mut(column.side).set(column.kind, value);
    }
    stat.settle_possession();
    Ok((id, stat))
}

pub fn find_minute_stat(
    conn: &Connection,
    match_id: u64,
    key: MinuteKey,
) -> Result<Option<(i64, MinuteStat)>, PollError> {
    let columns = StatColumn::all();
    let sql = minute_stat_select_sql("match_id = ?1 AND match_minute = ?2 AND half = ?3");
    let found = conn
        .query_row(
            &sql,
            params![sql_id(match_id)?, i64::from(key.minute), i64::from(key.half)],
            |row| read_minute_stat(row, &columns),
        )
        .optional()?;
    Ok(found)
}

pub fn minute_stat_id(
    conn: &Connection,
    match_id: u64,
    key: MinuteKey,
) -> Result<Option<i64>, PollError> {
    let id = conn
        .query_row(
            "SELECT minute_stat_id FROM match_minute_stats
             WHERE match_id = ?1 AND match_minute = ?2 AND half = ?3",
            params![sql_id(match_id)?, i64::from(key.minute), i64::from(key.half)],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(id)
}

fn stat_values(row: &MinuteStat, columns: &[StatColumn]) -> Vec<SqlValue> {
    columns
        .iter()
        .map(|column| match row.get(*column) {
            Some(value) => SqlValue::Real(value),
            None => SqlValue::Null,
        })
        .collect()
}

pub fn insert_minute_stat(conn: &Connection, row: &MinuteStat) -> Result<i64, PollError> {
    let columns = StatColumn::all();
    let names = columns.iter().map(|c| c.name()).collect::<Vec<_>>();
    let placeholders = (1..=names.len() + 4)
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO match_minute_stats (match_id, match_minute, half, {}, updated_at)
         VALUES ({placeholders})",
        names.join(", ")
    );

    let mut values = vec![
        SqlValue::Integer(sql_id(row.match_id)?),
        SqlValue::Integer(i64::from(row.minute)),
        SqlValue::Integer(i64::from(row.half)),
    ];
    values.extend(stat_values(row, &columns));
    values.push(SqlValue::Text(Utc::now().to_rfc3339()));

    conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(conn.last_insert_rowid())
}

/// Overwrites every stat column of an existing row; the key never changes.
pub fn replace_minute_stat(conn: &Connection, id: i64, row: &MinuteStat) -> Result<(), PollError> {
    let columns = StatColumn::all();
    let assignments = columns
        .iter()
        .enumerate()
        .map(|(idx, c)| format!("{} = ?{}", c.name(), idx + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE match_minute_stats SET {assignments}, updated_at = ?{} WHERE minute_stat_id = ?{}",
        columns.len() + 1,
        columns.len() + 2
    );

    let mut values = stat_values(row, &columns);
    values.push(SqlValue::Text(Utc::now().to_rfc3339()));
    values.push(SqlValue::Integer(id));
    conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(())
}

pub fn load_minute_stats(conn: &Connection, match_id: u64) -> Result<Vec<MinuteStat>, PollError> {
    let columns = StatColumn::all();
    let sql = format!(
        "{} ORDER BY half ASC, match_minute ASC",
        minute_stat_select_sql("match_id = ?1")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![sql_id(match_id)?], |row| read_minute_stat(row, &columns))?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?.1);
    }
    Ok(out)
}

pub fn ensure_event_type(conn: &Connection, type_id: u32, kind: OccurrenceKind) -> Result<(), PollError> {
    conn.execute(
        "INSERT INTO event_type (event_type_id, type_name) VALUES (?1, ?2)
         ON CONFLICT(event_type_id) DO NOTHING",
        params![i64::from(type_id), kind.name()],
    )?;
    Ok(())
}

/// Insert-if-absent; a stored name is only ever filled in, never replaced.
pub fn ensure_player(conn: &Connection, player: &PlayerRef) -> Result<(), PollError> {
    conn.execute(
        "INSERT INTO player (player_id, player_name) VALUES (?1, ?2)
         ON CONFLICT(player_id) DO UPDATE SET player_name = excluded.player_name
         WHERE player.player_name IS NULL AND excluded.player_name IS NOT NULL",
        params![sql_id(player.id)?, player.name],
    )?;
    Ok(())
}

/// Returns false when the vendor id is already stored.
pub fn insert_occurrence(
    conn: &Connection,
    occurrence: &Occurrence,
    minute_stat_id: i64,
) -> Result<bool, PollError> {
    let inserted = conn.execute(
        "INSERT INTO match_event (
            match_event_id, match_id, minute_stat_id, event_type_id, team_id,
            match_minute, extra_minute, half, player_id, related_player_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(match_event_id) DO NOTHING",
        params![
            sql_id(occurrence.event_id)?,
            sql_id(occurrence.match_id)?,
            minute_stat_id,
            i64::from(occurrence.vendor_type_id),
            sql_id(occurrence.team_id)?,
            i64::from(occurrence.minute),
            occurrence.extra_minute.map(i64::from),
            i64::from(occurrence.half),
            occurrence.player.as_ref().map(|p| sql_id(p.id)).transpose()?,
            occurrence.related.as_ref().map(|p| sql_id(p.id)).transpose()?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(inserted == 1)
}

/// Vendor ids of goal-type occurrences already stored for the match.
pub fn known_goal_ids(conn: &Connection, match_id: u64) -> Result<HashSet<u64>, PollError> {
    let goal_names = OccurrenceKind::KNOWN
        .iter()
        .filter(|k| k.is_goal())
        .map(|k| format!("'{}'", k.name()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT me.match_event_id
         FROM match_event me
         JOIN event_type et ON et.event_type_id = me.event_type_id
         WHERE me.match_id = ?1 AND et.type_name IN ({goal_names})"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![sql_id(match_id)?], |row| row.get::<_, u64>(0))?;

    let mut out = HashSet::new();
    for row in rows {
        out.insert(row?);
    }
    Ok(out)
}

pub fn load_occurrences(conn: &Connection, match_id: u64) -> Result<Vec<Occurrence>, PollError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT
            me.match_event_id, me.match_id, et.type_name, me.event_type_id, me.team_id,
            me.match_minute, me.extra_minute, me.half,
            me.player_id, p.player_name, me.related_player_id, rp.player_name
        FROM match_event me
        JOIN event_type et ON et.event_type_id = me.event_type_id
        LEFT JOIN player p ON p.player_id = me.player_id
        LEFT JOIN player rp ON rp.player_id = me.related_player_id
        WHERE me.match_id = ?1
        ORDER BY me.half ASC, me.match_minute ASC, me.match_event_id ASC
        "#,
    )?;

    let rows = stmt.query_map(params![sql_id(match_id)?], |row| {
        let type_name: String = row.get(2)?;
        let player = row
            .get::<_, Option<u64>>(8)?
            .map(|id| -> rusqlite::Result<PlayerRef> {
                Ok(PlayerRef {
                    id,
                    name: row.get(9)?,
                })
            })
            .transpose()?;
        let related = row
            .get::<_, Option<u64>>(10)?
            .map(|id| -> rusqlite::Result<PlayerRef> {
                Ok(PlayerRef {
                    id,
                    name: row.get(11)?,
                })
            })
            .transpose()?;
        Ok(Occurrence {
            event_id: row.get::<_, u64>(0)?,
            match_id: row.get::<_, u64>(1)?,
            kind: OccurrenceKind::from_name(&type_name),
            vendor_type_id: row.get::<_, u32>(3)?,
            team_id: row.get::<_, u64>(4)?,
            minute: row.get::<_, u16>(5)?,
            extra_minute: row.get::<_, Option<u16>>(6)?,
            half: row.get::<_, u8>(7)?,
            player,
            related,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
