use std::fs;
use std::path::PathBuf;

use matchday_ledger::PollError;
use matchday_ledger::catalog::TypeCatalog;
use matchday_ledger::model::{MinuteStat, Occurrence, OccurrenceKind, StatKind};
use matchday_ledger::momentum::{MomentumConfig, estimate};
use matchday_ledger::normalize::{Normalized, normalize_json};
use matchday_ledger::reconcile::reconcile;
use matchday_ledger::store::{self, MatchRecord};
use matchday_ledger::timeline::{DerivedTimelineRow, Timeline, build_timeline};
use matchday_ledger::seed;

const MATCH_ID: u64 = 19000001;
const HOME: u64 = 1;
const AWAY: u64 = 2;

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn record() -> MatchRecord {
    MatchRecord {
        match_id: MATCH_ID,
        home_team_id: HOME,
        away_team_id: AWAY,
        match_date: "2025-08-16T14:00:00+00:00".to_string(),
        competition_id: Some(8),
        season_id: Some(23614),
    }
}

fn stat(minute: u16, possession_home: f64, attacks: (f64, f64)) -> MinuteStat {
    let mut row = MinuteStat::empty(MATCH_ID, minute, 1);
    row.home.set(StatKind::Possession, Some(possession_home));
    row.home.set(StatKind::Attacks, Some(attacks.0));
    row.away.set(StatKind::Attacks, Some(attacks.1));
    row.settle_possession();
    row
}

fn occurrence(event_id: u64, kind: OccurrenceKind, team_id: u64, minute: u16) -> Occurrence {
    Occurrence {
        event_id,
        match_id: MATCH_ID,
        kind,
        vendor_type_id: 14,
        team_id,
        minute,
        extra_minute: None,
        half: 1,
        player: None,
        related: None,
    }
}

fn rows(timeline: &Timeline) -> Vec<DerivedTimelineRow> {
    timeline.rows().collect()
}

#[test]
fn score_is_forward_filled_across_gaps() {
    let timeline = Timeline::from_parts(
        record(),
        vec![stat(1, 50.0, (1.0, 1.0)), stat(2, 52.0, (3.0, 1.0)), stat(5, 49.0, (6.0, 4.0))],
        vec![occurrence(10, OccurrenceKind::Goal, HOME, 2)],
    );
    let all = rows(&timeline);
    let minutes: Vec<u16> = all.iter().map(|r| r.minute).collect();
    assert_eq!(minutes, vec![1, 2, 3, 4, 5]);

    let at_five = timeline.row_at(5).unwrap();
    assert_eq!((at_five.home_score, at_five.away_score), (1, 0));
    assert!(at_five.observed);

    let gap = &all[2];
    assert!(!gap.observed);
    assert_eq!((gap.home_score, gap.away_score), (1, 0));
    assert_eq!(gap.home.get(StatKind::Attacks), Some(3.0));
    assert_eq!(gap.counts.get(OccurrenceKind::Goal), 0);
    assert_eq!(all[1].counts.get(OccurrenceKind::Goal), 1);
}

#[test]
fn no_goals_means_zero_zero_everywhere() {
    let timeline = Timeline::from_parts(record(), vec![stat(3, 50.0, (0.0, 0.0))], vec![]);
    assert!(rows(&timeline)
        .iter()
        .all(|r| r.home_score == 0 && r.away_score == 0 && r.counts.total() == 0));
}

#[test]
fn score_never_decreases_and_own_goals_flip_sides() {
    let timeline = Timeline::from_parts(
        record(),
        vec![stat(1, 50.0, (0.0, 0.0)), stat(30, 55.0, (20.0, 10.0))],
        vec![
            occurrence(10, OccurrenceKind::Goal, HOME, 4),
            occurrence(11, OccurrenceKind::OwnGoal, HOME, 9),
            occurrence(12, OccurrenceKind::Penalty, AWAY, 9),
            occurrence(13, OccurrenceKind::MissedPenalty, HOME, 15),
            occurrence(14, OccurrenceKind::RedCard, AWAY, 22),
        ],
    );
    let all = rows(&timeline);
    for pair in all.windows(2) {
        assert!(pair[1].home_score >= pair[0].home_score);
        assert!(pair[1].away_score >= pair[0].away_score);
    }
    let last = all.last().unwrap();
    assert_eq!((last.home_score, last.away_score), (1, 2));
    assert_eq!(all[8].counts.get(OccurrenceKind::OwnGoal), 1);
    assert_eq!(all[8].counts.get(OccurrenceKind::Penalty), 1);
}

#[test]
fn possession_complements_to_one_hundred() {
    let timeline = Timeline::from_parts(
        record(),
        vec![stat(1, 50.0, (0.0, 0.0)), stat(2, 63.5, (1.0, 0.0)), stat(6, 41.0, (2.0, 3.0))],
        vec![],
    );
    for row in rows(&timeline) {
        let (home, away) = (row.possession_home.unwrap(), row.possession_away.unwrap());
        assert_eq!(home + away, 100.0);
        assert_eq!(row.away.possession, Some(away));
    }
}

#[test]
fn requested_minutes_are_clamped_to_the_last_stored_one() {
    let timeline = Timeline::from_parts(
        record(),
        vec![stat(1, 50.0, (0.0, 0.0)), stat(12, 50.0, (5.0, 5.0))],
        vec![occurrence(10, OccurrenceKind::Goal, AWAY, 12)],
    );
    assert_eq!(timeline.max_minute(), Some(12));
    assert_eq!(timeline.clamp_minute(90), Some(12));
    assert_eq!(timeline.clamp_minute(7), Some(7));
    let late = timeline.row_at(90).unwrap();
    assert_eq!(late.minute, 12);
    assert_eq!(late.away_score, 1);
    assert_eq!(timeline.rows().count(), 12);
}

#[test]
fn flat_stats_give_flat_momentum() {
    let series: Vec<MinuteStat> = (1..=15).map(|m| stat(m, 50.0, (10.0, 10.0))).collect();
    let timeline = Timeline::from_parts(record(), series, vec![]);
    let samples = estimate(&rows(&timeline), &MomentumConfig::default());
    assert_eq!(samples.len(), 15);
    assert!(samples.iter().all(|s| s.momentum == 0.0));
}

#[test]
fn gaps_do_not_create_momentum_spikes() {
    let timeline = Timeline::from_parts(
        record(),
        vec![stat(1, 50.0, (0.0, 0.0)), stat(8, 50.0, (7.0, 0.0))],
        vec![],
    );
    let samples = estimate(&rows(&timeline), &MomentumConfig::default());
    // Minutes 2..=7 carry minute 1 forward, so the whole jump lands on minute 8.
    assert!(samples[..7].iter().all(|s| s.momentum == 0.0));
    assert_eq!(samples[7].momentum, 7.0);
}

#[test]
fn built_from_the_store_after_two_polls() {
    let mut conn = store::open_in_memory().unwrap();
    let match_seed = seed::parse_seed(&read_fixture("seed_match.json")).unwrap();
    store::seed_match(&mut conn, &match_seed).unwrap();
    let catalog = TypeCatalog::builtin();
    for name in ["snapshot_first_half.json", "snapshot_second_half.json"] {
        let Normalized::Ready(snapshot) = normalize_json(&read_fixture(name), MATCH_ID, &catalog).unwrap()
        else {
            panic!("{name} should be started");
        };
        reconcile(&mut conn, &snapshot).unwrap();
    }

    let timeline = build_timeline(&conn, MATCH_ID).unwrap();
    let all = rows(&timeline);
    // First half 1..=23, second half from the penalty at 50 to the last row at 52.
    assert_eq!(all.len(), 23 + 3);
    assert_eq!((all[0].half, all[0].minute), (1, 1));
    assert_eq!((all[23].half, all[23].minute), (2, 50));

    let half_time = &all[22];
    assert_eq!((half_time.home_score, half_time.away_score), (1, 1));
    assert_eq!(half_time.possession_home, Some(58.0));

    let last = all.last().unwrap();
    assert_eq!((last.home_score, last.away_score), (3, 1));
    assert_eq!(last.possession_home, Some(53.0));
    assert_eq!(last.possession_away, Some(47.0));
    assert_eq!(last.counts.get(OccurrenceKind::Substitution), 1);

    let samples = estimate(&all, &MomentumConfig::default());
    assert_eq!(samples.len(), all.len());
    // Home out-attacked away between half time and minute 52.
    assert!(samples.last().unwrap().momentum > 0.0);
}

#[test]
fn timeline_for_unknown_match_is_an_error() {
    let conn = store::open_in_memory().unwrap();
    let err = build_timeline(&conn, 42).unwrap_err();
    assert!(matches!(err, PollError::MatchNotSeeded(42)));
}

fn poll(conn: &mut rusqlite::Connection, raw: &str) -> matchday_ledger::reconcile::ReconcileOutcome {
    let Normalized::Ready(snapshot) = normalize_json(raw, MATCH_ID, &TypeCatalog::builtin()).unwrap()
    else {
        panic!("snapshot should be started");
    };
    reconcile(conn, &snapshot).unwrap()
}

fn seeded() -> rusqlite::Connection {
    let mut conn = store::open_in_memory().unwrap();
    let match_seed = seed::parse_seed(&read_fixture("seed_match.json")).unwrap();
    store::seed_match(&mut conn, &match_seed).unwrap();
    conn
}

#[test]
fn first_half_goal_first_seen_after_the_break_stays_in_the_first_half() {
    let mut conn = seeded();
    let outcome = poll(
        &mut conn,
        r#"{"data": {"id": 19000001, "periods": [
            {"id": 501, "started": 1755352800, "minutes": 45},
            {"id": 502, "ticking": true, "started": 1755356400, "minutes": 50}
        ], "statistics": [
            {"type_id": 45, "location": "home", "data": {"value": 55}}
        ], "events": [
            {"id": 10, "type_id": 14, "participant_id": 1, "minute": 12}
        ]}}"#,
    );
    assert_eq!(outcome.new_goals.len(), 1);
    assert_eq!(outcome.new_goals[0].half, 1);

    let all = rows(&build_timeline(&conn, MATCH_ID).unwrap());
    let first_half = all.iter().filter(|r| r.half == 1).count();
    assert_eq!(first_half, 12);
    assert!(all.iter().filter(|r| r.half == 2).all(|r| r.minute >= 46));
    assert_eq!(all[11].home_score, 1);
    assert_eq!(all.last().unwrap().home_score, 1);
}

#[test]
fn poll_without_statistics_does_not_blank_carried_stats() {
    let mut conn = seeded();
    poll(
        &mut conn,
        r#"{"data": {"id": 19000001, "periods": [
            {"id": 501, "ticking": true, "started": 1755352800, "minutes": 20}
        ], "statistics": [
            {"type_id": 45, "location": "home", "data": {"value": 60}},
            {"type_id": 43, "location": "home", "data": {"value": 30}}
        ]}}"#,
    );
    poll(
        &mut conn,
        r#"{"data": {"id": 19000001, "periods": [
            {"id": 501, "ticking": true, "started": 1755352800, "minutes": 21}
        ], "statistics": []}}"#,
    );

    let timeline = build_timeline(&conn, MATCH_ID).unwrap();
    let at_21 = timeline.row_at(21).unwrap();
    assert_eq!(at_21.minute, 21);
    assert!(!at_21.observed);
    assert_eq!(at_21.possession_home, Some(60.0));
    assert_eq!(at_21.home.get(StatKind::Attacks), Some(30.0));

    let samples = estimate(&rows(&timeline), &MomentumConfig::default());
    assert_eq!(samples.last().unwrap().momentum, 0.0);
}
