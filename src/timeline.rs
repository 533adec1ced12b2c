use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::PollError;
use crate::model::{MinuteKey, MinuteStat, Occurrence, OccurrenceKind, Side, TeamStats};
use crate::store::{self, MatchRecord};

/// Per-kind occurrence counts for one minute. Every known kind is present,
/// zero when nothing happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OccurrenceCounts([u32; OccurrenceKind::KNOWN.len()]);

impl OccurrenceCounts {
    pub fn get(&self, kind: OccurrenceKind) -> u32 {
        kind.known_index().map(|idx| self.0[idx]).unwrap_or(0)
    }

    fn bump(&mut self, kind: OccurrenceKind) {
        if let Some(idx) = kind.known_index() {
            self.0[idx] += 1;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (OccurrenceKind, u32)> + '_ {
        OccurrenceKind::KNOWN
            .iter()
            .zip(self.0.iter())
            .map(|(kind, count)| (*kind, *count))
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}

impl Serialize for OccurrenceCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (kind, count) in self.iter() {
            map.serialize_entry(kind.name(), &count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedTimelineRow {
    pub minute: u16,
    pub half: u8,
    /// False for gap minutes whose stats were carried forward.
    pub observed: bool,
    pub home: TeamStats,
    pub away: TeamStats,
    pub possession_home: Option<f64>,
    pub possession_away: Option<f64>,
    pub counts: OccurrenceCounts,
    pub home_score: u32,
    pub away_score: u32,
}

impl DerivedTimelineRow {
    pub fn key(&self) -> MinuteKey {
        MinuteKey {
            half: self.half,
            minute: self.minute,
        }
    }
}

/// Stored fragments of one match, ready to be expanded into a continuous
/// per-minute sequence.
#[derive(Debug, Clone)]
pub struct Timeline {
    match_record: MatchRecord,
    stats: BTreeMap<MinuteKey, MinuteStat>,
    occurrences: BTreeMap<MinuteKey, Vec<Occurrence>>,
    keys: Vec<MinuteKey>,
}

pub fn build_timeline(conn: &Connection, match_id: u64) -> Result<Timeline, PollError> {
    let Some(record) = store::load_match(conn, match_id)? else {
        return Err(PollError::MatchNotSeeded(match_id));
    };
    let stats = store::load_minute_stats(conn, match_id)?;
    let occurrences = store::load_occurrences(conn, match_id)?;
    Ok(Timeline::from_parts(record, stats, occurrences))
}

impl Timeline {
    pub fn from_parts(
        match_record: MatchRecord,
        stats: Vec<MinuteStat>,
        occurrences: Vec<Occurrence>,
    ) -> Self {
        let stats: BTreeMap<MinuteKey, MinuteStat> =
            stats.into_iter().map(|row| (row.key(), row)).collect();
        let mut grouped: BTreeMap<MinuteKey, Vec<Occurrence>> = BTreeMap::new();
        for occurrence in occurrences {
            grouped.entry(occurrence.key()).or_default().push(occurrence);
        }
        let keys = minute_keys(stats.keys().chain(grouped.keys()).copied());
        Self {
            match_record,
            stats,
            occurrences: grouped,
            keys,
        }
    }

    pub fn match_record(&self) -> &MatchRecord {
        &self.match_record
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Rows in (half, minute) order, computed as they are pulled.
    pub fn rows(&self) -> TimelineRows<'_> {
        TimelineRows {
            timeline: self,
            next: 0,
            carried: None,
            home_score: 0,
            away_score: 0,
        }
    }

    pub fn max_minute(&self) -> Option<u16> {
        self.keys.iter().map(|key| key.minute).max()
    }

    /// Requests past the last stored minute are pulled back to it.
    pub fn clamp_minute(&self, requested: u16) -> Option<u16> {
        self.max_minute().map(|max| requested.min(max))
    }

    /// Latest row at or before `minute` after clamping.
    pub fn row_at(&self, minute: u16) -> Option<DerivedTimelineRow> {
        let minute = self.clamp_minute(minute)?;
        self.rows().filter(|row| row.minute <= minute).last()
    }
}

// First half starts at kickoff, later halves at their first stored minute.
// Each half runs to its last stored minute; halves with nothing stored are skipped.
fn minute_keys(observed: impl Iterator<Item = MinuteKey>) -> Vec<MinuteKey> {
    let mut bounds: BTreeMap<u8, (u16, u16)> = BTreeMap::new();
    for key in observed {
        let entry = bounds.entry(key.half).or_insert((key.minute, key.minute));
        entry.0 = entry.0.min(key.minute);
        entry.1 = entry.1.max(key.minute);
    }

    let mut keys = Vec::new();
    for (half, (first, last)) in bounds {
        let start = if half <= 1 { first.min(1) } else { first };
        keys.extend((start..=last).map(|minute| MinuteKey { half, minute }));
    }
    keys
}

pub struct TimelineRows<'a> {
    timeline: &'a Timeline,
    next: usize,
    carried: Option<(TeamStats, TeamStats)>,
    home_score: u32,
    away_score: u32,
}

impl Iterator for TimelineRows<'_> {
    type Item = DerivedTimelineRow;

    fn next(&mut self) -> Option<Self::Item> {
        let key = *self.timeline.keys.get(self.next)?;
        self.next += 1;

        // A stored row with every column null is a gap too.
        let observed = match self.timeline.stats.get(&key) {
            Some(row) if row.non_null_count() > 0 => {
                self.carried = Some((row.home.clone(), row.away.clone()));
                true
            }
            _ => false,
        };
        let (home, mut away) = self.carried.clone().unwrap_or_default();

        let mut counts = OccurrenceCounts::default();
        let record = &self.timeline.match_record;
        for occurrence in self.timeline.occurrences.get(&key).into_iter().flatten() {
            counts.bump(occurrence.kind);
            match occurrence.scoring_side(record.home_team_id, record.away_team_id) {
                Some(Side::Home) => self.home_score += 1,
                Some(Side::Away) => self.away_score += 1,
                None => {}
            }
        }

        // Storage only has the home figure; away is always derived here.
        let possession_home = home.possession;
        let possession_away = possession_home.map(|value| 100.0 - value);
        away.possession = possession_away;

        Some(DerivedTimelineRow {
            minute: key.minute,
            half: key.half,
            observed,
            home,
            away,
            possession_home,
            possession_away,
            counts,
            home_score: self.home_score,
            away_score: self.away_score,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.timeline.keys.len() - self.next;
        (left, Some(left))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StatKind;

    fn record() -> MatchRecord {
        MatchRecord {
            match_id: 1,
            home_team_id: 10,
            away_team_id: 20,
            match_date: "2025-08-16T14:00:00+00:00".to_string(),
            competition_id: None,
            season_id: None,
        }
    }

    fn stat(minute: u16, half: u8, possession: f64) -> MinuteStat {
        let mut row = MinuteStat::empty(1, minute, half);
        row.home.set(StatKind::Possession, Some(possession));
        row.settle_possession();
        row
    }

    #[test]
    fn minute_keys_cover_gaps_per_half() {
        let keys = minute_keys(
            [
                MinuteKey { half: 1, minute: 3 },
                MinuteKey { half: 1, minute: 5 },
                MinuteKey { half: 2, minute: 46 },
                MinuteKey { half: 2, minute: 48 },
            ]
            .into_iter(),
        );
        assert_eq!(keys.len(), 5 + 3);
        assert_eq!(keys[0], MinuteKey { half: 1, minute: 1 });
        assert_eq!(keys[5], MinuteKey { half: 2, minute: 46 });
    }

    #[test]
    fn gap_minutes_carry_stats_and_are_flagged() {
        let timeline = Timeline::from_parts(record(), vec![stat(2, 1, 60.0), stat(4, 1, 55.0)], vec![]);
        let rows: Vec<_> = timeline.rows().collect();
        assert_eq!(rows.len(), 4);
        assert!(!rows[0].observed);
        assert_eq!(rows[0].possession_home, None);
        assert!(rows[1].observed);
        assert!(!rows[2].observed);
        assert_eq!(rows[2].possession_home, Some(60.0));
        assert_eq!(rows[2].possession_away, Some(40.0));
        assert_eq!(rows[3].possession_away, Some(45.0));
    }

    #[test]
    fn empty_timeline_has_no_rows() {
        let timeline = Timeline::from_parts(record(), vec![], vec![]);
        assert!(timeline.is_empty());
        assert_eq!(timeline.rows().count(), 0);
        assert_eq!(timeline.row_at(10), None);
        assert_eq!(timeline.clamp_minute(10), None);
    }

    #[test]
    fn counts_serialize_every_known_kind() {
        let mut counts = OccurrenceCounts::default();
        counts.bump(OccurrenceKind::YellowCard);
        let json = serde_json::to_value(counts).unwrap();
        assert_eq!(json["yellowcard"], 1);
        assert_eq!(json["goal"], 0);
        assert_eq!(json.as_object().unwrap().len(), OccurrenceKind::KNOWN.len());
    }
}
