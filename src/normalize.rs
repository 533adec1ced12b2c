use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::catalog::{TypeCatalog, UNKNOWN};
use crate::error::PollError;
use crate::model::{MinuteKey, MinuteStat, Occurrence, OccurrenceKind, PlayerRef, StatKind};
use crate::snapshot::{RawEvent, RawPeriod, RawSnapshot, as_u64_any, parse_snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActivePeriod {
    pub period_id: Option<u64>,
    pub half: u8,
    pub minute: u16,
    pub ticking: bool,
}

impl ActivePeriod {
    pub fn key(&self) -> MinuteKey {
        MinuteKey {
            half: self.half,
            minute: self.minute,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameFlags {
    pub half_live: bool,
    pub game_over: bool,
}

/// Problems that cost data but do not abort the poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataQualityWarning {
    UnmappedStatistic { type_id: u32 },
    UnmappedEvent { event_id: u64, type_id: u32 },
    MalformedPlayerId { event_id: u64, raw: String },
}

#[derive(Debug, Clone)]
pub struct NormalizedSnapshot {
    pub match_id: u64,
    pub period: ActivePeriod,
    pub flags: GameFlags,
    /// Ordered by (half, minute). Always holds the row for `period`.
    pub minute_stats: Vec<MinuteStat>,
    pub occurrences: Vec<Occurrence>,
    pub warnings: Vec<DataQualityWarning>,
}

impl NormalizedSnapshot {
    pub fn current_minute_stat(&self) -> Option<&MinuteStat> {
        let key = self.period.key();
        self.minute_stats
            .iter()
            .find(|row| row.key() == key)
            .or_else(|| self.minute_stats.last())
    }
}

#[derive(Debug, Clone)]
pub enum Normalized {
    /// Pre-kickoff snapshot. Callers skip the write.
    NotStarted { match_id: u64 },
    Ready(NormalizedSnapshot),
}

pub fn normalize_json(
    raw: &str,
    match_id: u64,
    catalog: &TypeCatalog,
) -> Result<Normalized, PollError> {
    match parse_snapshot(raw, match_id)? {
        Some(snapshot) => Ok(normalize(&snapshot, catalog)),
        None => Ok(Normalized::NotStarted { match_id }),
    }
}

pub fn normalize(snapshot: &RawSnapshot, catalog: &TypeCatalog) -> Normalized {
    let Some(period) = active_period(&snapshot.periods) else {
        debug!(match_id = snapshot.id, "no periods yet, match not started");
        return Normalized::NotStarted {
            match_id: snapshot.id,
        };
    };

    let mut warnings = Vec::new();
    let minute_stats = pivot_statistics(snapshot, period, catalog, &mut warnings);
    let occurrences = project_events(snapshot, period, catalog, &mut warnings);

    Normalized::Ready(NormalizedSnapshot {
        match_id: snapshot.id,
        period,
        flags: GameFlags {
            half_live: period.ticking,
            game_over: snapshot.result_info.is_some(),
        },
        minute_stats,
        occurrences,
        warnings,
    })
}

/// Picks the period in progress: the ticking one, else the last one with a
/// start marker, else the last in the list.
pub fn resolve_active_period(periods: &[RawPeriod]) -> Option<usize> {
    if let Some(idx) = periods.iter().position(|p| p.ticking) {
        return Some(idx);
    }
    if let Some(idx) = periods.iter().rposition(|p| p.has_started()) {
        return Some(idx);
    }
    periods.len().checked_sub(1)
}

pub fn active_period(periods: &[RawPeriod]) -> Option<ActivePeriod> {
    let idx = resolve_active_period(periods)?;
    let period = &periods[idx];
    Some(ActivePeriod {
        period_id: period.id,
        half: half_of(period, idx),
        minute: period.minutes.unwrap_or(0),
        ticking: period.ticking,
    })
}

// The vendor numbers halves through `type_id`; position is the fallback.
fn half_of(period: &RawPeriod, idx: usize) -> u8 {
    period
        .type_id
        .unwrap_or_else(|| u8::try_from(idx + 1).unwrap_or(u8::MAX))
}

fn pivot_statistics(
    snapshot: &RawSnapshot,
    period: ActivePeriod,
    catalog: &TypeCatalog,
    warnings: &mut Vec<DataQualityWarning>,
) -> Vec<MinuteStat> {
    let mut rows: BTreeMap<MinuteKey, MinuteStat> = BTreeMap::new();
    rows.insert(
        period.key(),
        MinuteStat::empty(snapshot.id, period.minute, period.half),
    );

    let mut unmapped = HashSet::new();
    for stat in &snapshot.statistics {
        let name = catalog.statistic_name(stat.type_id);
        if name == UNKNOWN {
            if unmapped.insert(stat.type_id) {
                warn!(
                    match_id = snapshot.id,
                    type_id = stat.type_id,
                    "unmapped statistic type dropped"
                );
                warnings.push(DataQualityWarning::UnmappedStatistic {
                    type_id: stat.type_id,
                });
            }
            continue;
        }
        let Some(kind) = StatKind::from_name(name) else {
            debug!(statistic = name, "untracked statistic ignored");
            continue;
        };
        let Some(value) = stat.data.value else {
            continue;
        };

        let minute = stat.minute.unwrap_or(period.minute);
        let key = MinuteKey {
            half: period.half,
            minute,
        };
        rows.entry(key)
            .or_insert_with(|| MinuteStat::empty(snapshot.id, minute, period.half))
            .side_mut(stat.location)
            .set(kind, Some(value));
    }

    rows.into_values()
        .map(|mut row| {
            row.settle_possession();
            row
        })
        .collect()
}

fn project_events(
    snapshot: &RawSnapshot,
    period: ActivePeriod,
    catalog: &TypeCatalog,
    warnings: &mut Vec<DataQualityWarning>,
) -> Vec<Occurrence> {
    let mut out = Vec::with_capacity(snapshot.events.len());
    for event in &snapshot.events {
        let kind = OccurrenceKind::from_name(catalog.event_name(event.type_id));
        if kind == OccurrenceKind::Unknown {
            warn!(
                match_id = snapshot.id,
                event_id = event.id,
                type_id = event.type_id,
                "unmapped event type, occurrence excluded from this poll"
            );
            warnings.push(DataQualityWarning::UnmappedEvent {
                event_id: event.id,
                type_id: event.type_id,
            });
            continue;
        }

        let minute = event.minute.unwrap_or(period.minute);
        out.push(Occurrence {
            event_id: event.id,
            match_id: snapshot.id,
            kind,
            vendor_type_id: event.type_id,
            team_id: event.participant_id,
            minute,
            extra_minute: event.extra_minute,
            half: event_half(event, &snapshot.periods)
                .or_else(|| half_for_minute(minute, &snapshot.periods))
                .unwrap_or(period.half),
            player: player_ref(
                event,
                event.player_id.as_ref(),
                event.player_name.as_deref(),
                warnings,
            ),
            related: player_ref(
                event,
                event.related_player_id.as_ref(),
                event.related_player_name.as_deref(),
                warnings,
            ),
        });
    }
    out
}

fn event_half(event: &RawEvent, periods: &[RawPeriod]) -> Option<u8> {
    let period_id = event.period_id?;
    let idx = periods.iter().position(|p| p.id == Some(period_id))?;
    Some(half_of(&periods[idx], idx))
}

/// Half of the first period whose last minute reaches `minute`.
fn half_for_minute(minute: u16, periods: &[RawPeriod]) -> Option<u8> {
    periods
        .iter()
        .enumerate()
        .find(|(_, p)| p.minutes.is_some_and(|end| end >= minute))
        .map(|(idx, p)| half_of(p, idx))
}

/// Placeholder ids ("n/a", 0, nested junk) mean "no player", never an error.
fn player_ref(
    event: &RawEvent,
    id: Option<&Value>,
    name: Option<&str>,
    warnings: &mut Vec<DataQualityWarning>,
) -> Option<PlayerRef> {
    let raw = id.filter(|v| !v.is_null())?;
    let Some(id) = as_u64_any(raw).filter(|id| *id != 0) else {
        debug!(event_id = event.id, raw = %raw, "malformed player id treated as absent");
        warnings.push(DataQualityWarning::MalformedPlayerId {
            event_id: event.id,
            raw: raw.to_string(),
        });
        return None;
    };
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);
    Some(PlayerRef { id, name })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(id: u64, ticking: bool, started: Option<i64>, minutes: Option<u16>) -> RawPeriod {
        RawPeriod {
            id: Some(id),
            type_id: None,
            ticking,
            started: started.map(Value::from),
            minutes,
        }
    }

    #[test]
    fn ticking_period_wins() {
        let periods = vec![
            period(1, false, Some(150), Some(45)),
            period(2, true, Some(300), Some(50)),
        ];
        let active = active_period(&periods).unwrap();
        assert_eq!(active.period_id, Some(2));
        assert_eq!(active.minute, 50);
        assert_eq!(active.half, 2);
        assert!(active.ticking);
    }

    #[test]
    fn last_started_period_when_nothing_ticks() {
        let periods = vec![
            period(1, false, Some(150), Some(45)),
            period(2, false, Some(300), Some(90)),
            period(3, false, None, None),
        ];
        assert_eq!(resolve_active_period(&periods), Some(1));
    }

    #[test]
    fn last_in_list_without_start_markers() {
        let periods = vec![period(1, false, None, None), period(2, false, None, None)];
        let active = active_period(&periods).unwrap();
        assert_eq!(active.period_id, Some(2));
        assert!(!active.ticking);
        assert_eq!(resolve_active_period(&[]), None);
    }

    #[test]
    fn events_without_period_id_are_placed_by_minute() {
        let periods = vec![
            period(1, false, Some(150), Some(45)),
            period(2, true, Some(300), Some(50)),
        ];
        assert_eq!(half_for_minute(12, &periods), Some(1));
        assert_eq!(half_for_minute(45, &periods), Some(1));
        assert_eq!(half_for_minute(48, &periods), Some(2));
        assert_eq!(half_for_minute(51, &periods), None);
    }

    #[test]
    fn type_id_overrides_position_for_half() {
        let mut periods = vec![period(11, true, Some(1), Some(12))];
        periods[0].type_id = Some(1);
        assert_eq!(active_period(&periods).unwrap().half, 1);
    }
}
