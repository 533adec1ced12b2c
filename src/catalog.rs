use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::PollError;

pub const UNKNOWN: &str = "unknown";

// Vendor statistic type ids. Some are mapped even though no column exists
// for them so they are recognised and ignored instead of reported as unmapped.
const BUILTIN_STATISTICS: &[(u32, &str)] = &[
    (34, "corners"),
    (41, "shots_off_target"),
    (42, "shots_total"),
    (43, "attacks"),
    (44, "dangerous_attacks"),
    (45, "ball_possession"),
    (49, "shots_insidebox"),
    (50, "shots_outsidebox"),
    (51, "offsides"),
    (52, "goals"),
    (53, "goal_kicks"),
    (55, "free_kicks"),
    (56, "fouls"),
    (57, "saves"),
    (58, "shots_blocked"),
    (60, "throwins"),
    (78, "tackles"),
    (80, "passes"),
    (81, "successful_passes"),
    (82, "successful_passes_percentage"),
    (83, "redcards"),
    (84, "yellowcards"),
    (86, "shots_on_target"),
    (98, "total_crosses"),
    (99, "accurate_crosses"),
    (100, "interceptions"),
    (106, "duels_won"),
    (108, "dribbled_attempts"),
    (109, "successful_dribbles"),
    (122, "long_passes"),
];

const BUILTIN_EVENTS: &[(u32, &str)] = &[
    (10, "var"),
    (14, "goal"),
    (15, "owngoal"),
    (16, "penalty"),
    (17, "missed_penalty"),
    (18, "substitution"),
    (19, "yellowcard"),
    (20, "redcard"),
    (21, "yellowredcard"),
];

/// Static mapping from vendor type ids to canonical lowercase names.
/// Built once per run and passed by reference; never refreshed mid-run.
#[derive(Debug, Clone)]
pub struct TypeCatalog {
    statistics: HashMap<u32, String>,
    events: HashMap<u32, String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    statistics: HashMap<String, String>,
    #[serde(default)]
    events: HashMap<String, String>,
}

impl TypeCatalog {
    pub fn builtin() -> Self {
        Self {
            statistics: BUILTIN_STATISTICS
                .iter()
                .map(|(id, name)| (*id, (*name).to_string()))
                .collect(),
            events: BUILTIN_EVENTS
                .iter()
                .map(|(id, name)| (*id, (*name).to_string()))
                .collect(),
        }
    }

    /// Builtin table with `path` layered on top, or just the builtin table.
    pub fn load(path: Option<&Path>) -> Result<Self, PollError> {
        let Some(path) = path else {
            return Ok(Self::builtin());
        };
        let raw = fs::read_to_string(path)
            .map_err(|err| PollError::Catalog(format!("read {}: {err}", path.display())))?;
        let catalog = Self::builtin().with_overrides_json(&raw)?;
        info!(
            path = %path.display(),
            statistics = catalog.statistics.len(),
            events = catalog.events.len(),
            "loaded type catalog"
        );
        Ok(catalog)
    }

    /// Override file shape: `{"statistics": {"42": "Shots Total"}, "events": {"14": "Goal"}}`.
    pub fn with_overrides_json(mut self, raw: &str) -> Result<Self, PollError> {
        let file: CatalogFile = serde_json::from_str(raw.trim())
            .map_err(|err| PollError::Catalog(format!("invalid catalog json: {err}")))?;
        merge_entries(&mut self.statistics, file.statistics)?;
        merge_entries(&mut self.events, file.events)?;
        Ok(self)
    }

    pub fn statistic_name(&self, type_id: u32) -> &str {
        self.statistics
            .get(&type_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN)
    }

    pub fn event_name(&self, type_id: u32) -> &str {
        self.events
            .get(&type_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN)
    }
}

fn merge_entries(
    target: &mut HashMap<u32, String>,
    entries: HashMap<String, String>,
) -> Result<(), PollError> {
    for (raw_id, name) in entries {
        let id = raw_id
            .trim()
            .parse::<u32>()
            .map_err(|_| PollError::Catalog(format!("type id '{raw_id}' is not numeric")))?;
        let name = canonical_name(&name);
        if name.is_empty() {
            return Err(PollError::Catalog(format!("type id {id} has an empty name")));
        }
        target.insert(id, name);
    }
    Ok(())
}

/// `"Shots Total"` -> `"shots_total"`.
pub fn canonical_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|ch: char| ch.is_whitespace() || ch == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ids_resolve_to_unknown() {
        let catalog = TypeCatalog::builtin();
        assert_eq!(catalog.statistic_name(45), "ball_possession");
        assert_eq!(catalog.event_name(14), "goal");
        assert_eq!(catalog.statistic_name(9999), UNKNOWN);
        assert_eq!(catalog.event_name(9999), UNKNOWN);
    }

    #[test]
    fn overrides_are_canonicalised() {
        let catalog = TypeCatalog::builtin()
            .with_overrides_json(r#"{"statistics": {"500": "Big Chances - Created"}, "events": {"14": "Own Goal"}}"#)
            .expect("override should parse");
        assert_eq!(catalog.statistic_name(500), "big_chances_created");
        assert_eq!(catalog.event_name(14), "own_goal");
        assert_eq!(catalog.event_name(18), "substitution");
    }

    #[test]
    fn non_numeric_override_id_is_rejected() {
        let err = TypeCatalog::builtin()
            .with_overrides_json(r#"{"events": {"abc": "goal"}}"#)
            .unwrap_err();
        assert!(matches!(err, PollError::Catalog(_)));
    }
}
