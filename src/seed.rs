use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::PollError;
use crate::model::Side;

const REQUIRED_KEYS: [&str; 5] = ["match_id", "league_id", "season_id", "start_time", "team_data"];
const PLACEHOLDER_NAME: &str = "TBD";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedTeam {
    pub team_id: u64,
    pub name: String,
    pub code: Option<String>,
    pub logo_url: Option<String>,
}

/// Everything needed to register a match before its first poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSeed {
    pub match_id: u64,
    pub kickoff: DateTime<Utc>,
    pub competition: Option<NamedRef>,
    pub season: Option<NamedRef>,
    pub home: SeedTeam,
    pub away: SeedTeam,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    match_id: u64,
    league_id: Option<u64>,
    season_id: Option<u64>,
    start_time: String,
    #[serde(default)]
    competition_name: Option<String>,
    #[serde(default)]
    season_name: Option<String>,
    team_data: Vec<SeedTeamFile>,
}

#[derive(Debug, Deserialize)]
struct SeedTeamFile {
    team_id: u64,
    name: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    image: Option<String>,
    location: Side,
}

/// Parses and validates a seed document.
///
/// Required keys: `match_id`, `league_id`, `season_id`, `start_time` (UTC,
/// RFC 3339) and `team_data` holding exactly one home and one away team.
pub fn parse_seed(raw: &str) -> Result<MatchSeed, PollError> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|err| PollError::Seed(format!("invalid json: {err}")))?;
    let Some(object) = value.as_object() else {
        return Err(PollError::Seed("seed must be a json object".to_string()));
    };
    let missing = REQUIRED_KEYS
        .iter()
        .filter(|key| !object.contains_key(**key))
        .copied()
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(PollError::Seed(format!(
            "missing required keys: {}",
            missing.join(", ")
        )));
    }

    let file: SeedFile =
        serde_json::from_value(value).map_err(|err| PollError::Seed(err.to_string()))?;
    validate(file)
}

fn validate(file: SeedFile) -> Result<MatchSeed, PollError> {
    let kickoff = parse_utc(&file.start_time)?;

    if file.team_data.len() != 2 {
        return Err(PollError::Seed(format!(
            "team_data must hold exactly two teams, got {}",
            file.team_data.len()
        )));
    }
    let mut home = None;
    let mut away = None;
    for team in file.team_data {
        let slot = match team.location {
            Side::Home => &mut home,
            Side::Away => &mut away,
        };
        if slot.is_some() {
            return Err(PollError::Seed(format!(
                "two teams share the {} slot",
                team.location.suffix()
            )));
        }
        let name = team.name.trim().to_string();
        if name.is_empty() {
            return Err(PollError::Seed(format!("team {} has no name", team.team_id)));
        }
        *slot = Some(SeedTeam {
            team_id: team.team_id,
            name,
            code: non_empty(team.code),
            logo_url: non_empty(team.image),
        });
    }
    let (Some(home), Some(away)) = (home, away) else {
        return Err(PollError::Seed("need one home and one away team".to_string()));
    };
    if home.team_id == away.team_id {
        return Err(PollError::Seed(format!(
            "team {} cannot play itself",
            home.team_id
        )));
    }

    Ok(MatchSeed {
        match_id: file.match_id,
        kickoff,
        competition: file.league_id.map(|id| NamedRef {
            id,
            name: non_empty(file.competition_name).unwrap_or_else(|| PLACEHOLDER_NAME.to_string()),
        }),
        season: file.season_id.map(|id| NamedRef {
            id,
            name: non_empty(file.season_name).unwrap_or_else(|| PLACEHOLDER_NAME.to_string()),
        }),
        home,
        away,
    })
}

// Offsets other than zero are rejected rather than converted.
fn parse_utc(raw: &str) -> Result<DateTime<Utc>, PollError> {
    let parsed = DateTime::parse_from_rfc3339(raw.trim())
        .map_err(|err| PollError::Seed(format!("start_time '{raw}' is not RFC 3339: {err}")))?;
    if parsed.offset().local_minus_utc() != 0 {
        return Err(PollError::Seed(format!("start_time '{raw}' is not UTC")));
    }
    Ok(parsed.with_timezone(&Utc))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
