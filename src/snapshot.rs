use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::PollError;
use crate::model::Side;

/// One fixture as returned by a single poll of the vendor API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSnapshot {
    pub id: u64,
    #[serde(default)]
    pub periods: Vec<RawPeriod>,
    #[serde(default)]
    pub statistics: Vec<RawStatistic>,
    #[serde(default)]
    pub events: Vec<RawEvent>,
    /// Present (non-null) once the vendor has a final result.
    #[serde(default)]
    pub result_info: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPeriod {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub type_id: Option<u8>,
    #[serde(default)]
    pub ticking: bool,
    /// Only key presence matters, so `"started": null` still counts.
    #[serde(default, deserialize_with = "present")]
    pub started: Option<Value>,
    #[serde(default)]
    pub minutes: Option<u16>,
}

impl RawPeriod {
    pub fn has_started(&self) -> bool {
        self.started.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawStatistic {
    pub type_id: u32,
    pub location: Side,
    #[serde(default)]
    pub minute: Option<u16>,
    #[serde(default)]
    pub data: RawStatValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStatValue {
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawEvent {
    pub id: u64,
    pub type_id: u32,
    pub participant_id: u64,
    #[serde(default)]
    pub period_id: Option<u64>,
    #[serde(default)]
    pub minute: Option<u16>,
    #[serde(default)]
    pub extra_minute: Option<u16>,
    // Player ids stay loose: the vendor sometimes sends placeholders.
    #[serde(default)]
    pub player_id: Option<Value>,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub related_player_id: Option<Value>,
    #[serde(default)]
    pub related_player_name: Option<String>,
}

/// Parses a poll payload for `match_id`.
///
/// `Ok(None)` means the vendor returned an empty live list, i.e. the match
/// is not in play yet. Missing `data`, a `data` of the wrong type or a field
/// of the wrong type is an input-shape error.
pub fn parse_snapshot(raw: &str, match_id: u64) -> Result<Option<RawSnapshot>, PollError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(PollError::InputShape("empty payload".to_string()));
    }

    let root: Value = serde_json::from_str(trimmed)?;
    let Some(data) = root.get("data") else {
        return Err(PollError::InputShape("payload missing 'data' key".to_string()));
    };

    let fixture = match data {
        Value::Object(_) => data,
        Value::Array(items) => {
            let Some(found) = items
                .iter()
                .find(|item| item.get("id").and_then(as_u64_any) == Some(match_id))
            else {
                return Ok(None);
            };
            found
        }
        other => {
            return Err(PollError::InputShape(format!(
                "'data' is of unexpected type: {}",
                json_type_name(other)
            )));
        }
    };

    let snapshot = RawSnapshot::deserialize(fixture)?;
    if snapshot.id != match_id {
        return Err(PollError::InputShape(format!(
            "payload is for match {} but {match_id} was requested",
            snapshot.id
        )));
    }
    Ok(Some(snapshot))
}

// Keeps an explicit null as `Some(Value::Null)`; a missing key stays `None`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Lenient numeric id: numbers or digit strings, anything else is absent.
pub fn as_u64_any(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    v.as_str()?.trim().parse::<u64>().ok()
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_payload_picks_the_requested_fixture() {
        let raw = r#"{"data": [{"id": 7}, {"id": 9, "result_info": "Game ended"}]}"#;
        let snap = parse_snapshot(raw, 9).unwrap().expect("fixture 9 present");
        assert_eq!(snap.id, 9);
        assert!(snap.result_info.is_some());
        assert!(parse_snapshot(raw, 11).unwrap().is_none());
        assert!(parse_snapshot(r#"{"data": []}"#, 11).unwrap().is_none());
    }

    #[test]
    fn shape_errors_are_typed() {
        for raw in [
            "",
            "null",
            r#"{"oops": 1}"#,
            r#"{"data": "bad"}"#,
            r#"{"data": {"id": 1, "periods": {}}}"#,
            r#"{"data": {"id": 2}}"#,
        ] {
            let err = parse_snapshot(raw, 1).unwrap_err();
            assert!(matches!(err, PollError::InputShape(_)), "{raw}: {err:?}");
        }
    }

    #[test]
    fn started_key_counts_even_when_null() {
        let raw = r#"{"data": {"id": 3, "periods": [
            {"id": 1, "started": null, "minutes": 45},
            {"id": 2}
        ]}}"#;
        let snap = parse_snapshot(raw, 3).unwrap().unwrap();
        assert!(snap.periods[0].has_started());
        assert!(!snap.periods[1].has_started());
    }

    #[test]
    fn lenient_ids() {
        assert_eq!(as_u64_any(&Value::from(12)), Some(12));
        assert_eq!(as_u64_any(&Value::from(" 44 ")), Some(44));
        assert_eq!(as_u64_any(&Value::from("n/a")), None);
        assert_eq!(as_u64_any(&Value::from(-3)), None);
    }
}
