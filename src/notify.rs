use serde::Serialize;

use crate::reconcile::NewOccurrence;

const UNKNOWN_PLAYER: &str = "Unknown player";

/// Payload handed to the external notifier. Delivery is at-least-once, so
/// receivers dedupe on `event_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationBatch {
    pub match_id: u64,
    pub goals: Vec<NewOccurrence>,
    pub messages: Vec<String>,
}

pub fn goal_message(goal: &NewOccurrence) -> String {
    let player = goal
        .player_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(UNKNOWN_PLAYER);
    format!(
        "GOAL! {}' {} scores for {}.",
        goal.minute, player, goal.team_id
    )
}

/// `None` when there is nothing new to announce.
pub fn batch_for(match_id: u64, goals: &[NewOccurrence]) -> Option<NotificationBatch> {
    if goals.is_empty() {
        return None;
    }
    Some(NotificationBatch {
        match_id,
        goals: goals.to_vec(),
        messages: goals.iter().map(goal_message).collect(),
    })
}
