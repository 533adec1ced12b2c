use std::collections::VecDeque;

use serde::Serialize;

use crate::model::{StatKind, TeamStats};
use crate::timeline::DerivedTimelineRow;

pub const DEFAULT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumWeights {
    pub attacks: f64,
    pub dangerous_attacks: f64,
    pub shots: f64,
}

impl Default for MomentumWeights {
    fn default() -> Self {
        Self {
            attacks: 1.0,
            dangerous_attacks: 3.0,
            shots: 2.0,
        }
    }
}

impl MomentumWeights {
    fn terms(&self) -> [(StatKind, f64); 3] {
        [
            (StatKind::Attacks, self.attacks),
            (StatKind::DangerousAttacks, self.dangerous_attacks),
            (StatKind::Shots, self.shots),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumConfig {
    /// Trailing window length in rows; zero is treated as one.
    pub window: usize,
    pub weights: MomentumWeights,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            weights: MomentumWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MomentumSample {
    pub minute: u16,
    pub half: u8,
    pub home_activity: f64,
    pub away_activity: f64,
    /// Positive favours home, negative favours away. Unbounded.
    pub momentum: f64,
}

/// One sample per timeline row.
///
/// Each pressure stat contributes its minute-over-minute delta times its
/// weight; a side's activity is the sum of those contributions over the
/// trailing window. The first row, and any row where either reading is
/// missing, contributes a zero delta.
pub fn estimate(rows: &[DerivedTimelineRow], config: &MomentumConfig) -> Vec<MomentumSample> {
    let window = config.window.max(1);
    let terms = config.weights.terms();

    let mut out = Vec::with_capacity(rows.len());
    let mut recent: VecDeque<(f64, f64)> = VecDeque::with_capacity(window);
    let mut sums = (0.0_f64, 0.0_f64);
    let mut previous: Option<&DerivedTimelineRow> = None;

    for row in rows {
        let delta = match previous {
            Some(prev) => (
                weighted_delta(&prev.home, &row.home, &terms),
                weighted_delta(&prev.away, &row.away, &terms),
            ),
            None => (0.0, 0.0),
        };
        previous = Some(row);

        recent.push_back(delta);
        sums.0 += delta.0;
        sums.1 += delta.1;
        if recent.len() > window
            && let Some(old) = recent.pop_front()
        {
            sums.0 -= old.0;
            sums.1 -= old.1;
        }

        out.push(MomentumSample {
            minute: row.minute,
            half: row.half,
            home_activity: sums.0,
            away_activity: sums.1,
            momentum: sums.0 - sums.1,
        });
    }
    out
}

fn weighted_delta(prev: &TeamStats, current: &TeamStats, terms: &[(StatKind, f64)]) -> f64 {
    terms
        .iter()
        .map(|(kind, weight)| match (prev.get(*kind), current.get(*kind)) {
            (Some(before), Some(after)) => (after - before) * weight,
            _ => 0.0,
        })
        .sum()
}
