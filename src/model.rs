use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn suffix(self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

/// Statistics we keep a column for. Anything else the vendor sends is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    Shots,
    ShotsOnTarget,
    ShotsOffTarget,
    ShotsInside,
    ShotsOutside,
    Attacks,
    DangerousAttacks,
    Corners,
    Fouls,
    Offsides,
    YellowCards,
    RedCards,
    Tackles,
    Passes,
    Saves,
    Possession,
}

impl StatKind {
    pub const ALL: [StatKind; 16] = [
        StatKind::Shots,
        StatKind::ShotsOnTarget,
        StatKind::ShotsOffTarget,
        StatKind::ShotsInside,
        StatKind::ShotsOutside,
        StatKind::Attacks,
        StatKind::DangerousAttacks,
        StatKind::Corners,
        StatKind::Fouls,
        StatKind::Offsides,
        StatKind::YellowCards,
        StatKind::RedCards,
        StatKind::Tackles,
        StatKind::Passes,
        StatKind::Saves,
        StatKind::Possession,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StatKind::Shots => "shots",
            StatKind::ShotsOnTarget => "shots_on_target",
            StatKind::ShotsOffTarget => "shots_off_target",
            StatKind::ShotsInside => "shots_inside",
            StatKind::ShotsOutside => "shots_outside",
            StatKind::Attacks => "attacks",
            StatKind::DangerousAttacks => "dangerous_attacks",
            StatKind::Corners => "corners",
            StatKind::Fouls => "fouls",
            StatKind::Offsides => "offsides",
            StatKind::YellowCards => "yellowcards",
            StatKind::RedCards => "redcards",
            StatKind::Tackles => "tackles",
            StatKind::Passes => "passes",
            StatKind::Saves => "saves",
            StatKind::Possession => "possession",
        }
    }

    /// Accepts the canonical name plus the vendor spellings seen in the wild.
    pub fn from_name(name: &str) -> Option<StatKind> {
        let kind = match name {
            "shots" | "shots_total" => StatKind::Shots,
            "shots_on_target" => StatKind::ShotsOnTarget,
            "shots_off_target" => StatKind::ShotsOffTarget,
            "shots_inside" | "shots_insidebox" => StatKind::ShotsInside,
            "shots_outside" | "shots_outsidebox" => StatKind::ShotsOutside,
            "attacks" => StatKind::Attacks,
            "dangerous_attacks" | "danger_attacks" => StatKind::DangerousAttacks,
            "corners" => StatKind::Corners,
            "fouls" => StatKind::Fouls,
            "offsides" => StatKind::Offsides,
            "yellowcards" | "yellow_cards" => StatKind::YellowCards,
            "redcards" | "red_cards" => StatKind::RedCards,
            "tackles" => StatKind::Tackles,
            "passes" => StatKind::Passes,
            "saves" => StatKind::Saves,
            "possession" | "ball_possession" => StatKind::Possession,
            _ => return None,
        };
        Some(kind)
    }
}

/// One stored column of `match_minute_stats`. Possession is only stored for
/// the home side; the away figure is always derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatColumn {
    pub kind: StatKind,
    pub side: Side,
}

impl StatColumn {
    pub fn all() -> Vec<StatColumn> {
        let mut out = Vec::with_capacity(StatKind::ALL.len() * 2);
        for kind in StatKind::ALL {
            out.push(StatColumn {
                kind,
                side: Side::Home,
            });
            if kind != StatKind::Possession {
                out.push(StatColumn {
                    kind,
                    side: Side::Away,
                });
            }
        }
        out
    }

    pub fn name(self) -> String {
        format!("{}_{}", self.kind.name(), self.side.suffix())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    pub shots: Option<f64>,
    pub shots_on_target: Option<f64>,
    pub shots_off_target: Option<f64>,
    pub shots_inside: Option<f64>,
    pub shots_outside: Option<f64>,
    pub attacks: Option<f64>,
    pub dangerous_attacks: Option<f64>,
    pub corners: Option<f64>,
    pub fouls: Option<f64>,
    pub offsides: Option<f64>,
    pub yellowcards: Option<f64>,
    pub redcards: Option<f64>,
    pub tackles: Option<f64>,
    pub passes: Option<f64>,
    pub saves: Option<f64>,
    pub possession: Option<f64>,
}

impl TeamStats {
    pub fn get(&self, kind: StatKind) -> Option<f64> {
        match kind {
            StatKind::Shots => self.shots,
            StatKind::ShotsOnTarget => self.shots_on_target,
            StatKind::ShotsOffTarget => self.shots_off_target,
            StatKind::ShotsInside => self.shots_inside,
            StatKind::ShotsOutside => self.shots_outside,
            StatKind::Attacks => self.attacks,
            StatKind::DangerousAttacks => self.dangerous_attacks,
            StatKind::Corners => self.corners,
            StatKind::Fouls => self.fouls,
            StatKind::Offsides => self.offsides,
            StatKind::YellowCards => self.yellowcards,
            StatKind::RedCards => self.redcards,
            StatKind::Tackles => self.tackles,
            StatKind::Passes => self.passes,
            StatKind::Saves => self.saves,
            StatKind::Possession => self.possession,
        }
    }

    pub fn set(&mut self, kind: StatKind, value: Option<f64>) {
        let slot = match kind {
            StatKind::Shots => &mut self.shots,
            StatKind::ShotsOnTarget => &mut self.shots_on_target,
            StatKind::ShotsOffTarget => &mut self.shots_off_target,
            StatKind::ShotsInside => &mut self.shots_inside,
            StatKind::ShotsOutside => &mut self.shots_outside,
            StatKind::Attacks => &mut self.attacks,
            StatKind::DangerousAttacks => &mut self.dangerous_attacks,
            StatKind::Corners => &mut self.corners,
            StatKind::Fouls => &mut self.fouls,
            StatKind::Offsides => &mut self.offsides,
            StatKind::YellowCards => &mut self.yellowcards,
            StatKind::RedCards => &mut self.redcards,
            StatKind::Tackles => &mut self.tackles,
            StatKind::Passes => &mut self.passes,
            StatKind::Saves => &mut self.saves,
            StatKind::Possession => &mut self.possession,
        };
        *slot = value;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MinuteKey {
    pub half: u8,
    pub minute: u16,
}

/// Wide per-minute row keyed by (match, minute, half).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinuteStat {
    pub match_id: u64,
    pub minute: u16,
    pub half: u8,
    pub home: TeamStats,
    pub away: TeamStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinuteStatChoice {
    KeepExisting,
    TakeIncoming,
}

impl MinuteStat {
    pub fn empty(match_id: u64, minute: u16, half: u8) -> Self {
        Self {
            match_id,
            minute,
            half,
            home: TeamStats::default(),
            away: TeamStats::default(),
        }
    }

    pub fn key(&self) -> MinuteKey {
        MinuteKey {
            half: self.half,
            minute: self.minute,
        }
    }

    pub fn side(&self, side: Side) -> &TeamStats {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut TeamStats {
        match side {
            Side::Home => &mut self.home,
            Side::Away => &mut self.away,
        }
    }

    pub fn get(&self, column: StatColumn) -> Option<f64> {
        self.side(column.side).get(column.kind)
    }

    pub fn possession_home(&self) -> Option<f64> {
        self.home.possession
    }

    pub fn possession_away(&self) -> Option<f64> {
        self.home.possession.map(|home| 100.0 - home)
    }

    /// Re-derives possession so `away == 100 - home`. A lone away figure is
    /// turned into the home figure first.
    pub fn settle_possession(&mut self) {
        if self.home.possession.is_none()
            && let Some(away) = self.away.possession
        {
            self.home.possession = Some(100.0 - away);
        }
        self.away.possession = self.possession_away();
    }

    /// Number of stored columns carrying a value.
    pub fn non_null_count(&self) -> usize {
        StatColumn::all()
            .into_iter()
            .filter(|column| self.get(*column).is_some())
            .count()
    }

    pub fn has_any_stat(&self) -> bool {
        self.non_null_count() > 0
    }

    /// Conflict policy for two rows with the same key: the row with more
    /// non-null columns wins, ties keep what is already stored.
    pub fn prefer_complete(existing: &MinuteStat, incoming: &MinuteStat) -> MinuteStatChoice {
        if incoming.non_null_count() > existing.non_null_count() {
            MinuteStatChoice::TakeIncoming
        } else {
            MinuteStatChoice::KeepExisting
        }
    }
}

/// Serialized through [`OccurrenceKind::name`], the spelling stored in
/// `event_type.type_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OccurrenceKind {
    Goal,
    OwnGoal,
    Penalty,
    MissedPenalty,
    Substitution,
    YellowCard,
    RedCard,
    YellowRedCard,
    Var,
    Unknown,
}

impl Serialize for OccurrenceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for OccurrenceKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(OccurrenceKind::from_name(&name))
    }
}

impl OccurrenceKind {
    pub const KNOWN: [OccurrenceKind; 9] = [
        OccurrenceKind::Goal,
        OccurrenceKind::OwnGoal,
        OccurrenceKind::Penalty,
        OccurrenceKind::MissedPenalty,
        OccurrenceKind::Substitution,
        OccurrenceKind::YellowCard,
        OccurrenceKind::RedCard,
        OccurrenceKind::YellowRedCard,
        OccurrenceKind::Var,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OccurrenceKind::Goal => "goal",
            OccurrenceKind::OwnGoal => "owngoal",
            OccurrenceKind::Penalty => "penalty",
            OccurrenceKind::MissedPenalty => "missed_penalty",
            OccurrenceKind::Substitution => "substitution",
            OccurrenceKind::YellowCard => "yellowcard",
            OccurrenceKind::RedCard => "redcard",
            OccurrenceKind::YellowRedCard => "yellowredcard",
            OccurrenceKind::Var => "var",
            OccurrenceKind::Unknown => "unknown",
        }
    }

    pub fn from_name(name: &str) -> OccurrenceKind {
        match name {
            "goal" => OccurrenceKind::Goal,
            "owngoal" | "own_goal" => OccurrenceKind::OwnGoal,
            "penalty" => OccurrenceKind::Penalty,
            "missed_penalty" | "penalty_missed" => OccurrenceKind::MissedPenalty,
            "substitution" => OccurrenceKind::Substitution,
            "yellowcard" | "yellow_card" => OccurrenceKind::YellowCard,
            "redcard" | "red_card" => OccurrenceKind::RedCard,
            "yellowredcard" | "yellow_red_card" => OccurrenceKind::YellowRedCard,
            "var" => OccurrenceKind::Var,
            _ => OccurrenceKind::Unknown,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OccurrenceKind::Goal => "Goal",
            OccurrenceKind::OwnGoal => "Own goal",
            OccurrenceKind::Penalty => "Penalty goal",
            OccurrenceKind::MissedPenalty => "Missed penalty",
            OccurrenceKind::Substitution => "Substitution",
            OccurrenceKind::YellowCard => "Yellow card",
            OccurrenceKind::RedCard => "Red card",
            OccurrenceKind::YellowRedCard => "Second yellow",
            OccurrenceKind::Var => "VAR review",
            OccurrenceKind::Unknown => "Unknown",
        }
    }

    /// Occurrences that change the score and trigger a notification.
    pub fn is_goal(self) -> bool {
        matches!(
            self,
            OccurrenceKind::Goal | OccurrenceKind::OwnGoal | OccurrenceKind::Penalty
        )
    }

    /// Position inside `KNOWN`, used to index per-kind counters.
    pub fn known_index(self) -> Option<usize> {
        Self::KNOWN.iter().position(|k| *k == self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PlayerRef {
    pub id: u64,
    pub name: Option<String>,
}

/// A discrete happening with a vendor id that is stable across polls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Occurrence {
    pub event_id: u64,
    pub match_id: u64,
    pub kind: OccurrenceKind,
    pub vendor_type_id: u32,
    pub team_id: u64,
    pub minute: u16,
    pub extra_minute: Option<u16>,
    pub half: u8,
    pub player: Option<PlayerRef>,
    pub related: Option<PlayerRef>,
}

impl Occurrence {
    pub fn key(&self) -> MinuteKey {
        MinuteKey {
            half: self.half,
            minute: self.minute,
        }
    }

    pub fn player_name(&self) -> Option<&str> {
        self.player.as_ref().and_then(|p| p.name.as_deref())
    }

    /// Side credited on the scoreboard, `None` for non-goals or a team that
    /// plays in neither slot. Own goals count for the opponent.
    pub fn scoring_side(&self, home_team_id: u64, away_team_id: u64) -> Option<Side> {
        if !self.kind.is_goal() {
            return None;
        }
        let side = if self.team_id == home_team_id {
            Side::Home
        } else if self.team_id == away_team_id {
            Side::Away
        } else {
            return None;
        };
        if self.kind == OccurrenceKind::OwnGoal {
            Some(side.opposite())
        } else {
            Some(side)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[(StatKind, Side, f64)]) -> MinuteStat {
        let mut out = MinuteStat::empty(1, 10, 1);
        for (kind, side, value) in values {
            out.side_mut(*side).set(*kind, Some(*value));
        }
        out
    }

    #[test]
    fn stat_columns_store_possession_once() {
        let cols = StatColumn::all();
        assert_eq!(cols.len(), StatKind::ALL.len() * 2 - 1);
        assert!(cols.iter().any(|c| c.name() == "possession_home"));
        assert!(!cols.iter().any(|c| c.name() == "possession_away"));
        assert!(cols.iter().any(|c| c.name() == "dangerous_attacks_away"));
    }

    #[test]
    fn settle_possession_derives_missing_side() {
        let mut only_away = row(&[(StatKind::Possession, Side::Away, 38.0)]);
        only_away.settle_possession();
        assert_eq!(only_away.possession_home(), Some(62.0));
        assert_eq!(only_away.away.possession, Some(38.0));

        let mut conflicting = row(&[
            (StatKind::Possession, Side::Home, 55.0),
            (StatKind::Possession, Side::Away, 50.0),
        ]);
        conflicting.settle_possession();
        assert_eq!(conflicting.away.possession, Some(45.0));
    }

    #[test]
    fn prefer_complete_takes_richer_row_and_keeps_existing_on_tie() {
        let sparse = row(&[(StatKind::Shots, Side::Home, 3.0)]);
        let rich = row(&[
            (StatKind::Shots, Side::Home, 3.0),
            (StatKind::Attacks, Side::Away, 20.0),
        ]);
        let other_sparse = row(&[(StatKind::Corners, Side::Away, 1.0)]);

        assert_eq!(
            MinuteStat::prefer_complete(&sparse, &rich),
            MinuteStatChoice::TakeIncoming
        );
        assert_eq!(
            MinuteStat::prefer_complete(&rich, &sparse),
            MinuteStatChoice::KeepExisting
        );
        assert_eq!(
            MinuteStat::prefer_complete(&sparse, &other_sparse),
            MinuteStatChoice::KeepExisting
        );
    }

    #[test]
    fn own_goal_is_credited_to_the_opponent() {
        let mut occ = Occurrence {
            event_id: 1,
            match_id: 1,
            kind: OccurrenceKind::OwnGoal,
            vendor_type_id: 15,
            team_id: 10,
            minute: 30,
            extra_minute: None,
            half: 1,
            player: None,
            related: None,
        };
        assert_eq!(occ.scoring_side(10, 20), Some(Side::Away));
        occ.kind = OccurrenceKind::Goal;
        assert_eq!(occ.scoring_side(10, 20), Some(Side::Home));
        occ.kind = OccurrenceKind::YellowCard;
        assert_eq!(occ.scoring_side(10, 20), None);
    }

    #[test]
    fn stat_aliases_resolve() {
        assert_eq!(StatKind::from_name("ball_possession"), Some(StatKind::Possession));
        assert_eq!(StatKind::from_name("shots_total"), Some(StatKind::Shots));
        assert_eq!(StatKind::from_name("throwins"), None);
        assert_eq!(OccurrenceKind::from_name("own_goal"), OccurrenceKind::OwnGoal);
        assert_eq!(OccurrenceKind::from_name("corner"), OccurrenceKind::Unknown);
    }

    #[test]
    fn occurrence_kind_json_uses_the_stored_spelling() {
        for kind in OccurrenceKind::KNOWN {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
            let back: OccurrenceKind = serde_json::from_str(&json).unwrap();
            assert_eq!(back, kind);
        }
        assert_eq!(serde_json::to_string(&OccurrenceKind::OwnGoal).unwrap(), "\"owngoal\"");
    }
}
