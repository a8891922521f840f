use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Alliance, AllianceState, MatchId, TeamId};
use crate::config::RulesConfig;
use crate::error::ScoringError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    InProgress,
    Completed,
    Finalized,
    Stopped,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 5] = [
        MatchStatus::Scheduled,
        MatchStatus::InProgress,
        MatchStatus::Completed,
        MatchStatus::Finalized,
        MatchStatus::Stopped,
    ];

    /// Lifecycle edges: scheduled -> in_progress -> {completed, stopped},
    /// completed -> finalized.
    pub fn can_transition_to(self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (MatchStatus::Scheduled, MatchStatus::InProgress)
                | (MatchStatus::InProgress, MatchStatus::Completed)
                | (MatchStatus::InProgress, MatchStatus::Stopped)
                | (MatchStatus::Completed, MatchStatus::Finalized)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Finalized | MatchStatus::Stopped)
    }

    /// Whether the score book may still be changed (live play or review).
    pub fn accepts_score_changes(self) -> bool {
        matches!(self, MatchStatus::InProgress | MatchStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::InProgress => "in_progress",
            MatchStatus::Completed => "completed",
            MatchStatus::Finalized => "finalized",
            MatchStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        MatchStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == needle)
            .ok_or_else(|| ScoringError::validation(format!("unknown match status '{needle}'")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Qualification,
    Playoff,
    Final,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::Qualification => "qualification",
            MatchType::Playoff => "playoff",
            MatchType::Final => "final",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qualification" | "qual" => Ok(MatchType::Qualification),
            "playoff" => Ok(MatchType::Playoff),
            "final" => Ok(MatchType::Final),
            other => Err(ScoringError::validation(format!("unknown match type '{other}'"))),
        }
    }
}

/// Schedule entry for a match: number, type and up to two teams per alliance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct MatchSetup {
    #[validate(range(min = 1))]
    pub match_number: u32,
    pub match_type: MatchType,
    pub red_teams: [Option<TeamId>; 2],
    pub blue_teams: [Option<TeamId>; 2],
}

impl MatchSetup {
    pub fn assigned_teams(&self) -> impl Iterator<Item = TeamId> + '_ {
        self.red_teams.iter().chain(self.blue_teams.iter()).flatten().copied()
    }
}

/// RP contribution of a match that is currently counted in the rankings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardedRp {
    pub red: u32,
    pub blue: u32,
}

impl AwardedRp {
    pub fn get(&self, alliance: Alliance) -> u32 {
        match alliance {
            Alliance::Red => self.red,
            Alliance::Blue => self.blue,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub match_number: u32,
    pub match_type: MatchType,
    pub red_teams: [Option<TeamId>; 2],
    pub blue_teams: [Option<TeamId>; 2],
    pub red: AllianceState,
    pub blue: AllianceState,
    pub status: MatchStatus,
    pub time_remaining: u32,
    pub is_endgame: bool,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// What this match currently contributes to team rankings
    #[serde(default)]
    pub awarded_rp: Option<AwardedRp>,
}

impl MatchRecord {
    pub fn new(id: MatchId, setup: &MatchSetup, rules: &RulesConfig) -> Self {
        Self {
            id,
            match_number: setup.match_number,
            match_type: setup.match_type,
            red_teams: setup.red_teams,
            blue_teams: setup.blue_teams,
            red: AllianceState::new(rules.bonus_duration_secs),
            blue: AllianceState::new(rules.bonus_duration_secs),
            status: MatchStatus::Scheduled,
            time_remaining: rules.match_duration_secs,
            is_endgame: false,
            start_time: None,
            end_time: None,
            awarded_rp: None,
        }
    }

    pub fn alliance(&self, alliance: Alliance) -> &AllianceState {
        match alliance {
            Alliance::Red => &self.red,
            Alliance::Blue => &self.blue,
        }
    }

    pub fn alliance_mut(&mut self, alliance: Alliance) -> &mut AllianceState {
        match alliance {
            Alliance::Red => &mut self.red,
            Alliance::Blue => &mut self.blue,
        }
    }

    pub fn teams(&self, alliance: Alliance) -> [Option<TeamId>; 2] {
        match alliance {
            Alliance::Red => self.red_teams,
            Alliance::Blue => self.blue_teams,
        }
    }

    pub fn is_fully_assigned(&self) -> bool {
        self.red_teams.iter().chain(self.blue_teams.iter()).all(Option::is_some)
    }

    pub fn has_team(&self, team_id: TeamId) -> bool {
        self.red_teams.iter().chain(self.blue_teams.iter()).any(|slot| *slot == Some(team_id))
    }

    pub fn apply_setup(&mut self, setup: &MatchSetup) {
        self.match_number = setup.match_number;
        self.match_type = setup.match_type;
        self.red_teams = setup.red_teams;
        self.blue_teams = setup.blue_teams;
    }

    /// Timers and live flags back to their pre-match values.
    pub fn reset_clock(&mut self, rules: &RulesConfig) {
        self.time_remaining = rules.match_duration_secs;
        self.is_endgame = false;
        for alliance in Alliance::ALL {
            let state = self.alliance_mut(alliance);
            state.bonus_active = false;
            state.bonus_time_remaining = rules.bonus_duration_secs;
        }
    }

    /// Every timer to zero, as after an emergency stop.
    pub fn zero_clock(&mut self) {
        self.time_remaining = 0;
        for alliance in Alliance::ALL {
            let state = self.alliance_mut(alliance);
            state.bonus_active = false;
            state.bonus_time_remaining = 0;
        }
    }

    pub fn transition_to(&mut self, next: MatchStatus) -> Result<(), ScoringError> {
        if !self.status.can_transition_to(next) {
            return Err(ScoringError::InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_setup() -> MatchSetup {
        MatchSetup {
            match_number: 1,
            match_type: MatchType::Qualification,
            red_teams: [Some(1), Some(2)],
            blue_teams: [Some(3), Some(4)],
        }
    }

    #[test]
    fn test_new_match_uses_rules() {
        let rules = RulesConfig::default();
        let record = MatchRecord::new(7, &full_setup(), &rules);
        assert_eq!(record.status, MatchStatus::Scheduled);
        assert_eq!(record.time_remaining, 135);
        assert_eq!(record.red.bonus_time_remaining, 15);
        assert!(!record.is_endgame);
        assert!(record.is_fully_assigned());
    }

    #[test]
    fn test_partial_assignment() {
        let mut setup = full_setup();
        setup.blue_teams[1] = None;
        let record = MatchRecord::new(1, &setup, &RulesConfig::default());
        assert!(!record.is_fully_assigned());
        assert!(record.has_team(3));
        assert!(!record.has_team(4));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for from in [MatchStatus::Finalized, MatchStatus::Stopped] {
            assert!(from.is_terminal());
            for to in MatchStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} should be rejected");
            }
        }
    }

    #[test]
    fn test_lifecycle_edges() {
        use MatchStatus::*;
        assert!(Scheduled.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Stopped));
        assert!(Completed.can_transition_to(Finalized));
        assert!(!Completed.can_transition_to(Stopped));
        assert!(!Scheduled.can_transition_to(Completed));
        assert!(!Scheduled.can_transition_to(Stopped));
        assert!(!InProgress.can_transition_to(Finalized));
    }

    #[test]
    fn test_transition_error() {
        let mut record = MatchRecord::new(1, &full_setup(), &RulesConfig::default());
        let err = record.transition_to(MatchStatus::Finalized).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::InvalidTransition { from: MatchStatus::Scheduled, to: MatchStatus::Finalized }
        ));
        assert_eq!(record.status, MatchStatus::Scheduled);
    }

    #[test]
    fn test_setup_validation() {
        let setup = MatchSetup { match_number: 0, ..full_setup() };
        assert!(setup.validate().is_err());
        assert!(full_setup().validate().is_ok());
    }

    #[test]
    fn test_parse_status_and_type() {
        assert_eq!("in_progress".parse::<MatchStatus>().unwrap(), MatchStatus::InProgress);
        assert_eq!("Playoff".parse::<MatchType>().unwrap(), MatchType::Playoff);
        assert!("running".parse::<MatchStatus>().is_err());
    }
}
