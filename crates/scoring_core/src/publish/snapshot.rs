use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::{Alliance, AllianceCounters, AllianceState, MatchId, MatchRecord, MatchStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AllianceScore {
    pub score: u32,
    pub counters: AllianceCounters,
    pub teleop_rp: bool,
    pub climb_rp: bool,
    pub win_rp: bool,
}

impl From<&AllianceState> for AllianceScore {
    fn from(state: &AllianceState) -> Self {
        Self {
            score: state.score,
            counters: state.counters,
            teleop_rp: state.teleop_rp,
            climb_rp: state.climb_rp,
            win_rp: state.win_rp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScoreSnapshot {
    pub match_id: MatchId,
    pub red: AllianceScore,
    pub blue: AllianceScore,
}

impl ScoreSnapshot {
    pub fn of(record: &MatchRecord) -> Self {
        Self {
            match_id: record.id,
            red: AllianceScore::from(&record.red),
            blue: AllianceScore::from(&record.blue),
        }
    }

    pub fn alliance(&self, alliance: Alliance) -> &AllianceScore {
        match alliance {
            Alliance::Red => &self.red,
            Alliance::Blue => &self.blue,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BonusState {
    pub active: bool,
    pub time_remaining: u32,
}

impl From<&AllianceState> for BonusState {
    fn from(state: &AllianceState) -> Self {
        Self { active: state.bonus_active, time_remaining: state.bonus_time_remaining }
    }
}

/// Consolidated clock state published once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TimerSnapshot {
    pub match_id: MatchId,
    pub time_remaining: u32,
    pub is_endgame: bool,
    pub red_bonus: BonusState,
    pub blue_bonus: BonusState,
    pub paused: bool,
}

impl TimerSnapshot {
    pub fn of(record: &MatchRecord, paused: bool) -> Self {
        Self {
            match_id: record.id,
            time_remaining: record.time_remaining,
            is_endgame: record.is_endgame,
            red_bonus: BonusState::from(&record.red),
            blue_bonus: BonusState::from(&record.blue),
            paused,
        }
    }
}

/// Final state of a match at a lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub match_number: u32,
    pub status: MatchStatus,
    pub red: AllianceScore,
    pub blue: AllianceScore,
}

impl MatchSummary {
    pub fn of(record: &MatchRecord) -> Self {
        Self {
            match_id: record.id,
            match_number: record.match_number,
            status: record.status,
            red: AllianceScore::from(&record.red),
            blue: AllianceScore::from(&record.blue),
        }
    }
}
