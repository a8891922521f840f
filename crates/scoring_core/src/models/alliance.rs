use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::EventKind;
use crate::error::ScoringError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Alliance {
    Red,
    Blue,
}

impl Alliance {
    pub const ALL: [Alliance; 2] = [Alliance::Red, Alliance::Blue];

    pub fn opponent(self) -> Alliance {
        match self {
            Alliance::Red => Alliance::Blue,
            Alliance::Blue => Alliance::Red,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Alliance::Red => "red",
            Alliance::Blue => "blue",
        }
    }
}

impl fmt::Display for Alliance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Alliance {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(Alliance::Red),
            "blue" => Ok(Alliance::Blue),
            other => Err(ScoringError::validation(format!("unknown alliance '{other}'"))),
        }
    }
}

/// Per-alliance tally of every recorded event kind.
///
/// `foul` and `tech_foul` count penalties this alliance committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AllianceCounters {
    pub bucket_normal: u32,
    pub bucket_bonus: u32,
    pub human_bucket: u32,
    pub park: u32,
    pub slight_ramp: u32,
    pub climb: u32,
    pub foul: u32,
    pub tech_foul: u32,
}

impl AllianceCounters {
    pub fn get(&self, kind: EventKind) -> u32 {
        match kind {
            EventKind::BucketNormal => self.bucket_normal,
            EventKind::BucketBonus => self.bucket_bonus,
            EventKind::HumanBucket => self.human_bucket,
            EventKind::Park => self.park,
            EventKind::SlightRamp => self.slight_ramp,
            EventKind::Climb => self.climb,
            EventKind::Foul => self.foul,
            EventKind::TechFoul => self.tech_foul,
        }
    }

    pub fn get_mut(&mut self, kind: EventKind) -> &mut u32 {
        match kind {
            EventKind::BucketNormal => &mut self.bucket_normal,
            EventKind::BucketBonus => &mut self.bucket_bonus,
            EventKind::HumanBucket => &mut self.human_bucket,
            EventKind::Park => &mut self.park,
            EventKind::SlightRamp => &mut self.slight_ramp,
            EventKind::Climb => &mut self.climb,
            EventKind::Foul => &mut self.foul,
            EventKind::TechFoul => &mut self.tech_foul,
        }
    }
}

/// Live state of one alliance within one match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllianceState {
    pub counters: AllianceCounters,
    pub score: u32,
    pub bonus_active: bool,
    pub bonus_time_remaining: u32,
    pub teleop_rp: bool,
    pub climb_rp: bool,
    pub win_rp: bool,
    /// Set once an administrator overwrote `score` directly; from then on the
    /// score no longer follows the counters.
    #[serde(default)]
    pub score_overridden: bool,
}

impl AllianceState {
    pub fn new(bonus_duration_secs: u32) -> Self {
        Self { bonus_time_remaining: bonus_duration_secs, ..Self::default() }
    }

    /// Ranking points each team on this alliance earns (0-3).
    pub fn earned_rp(&self) -> u32 {
        u32::from(self.win_rp) + u32::from(self.teleop_rp) + u32::from(self.climb_rp)
    }
}
