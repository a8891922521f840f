use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::TeamId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub number: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TeamRegistration {
    #[validate(range(min = 1))]
    pub number: u32,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
}

impl TeamRegistration {
    pub fn new(number: u32, name: impl Into<String>) -> Self {
        Self { number, name: name.into().trim().to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRanking {
    pub team_id: TeamId,
    pub ranking_points: u32,
    pub current_rank: Option<u32>,
    pub previous_rank: Option<u32>,
}

impl TeamRanking {
    pub fn new(team_id: TeamId) -> Self {
        Self { team_id, ranking_points: 0, current_rank: None, previous_rank: None }
    }

    pub fn rank_change(&self) -> RankChange {
        match (self.previous_rank, self.current_rank) {
            (Some(previous), Some(current)) if current < previous => RankChange::Up,
            (Some(previous), Some(current)) if current > previous => RankChange::Down,
            _ => RankChange::Unchanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RankChange {
    Up,
    Down,
    /// Also used when there is no previous rank yet
    Unchanged,
}

impl RankChange {
    pub fn symbol(self) -> &'static str {
        match self {
            RankChange::Up => "▲",
            RankChange::Down => "▼",
            RankChange::Unchanged => "-",
        }
    }
}

/// Ranking table row joined with team identity, as shown to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RankingRow {
    pub rank: u32,
    pub team_id: TeamId,
    pub team_number: u32,
    pub team_name: String,
    pub ranking_points: u32,
    pub rank_change: RankChange,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranking(previous: Option<u32>, current: Option<u32>) -> TeamRanking {
        TeamRanking { team_id: 1, ranking_points: 0, current_rank: current, previous_rank: previous }
    }

    #[test]
    fn test_rank_change() {
        assert_eq!(ranking(Some(4), Some(2)).rank_change(), RankChange::Up);
        assert_eq!(ranking(Some(2), Some(4)).rank_change(), RankChange::Down);
        assert_eq!(ranking(Some(3), Some(3)).rank_change(), RankChange::Unchanged);
        assert_eq!(ranking(None, Some(1)).rank_change(), RankChange::Unchanged);
        assert_eq!(ranking(None, None).rank_change(), RankChange::Unchanged);
    }

    #[test]
    fn test_registration_validation() {
        assert!(TeamRegistration::new(254, "Cheesy Poofs").validate().is_ok());
        assert!(TeamRegistration::new(0, "Zero").validate().is_err());
        assert!(TeamRegistration::new(1, "   ").validate().is_err());
        assert!(TeamRegistration::new(1, "x".repeat(101)).validate().is_err());
    }
}
