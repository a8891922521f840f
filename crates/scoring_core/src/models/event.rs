use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Alliance, EventId, MatchId, TeamId};
use crate::error::ScoringError;

/// Longest free-text note accepted on an event.
pub const MAX_DETAILS_LEN: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BucketNormal,
    BucketBonus,
    HumanBucket,
    Park,
    SlightRamp,
    Climb,
    /// Penalty: points go to the opponent
    Foul,
    /// Penalty: points go to the opponent
    TechFoul,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::BucketNormal,
        EventKind::BucketBonus,
        EventKind::HumanBucket,
        EventKind::Park,
        EventKind::SlightRamp,
        EventKind::Climb,
        EventKind::Foul,
        EventKind::TechFoul,
    ];

    pub fn is_penalty(self) -> bool {
        matches!(self, EventKind::Foul | EventKind::TechFoul)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::BucketNormal => "bucket_normal",
            EventKind::BucketBonus => "bucket_bonus",
            EventKind::HumanBucket => "human_bucket",
            EventKind::Park => "park",
            EventKind::SlightRamp => "slight_ramp",
            EventKind::Climb => "climb",
            EventKind::Foul => "foul",
            EventKind::TechFoul => "tech_foul",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == needle)
            .ok_or_else(|| ScoringError::validation(format!("unknown event kind '{needle}'")))
    }
}

/// One entry of the append-only scoring log. Never edited after it is
/// recorded; a mistake is corrected by deleting the event, which reverses its
/// counter and score contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub id: EventId,
    pub match_id: MatchId,
    /// Alliance that scored, or that committed the penalty
    pub alliance: Alliance,
    pub kind: EventKind,
    pub points: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ScoreEvent {
    /// Alliance whose score received the points.
    pub fn beneficiary(&self) -> Alliance {
        if self.kind.is_penalty() {
            self.alliance.opponent()
        } else {
            self.alliance
        }
    }
}

/// A scoring event as submitted by a referee, before it is logged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventInput {
    /// Overrides the configured point value for the kind
    pub points: Option<u32>,
    pub team_id: Option<TeamId>,
    pub details: Option<String>,
}

impl EventInput {
    pub fn with_points(points: u32) -> Self {
        Self { points: Some(points), ..Self::default() }
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        if let Some(details) = &self.details {
            if details.chars().count() > MAX_DETAILS_LEN {
                return Err(ScoringError::validation(format!(
                    "event details exceed {MAX_DETAILS_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: EventKind, alliance: Alliance) -> ScoreEvent {
        ScoreEvent {
            id: 1,
            match_id: 1,
            alliance,
            kind,
            points: 5,
            team_id: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_parse_round_trips_names() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert_eq!("TECH_FOUL".parse::<EventKind>().unwrap(), EventKind::TechFoul);
        assert!("dunk".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_beneficiary() {
        assert_eq!(sample(EventKind::Climb, Alliance::Red).beneficiary(), Alliance::Red);
        assert_eq!(sample(EventKind::Foul, Alliance::Red).beneficiary(), Alliance::Blue);
        assert_eq!(sample(EventKind::TechFoul, Alliance::Blue).beneficiary(), Alliance::Red);
    }

    #[test]
    fn test_serde_names_match_wire_names() {
        let json = serde_json::to_string(&EventKind::SlightRamp).unwrap();
        assert_eq!(json, "\"slight_ramp\"");
    }

    #[test]
    fn test_details_length_limit() {
        let ok = EventInput { details: Some("x".repeat(MAX_DETAILS_LEN)), ..EventInput::default() };
        assert!(ok.validate().is_ok());

        let too_long =
            EventInput { details: Some("x".repeat(MAX_DETAILS_LEN + 1)), ..EventInput::default() };
        assert!(too_long.validate().is_err());
    }
}
