//! Publish interface
//!
//! The engine announces every observable change as a [`Notification`] on a
//! [`Publisher`]. Transport adapters (websocket, display boards, the CLI)
//! subscribe and forward; the engine never knows which transport is used.

mod broadcast;
mod snapshot;

pub use broadcast::{BroadcastPublisher, NullPublisher};
pub use snapshot::{AllianceScore, BonusState, MatchSummary, ScoreSnapshot, TimerSnapshot};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::{Alliance, MatchId, RankingRow};

/// Fire-and-forget sink for notifications. Implementations must not block:
/// the match clock publishes from its tick.
pub trait Publisher: Send + Sync {
    fn publish(&self, notification: Notification);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "topic", content = "payload", rename_all = "snake_case")]
pub enum Notification {
    MatchStarted { timer: TimerSnapshot, score: ScoreSnapshot },
    ScoreUpdated(ScoreSnapshot),
    TimerUpdate(TimerSnapshot),
    EndgameStarted { match_id: MatchId, time_remaining: u32 },
    BonusActivated { match_id: MatchId, alliance: Alliance, time_remaining: u32 },
    BonusEnded { match_id: MatchId, alliance: Alliance },
    MatchEnded(MatchSummary),
    MatchFinalized(MatchSummary),
    MatchStopped(MatchSummary),
    RankingsUpdated { rankings: Vec<RankingRow> },
}

impl Notification {
    /// Wire name of the notification.
    pub fn topic(&self) -> &'static str {
        match self {
            Notification::MatchStarted { .. } => "match_started",
            Notification::ScoreUpdated(_) => "score_updated",
            Notification::TimerUpdate(_) => "timer_update",
            Notification::EndgameStarted { .. } => "endgame_started",
            Notification::BonusActivated { .. } => "bonus_activated",
            Notification::BonusEnded { .. } => "bonus_ended",
            Notification::MatchEnded(_) => "match_ended",
            Notification::MatchFinalized(_) => "match_finalized",
            Notification::MatchStopped(_) => "match_stopped",
            Notification::RankingsUpdated { .. } => "rankings_updated",
        }
    }

    /// Match this notification belongs to; rankings are event-wide.
    pub fn match_id(&self) -> Option<MatchId> {
        match self {
            Notification::MatchStarted { timer, .. } => Some(timer.match_id),
            Notification::ScoreUpdated(score) => Some(score.match_id),
            Notification::TimerUpdate(timer) => Some(timer.match_id),
            Notification::EndgameStarted { match_id, .. }
            | Notification::BonusActivated { match_id, .. }
            | Notification::BonusEnded { match_id, .. } => Some(*match_id),
            Notification::MatchEnded(summary)
            | Notification::MatchFinalized(summary)
            | Notification::MatchStopped(summary) => Some(summary.match_id),
            Notification::RankingsUpdated { .. } => None,
        }
    }

    /// JSON schema of the wire format, for transport adapters.
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Notification)
    }
}
