// Records shared by the engine, the store and the publish layer

pub mod alliance;
pub mod event;
pub mod match_record;
pub mod team;

pub use alliance::{Alliance, AllianceCounters, AllianceState};
pub use event::{EventInput, EventKind, ScoreEvent, MAX_DETAILS_LEN};
pub use match_record::{AwardedRp, MatchRecord, MatchSetup, MatchStatus, MatchType};
pub use team::{RankChange, RankingRow, Team, TeamRanking, TeamRegistration};

pub type TeamId = u32;
pub type MatchId = u32;
pub type EventId = u32;
