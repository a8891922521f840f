//! Storage collaborator
//!
//! The engine reads records through [`Store`] and writes them only through
//! [`Store::commit`], which applies a [`WriteBatch`] all-or-nothing. Every
//! mutating transition builds one batch, so a failed write never leaves half
//! of a transition behind.

pub mod error;
pub mod memory;
pub mod snapshot;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use snapshot::{
    decompress_and_deserialize, load_snapshot, save_snapshot, serialize_and_compress,
    StoreSnapshot, StoreTables, SNAPSHOT_VERSION,
};

use serde::{Deserialize, Serialize};

use crate::models::{
    EventId, MatchId, MatchRecord, MatchStatus, ScoreEvent, Team, TeamId, TeamRanking,
};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Record families with their own id sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Team,
    Match,
    Event,
}

pub trait Store: Send + Sync {
    /// Next free id for a record family. Ids are never reused.
    fn next_id(&self, kind: RecordKind) -> StoreResult<u32>;

    fn team(&self, id: TeamId) -> StoreResult<Option<Team>>;
    fn team_by_number(&self, number: u32) -> StoreResult<Option<Team>>;
    /// All teams, ordered by team number
    fn teams(&self) -> StoreResult<Vec<Team>>;

    fn match_record(&self, id: MatchId) -> StoreResult<Option<MatchRecord>>;
    /// Matches with the given status (all when `None`), newest id first
    fn matches(&self, status: Option<MatchStatus>) -> StoreResult<Vec<MatchRecord>>;

    fn event(&self, id: EventId) -> StoreResult<Option<ScoreEvent>>;
    /// Events of one match (all when `None`), in recording order
    fn events(&self, match_id: Option<MatchId>) -> StoreResult<Vec<ScoreEvent>>;

    fn ranking(&self, team_id: TeamId) -> StoreResult<Option<TeamRanking>>;
    /// Ranking rows by current rank; unranked rows last, by team id
    fn rankings(&self) -> StoreResult<Vec<TeamRanking>>;

    /// Apply every write in `batch`, or none of them.
    fn commit(&self, batch: WriteBatch) -> StoreResult<()>;
}

/// Upserts and deletes applied together by [`Store::commit`]. Upserts are
/// applied before deletes.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub teams: Vec<Team>,
    pub deleted_teams: Vec<TeamId>,
    pub matches: Vec<MatchRecord>,
    pub deleted_matches: Vec<MatchId>,
    pub events: Vec<ScoreEvent>,
    pub deleted_events: Vec<EventId>,
    /// Bulk delete of every event logged against these matches
    pub event_purges: Vec<MatchId>,
    pub rankings: Vec<TeamRanking>,
    pub deleted_rankings: Vec<TeamId>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_team(mut self, team: Team) -> Self {
        self.teams.push(team);
        self
    }

    pub fn delete_team(mut self, id: TeamId) -> Self {
        self.deleted_teams.push(id);
        self
    }

    pub fn put_match(mut self, record: MatchRecord) -> Self {
        self.matches.push(record);
        self
    }

    pub fn delete_match(mut self, id: MatchId) -> Self {
        self.deleted_matches.push(id);
        self
    }

    pub fn put_event(mut self, event: ScoreEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn delete_event(mut self, id: EventId) -> Self {
        self.deleted_events.push(id);
        self
    }

    pub fn purge_events(mut self, match_id: MatchId) -> Self {
        self.event_purges.push(match_id);
        self
    }

    pub fn put_rankings(mut self, rankings: impl IntoIterator<Item = TeamRanking>) -> Self {
        self.rankings.extend(rankings);
        self
    }

    pub fn delete_ranking(mut self, team_id: TeamId) -> Self {
        self.deleted_rankings.push(team_id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
            && self.deleted_teams.is_empty()
            && self.matches.is_empty()
            && self.deleted_matches.is_empty()
            && self.events.is_empty()
            && self.deleted_events.is_empty()
            && self.event_purges.is_empty()
            && self.rankings.is_empty()
            && self.deleted_rankings.is_empty()
    }
}
