use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::error::StoreError;
use super::snapshot::{load_snapshot, save_snapshot, StoreSnapshot, StoreTables};
use super::{RecordKind, Store, StoreResult, WriteBatch};
use crate::models::{
    EventId, MatchId, MatchRecord, MatchStatus, ScoreEvent, Team, TeamId, TeamRanking,
};

/// In-memory [`Store`]. With a snapshot path, every successful commit is also
/// written to disk before it becomes visible.
pub struct MemoryStore {
    tables: Mutex<StoreTables>,
    snapshot_path: Option<PathBuf>,
    injected_failure: Mutex<Option<String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_tables(StoreTables::default(), None)
    }

    /// Open a snapshot-backed store, starting empty when the file does not
    /// exist yet.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let tables = if path.exists() {
            let snapshot = load_snapshot(path)?;
            log::info!(
                "Opened store {:?}: {} teams, {} matches, {} events",
                path,
                snapshot.tables.teams.len(),
                snapshot.tables.matches.len(),
                snapshot.tables.events.len()
            );
            snapshot.tables
        } else {
            log::info!("Creating new store at {:?}", path);
            StoreTables::default()
        };
        Ok(Self::from_tables(tables, Some(path.to_path_buf())))
    }

    fn from_tables(tables: StoreTables, snapshot_path: Option<PathBuf>) -> Self {
        Self { tables: Mutex::new(tables), snapshot_path, injected_failure: Mutex::new(None) }
    }

    /// Make the next commit fail without applying anything.
    pub fn fail_next_commit(&self, reason: impl Into<String>) {
        if let Ok(mut failure) = self.injected_failure.lock() {
            *failure = Some(reason.into());
        }
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// Copy of every table, for export and inspection.
    pub fn tables(&self) -> StoreResult<StoreTables> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, StoreTables>> {
        self.tables.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Store for MemoryStore {
    fn next_id(&self, kind: RecordKind) -> StoreResult<u32> {
        Ok(self.lock()?.allocate_id(kind))
    }

    fn team(&self, id: TeamId) -> StoreResult<Option<Team>> {
        Ok(self.lock()?.teams.get(&id).cloned())
    }

    fn team_by_number(&self, number: u32) -> StoreResult<Option<Team>> {
        Ok(self.lock()?.teams.values().find(|team| team.number == number).cloned())
    }

    fn teams(&self) -> StoreResult<Vec<Team>> {
        let mut teams: Vec<Team> = self.lock()?.teams.values().cloned().collect();
        teams.sort_by_key(|team| team.number);
        Ok(teams)
    }

    fn match_record(&self, id: MatchId) -> StoreResult<Option<MatchRecord>> {
        Ok(self.lock()?.matches.get(&id).cloned())
    }

    fn matches(&self, status: Option<MatchStatus>) -> StoreResult<Vec<MatchRecord>> {
        Ok(self
            .lock()?
            .matches
            .values()
            .rev()
            .filter(|record| status.map_or(true, |wanted| record.status == wanted))
            .cloned()
            .collect())
    }

    fn event(&self, id: EventId) -> StoreResult<Option<ScoreEvent>> {
        Ok(self.lock()?.events.get(&id).cloned())
    }

    fn events(&self, match_id: Option<MatchId>) -> StoreResult<Vec<ScoreEvent>> {
        Ok(self
            .lock()?
            .events
            .values()
            .filter(|event| match_id.map_or(true, |wanted| event.match_id == wanted))
            .cloned()
            .collect())
    }

    fn ranking(&self, team_id: TeamId) -> StoreResult<Option<TeamRanking>> {
        Ok(self.lock()?.rankings.get(&team_id).cloned())
    }

    fn rankings(&self) -> StoreResult<Vec<TeamRanking>> {
        let mut rankings: Vec<TeamRanking> = self.lock()?.rankings.values().cloned().collect();
        rankings.sort_by_key(|row| (row.current_rank.unwrap_or(u32::MAX), row.team_id));
        Ok(rankings)
    }

    fn commit(&self, batch: WriteBatch) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let injected = self.injected_failure.lock().map_err(|_| StoreError::LockPoisoned)?.take();
        if let Some(reason) = injected {
            log::warn!("Commit rejected: {}", reason);
            return Err(StoreError::CommitRejected(reason));
        }

        let mut tables = self.lock()?;
        let mut next = tables.clone();
        next.apply(batch);

        if let Some(path) = &self.snapshot_path {
            save_snapshot(path, &StoreSnapshot::new(next.clone()))?;
        }

        *tables = next;
        Ok(())
    }
}
