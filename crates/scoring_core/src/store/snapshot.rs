// Store snapshots on disk
// MessagePack + LZ4 compression with a trailing SHA-256 checksum

use std::collections::BTreeMap;
use std::fs::{rename, File};
use std::io::{Read, Write};
use std::path::Path;

use chrono::Utc;
use lz4_flex::{compress_prepend_size, decompress_size_prepended};
use rmp_serde::{from_slice, to_vec_named};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::StoreError;
use super::{RecordKind, WriteBatch};
use crate::models::{EventId, MatchId, MatchRecord, ScoreEvent, Team, TeamId, TeamRanking};

pub const SNAPSHOT_VERSION: u32 = 1;

const CHECKSUM_LEN: usize = 32;

/// Every table of the store plus its id sequences.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StoreTables {
    pub teams: BTreeMap<TeamId, Team>,
    pub matches: BTreeMap<MatchId, MatchRecord>,
    pub events: BTreeMap<EventId, ScoreEvent>,
    pub rankings: BTreeMap<TeamId, TeamRanking>,
    pub last_team_id: u32,
    pub last_match_id: u32,
    pub last_event_id: u32,
}

impl StoreTables {
    pub fn allocate_id(&mut self, kind: RecordKind) -> u32 {
        let counter = match kind {
            RecordKind::Team => &mut self.last_team_id,
            RecordKind::Match => &mut self.last_match_id,
            RecordKind::Event => &mut self.last_event_id,
        };
        *counter += 1;
        *counter
    }

    pub fn apply(&mut self, batch: WriteBatch) {
        for team in batch.teams {
            self.teams.insert(team.id, team);
        }
        for record in batch.matches {
            self.matches.insert(record.id, record);
        }
        for event in batch.events {
            self.events.insert(event.id, event);
        }
        for ranking in batch.rankings {
            self.rankings.insert(ranking.team_id, ranking);
        }

        for id in batch.deleted_teams {
            self.teams.remove(&id);
        }
        for id in batch.deleted_matches {
            self.matches.remove(&id);
        }
        for id in batch.deleted_events {
            self.events.remove(&id);
        }
        if !batch.event_purges.is_empty() {
            self.events.retain(|_, event| !batch.event_purges.contains(&event.match_id));
        }
        for id in batch.deleted_rankings {
            self.rankings.remove(&id);
        }
    }

    fn validate(&self) -> Result<(), StoreError> {
        let ids_in_range = self.teams.keys().all(|id| *id <= self.last_team_id)
            && self.matches.keys().all(|id| *id <= self.last_match_id)
            && self.events.keys().all(|id| *id <= self.last_event_id);
        if !ids_in_range {
            return Err(StoreError::Corrupted);
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoreSnapshot {
    /// Snapshot format version
    pub version: u32,
    /// Write time (unix milliseconds)
    pub timestamp: i64,
    pub tables: StoreTables,
}

impl StoreSnapshot {
    pub fn new(tables: StoreTables) -> Self {
        Self { version: SNAPSHOT_VERSION, timestamp: Utc::now().timestamp_millis(), tables }
    }
}

pub fn serialize_and_compress(snapshot: &StoreSnapshot) -> Result<Vec<u8>, StoreError> {
    snapshot.tables.validate()?;

    let msgpack = to_vec_named(snapshot).map_err(StoreError::Serialization)?;
    let compressed = compress_prepend_size(&msgpack);

    let mut hasher = Sha256::new();
    hasher.update(&compressed);
    let checksum = hasher.finalize();

    let mut result = compressed;
    result.extend_from_slice(&checksum);
    Ok(result)
}

pub fn decompress_and_deserialize(bytes: &[u8]) -> Result<StoreSnapshot, StoreError> {
    // size header + checksum
    if bytes.len() < 4 + CHECKSUM_LEN {
        return Err(StoreError::Corrupted);
    }

    let (payload, checksum_bytes) = bytes.split_at(bytes.len() - CHECKSUM_LEN);

    let mut hasher = Sha256::new();
    hasher.update(payload);
    let calculated = hasher.finalize();
    if &calculated[..] != checksum_bytes {
        return Err(StoreError::ChecksumMismatch);
    }

    let msgpack = decompress_size_prepended(payload).map_err(|_| StoreError::Decompression)?;
    let snapshot: StoreSnapshot = from_slice(&msgpack).map_err(StoreError::Deserialization)?;

    if snapshot.version > SNAPSHOT_VERSION {
        return Err(StoreError::VersionMismatch {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }

    snapshot.tables.validate()?;
    Ok(snapshot)
}

/// Write-temp-then-rename so a crash never leaves a torn snapshot.
pub fn save_snapshot(path: &Path, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let data = serialize_and_compress(snapshot)?;
    let temp_path = path.with_extension("tmp");

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.flush()?;
        file.sync_all()?;
    }

    rename(&temp_path, path)?;

    log::debug!("Saved {} byte snapshot to {:?}", data.len(), path);
    Ok(())
}

pub fn load_snapshot(path: &Path) -> Result<StoreSnapshot, StoreError> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;

    let snapshot = decompress_and_deserialize(&data)?;

    log::debug!("Loaded {} byte snapshot from {:?}", data.len(), path);
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RulesConfig;
    use crate::models::{MatchSetup, MatchType};
    use tempfile::TempDir;

    fn sample_tables() -> StoreTables {
        let mut tables = StoreTables::default();
        let team_id = tables.allocate_id(RecordKind::Team);
        let match_id = tables.allocate_id(RecordKind::Match);
        let setup = MatchSetup {
            match_number: 3,
            match_type: MatchType::Playoff,
            red_teams: [Some(team_id), None],
            blue_teams: [None, None],
        };
        tables.apply(
            WriteBatch::new()
                .put_team(Team { id: team_id, number: 1678, name: "Citrus Circuits".into() })
                .put_match(MatchRecord::new(match_id, &setup, &RulesConfig::default()))
                .put_rankings([TeamRanking::new(team_id)]),
        );
        tables
    }

    #[test]
    fn test_snapshot_file_keeps_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("event.scores");
        let snapshot = StoreSnapshot::new(sample_tables());

        save_snapshot(&path, &snapshot).unwrap();
        let loaded = load_snapshot(&path).unwrap();

        assert_eq!(loaded.tables, snapshot.tables);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_checksum_validation() {
        let mut bytes = serialize_and_compress(&StoreSnapshot::new(sample_tables())).unwrap();
        if let Some(last) = bytes.last_mut() {
            *last = last.wrapping_add(1);
        }
        assert!(matches!(decompress_and_deserialize(&bytes), Err(StoreError::ChecksumMismatch)));
    }

    #[test]
    fn test_truncated_data_is_corrupted() {
        assert!(matches!(decompress_and_deserialize(&[0u8; 8]), Err(StoreError::Corrupted)));
    }

    #[test]
    fn test_future_version_rejected() {
        let mut snapshot = StoreSnapshot::new(StoreTables::default());
        snapshot.version = SNAPSHOT_VERSION + 1;
        let bytes = serialize_and_compress(&snapshot).unwrap();
        assert!(matches!(
            decompress_and_deserialize(&bytes),
            Err(StoreError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_purge_removes_only_that_match() {
        let mut tables = StoreTables::default();
        for (id, match_id) in [(1, 1), (2, 2), (3, 1)] {
            tables.events.insert(
                id,
                ScoreEvent {
                    id,
                    match_id,
                    alliance: crate::models::Alliance::Red,
                    kind: crate::models::EventKind::Park,
                    points: 2,
                    team_id: None,
                    details: None,
                    timestamp: Utc::now(),
                },
            );
        }
        tables.apply(WriteBatch::new().purge_events(1));
        assert_eq!(tables.events.keys().copied().collect::<Vec<_>>(), vec![2]);
    }
}
