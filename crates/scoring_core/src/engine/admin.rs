//! Event administration: team registry, match schedule and the ranking
//! table. Same write discipline as the live operations.

use std::collections::HashSet;

use tracing::{info, warn};
use validator::Validate;

use super::controller::{ControllerInner, MatchController};
use super::ranking::{ranking_rows, recompute_rankings};
use crate::error::{Result, ScoringError};
use crate::models::{
    Alliance, MatchId, MatchRecord, MatchSetup, MatchStatus, RankingRow, ScoreEvent, Team, TeamId,
    TeamRanking, TeamRegistration,
};
use crate::store::{RecordKind, WriteBatch};

impl MatchController {
    /// Register a team. Team numbers are unique; the team starts with an
    /// unranked, zero-point ranking row.
    pub fn register_team(&self, registration: TeamRegistration) -> Result<Team> {
        registration.validate()?;
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        if inner.store.team_by_number(registration.number)?.is_some() {
            return Err(ScoringError::validation(format!(
                "team number {} is already registered",
                registration.number
            )));
        }

        let team = Team {
            id: inner.store.next_id(RecordKind::Team)?,
            number: registration.number,
            name: registration.name,
        };
        inner.store.commit(
            WriteBatch::new().put_team(team.clone()).put_rankings([TeamRanking::new(team.id)]),
        )?;

        info!(team_id = team.id, number = team.number, "team registered");
        Ok(team)
    }

    /// Remove a team that is not on any match.
    pub fn remove_team(&self, team_id: TeamId) -> Result<()> {
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let team = inner.store.team(team_id)?.ok_or_else(|| ScoringError::not_found("team", team_id))?;
        if let Some(record) = inner.store.matches(None)?.iter().find(|m| m.has_team(team_id)) {
            return Err(ScoringError::validation(format!(
                "team {} is assigned to match {}",
                team.number, record.match_number
            )));
        }

        inner.store.commit(WriteBatch::new().delete_team(team_id).delete_ranking(team_id))?;
        info!(team_id, number = team.number, "team removed");
        Ok(())
    }

    pub fn teams(&self) -> Result<Vec<Team>> {
        Ok(self.inner.store.teams()?)
    }

    /// Add a match to the schedule. Team slots may be left empty until the
    /// match starts.
    pub fn create_match(&self, setup: MatchSetup) -> Result<MatchRecord> {
        setup.validate()?;
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        inner.check_setup(&setup, None)?;
        let record = MatchRecord::new(inner.store.next_id(RecordKind::Match)?, &setup, &inner.rules);
        inner.store.commit(WriteBatch::new().put_match(record.clone()))?;

        info!(
            match_id = record.id,
            match_number = record.match_number,
            match_type = %record.match_type,
            "match scheduled"
        );
        Ok(record)
    }

    /// Change number, type or teams of a match that has not started.
    pub fn update_match_setup(&self, match_id: MatchId, setup: MatchSetup) -> Result<MatchRecord> {
        setup.validate()?;
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let mut record = inner.load_match(match_id)?;
        if record.status != MatchStatus::Scheduled {
            return Err(ScoringError::InvalidState {
                match_id,
                status: record.status,
                action: "change its schedule",
            });
        }
        inner.check_setup(&setup, Some(match_id))?;

        record.apply_setup(&setup);
        inner.store.commit(WriteBatch::new().put_match(record.clone()))?;
        info!(match_id, match_number = record.match_number, "match schedule updated");
        Ok(record)
    }

    /// Delete a match and its event log. RP the match contributed are taken
    /// back out of the rankings. A match in play must be ended or stopped
    /// first.
    pub fn delete_match(&self, match_id: MatchId) -> Result<()> {
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let record = inner.load_match(match_id)?;
        if record.status == MatchStatus::InProgress {
            return Err(ScoringError::InvalidState {
                match_id,
                status: record.status,
                action: "delete it",
            });
        }

        let mut batch = WriteBatch::new().delete_match(match_id).purge_events(match_id);
        let rows = match record.awarded_rp {
            Some(_) => {
                let mut rankings = inner.store.rankings()?;
                withdraw_rp(&record, &mut rankings);
                recompute_rankings(&mut rankings);
                let rows = inner.rows_for(&rankings)?;
                batch = batch.put_rankings(rankings);
                Some(rows)
            }
            None => None,
        };
        inner.store.commit(batch)?;

        warn!(match_id, match_number = record.match_number, "match deleted");
        if let Some(rows) = rows {
            inner.publish_rankings(&rows);
        }
        Ok(())
    }

    /// Clear the whole schedule and event log. Every ranking row goes back
    /// to zero points. Returns the number of matches deleted.
    pub fn delete_all_matches(&self) -> Result<usize> {
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let matches = inner.store.matches(None)?;
        if let Some(live) = matches.iter().find(|m| m.status == MatchStatus::InProgress) {
            return Err(ScoringError::InvalidState {
                match_id: live.id,
                status: live.status,
                action: "clear the schedule",
            });
        }

        let mut rankings = inner.store.rankings()?;
        zero_rankings(&mut rankings);
        let rows = inner.rows_for(&rankings)?;
        let mut batch = WriteBatch::new().put_rankings(rankings);
        for record in &matches {
            batch = batch.delete_match(record.id).purge_events(record.id);
        }
        inner.store.commit(batch)?;

        warn!(count = matches.len(), "all matches deleted");
        inner.publish_rankings(&rows);
        Ok(matches.len())
    }

    /// Scheduled matches, newest first, optionally by status.
    pub fn matches(&self, status: Option<MatchStatus>) -> Result<Vec<MatchRecord>> {
        Ok(self.inner.store.matches(status)?)
    }

    pub fn match_record(&self, match_id: MatchId) -> Result<MatchRecord> {
        self.inner.load_match(match_id)
    }

    /// Event log, of one match or of the whole event.
    pub fn events(&self, match_id: Option<MatchId>) -> Result<Vec<ScoreEvent>> {
        if let Some(match_id) = match_id {
            self.inner.load_match(match_id)?;
        }
        Ok(self.inner.store.events(match_id)?)
    }

    /// Set a team's ranking points by hand and re-rank.
    pub fn set_ranking_points(&self, team_id: TeamId, points: u32) -> Result<Vec<RankingRow>> {
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        inner.store.team(team_id)?.ok_or_else(|| ScoringError::not_found("team", team_id))?;
        let mut rankings = inner.store.rankings()?;
        match rankings.iter_mut().find(|row| row.team_id == team_id) {
            Some(row) => row.ranking_points = points,
            None => rankings.push(TeamRanking { ranking_points: points, ..TeamRanking::new(team_id) }),
        }
        recompute_rankings(&mut rankings);
        let rows = inner.rows_for(&rankings)?;
        inner.store.commit(WriteBatch::new().put_rankings(rankings))?;

        warn!(team_id, points, "ranking points set manually");
        inner.publish_rankings(&rows);
        Ok(rows)
    }

    /// Zero every team's ranking points and clear ranks. Matches already
    /// played no longer count: finalizing one later adds its RP afresh.
    pub fn reset_rankings(&self) -> Result<Vec<RankingRow>> {
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let mut rankings = inner.store.rankings()?;
        zero_rankings(&mut rankings);
        let rows = inner.rows_for(&rankings)?;
        let mut batch = WriteBatch::new().put_rankings(rankings);
        for mut record in inner.store.matches(None)? {
            if record.awarded_rp.take().is_some() {
                batch = batch.put_match(record);
            }
        }
        inner.store.commit(batch)?;

        warn!(teams = rows.len(), "rankings reset");
        inner.publish_rankings(&rows);
        Ok(rows)
    }

    /// Re-rank from the stored points and announce the table.
    pub fn recompute_rankings(&self) -> Result<Vec<RankingRow>> {
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let mut rankings = inner.store.rankings()?;
        recompute_rankings(&mut rankings);
        let rows = inner.rows_for(&rankings)?;
        inner.store.commit(WriteBatch::new().put_rankings(rankings))?;
        inner.publish_rankings(&rows);
        Ok(rows)
    }

    /// Current ranking table, best first.
    pub fn ranking_table(&self) -> Result<Vec<RankingRow>> {
        let store = &self.inner.store;
        Ok(ranking_rows(&store.rankings()?, &store.teams()?))
    }
}

impl ControllerInner {
    /// Teams must exist and appear once; (number, type) must be free.
    fn check_setup(&self, setup: &MatchSetup, editing: Option<MatchId>) -> Result<()> {
        let mut seen = HashSet::new();
        for team_id in setup.assigned_teams() {
            if !seen.insert(team_id) {
                return Err(ScoringError::validation(format!(
                    "team {team_id} is assigned twice in match {}",
                    setup.match_number
                )));
            }
            if self.store.team(team_id)?.is_none() {
                return Err(ScoringError::not_found("team", team_id));
            }
        }

        let taken = self.store.matches(None)?.into_iter().any(|m| {
            Some(m.id) != editing
                && m.match_number == setup.match_number
                && m.match_type == setup.match_type
        });
        if taken {
            return Err(ScoringError::validation(format!(
                "{} match {} already exists",
                setup.match_type, setup.match_number
            )));
        }
        Ok(())
    }
}

/// Take a match's counted RP back out of the table.
fn withdraw_rp(record: &MatchRecord, rankings: &mut [TeamRanking]) {
    let Some(awarded) = record.awarded_rp else {
        return;
    };
    for alliance in Alliance::ALL {
        for team_id in record.teams(alliance).into_iter().flatten() {
            if let Some(row) = rankings.iter_mut().find(|row| row.team_id == team_id) {
                row.ranking_points = row.ranking_points.saturating_sub(awarded.get(alliance));
            }
        }
    }
}

fn zero_rankings(rankings: &mut [TeamRanking]) {
    for row in rankings.iter_mut() {
        *row = TeamRanking::new(row.team_id);
    }
}
