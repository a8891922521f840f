//! Match controller
//!
//! Owns the lifecycle of the live match and is the only writer of match
//! records. Every operation follows the same shape under one write lock:
//! load, mutate, commit a single [`WriteBatch`], then publish. Notifications
//! therefore always describe committed state, and a failed commit publishes
//! nothing.
//!
//! The clock ticks into the controller through [`TickSink`]. The clock task
//! holds only a weak reference, so dropping the last controller handle also
//! ends the clock.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::clock::{advance_one_second, Clock, IntervalTicker, TickFlow, TickSink};
use super::ranking::{ranking_rows, recompute_rankings, RankingEngine};
use super::score_book::{Reversal, ScoreBook};
use crate::config::RulesConfig;
use crate::error::{Result, ScoringError};
use crate::models::{
    Alliance, EventId, EventInput, EventKind, MatchId, MatchRecord, MatchStatus, RankingRow,
    ScoreEvent, TeamRanking,
};
use crate::publish::{MatchSummary, Notification, Publisher, ScoreSnapshot, TimerSnapshot};
use crate::store::{RecordKind, Store, WriteBatch};

/// Handle to the scoring engine. Cheap to clone; all clones share one
/// store, publisher and match clock.
#[derive(Clone)]
pub struct MatchController {
    pub(super) inner: Arc<ControllerInner>,
}

pub(super) struct ControllerInner {
    pub(super) store: Arc<dyn Store>,
    pub(super) publisher: Arc<dyn Publisher>,
    pub(super) rules: RulesConfig,
    write_lock: Mutex<()>,
    /// Clock of the live match; at most one at a time
    session: Mutex<Option<Clock>>,
}

impl MatchController {
    pub fn new(store: Arc<dyn Store>, publisher: Arc<dyn Publisher>, rules: RulesConfig) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                store,
                publisher,
                rules,
                write_lock: Mutex::new(()),
                session: Mutex::new(None),
            }),
        }
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.inner.rules
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    /// Start a scheduled match: full time on the clock, no endgame, bonus
    /// windows closed. A match whose clock is still running is stopped in
    /// the same commit, so only one match is ever in progress.
    pub fn start_match(&self, match_id: MatchId) -> Result<()> {
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let mut record = inner.load_match(match_id)?;
        if record.status != MatchStatus::Scheduled {
            return Err(ScoringError::InvalidTransition {
                from: record.status,
                to: MatchStatus::InProgress,
            });
        }
        if !record.is_fully_assigned() {
            return Err(ScoringError::validation(format!(
                "match {} needs two teams on each alliance before it can start",
                record.match_number
            )));
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ScoringError::Config(
                "match clock needs a running tokio runtime".to_string(),
            ));
        }

        let previous = inner.lock_session().as_ref().map(Clock::match_id);
        let mut displaced = match previous {
            Some(previous) => inner
                .store
                .match_record(previous)?
                .filter(|other| other.status == MatchStatus::InProgress),
            None => None,
        };

        record.transition_to(MatchStatus::InProgress)?;
        record.reset_clock(&inner.rules);
        record.start_time = Some(Utc::now());
        record.end_time = None;
        let mut batch = WriteBatch::new().put_match(record.clone());
        if let Some(other) = displaced.as_mut() {
            other.transition_to(MatchStatus::Stopped)?;
            other.zero_clock();
            other.end_time = Some(Utc::now());
            batch = batch.put_match(other.clone());
        }
        inner.store.commit(batch)?;

        let clock = {
            let mut session = inner.lock_session();
            if let Some(previous) = session.take() {
                warn!(
                    previous_match = previous.match_id(),
                    match_id, "stopping clock of previous match"
                );
                previous.stop();
            }
            let ticker = IntervalTicker::new(inner.rules.tick_interval());
            let clock = Clock::start(match_id, Arc::downgrade(&self.inner), ticker);
            let session_id = clock.as_ref().map(Clock::session_id);
            *session = clock;
            session_id
        };
        match clock {
            Some(session) => info!(match_id, %session, match_number = record.match_number, "match started"),
            None => error!(match_id, "match started but its clock could not be spawned"),
        }

        if let Some(other) = displaced {
            warn!(match_id = other.id, "match stopped, another match started");
            inner.publisher.publish(Notification::MatchStopped(MatchSummary::of(&other)));
        }
        inner.publisher.publish(Notification::MatchStarted {
            timer: TimerSnapshot::of(&record, false),
            score: ScoreSnapshot::of(&record),
        });
        Ok(())
    }

    /// Log one scoring event and credit its points. Accepted during play
    /// and while a completed match is under review.
    pub fn record_event(
        &self,
        match_id: MatchId,
        alliance: Alliance,
        kind: EventKind,
        input: EventInput,
    ) -> Result<ScoreEvent> {
        input.validate()?;
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let mut record = inner.load_match(match_id)?;
        ensure_score_changes(&record, "record events")?;
        if let Some(team_id) = input.team_id {
            if !record.teams(alliance).contains(&Some(team_id)) {
                return Err(ScoringError::validation(format!(
                    "team {team_id} is not on the {alliance} alliance of match {}",
                    record.match_number
                )));
            }
        }

        let mut event = ScoreBook::new(&inner.rules.points).apply(&mut record, alliance, kind, input);
        event.id = inner.store.next_id(RecordKind::Event)?;
        inner
            .store
            .commit(WriteBatch::new().put_match(record.clone()).put_event(event.clone()))?;

        debug!(match_id, event_id = event.id, %alliance, %kind, points = event.points, "event recorded");
        inner.publisher.publish(Notification::ScoreUpdated(ScoreSnapshot::of(&record)));
        Ok(event)
    }

    /// Remove a logged event and reverse its contribution.
    pub fn delete_event(&self, event_id: EventId) -> Result<Reversal> {
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let event = inner
            .store
            .event(event_id)?
            .ok_or_else(|| ScoringError::not_found("event", event_id))?;
        let mut record = inner.load_match(event.match_id)?;
        ensure_score_changes(&record, "delete events")?;

        let reversal = ScoreBook::new(&inner.rules.points).reverse(&mut record, &event);
        inner
            .store
            .commit(WriteBatch::new().put_match(record.clone()).delete_event(event_id))?;

        debug!(match_id = record.id, event_id, clamped = reversal.clamped, "event deleted");
        inner.publisher.publish(Notification::ScoreUpdated(ScoreSnapshot::of(&record)));
        Ok(reversal)
    }

    /// Set an alliance score directly. The counters and event log are left
    /// alone, so the score no longer follows them.
    pub fn override_score(&self, match_id: MatchId, alliance: Alliance, score: u32) -> Result<()> {
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let mut record = inner.load_match(match_id)?;
        ensure_score_changes(&record, "override scores")?;

        let previous = record.alliance(alliance).score;
        ScoreBook::new(&inner.rules.points).manual_override(&mut record, alliance, score);
        inner.store.commit(WriteBatch::new().put_match(record.clone()))?;

        warn!(match_id, %alliance, previous, score, "score overridden manually");
        inner.publisher.publish(Notification::ScoreUpdated(ScoreSnapshot::of(&record)));
        Ok(())
    }

    /// Open the alliance's bonus window and earn its teleop RP. Returns
    /// false, with nothing published, when the window is already open.
    pub fn activate_bonus(&self, match_id: MatchId, alliance: Alliance) -> Result<bool> {
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let mut record = inner.load_match(match_id)?;
        if record.status != MatchStatus::InProgress {
            return Err(ScoringError::InvalidState {
                match_id,
                status: record.status,
                action: "activate a bonus",
            });
        }
        if record.alliance(alliance).bonus_active {
            debug!(match_id, %alliance, "bonus already active");
            return Ok(false);
        }

        let state = record.alliance_mut(alliance);
        state.bonus_active = true;
        state.bonus_time_remaining = inner.rules.bonus_duration_secs;
        state.teleop_rp = true;
        inner.store.commit(WriteBatch::new().put_match(record.clone()))?;

        info!(match_id, %alliance, "bonus activated");
        inner.publisher.publish(Notification::BonusActivated {
            match_id,
            alliance,
            time_remaining: inner.rules.bonus_duration_secs,
        });
        Ok(true)
    }

    /// End play early. Same outcome as the clock running out.
    pub fn end_match(&self, match_id: MatchId) -> Result<()> {
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let record = inner.load_match(match_id)?;
        if record.status != MatchStatus::InProgress {
            return Err(ScoringError::InvalidTransition {
                from: record.status,
                to: MatchStatus::Completed,
            });
        }
        inner.complete(record)
    }

    /// Close review of a completed match. RP are derived again from the
    /// reviewed scores and replace what the match contributed at completion.
    pub fn finalize_match(&self, match_id: MatchId) -> Result<()> {
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let mut record = inner.load_match(match_id)?;
        record.transition_to(MatchStatus::Finalized)?;
        let rankings = inner.award_rankings(&mut record)?;
        let rows = inner.rows_for(&rankings)?;
        inner
            .store
            .commit(WriteBatch::new().put_match(record.clone()).put_rankings(rankings))?;

        info!(match_id, red = record.red.score, blue = record.blue.score, "match finalized");
        inner.publisher.publish(Notification::MatchFinalized(MatchSummary::of(&record)));
        inner.publish_rankings(&rows);
        Ok(())
    }

    /// Emergency stop during play: no RP, every timer zeroed.
    pub fn stop_match(&self, match_id: MatchId) -> Result<()> {
        let inner = &self.inner;
        let _writes = inner.lock_writes();

        let mut record = inner.load_match(match_id)?;
        record.transition_to(MatchStatus::Stopped)?;
        record.zero_clock();
        record.end_time = Some(Utc::now());
        inner.store.commit(WriteBatch::new().put_match(record.clone()))?;
        inner.release_clock(match_id);

        warn!(match_id, "match stopped");
        inner.publisher.publish(Notification::MatchStopped(MatchSummary::of(&record)));
        Ok(())
    }

    /// Freeze the clock for a field fault and re-broadcast the timer.
    pub fn pause_for_fault(&self) -> Result<TimerSnapshot> {
        self.inner.set_paused(true)
    }

    /// Unfreeze the clock after a field fault and re-broadcast the timer.
    pub fn resume_from_fault(&self) -> Result<TimerSnapshot> {
        self.inner.set_paused(false)
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock_session().as_ref().map_or(false, Clock::is_paused)
    }

    /// Match whose clock is running, if any.
    pub fn active_match_id(&self) -> Option<MatchId> {
        self.inner.lock_session().as_ref().map(Clock::match_id)
    }

    /// The match in play, as recorded in the store.
    pub fn current_match(&self) -> Result<Option<MatchRecord>> {
        Ok(self.inner.store.matches(Some(MatchStatus::InProgress))?.into_iter().next())
    }

    pub fn score_snapshot(&self, match_id: MatchId) -> Result<ScoreSnapshot> {
        Ok(ScoreSnapshot::of(&self.inner.load_match(match_id)?))
    }

    pub fn timer_snapshot(&self, match_id: MatchId) -> Result<TimerSnapshot> {
        let record = self.inner.load_match(match_id)?;
        Ok(TimerSnapshot::of(&record, self.inner.clock_paused(match_id)))
    }
}

fn ensure_score_changes(record: &MatchRecord, action: &'static str) -> Result<()> {
    if record.status.accepts_score_changes() {
        Ok(())
    } else {
        Err(ScoringError::InvalidState { match_id: record.id, status: record.status, action })
    }
}

impl ControllerInner {
    pub(super) fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Clock>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn load_match(&self, match_id: MatchId) -> Result<MatchRecord> {
        self.store
            .match_record(match_id)?
            .ok_or_else(|| ScoringError::not_found("match", match_id))
    }

    /// Stop and forget the clock if it belongs to `match_id`.
    pub(super) fn release_clock(&self, match_id: MatchId) {
        let mut session = self.lock_session();
        if session.as_ref().map(Clock::match_id) == Some(match_id) {
            if let Some(clock) = session.take() {
                clock.stop();
            }
        }
    }

    /// Apply the match's RP to the ranking table and re-rank. Returns the
    /// full table to commit.
    fn award_rankings(&self, record: &mut MatchRecord) -> Result<Vec<TeamRanking>> {
        let mut rankings = self.store.rankings()?;
        RankingEngine::new(&self.rules).compute(record, &mut rankings);
        recompute_rankings(&mut rankings);
        Ok(rankings)
    }

    /// Rows announcing `rankings`. Read before the commit: nothing may
    /// fail once a change is stored.
    pub(super) fn rows_for(&self, rankings: &[TeamRanking]) -> Result<Vec<RankingRow>> {
        Ok(ranking_rows(rankings, &self.store.teams()?))
    }

    pub(super) fn publish_rankings(&self, rows: &[RankingRow]) {
        self.publisher.publish(Notification::RankingsUpdated { rankings: rows.to_vec() });
    }

    /// Whether the clock of `match_id` is running but paused.
    fn clock_paused(&self, match_id: MatchId) -> bool {
        self.lock_session()
            .as_ref()
            .is_some_and(|clock| clock.match_id() == match_id && clock.is_paused())
    }

    /// in_progress -> completed with RP awarded, as one commit. The clock
    /// is released only once the commit has succeeded, so a failed
    /// completion on expiry is retried by the next tick.
    fn complete(&self, mut record: MatchRecord) -> Result<()> {
        record.transition_to(MatchStatus::Completed)?;
        record.end_time = Some(Utc::now());
        let rankings = self.award_rankings(&mut record)?;
        let rows = self.rows_for(&rankings)?;
        self.store.commit(WriteBatch::new().put_match(record.clone()).put_rankings(rankings))?;
        self.release_clock(record.id);

        info!(
            match_id = record.id,
            red = record.red.score,
            blue = record.blue.score,
            "match completed"
        );
        self.publisher.publish(Notification::MatchEnded(MatchSummary::of(&record)));
        self.publish_rankings(&rows);
        Ok(())
    }

    fn set_paused(&self, paused: bool) -> Result<TimerSnapshot> {
        let _writes = self.lock_writes();
        let match_id = {
            let session = self.lock_session();
            let clock = session
                .as_ref()
                .ok_or_else(|| ScoringError::validation("no match clock is running"))?;
            let changed = if paused { clock.pause() } else { clock.resume() };
            if changed {
                info!(match_id = clock.match_id(), paused, "field fault pause toggled");
            }
            clock.match_id()
        };

        let snapshot = TimerSnapshot::of(&self.load_match(match_id)?, paused);
        self.publisher.publish(Notification::TimerUpdate(snapshot));
        Ok(snapshot)
    }

    fn tick(&self, match_id: MatchId) -> Result<TickFlow> {
        let _writes = self.lock_writes();

        // A tick already past the clock's own check may land after a pause
        let paused = self.clock_paused(match_id);
        if paused {
            debug!(match_id, "tick skipped, clock paused");
            return Ok(TickFlow::Continue);
        }

        let Some(mut record) = self.store.match_record(match_id)? else {
            warn!(match_id, "clock running for a match that no longer exists");
            return Ok(TickFlow::Stop);
        };
        if record.status != MatchStatus::InProgress {
            debug!(match_id, status = %record.status, "clock stopping, match no longer in play");
            return Ok(TickFlow::Stop);
        }

        let report = advance_one_second(&mut record, &self.rules);
        self.store.commit(WriteBatch::new().put_match(record.clone()))?;

        if report.endgame_entered {
            info!(match_id, time_remaining = record.time_remaining, "endgame started");
            self.publisher.publish(Notification::EndgameStarted {
                match_id,
                time_remaining: record.time_remaining,
            });
        }
        for alliance in report.bonus_ended {
            debug!(match_id, %alliance, "bonus ended");
            self.publisher.publish(Notification::BonusEnded { match_id, alliance });
        }
        self.publisher.publish(Notification::TimerUpdate(TimerSnapshot::of(&record, paused)));

        if report.expired {
            self.complete(record)?;
            return Ok(TickFlow::Stop);
        }
        Ok(TickFlow::Continue)
    }
}

impl TickSink for ControllerInner {
    fn can_tick(&self, match_id: MatchId) -> bool {
        matches!(self.store.match_record(match_id), Ok(Some(_)))
    }

    fn on_tick(&self, match_id: MatchId) -> TickFlow {
        match self.tick(match_id) {
            Ok(flow) => flow,
            Err(e) => {
                // Keep ticking: the next tick retries the write
                error!(match_id, error = %e, "clock tick failed");
                TickFlow::Continue
            }
        }
    }
}
