//! Score book: applies and reverses scoring events against a match's two
//! alliances. Pure bookkeeping; the controller logs the returned events and
//! commits the match.

use chrono::Utc;
use tracing::warn;

use crate::config::PointTable;
use crate::models::{Alliance, EventInput, EventKind, MatchRecord, ScoreEvent};

/// Outcome of a reversal. `clamped` is set when a counter or score would
/// have gone below zero and was held at zero instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reversal {
    pub clamped: bool,
}

pub struct ScoreBook<'a> {
    points: &'a PointTable,
}

impl<'a> ScoreBook<'a> {
    pub fn new(points: &'a PointTable) -> Self {
        Self { points }
    }

    /// Count one event for `alliance` and credit its points.
    ///
    /// Scoring kinds credit `alliance`. Penalties count against `alliance`
    /// and credit the opponent. Returns the log entry with `id` left at 0
    /// for the store to assign.
    pub fn apply(
        &self,
        record: &mut MatchRecord,
        alliance: Alliance,
        kind: EventKind,
        input: EventInput,
    ) -> ScoreEvent {
        let points = input.points.unwrap_or_else(|| self.points.points_for(kind));

        let counter = record.alliance_mut(alliance).counters.get_mut(kind);
        *counter = counter.saturating_add(1);

        let beneficiary = if kind.is_penalty() { alliance.opponent() } else { alliance };
        let target = record.alliance_mut(beneficiary);
        target.score = target.score.saturating_add(points);

        ScoreEvent {
            id: 0,
            match_id: record.id,
            alliance,
            kind,
            points,
            team_id: input.team_id,
            details: input.details,
            timestamp: Utc::now(),
        }
    }

    /// Undo a previously applied event. Counter and score are floored at
    /// zero; a floor hit makes the reversal lossy and is reported.
    pub fn reverse(&self, record: &mut MatchRecord, event: &ScoreEvent) -> Reversal {
        let mut reversal = Reversal::default();

        let counter = record.alliance_mut(event.alliance).counters.get_mut(event.kind);
        if *counter == 0 {
            reversal.clamped = true;
        }
        *counter = counter.saturating_sub(1);

        let target = record.alliance_mut(event.beneficiary());
        if target.score < event.points {
            reversal.clamped = true;
        }
        target.score = target.score.saturating_sub(event.points);

        if reversal.clamped {
            warn!(
                match_id = record.id,
                event_id = event.id,
                kind = %event.kind,
                "reversal clamped at zero"
            );
        }
        reversal
    }

    /// Overwrite an alliance score, leaving the counters untouched. The score
    /// stops tracking the counters from here on; the alliance is flagged so
    /// reviewers can see it.
    pub fn manual_override(&self, record: &mut MatchRecord, alliance: Alliance, score: u32) {
        let state = record.alliance_mut(alliance);
        state.score = score;
        state.score_overridden = true;
    }
}
