//! Match clock
//!
//! One tick is one second of match time. The tick loop runs as a tokio task
//! driven by a [`Ticker`]; stopping is a cancellation token, and the field
//! fault pause is a flag the loop reads before every tick. A tick that has
//! started always finishes its bookkeeping: cancellation is only observed
//! between ticks.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::config::RulesConfig;
use crate::models::{Alliance, MatchId, MatchRecord};

/// What one second did to a match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Endgame began on this tick
    pub endgame_entered: bool,
    /// Alliances whose bonus window closed on this tick
    pub bonus_ended: Vec<Alliance>,
    /// No match time left
    pub expired: bool,
}

/// Advance a running match by one second: match time, the one-way endgame
/// flag, then each active bonus window.
pub fn advance_one_second(record: &mut MatchRecord, rules: &RulesConfig) -> TickReport {
    let mut report = TickReport::default();

    record.time_remaining = record.time_remaining.saturating_sub(1);
    if !record.is_endgame && record.time_remaining <= rules.endgame_threshold_secs {
        record.is_endgame = true;
        report.endgame_entered = true;
    }

    for alliance in Alliance::ALL {
        let state = record.alliance_mut(alliance);
        if !state.bonus_active {
            continue;
        }
        state.bonus_time_remaining = state.bonus_time_remaining.saturating_sub(1);
        if state.bonus_time_remaining == 0 {
            state.bonus_active = false;
            report.bonus_ended.push(alliance);
        }
    }

    report.expired = record.time_remaining == 0;
    report
}

/// Source of clock ticks.
pub trait Ticker: Send + 'static {
    fn tick(&mut self) -> impl Future<Output = ()> + Send;
}

/// Wall-clock ticker. Late ticks are delayed, never fired in a burst, so a
/// stalled process does not eat several seconds of match time at once.
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// First tick fires one `period` from now. Needs a tokio runtime.
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

/// Receiver of clock ticks, normally the match controller.
pub trait TickSink: Send + Sync + 'static {
    /// Whether `match_id` can be clocked at all.
    fn can_tick(&self, match_id: MatchId) -> bool;

    /// One second of unpaused match time has elapsed.
    fn on_tick(&self, match_id: MatchId) -> TickFlow;
}

/// Handle to a running clock task. Dropping the handle stops the clock.
pub struct Clock {
    match_id: MatchId,
    session: Uuid,
    paused: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Clock {
    /// Spawn the tick loop for `match_id`. Returns `None`, without
    /// spawning, when the sink cannot clock that match or no tokio runtime
    /// is available.
    pub fn start<S: TickSink, T: Ticker>(
        match_id: MatchId,
        sink: Weak<S>,
        mut ticker: T,
    ) -> Option<Clock> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let ready = sink.upgrade().map_or(false, |sink| sink.can_tick(match_id));
        if !ready {
            debug!(match_id, "clock not started, match unavailable");
            return None;
        }

        let session = Uuid::new_v4();
        let paused = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let loop_paused = Arc::clone(&paused);
        let loop_cancel = cancel.clone();
        let span = info_span!("match_clock", match_id, session = %session);

        let task = runtime.spawn(
            async move {
                info!("clock started");
                loop {
                    tokio::select! {
                        biased;
                        _ = loop_cancel.cancelled() => break,
                        _ = ticker.tick() => {}
                    }

                    if loop_paused.load(Ordering::Acquire) {
                        continue;
                    }

                    let Some(sink) = sink.upgrade() else {
                        break;
                    };
                    if sink.on_tick(match_id) == TickFlow::Stop {
                        break;
                    }
                }
                info!("clock stopped");
            }
            .instrument(span),
        );

        Some(Clock { match_id, session, paused, cancel, task })
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    pub fn session_id(&self) -> Uuid {
        self.session
    }

    /// Freeze match time. Returns false when already paused.
    pub fn pause(&self) -> bool {
        !self.paused.swap(true, Ordering::AcqRel)
    }

    /// Unfreeze match time. Returns false when not paused.
    pub fn resume(&self) -> bool {
        self.paused.swap(false, Ordering::AcqRel)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchSetup;
    use std::sync::atomic::AtomicU32;

    fn running_match() -> MatchRecord {
        let mut record = MatchRecord::new(1, &MatchSetup::default(), &RulesConfig::default());
        record.status = crate::models::MatchStatus::InProgress;
        record
    }

    struct CountingSink {
        ticks: AtomicU32,
        stop_after: u32,
        available: bool,
    }

    impl CountingSink {
        fn new(stop_after: u32) -> Arc<Self> {
            Arc::new(Self { ticks: AtomicU32::new(0), stop_after, available: true })
        }

        fn ticks(&self) -> u32 {
            self.ticks.load(Ordering::SeqCst)
        }
    }

    impl TickSink for CountingSink {
        fn can_tick(&self, _match_id: MatchId) -> bool {
            self.available
        }

        fn on_tick(&self, _match_id: MatchId) -> TickFlow {
            let ticks = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            if ticks >= self.stop_after {
                TickFlow::Stop
            } else {
                TickFlow::Continue
            }
        }
    }

    fn start(sink: &Arc<CountingSink>) -> Clock {
        Clock::start(1, Arc::downgrade(sink), IntervalTicker::new(Duration::from_secs(1)))
            .expect("clock should start")
    }

    #[test]
    fn test_endgame_is_entered_once() {
        let rules = RulesConfig::default();
        let mut record = running_match();
        record.time_remaining = 32;

        assert!(!advance_one_second(&mut record, &rules).endgame_entered);
        let report = advance_one_second(&mut record, &rules);
        assert!(report.endgame_entered);
        assert_eq!(record.time_remaining, 30);
        assert!(record.is_endgame);

        for _ in 0..29 {
            let report = advance_one_second(&mut record, &rules);
            assert!(!report.endgame_entered);
            assert!(record.is_endgame);
        }
        assert_eq!(record.time_remaining, 1);
    }

    #[test]
    fn test_full_countdown_expires() {
        let rules = RulesConfig::default();
        let mut record = running_match();
        let mut endgame_events = 0;

        for second in 1..=135 {
            let report = advance_one_second(&mut record, &rules);
            endgame_events += u32::from(report.endgame_entered);
            assert_eq!(report.expired, second == 135);
        }
        assert_eq!(endgame_events, 1);
        assert_eq!(record.time_remaining, 0);
    }

    #[test]
    fn test_bonus_windows_run_independently() {
        let rules = RulesConfig::default();
        let mut record = running_match();
        record.red.bonus_active = true;
        record.red.bonus_time_remaining = 2;
        record.blue.bonus_active = true;
        record.blue.bonus_time_remaining = 3;

        assert!(advance_one_second(&mut record, &rules).bonus_ended.is_empty());
        assert_eq!(advance_one_second(&mut record, &rules).bonus_ended, vec![Alliance::Red]);
        assert!(!record.red.bonus_active);
        assert!(record.blue.bonus_active);
        assert_eq!(advance_one_second(&mut record, &rules).bonus_ended, vec![Alliance::Blue]);
        assert!(advance_one_second(&mut record, &rules).bonus_ended.is_empty());
    }

    #[test]
    fn test_inactive_bonus_timer_is_untouched() {
        let rules = RulesConfig::default();
        let mut record = running_match();
        advance_one_second(&mut record, &rules);
        assert_eq!(record.red.bonus_time_remaining, 15);
    }

    #[test]
    fn test_start_without_runtime_is_noop() {
        let sink = CountingSink::new(10);
        let ticker_free = Clock::start(1, Arc::downgrade(&sink), NeverTicker);
        assert!(ticker_free.is_none());
    }

    struct NeverTicker;

    impl Ticker for NeverTicker {
        async fn tick(&mut self) {
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fails_when_match_unavailable() {
        let sink = Arc::new(CountingSink { ticks: AtomicU32::new(0), stop_after: 5, available: false });
        assert!(Clock::start(1, Arc::downgrade(&sink), NeverTicker).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_second() {
        let sink = CountingSink::new(100);
        let clock = start(&sink);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(sink.ticks(), 3);
        assert!(clock.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_skips_ticks_without_stopping() {
        let sink = CountingSink::new(100);
        let clock = start(&sink);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(clock.pause());
        assert!(!clock.pause(), "pause is idempotent");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.ticks(), 2);
        assert!(clock.is_running());

        assert!(clock.resume());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(sink.ticks(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_loop() {
        let sink = CountingSink::new(100);
        let clock = start(&sink);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        clock.stop();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(sink.ticks(), 1);
        assert!(!clock.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_can_finish_the_clock() {
        let sink = CountingSink::new(2);
        let clock = start(&sink);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.ticks(), 2);
        assert!(!clock.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sink_stops_clock() {
        let sink = CountingSink::new(100);
        let clock = start(&sink);
        drop(sink);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!clock.is_running());
    }
}
