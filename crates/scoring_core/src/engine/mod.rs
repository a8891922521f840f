//! Scoring engine: the match clock, the score book, ranking points and the
//! controller that ties them to storage and publication.

pub mod admin;
pub mod clock;
pub mod controller;
pub mod ranking;
pub mod score_book;

pub use clock::{advance_one_second, Clock, IntervalTicker, TickFlow, TickReport, TickSink, Ticker};
pub use controller::MatchController;
pub use ranking::{ranking_rows, recompute_rankings, RankingEngine};
pub use score_book::{Reversal, ScoreBook};
