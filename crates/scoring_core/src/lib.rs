//! # scoring_core - Live Match Scoring Engine
//!
//! Scoring backend for a two-alliance robotics competition: a one-second
//! match clock with endgame and bonus windows, an append-only score book,
//! ranking points, and the match lifecycle from schedule to finalization.
//!
//! ## Features
//! - Single writer: every transition commits one all-or-nothing batch
//! - Notifications published only after the commit they describe
//! - Field-fault pause without losing match time
//! - Snapshot-backed store (MessagePack + LZ4 + SHA-256)

// Struct initialization pattern used intentionally
#![allow(clippy::field_reassign_with_default)]
// Doc formatting lints - purely cosmetic
#![allow(clippy::doc_lazy_continuation)]

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod publish;
pub mod store;

pub use config::{PointTable, RulesConfig};
pub use engine::MatchController;
pub use error::{Result, ScoringError};
pub use models::{
    Alliance, EventInput, EventKind, MatchRecord, MatchSetup, MatchStatus, MatchType, ScoreEvent,
    Team, TeamRegistration,
};
pub use publish::{BroadcastPublisher, Notification, Publisher};
pub use store::{MemoryStore, Store};
