use thiserror::Error;

use crate::models::{MatchId, MatchStatus};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u32 },

    #[error("Match {match_id} is {status}, cannot {action}")]
    InvalidState { match_id: MatchId, status: MatchStatus, action: &'static str },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl ScoringError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ScoringError::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: u32) -> Self {
        ScoringError::NotFound { kind, id }
    }

    /// Errors the caller can fix and re-issue. Storage and config failures are
    /// operator problems.
    pub fn is_client_error(&self) -> bool {
        match self {
            ScoringError::Validation(_) => true,
            ScoringError::NotFound { .. } => true,
            ScoringError::InvalidState { .. } => true,
            ScoringError::InvalidTransition { .. } => true,
            ScoringError::Config(_) => false,
            ScoringError::Storage(_) => false,
        }
    }
}

impl From<validator::ValidationErrors> for ScoringError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ScoringError::Validation(errors.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScoringError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(ScoringError::validation("missing team").is_client_error());
        assert!(ScoringError::not_found("match", 3).is_client_error());
        assert!(!ScoringError::Config("bad".into()).is_client_error());
        assert!(!ScoringError::Storage(StoreError::Corrupted).is_client_error());
    }

    #[test]
    fn test_display_messages() {
        let err = ScoringError::not_found("event", 12);
        assert_eq!(err.to_string(), "event 12 not found");

        let err = ScoringError::InvalidState {
            match_id: 4,
            status: MatchStatus::Finalized,
            action: "record events",
        };
        assert_eq!(err.to_string(), "Match 4 is finalized, cannot record events");
    }
}
