use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),

    #[error("Decompression error")]
    Decompression,

    #[error("Corrupted data")]
    Corrupted,

    #[error("Checksum mismatch")]
    ChecksumMismatch,

    #[error("Version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Commit rejected: {0}")]
    CommitRejected(String),

    #[error("Store lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Whether re-issuing the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Io(_) => true,
            StoreError::CommitRejected(_) => true,
            StoreError::Corrupted => false,
            StoreError::ChecksumMismatch => false,
            StoreError::VersionMismatch { .. } => false,
            StoreError::LockPoisoned => false,
            _ => false,
        }
    }
}
