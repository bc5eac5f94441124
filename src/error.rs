use thiserror::Error;

use crate::conflict::PlacementError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid placement: {0}")]
    Placement(#[from] PlacementError),

    #[error("Slot not found: {0}")]
    SlotNotFound(i64),

    #[error("Topic not found: {0}")]
    TopicNotFound(i64),

    #[error("Subject not found: {0}")]
    SubjectNotFound(i64),

    #[error("A reverted schedule is still being saved; wait for it before editing again")]
    CommitPending,

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Destructive operation needs confirmation: {0}")]
    Unconfirmed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Persistence failures are worth retrying; validation failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Rejected(_) | Error::Io(_))
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
