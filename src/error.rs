use thiserror::Error;

use crate::types::Amount;

/// Validation and ownership failures.
///
/// These are surfaced to the caller before any write happens, so they
/// never leave a partial effect behind.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("event `{0}` does not exist")]
    UnknownEvent(i64),

    #[error("participant `{0}` is not registered")]
    UnknownParticipant(i64),

    #[error("event `{0}` belongs to another user")]
    ForeignEvent(i64),

    #[error("a round must contain at least one outcome")]
    EmptyOutcomes,

    #[error("invalid amount `{0}` for participant `{1}`: paid amounts cannot be negative")]
    NegativeAmount(Amount, i64),

    #[error("invalid participant name: names cannot be empty")]
    EmptyParticipantName,

    #[error("invalid date `{0}` in snapshot: expected a calendar date or an RFC 3339 timestamp")]
    InvalidSnapshotDate(String),
}

impl InputError {
    pub fn unknown_event(event_id: i64) -> Self {
        InputError::UnknownEvent(event_id)
    }

    pub fn unknown_participant(participant_id: i64) -> Self {
        InputError::UnknownParticipant(participant_id)
    }

    pub fn foreign_event(event_id: i64) -> Self {
        InputError::ForeignEvent(event_id)
    }

    pub fn empty_outcomes() -> Self {
        InputError::EmptyOutcomes
    }

    pub fn negative_amount(amount: Amount, participant_id: i64) -> Self {
        InputError::NegativeAmount(amount, participant_id)
    }

    pub fn empty_participant_name() -> Self {
        InputError::EmptyParticipantName
    }

    pub fn invalid_snapshot_date(date: String) -> Self {
        InputError::InvalidSnapshotDate(date)
    }
}

/// Failure inside the entity store.
///
/// Multi-statement operations run in a transaction and roll back before
/// this is returned, so no partial write is ever observable.
#[derive(Error)]
#[error("{message}")]
pub struct StoreError {
    message: String,
    cause: Option<anyhow::Error>,
}

impl StoreError {
    pub fn new<T: AsRef<str>>(message: T, cause: anyhow::Error) -> Self {
        StoreError {
            message: message.as_ref().to_string(),
            cause: Some(cause),
        }
    }

    /// A row that was validated upstream vanished before the write ran.
    pub fn concurrency(message: &str) -> Self {
        StoreError {
            message: format!("concurrency error: {message}"),
            cause: None,
        }
    }
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {:?}", self.message, cause),
            None => write!(f, "{}", self.message),
        }
    }
}
