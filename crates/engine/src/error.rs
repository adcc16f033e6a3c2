//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`NotFound`] thrown when a referenced entity does not exist.
//! - [`InvalidStateTransition`] thrown when a lifecycle step is not legal from
//!   the current status.
//! - [`InsufficientFunds`] thrown when a withdrawal or deduction would make a
//!   balance negative.
//! - [`Validation`] thrown when an input is missing or out of range.
//! - [`ConcurrencyConflict`] thrown when a row changed between check and
//!   commit.
//! - [`Database`] wraps any other persistence failure.
//!
//!  [`NotFound`]: EngineError::NotFound
//!  [`InvalidStateTransition`]: EngineError::InvalidStateTransition
//!  [`InsufficientFunds`]: EngineError::InsufficientFunds
//!  [`Validation`]: EngineError::Validation
//!  [`ConcurrencyConflict`]: EngineError::ConcurrencyConflict
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" not found!")]
    NotFound(String),
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Concurrent modification: {0}")]
    ConcurrencyConflict(String),
    #[error("\"{0}\" already present!")]
    AlreadyExists(String),
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Database(DbErr),
}

impl From<DbErr> for EngineError {
    fn from(err: DbErr) -> Self {
        // SQLite reports a competing writer as a busy/locked database.
        let message = err.to_string();
        if message.contains("database is locked") || message.contains("database is busy") {
            return Self::ConcurrencyConflict(message);
        }
        Self::Database(err)
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NotFound(a), Self::NotFound(b)) => a == b,
            (Self::InvalidStateTransition(a), Self::InvalidStateTransition(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::ConcurrencyConflict(a), Self::ConcurrencyConflict(b)) => a == b,
            (Self::AlreadyExists(a), Self::AlreadyExists(b)) => a == b,
            (Self::InvalidData(a), Self::InvalidData(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
