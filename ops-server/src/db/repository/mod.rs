//! Repository Module
//!
//! Function-style repositories over `&SqlitePool`, one module per entity.
//! Compound operations that must be atomic open a transaction internally.
//! Optimistic concurrency is expressed as conditional UPDATEs: a statement
//! whose precondition no longer holds affects zero rows and surfaces as
//! [`RepoError::Conflict`], leaving state unchanged.

pub mod availability;
pub mod camera;
pub mod dispatch_log;
pub mod metrics;
pub mod order_item;
pub mod restaurant;
pub mod schedule;
pub mod section;
pub mod shift;
pub mod table;
pub mod visit;
pub mod waiter;
pub mod waitlist;

use shared::{AppError, ErrorCode};
use thiserror::Error;

/// Repository error types — the State Store failure model
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique-key collision (insert-level duplicates)
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Optimistic-concurrency loss: the precondition no longer held
    #[error("Conflict: {0}")]
    Conflict(String),

    /// State-machine or data invariant would be violated
    #[error("Invariant: {0}")]
    Invariant(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound("row not found".into()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Duplicate(db.message().to_string())
            }
            _ => RepoError::Database(err.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::with_message(ErrorCode::NotFound, msg),
            RepoError::Duplicate(msg) => AppError::with_message(ErrorCode::AlreadyExists, msg),
            RepoError::Conflict(msg) => AppError::with_message(ErrorCode::Conflict, msg),
            RepoError::Invariant(msg) => AppError::with_message(ErrorCode::InvalidRequest, msg),
            RepoError::Validation(msg) => AppError::validation(msg),
            RepoError::Database(msg) => AppError::database(msg),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
