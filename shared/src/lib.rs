//! Shared types for the restaurant operations backend
//!
//! Common types used by the server crate and external tooling:
//! the unified error system, domain model structs, and small utilities.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
