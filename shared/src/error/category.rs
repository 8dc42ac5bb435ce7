//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// Categories are determined by the leading digit of the error code:
/// - 0xxx: General errors
/// - 1xxx: Table errors
/// - 2xxx: Routing errors
/// - 3xxx: Scheduling errors
/// - 4xxx: Camera / pipeline errors
/// - 5xxx: Staff / visit errors
/// - 9xxx: System errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Table state errors (1xxx)
    Table,
    /// Routing errors (2xxx)
    Routing,
    /// Scheduling errors (3xxx)
    Scheduling,
    /// Camera / pipeline errors (4xxx)
    Pipeline,
    /// Staff / visit errors (5xxx)
    Staff,
    /// System errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            1000..2000 => Self::Table,
            2000..3000 => Self::Routing,
            3000..4000 => Self::Scheduling,
            4000..5000 => Self::Pipeline,
            5000..6000 => Self::Staff,
            _ => Self::System,
        }
    }

    /// Whether errors in this category should be retried by the caller
    ///
    /// Only optimistic-concurrency losses and transient system faults are
    /// worth retrying; everything else needs a changed request.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::System)
    }

    /// Human-readable category name
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Table => "table",
            Self::Routing => "routing",
            Self::Scheduling => "scheduling",
            Self::Pipeline => "pipeline",
            Self::Staff => "staff",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_code_ranges() {
        assert_eq!(ErrorCategory::from_code(3), ErrorCategory::General);
        assert_eq!(ErrorCategory::from_code(1002), ErrorCategory::Table);
        assert_eq!(ErrorCategory::from_code(2004), ErrorCategory::Routing);
        assert_eq!(ErrorCategory::from_code(3002), ErrorCategory::Scheduling);
        assert_eq!(ErrorCategory::from_code(4003), ErrorCategory::Pipeline);
        assert_eq!(ErrorCategory::from_code(5002), ErrorCategory::Staff);
        assert_eq!(ErrorCategory::from_code(9003), ErrorCategory::System);
    }

    #[test]
    fn code_category_matches_range() {
        assert_eq!(ErrorCode::InvalidTransition.category(), ErrorCategory::Table);
        assert_eq!(ErrorCode::SeatConflict.category(), ErrorCategory::Routing);
        assert_eq!(ErrorCode::DatabaseError.category(), ErrorCategory::System);
    }
}
