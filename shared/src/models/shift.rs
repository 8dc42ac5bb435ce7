//! Shift Model (班次)

use serde::{Deserialize, Serialize};

/// Shift status — at most one non-ended shift per waiter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum ShiftStatus {
    #[default]
    Active,
    OnBreak,
    Ended,
}

impl ShiftStatus {
    /// Non-ended statuses keep the waiter in the candidate pool
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Ended)
    }
}

/// Waiter work session with mutable service aggregates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Shift {
    pub id: String,
    pub restaurant_id: String,
    pub waiter_id: String,
    /// Section assignment for section-mode routing
    pub section_id: Option<String>,
    pub status: ShiftStatus,
    /// Clock-in time (Unix millis)
    pub clock_in: i64,
    /// Clock-out time (Unix millis), null while open
    pub clock_out: Option<i64>,
    pub tables_served: i64,
    pub total_covers: i64,
    pub total_tips: f64,
    pub total_sales: f64,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}
