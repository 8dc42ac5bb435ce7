//! Visit Model — one table occupancy session

use serde::{Deserialize, Serialize};

/// Table occupancy from seating to clear
///
/// `duration_minutes` is derived when `cleared_at` is set;
/// `tip_percentage` is derived when both total and tip are known.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Visit {
    pub id: String,
    pub restaurant_id: String,
    pub table_id: String,
    /// Null for camera-observed walk-ins until a host assigns a waiter
    pub waiter_id: Option<String>,
    pub shift_id: Option<String>,
    /// Waitlist entry this party came from, if any
    pub waitlist_id: Option<String>,
    /// Set when the visit is transferred between waiters
    pub original_waiter_id: Option<String>,
    pub party_size: i64,
    /// Covers observed by the classifier, when available
    pub actual_covers: Option<i64>,
    // Milestones (Unix millis)
    pub seated_at: i64,
    pub first_served_at: Option<i64>,
    pub payment_at: Option<i64>,
    pub cleared_at: Option<i64>,
    /// Turn time, computed at clear
    pub duration_minutes: Option<f64>,
    // Money
    pub subtotal: Option<f64>,
    pub tax: Option<f64>,
    pub total: Option<f64>,
    pub tip: Option<f64>,
    pub tip_percentage: Option<f64>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl Visit {
    /// A visit is open until it is cleared
    pub fn is_open(&self) -> bool {
        self.cleared_at.is_none()
    }
}

/// Payment summary attached when the check closes
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisitTotals {
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub tip: f64,
}
