//! Waiter Model (服务员)

use serde::{Deserialize, Serialize};

/// Staff role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum WaiterRole {
    Server,
    Bartender,
    Host,
    Busser,
    Runner,
}

impl WaiterRole {
    /// Roles eligible to take parties from the router
    pub fn can_take_tables(&self) -> bool {
        matches!(self, Self::Server | Self::Bartender)
    }
}

/// Coarse performance bucket derived from composite score percentiles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum WaiterTier {
    Strong,
    #[default]
    Standard,
    Developing,
}

/// Waiter entity with lifetime totals
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Waiter {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: WaiterRole,
    pub tier: WaiterTier,
    /// Blended performance score 0..100 (turn time 0.3 + tip% 0.4 + covers 0.3)
    pub composite_score: f64,
    pub tier_updated_at: Option<i64>,
    pub total_shifts: i64,
    pub total_covers: i64,
    pub total_tips: f64,
    pub is_active: bool,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

/// Create waiter payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaiterCreate {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: WaiterRole,
}
