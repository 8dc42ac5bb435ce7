//! Section Model

use serde::{Deserialize, Serialize};

/// A named area inside a restaurant holding an ordered run of tables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Section {
    pub id: String,
    pub restaurant_id: String,
    pub name: String,
    /// Ordering within the floor plan
    pub position: i64,
    pub created_at: Option<i64>,
}
