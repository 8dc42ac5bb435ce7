//! Order line items (POS ingest surface feeding the menu rollups)

use serde::{Deserialize, Serialize};

/// One ordered line attached to a visit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub visit_id: String,
    pub menu_item: String,
    pub quantity: i64,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    pub ordered_at: i64,
}

/// Create payload for an order line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemCreate {
    pub menu_item: String,
    pub quantity: i64,
    pub unit_price: Option<f64>,
}
