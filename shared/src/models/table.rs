//! Dining Table Model (桌台)

use serde::{Deserialize, Serialize};

/// Physical table state, driven by the table state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum TableState {
    Clean,
    Occupied,
    Dirty,
    Reserved,
    Unavailable,
}

impl TableState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Occupied => "occupied",
            Self::Dirty => "dirty",
            Self::Reserved => "reserved",
            Self::Unavailable => "unavailable",
        }
    }
}

impl std::fmt::Display for TableState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seat group type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum TableType {
    Booth,
    Bar,
    Table,
}

/// Floor placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum TableLocation {
    Inside,
    Outside,
    Patio,
}

/// Where a state change came from
///
/// - `ml` carries `(confidence, model_id)` in the log detail
/// - `host` carries the acting user id
/// - `system` carries the operation name (e.g. "visit.clear")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum StateSource {
    Ml,
    Host,
    System,
}

impl std::fmt::Display for StateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ml => "ml",
            Self::Host => "host",
            Self::System => "system",
        };
        f.write_str(s)
    }
}

/// Dining table entity
///
/// Invariant: `state == occupied` ⇔ `current_visit_id` points at an open
/// visit; the repository enforces this on every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct DiningTable {
    pub id: String,
    pub restaurant_id: String,
    pub section_id: Option<String>,
    /// Unique within the restaurant
    pub table_number: i64,
    /// 1..20 seats
    pub capacity: i64,
    pub table_type: TableType,
    pub location: TableLocation,
    pub state: TableState,
    /// Confidence of the last state write (0..1), ML sources only
    pub state_confidence: Option<f64>,
    pub state_updated_at: Option<i64>,
    pub current_visit_id: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

/// Create dining table payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiningTableCreate {
    pub section_id: Option<String>,
    pub table_number: i64,
    pub capacity: i64,
    pub table_type: TableType,
    pub location: TableLocation,
}

/// Append-only audit row for table state changes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct TableStateLog {
    pub id: i64,
    pub table_id: String,
    pub previous_state: TableState,
    pub next_state: TableState,
    pub confidence: Option<f64>,
    pub source: StateSource,
    /// Provenance payload: model id, user id, or operation name
    pub detail: Option<String>,
    pub created_at: i64,
}
