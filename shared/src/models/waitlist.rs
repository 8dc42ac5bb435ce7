//! Waitlist Model — queued parties

use serde::{Deserialize, Serialize};

use super::table::{TableLocation, TableType};

/// Waitlist entry lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum WaitlistStatus {
    #[default]
    Waiting,
    Seated,
    WalkedAway,
}

/// Party preference for table type; `none` means no preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum TablePreference {
    Booth,
    Bar,
    Table,
    #[default]
    None,
}

impl TablePreference {
    /// The table type this preference matches, if it names one
    pub fn matches(&self, table_type: TableType) -> bool {
        matches!(
            (self, table_type),
            (Self::Booth, TableType::Booth)
                | (Self::Bar, TableType::Bar)
                | (Self::Table, TableType::Table)
        )
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Party preference for location; `none` means no preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum LocationPreference {
    Inside,
    Outside,
    Patio,
    #[default]
    None,
}

impl LocationPreference {
    pub fn matches(&self, location: TableLocation) -> bool {
        matches!(
            (self, location),
            (Self::Inside, TableLocation::Inside)
                | (Self::Outside, TableLocation::Outside)
                | (Self::Patio, TableLocation::Patio)
        )
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// A queued party waiting to be seated
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct WaitlistEntry {
    pub id: String,
    pub restaurant_id: String,
    pub party_name: Option<String>,
    pub party_size: i64,
    pub table_preference: TablePreference,
    pub location_preference: LocationPreference,
    pub status: WaitlistStatus,
    pub quoted_wait_minutes: Option<i64>,
    /// Linked visit once seated
    pub visit_id: Option<String>,
    pub created_at: i64,
    pub seated_at: Option<i64>,
}
