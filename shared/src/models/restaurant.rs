//! Restaurant Model

use serde::{Deserialize, Serialize};

/// Router branch selection (spec: section vs rotation)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    /// Waiters only take tables in their assigned section
    #[default]
    Section,
    /// Round-robin across all waiters with active shifts
    Rotation,
}

/// Per-restaurant routing knobs, stored inside `restaurants.config`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingSettings {
    pub mode: RoutingMode,
    pub max_tables_per_waiter: i64,
    pub efficiency_weight: f64,
    pub workload_penalty: f64,
    pub tip_penalty: f64,
    pub recency_penalty_minutes: i64,
    pub recency_penalty_weight: f64,
}

impl Default for RoutingSettings {
    fn default() -> Self {
        Self {
            mode: RoutingMode::Section,
            max_tables_per_waiter: 5,
            efficiency_weight: 1.0,
            workload_penalty: 3.0,
            tip_penalty: 2.0,
            recency_penalty_minutes: 5,
            recency_penalty_weight: 1.5,
        }
    }
}

/// Staffing alert thresholds, as a ratio of forecast demand
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertSettings {
    pub understaffed_threshold: f64,
    pub overstaffed_threshold: f64,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            understaffed_threshold: 0.8,
            overstaffed_threshold: 1.3,
        }
    }
}

/// Structured view of the restaurant configuration map
///
/// Unknown keys in the stored JSON are ignored on read and preserved on
/// write (the raw column is only rewritten through [`RestaurantConfig`]
/// round-trips at bounded endpoints).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RestaurantConfig {
    pub routing: RoutingSettings,
    pub alerts: AlertSettings,
}

/// Restaurant entity — root of the ownership tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    /// IANA timezone name, e.g. "America/New_York"
    pub timezone: String,
    /// Configuration map (JSON): routing weights, alert thresholds
    pub config: String,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl Restaurant {
    /// Parse the configuration column, falling back to defaults on any
    /// malformed content so that a bad config can never break routing.
    pub fn parsed_config(&self) -> RestaurantConfig {
        serde_json::from_str(&self.config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_routing_spec() {
        let cfg = RestaurantConfig::default();
        assert_eq!(cfg.routing.mode, RoutingMode::Section);
        assert_eq!(cfg.routing.max_tables_per_waiter, 5);
        assert_eq!(cfg.routing.workload_penalty, 3.0);
        assert_eq!(cfg.routing.recency_penalty_minutes, 5);
    }

    #[test]
    fn malformed_config_falls_back_to_defaults() {
        let r = Restaurant {
            id: "r1".into(),
            name: "Test".into(),
            timezone: "UTC".into(),
            config: "{not json".into(),
            created_at: None,
            updated_at: None,
        };
        assert_eq!(r.parsed_config().routing.max_tables_per_waiter, 5);
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let r = Restaurant {
            id: "r1".into(),
            name: "Test".into(),
            timezone: "UTC".into(),
            config: r#"{"routing":{"mode":"rotation"}}"#.into(),
            created_at: None,
            updated_at: None,
        };
        let cfg = r.parsed_config();
        assert_eq!(cfg.routing.mode, RoutingMode::Rotation);
        assert_eq!(cfg.routing.tip_penalty, 2.0);
    }
}
