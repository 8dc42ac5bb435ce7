//! Scheduling Models — availability, preferences, requirements, schedules

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::waiter::WaiterRole;

/// Availability window kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum AvailabilityType {
    Available,
    Unavailable,
    Preferred,
}

/// A weekly-repeating availability window for one waiter
///
/// No overlapping same-type windows on one day (enforced at insert).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct StaffAvailability {
    pub id: String,
    pub waiter_id: String,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: i64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub availability_type: AvailabilityType,
    /// Effective range; open-ended when null
    pub effective_from: Option<NaiveDate>,
    pub effective_until: Option<NaiveDate>,
    pub created_at: Option<i64>,
}

impl StaffAvailability {
    /// Whether this window applies during the week starting `week_start`
    pub fn is_effective_on(&self, week_start: NaiveDate) -> bool {
        let week_end = week_start + chrono::Days::new(6);
        if let Some(from) = self.effective_from {
            if week_end < from {
                return false;
            }
        }
        if let Some(until) = self.effective_until {
            if week_start > until {
                return false;
            }
        }
        true
    }
}

/// Broad shift periods used in staff preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftType {
    Morning,
    Afternoon,
    Evening,
    Closing,
}

impl ShiftType {
    /// Classify a shift by its start hour
    pub fn classify(start: NaiveTime) -> Self {
        use chrono::Timelike;
        match start.hour() {
            6..=10 => Self::Morning,
            11..=15 => Self::Afternoon,
            16..=20 => Self::Evening,
            _ => Self::Closing,
        }
    }
}

/// One row of preferences per waiter
///
/// List columns are JSON TEXT; typed accessors tolerate malformed content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct StaffPreference {
    pub waiter_id: String,
    /// JSON array of roles
    pub preferred_roles: String,
    /// JSON array of shift types
    pub preferred_shift_types: String,
    /// JSON array of section ids
    pub preferred_sections: String,
    pub max_hours_per_week: Option<i64>,
    pub min_hours_per_week: Option<i64>,
    pub max_shifts_per_week: Option<i64>,
    pub avoid_clopening: bool,
    pub updated_at: Option<i64>,
}

impl StaffPreference {
    pub fn roles(&self) -> Vec<WaiterRole> {
        serde_json::from_str(&self.preferred_roles).unwrap_or_default()
    }

    pub fn shift_types(&self) -> Vec<ShiftType> {
        serde_json::from_str(&self.preferred_shift_types).unwrap_or_default()
    }

    pub fn sections(&self) -> Vec<String> {
        serde_json::from_str(&self.preferred_sections).unwrap_or_default()
    }
}

/// Coverage requirement for a weekly-repeating slot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct StaffingRequirement {
    pub id: String,
    pub restaurant_id: String,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: i64,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub role: WaiterRole,
    pub min_staff: i64,
    pub max_staff: Option<i64>,
    /// Prime shifts are tracked separately for fairness
    pub is_prime_shift: bool,
}

/// Weekly schedule lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum ScheduleStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// How a schedule (or item) came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum GeneratedBy {
    Manual,
    Engine,
    Suggestion,
}

/// Weekly schedule container
///
/// `(restaurant_id, week_start, version)` is unique; republishing the same
/// week archives the prior published version and bumps `version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Schedule {
    pub id: String,
    pub restaurant_id: String,
    /// Monday of the scheduled week
    pub week_start: NaiveDate,
    pub status: ScheduleStatus,
    pub version: i64,
    pub generated_by: GeneratedBy,
    pub schedule_run_id: Option<String>,
    /// Optional narrative summary (external narrator)
    pub summary: Option<String>,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

/// One assigned shift inside a schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ScheduleItem {
    pub id: String,
    pub schedule_id: String,
    pub waiter_id: String,
    pub role: WaiterRole,
    pub section_id: Option<String>,
    pub shift_date: NaiveDate,
    pub shift_start: NaiveTime,
    pub shift_end: NaiveTime,
    pub source: GeneratedBy,
    /// 0..100
    pub preference_match_score: f64,
    /// Signed; positive improved fairness
    pub fairness_impact_score: f64,
    pub created_at: Option<i64>,
}

/// Structured rationale for one schedule item
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ScheduleReasoning {
    pub id: i64,
    pub schedule_run_id: String,
    pub schedule_item_id: String,
    /// JSON array of rule lines
    pub reasons: String,
    /// JSON array of soft-violation notes
    pub constraint_violations: String,
    pub confidence: f64,
    /// Optional narrator paragraph; core functions without it
    pub narrative: Option<String>,
    pub created_at: i64,
}

impl ScheduleReasoning {
    pub fn reason_lines(&self) -> Vec<String> {
        serde_json::from_str(&self.reasons).unwrap_or_default()
    }

    pub fn violation_lines(&self) -> Vec<String> {
        serde_json::from_str(&self.constraint_violations).unwrap_or_default()
    }
}

/// Engine run status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum RunStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

/// One execution of the scheduling engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ScheduleRun {
    pub id: String,
    pub restaurant_id: String,
    pub week_start: NaiveDate,
    pub engine_version: String,
    pub run_status: RunStatus,
    /// JSON snapshot of the inputs the run saw
    pub inputs_snapshot: Option<String>,
    /// JSON summary metrics (items_created, coverage_pct, fairness_gini, ...)
    pub summary_metrics: Option<String>,
    pub error_message: Option<String>,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub created_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_type_classification() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(ShiftType::classify(t(7, 0)), ShiftType::Morning);
        assert_eq!(ShiftType::classify(t(11, 0)), ShiftType::Afternoon);
        assert_eq!(ShiftType::classify(t(17, 30)), ShiftType::Evening);
        assert_eq!(ShiftType::classify(t(22, 0)), ShiftType::Closing);
        assert_eq!(ShiftType::classify(t(2, 0)), ShiftType::Closing);
    }

    #[test]
    fn availability_effective_range() {
        let window = StaffAvailability {
            id: "a1".into(),
            waiter_id: "w1".into(),
            day_of_week: 5,
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
            availability_type: AvailabilityType::Available,
            effective_from: Some(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
            effective_until: Some(NaiveDate::from_ymd_opt(2025, 8, 31).unwrap()),
            created_at: None,
        };
        assert!(window.is_effective_on(NaiveDate::from_ymd_opt(2025, 7, 7).unwrap()));
        assert!(!window.is_effective_on(NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()));
        // A week straddling the start date still applies
        assert!(window.is_effective_on(NaiveDate::from_ymd_opt(2025, 5, 26).unwrap()));
    }
}
