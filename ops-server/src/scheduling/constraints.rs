//! Constraint validator
//!
//! Hard constraints reject a candidate outright; soft constraints deduct
//! from a 100-point score and never reject.

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::Serialize;
use shared::models::{ShiftType, StaffAvailability, AvailabilityType, WaiterRole};

use crate::utils::time::{shift_hours, time_within, times_overlap};

/// Default weekly-hour cap when a waiter has no stated preference
pub const DEFAULT_MAX_HOURS: f64 = 40.0;
/// Statutory weekly maximum; never exceeded regardless of preferences
pub const LEGAL_MAX_HOURS: f64 = 48.0;
/// Minimum rest between a close and the next open
pub const CLOPENING_MIN_GAP_HOURS: f64 = 10.0;

const SHIFT_TYPE_DEDUCTION: f64 = 15.0;
const SECTION_DEDUCTION: f64 = 10.0;
const CLOPENING_DEDUCTION: f64 = 20.0;
const UNDER_MIN_HOURS_DEDUCTION_PER_HOUR: f64 = 5.0;

/// A candidate or committed shift assignment
#[derive(Debug, Clone, PartialEq)]
pub struct ShiftAssignment {
    pub shift_date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub role: WaiterRole,
    pub section_id: Option<String>,
}

impl ShiftAssignment {
    pub fn hours(&self) -> f64 {
        shift_hours(self.start, self.end)
    }

    pub fn day_of_week(&self) -> i64 {
        self.shift_date.weekday().num_days_from_monday() as i64
    }
}

/// Scheduling context for one staff member during a run
#[derive(Debug, Clone)]
pub struct StaffContext {
    pub waiter_id: String,
    pub name: String,
    pub role: WaiterRole,
    pub is_active: bool,
    pub availability: Vec<StaffAvailability>,
    pub preferred_roles: Vec<WaiterRole>,
    pub preferred_shift_types: Vec<ShiftType>,
    pub preferred_sections: Vec<String>,
    pub max_hours_per_week: Option<i64>,
    pub min_hours_per_week: Option<i64>,
    pub max_shifts_per_week: Option<i64>,
    pub avoid_clopening: bool,
    /// Assignments already made this week (running state)
    pub assigned: Vec<ShiftAssignment>,
}

impl StaffContext {
    pub fn assigned_hours(&self) -> f64 {
        self.assigned.iter().map(ShiftAssignment::hours).sum()
    }

    fn effective_max_hours(&self) -> f64 {
        self.max_hours_per_week
            .map(|h| h as f64)
            .unwrap_or(DEFAULT_MAX_HOURS)
            .min(LEGAL_MAX_HOURS)
    }
}

/// Hard-constraint failures (any one rejects the candidate)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HardViolation {
    NotActive,
    Unavailable,
    RoleMismatch,
    MaxHoursExceeded,
    MaxShiftsExceeded,
    OverlappingShift,
}

/// Soft deductions attached to a candidate for reasoning output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SoftDeduction {
    ShiftTypeMismatch { points: f64 },
    SectionMismatch { points: f64 },
    Clopening { points: f64, gap_hours: f64 },
    UnderMinHours { points: f64, hours_short: f64 },
}

impl SoftDeduction {
    pub fn points(&self) -> f64 {
        match self {
            Self::ShiftTypeMismatch { points }
            | Self::SectionMismatch { points }
            | Self::Clopening { points, .. }
            | Self::UnderMinHours { points, .. } => *points,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::ShiftTypeMismatch { .. } => "Shift type outside stated preferences".into(),
            Self::SectionMismatch { .. } => "Section is not a preferred section".into(),
            Self::Clopening { gap_hours, .. } => {
                format!("Close-open pattern with only {gap_hours:.1}h rest")
            }
            Self::UnderMinHours { hours_short, .. } => {
                format!("{hours_short:.1}h under the weekly minimum")
            }
        }
    }
}

/// Soft-constraint result: `100 − deductions`, floored at 0
#[derive(Debug, Clone)]
pub struct SoftScore {
    pub score: f64,
    pub deductions: Vec<SoftDeduction>,
}

/// Whether the staff member's availability admits `[start, end]` on the
/// assignment's weekday: an unavailable overlap rejects; otherwise an
/// available/preferred window must fully cover the shift.
fn is_available(staff: &StaffContext, assignment: &ShiftAssignment) -> bool {
    let dow = assignment.day_of_week();

    let mut covered = false;
    for window in staff.availability.iter().filter(|w| w.day_of_week == dow) {
        match window.availability_type {
            AvailabilityType::Unavailable => {
                if times_overlap(assignment.start, assignment.end, window.start_time, window.end_time)
                {
                    return false;
                }
            }
            AvailabilityType::Available | AvailabilityType::Preferred => {
                if time_within(assignment.start, assignment.end, window.start_time, window.end_time)
                {
                    covered = true;
                }
            }
        }
    }
    covered
}

/// Whether the shift sits inside a `preferred` window
fn in_preferred_window(staff: &StaffContext, assignment: &ShiftAssignment) -> bool {
    let dow = assignment.day_of_week();
    staff
        .availability
        .iter()
        .filter(|w| {
            w.day_of_week == dow && w.availability_type == AvailabilityType::Preferred
        })
        .any(|w| time_within(assignment.start, assignment.end, w.start_time, w.end_time))
}

fn role_compatible(staff_role: WaiterRole, required: WaiterRole) -> bool {
    staff_role == required
}

/// Rest gap in hours between two assignments on consecutive days (or the
/// same day), None when they are not adjacent enough to matter.
fn gap_hours(earlier: &ShiftAssignment, later: &ShiftAssignment) -> Option<f64> {
    let (first, second) = if earlier.shift_date <= later.shift_date {
        (earlier, later)
    } else {
        (later, earlier)
    };

    let day_diff = (second.shift_date - first.shift_date).num_days();
    if day_diff > 1 {
        return None;
    }

    let mut end_minutes = crate::utils::time::minutes_of_day(first.end);
    if first.end < first.start {
        end_minutes += 24 * 60; // overnight close
    }
    let start_minutes = crate::utils::time::minutes_of_day(second.start) + day_diff * 24 * 60;

    let gap = (start_minutes - end_minutes) as f64 / 60.0;
    if gap < 0.0 {
        return None; // overlapping handled elsewhere
    }
    Some(gap)
}

/// Validate hard constraints. Empty result = candidate is admissible.
pub fn check_hard(staff: &StaffContext, assignment: &ShiftAssignment) -> Vec<HardViolation> {
    let mut violations = Vec::new();

    if !staff.is_active {
        violations.push(HardViolation::NotActive);
    }

    if !is_available(staff, assignment) {
        violations.push(HardViolation::Unavailable);
    }

    let role_ok = if staff.preferred_roles.is_empty() {
        role_compatible(staff.role, assignment.role)
    } else {
        staff.preferred_roles.contains(&assignment.role)
    };
    if !role_ok {
        violations.push(HardViolation::RoleMismatch);
    }

    let projected = staff.assigned_hours() + assignment.hours();
    if projected > staff.effective_max_hours() || projected > LEGAL_MAX_HOURS {
        violations.push(HardViolation::MaxHoursExceeded);
    }

    if let Some(max_shifts) = staff.max_shifts_per_week {
        if staff.assigned.len() as i64 >= max_shifts {
            violations.push(HardViolation::MaxShiftsExceeded);
        }
    }

    let overlaps = staff.assigned.iter().any(|existing| {
        existing.shift_date == assignment.shift_date
            && times_overlap(assignment.start, assignment.end, existing.start, existing.end)
    });
    if overlaps {
        violations.push(HardViolation::OverlappingShift);
    }

    violations
}

/// Score soft constraints: deductions only, never rejection.
pub fn score_soft(staff: &StaffContext, assignment: &ShiftAssignment) -> SoftScore {
    let mut deductions = Vec::new();

    if !staff.preferred_shift_types.is_empty() {
        let shift_type = ShiftType::classify(assignment.start);
        if !staff.preferred_shift_types.contains(&shift_type) {
            deductions.push(SoftDeduction::ShiftTypeMismatch { points: SHIFT_TYPE_DEDUCTION });
        }
    }

    if let Some(section_id) = &assignment.section_id {
        if !staff.preferred_sections.is_empty() && !staff.preferred_sections.contains(section_id) {
            deductions.push(SoftDeduction::SectionMismatch { points: SECTION_DEDUCTION });
        }
    }

    if staff.avoid_clopening {
        let closing_gap = staff
            .assigned
            .iter()
            .filter_map(|existing| gap_hours(existing, assignment))
            .fold(f64::INFINITY, f64::min);
        if closing_gap < CLOPENING_MIN_GAP_HOURS {
            deductions.push(SoftDeduction::Clopening {
                points: CLOPENING_DEDUCTION,
                gap_hours: closing_gap,
            });
        }
    }

    if let Some(min_hours) = staff.min_hours_per_week {
        let projected = staff.assigned_hours() + assignment.hours();
        let short = min_hours as f64 - projected;
        if short > 0.0 {
            deductions.push(SoftDeduction::UnderMinHours {
                points: UNDER_MIN_HOURS_DEDUCTION_PER_HOUR * short,
                hours_short: short,
            });
        }
    }

    let total: f64 = deductions.iter().map(SoftDeduction::points).sum();
    SoftScore { score: (100.0 - total).max(0.0), deductions }
}

/// Preference bonus for the engine's total score:
/// role +20, shift type +15, section +10, prime slot in a preferred
/// window +10 — capped at 100.
pub fn preference_bonus(
    staff: &StaffContext,
    assignment: &ShiftAssignment,
    is_prime_shift: bool,
) -> f64 {
    let mut bonus: f64 = 0.0;
    if staff.preferred_roles.contains(&assignment.role) {
        bonus += 20.0;
    }
    if staff.preferred_shift_types.contains(&ShiftType::classify(assignment.start)) {
        bonus += 15.0;
    }
    if let Some(section_id) = &assignment.section_id {
        if staff.preferred_sections.contains(section_id) {
            bonus += 10.0;
        }
    }
    if is_prime_shift && in_preferred_window(staff, assignment) {
        bonus += 10.0;
    }
    bonus.min(100.0)
}

/// Whether the shift lands inside a `preferred` availability window
/// (exposed for reasoning lines).
pub fn prefers_this_time(staff: &StaffContext, assignment: &ShiftAssignment) -> bool {
    in_preferred_window(staff, assignment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        // 2025-06-02 is a Monday
        NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
    }

    fn window(dow: i64, start: NaiveTime, end: NaiveTime, kind: AvailabilityType) -> StaffAvailability {
        StaffAvailability {
            id: shared::util::new_id(),
            waiter_id: "w1".into(),
            day_of_week: dow,
            start_time: start,
            end_time: end,
            availability_type: kind,
            effective_from: None,
            effective_until: None,
            created_at: None,
        }
    }

    fn staff_with(availability: Vec<StaffAvailability>) -> StaffContext {
        StaffContext {
            waiter_id: "w1".into(),
            name: "W1".into(),
            role: WaiterRole::Server,
            is_active: true,
            availability,
            preferred_roles: Vec::new(),
            preferred_shift_types: Vec::new(),
            preferred_sections: Vec::new(),
            max_hours_per_week: None,
            min_hours_per_week: None,
            max_shifts_per_week: None,
            avoid_clopening: true,
            assigned: Vec::new(),
        }
    }

    fn assignment(day: u32, start: NaiveTime, end: NaiveTime) -> ShiftAssignment {
        ShiftAssignment {
            shift_date: d(day),
            start,
            end,
            role: WaiterRole::Server,
            section_id: None,
        }
    }

    #[test]
    fn covered_window_passes_availability() {
        let staff = staff_with(vec![window(0, t(9, 0), t(17, 0), AvailabilityType::Available)]);
        let a = assignment(2, t(11, 0), t(15, 0)); // Monday
        assert!(check_hard(&staff, &a).is_empty());
    }

    #[test]
    fn partial_cover_is_unavailable() {
        let staff = staff_with(vec![window(0, t(9, 0), t(13, 0), AvailabilityType::Available)]);
        let a = assignment(2, t(11, 0), t(15, 0));
        assert!(check_hard(&staff, &a).contains(&HardViolation::Unavailable));
    }

    #[test]
    fn unavailable_overlap_rejects_even_with_cover() {
        let staff = staff_with(vec![
            window(0, t(9, 0), t(17, 0), AvailabilityType::Available),
            window(0, t(12, 0), t(13, 0), AvailabilityType::Unavailable),
        ]);
        let a = assignment(2, t(11, 0), t(15, 0));
        assert!(check_hard(&staff, &a).contains(&HardViolation::Unavailable));
    }

    #[test]
    fn weekly_hour_caps_apply() {
        let mut staff = staff_with(vec![window(0, t(0, 0), t(23, 59), AvailabilityType::Available)]);
        staff.max_hours_per_week = Some(40);
        // 37 hours already assigned: the next 4-hour shift breaks the cap
        for day in 3..8 {
            staff.assigned.push(assignment(day, t(10, 0), t(17, 24)));
        }
        let hours = staff.assigned_hours();
        assert!(hours > 36.0 && hours < 38.0);

        let a = assignment(2, t(10, 0), t(14, 0));
        assert!(check_hard(&staff, &a).contains(&HardViolation::MaxHoursExceeded));
    }

    #[test]
    fn legal_cap_binds_even_with_high_preference() {
        let mut staff = staff_with(vec![window(0, t(0, 0), t(23, 59), AvailabilityType::Available)]);
        staff.max_hours_per_week = Some(60); // preference beyond the law
        for day in 3..8 {
            staff.assigned.push(assignment(day, t(8, 0), t(17, 30)));
        }
        let a = assignment(2, t(10, 0), t(14, 0));
        assert!(check_hard(&staff, &a).contains(&HardViolation::MaxHoursExceeded));
    }

    #[test]
    fn overlapping_shift_is_rejected() {
        let mut staff = staff_with(vec![window(0, t(0, 0), t(23, 59), AvailabilityType::Available)]);
        staff.assigned.push(assignment(2, t(10, 0), t(14, 0)));
        let a = assignment(2, t(13, 0), t(17, 0));
        assert!(check_hard(&staff, &a).contains(&HardViolation::OverlappingShift));
    }

    #[test]
    fn preferred_roles_gate_the_role() {
        let mut staff = staff_with(vec![window(4, t(0, 0), t(23, 59), AvailabilityType::Available)]);
        staff.preferred_roles = vec![WaiterRole::Bartender];
        let a = ShiftAssignment { role: WaiterRole::Server, ..assignment(6, t(17, 0), t(23, 0)) };
        assert!(check_hard(&staff, &a).contains(&HardViolation::RoleMismatch));
    }

    #[test]
    fn clopening_deducts_twenty_points() {
        let mut staff = staff_with(Vec::new());
        // Closes Monday 23:00, opens Tuesday 08:00 → 9h rest
        staff.assigned.push(assignment(2, t(15, 0), t(23, 0)));
        let a = assignment(3, t(8, 0), t(12, 0));

        let soft = score_soft(&staff, &a);
        assert!(soft
            .deductions
            .iter()
            .any(|d| matches!(d, SoftDeduction::Clopening { .. })));
        assert_eq!(soft.score, 80.0);
    }

    #[test]
    fn long_rest_is_not_clopening() {
        let mut staff = staff_with(Vec::new());
        staff.assigned.push(assignment(2, t(15, 0), t(21, 0)));
        let a = assignment(3, t(10, 0), t(14, 0)); // 13h rest
        let soft = score_soft(&staff, &a);
        assert!(soft.deductions.is_empty());
        assert_eq!(soft.score, 100.0);
    }

    #[test]
    fn under_min_hours_deducts_per_hour_short() {
        let mut staff = staff_with(Vec::new());
        staff.min_hours_per_week = Some(20);
        // First 4-hour shift of the week: 16 hours short → −80, floored later
        let a = assignment(2, t(10, 0), t(14, 0));
        let soft = score_soft(&staff, &a);
        let deduction = soft
            .deductions
            .iter()
            .find(|d| matches!(d, SoftDeduction::UnderMinHours { .. }))
            .unwrap();
        assert_eq!(deduction.points(), 80.0);
        assert_eq!(soft.score, 20.0);
    }

    #[test]
    fn shift_type_mismatch_deducts_fifteen() {
        let mut staff = staff_with(Vec::new());
        staff.preferred_shift_types = vec![ShiftType::Morning];
        let a = assignment(6, t(18, 0), t(23, 0));
        let soft = score_soft(&staff, &a);
        assert_eq!(soft.score, 85.0);
    }

    #[test]
    fn preference_bonus_caps_at_one_hundred() {
        let mut staff = staff_with(vec![window(5, t(16, 0), t(23, 59), AvailabilityType::Preferred)]);
        staff.preferred_roles = vec![WaiterRole::Server];
        staff.preferred_shift_types = vec![ShiftType::Evening];
        staff.preferred_sections = vec!["sec-1".into()];

        let a = ShiftAssignment {
            section_id: Some("sec-1".into()),
            ..assignment(7, t(17, 0), t(22, 0)) // Saturday evening
        };
        let bonus = preference_bonus(&staff, &a, true);
        assert_eq!(bonus, 55.0); // 20 + 15 + 10 + 10
        assert!(bonus <= 100.0);
    }
}
