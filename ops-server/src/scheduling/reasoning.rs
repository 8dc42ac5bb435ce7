//! Structured reasoning lines for schedule items
//!
//! One line per reason the engine had for an assignment: availability
//! match, preference match, fairness delta, forecast contribution. These
//! lines are the canonical rationale; narrative prose is optional on top.

use shared::models::{ShiftType, StaffingRequirement};

use crate::scheduling::constraints::{
    prefers_this_time, ShiftAssignment, SoftScore, StaffContext,
};

/// Build the reason and violation lines for one accepted assignment.
pub fn build_reasons(
    staff: &StaffContext,
    assignment: &ShiftAssignment,
    soft: &SoftScore,
    fairness_impact: f64,
    requirement: &StaffingRequirement,
    forecast_covers_for_day: f64,
) -> (Vec<String>, Vec<String>) {
    let mut reasons = Vec::new();

    // Availability: the candidate passed the hard check to get here
    if prefers_this_time(staff, assignment) {
        reasons.push(format!(
            "{} marked {}–{} as a preferred time to work",
            staff.name, assignment.start, assignment.end
        ));
    } else {
        reasons.push(format!(
            "{} is available for the full {}–{} window",
            staff.name, assignment.start, assignment.end
        ));
    }

    if staff.preferred_roles.contains(&assignment.role) {
        reasons.push(format!("{:?} is a preferred role", assignment.role));
    }
    if staff
        .preferred_shift_types
        .contains(&ShiftType::classify(assignment.start))
    {
        reasons.push("Shift type matches stated preference".into());
    }
    if let Some(section_id) = &assignment.section_id {
        if staff.preferred_sections.contains(section_id) {
            reasons.push("Section matches stated preference".into());
        }
    }

    if fairness_impact > 0.0 {
        reasons.push(format!(
            "Assignment improves schedule fairness ({fairness_impact:+.1})"
        ));
    }

    if requirement.is_prime_shift {
        reasons.push("Covers a prime (high-demand) slot".into());
    }
    if forecast_covers_for_day > 0.0 {
        reasons.push(format!(
            "Forecast expects ~{:.0} covers that day",
            forecast_covers_for_day
        ));
    }

    let violations = soft.deductions.iter().map(|d| d.describe()).collect();
    (reasons, violations)
}
