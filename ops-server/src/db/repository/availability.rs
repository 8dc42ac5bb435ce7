//! Staff Availability, Preferences, and Staffing Requirement Repositories

use chrono::{NaiveDate, NaiveTime};
use shared::models::{
    AvailabilityType, StaffAvailability, StaffPreference, StaffingRequirement, WaiterRole,
};
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;

use crate::utils::time::times_overlap;

use super::{RepoError, RepoResult};

const AVAILABILITY_COLUMNS: &str = "id, waiter_id, day_of_week, start_time, end_time, \
     availability_type, effective_from, effective_until, created_at";
const PREFERENCE_COLUMNS: &str = "waiter_id, preferred_roles, preferred_shift_types, \
     preferred_sections, max_hours_per_week, min_hours_per_week, max_shifts_per_week, \
     avoid_clopening, updated_at";
const REQUIREMENT_COLUMNS: &str = "id, restaurant_id, day_of_week, start_time, end_time, role, \
     min_staff, max_staff, is_prime_shift";

/// Add an availability window. Overlapping same-type windows on the same
/// day are rejected (data-model invariant).
#[allow(clippy::too_many_arguments)]
pub async fn add_availability(
    pool: &SqlitePool,
    waiter_id: &str,
    day_of_week: i64,
    start_time: NaiveTime,
    end_time: NaiveTime,
    availability_type: AvailabilityType,
    effective_from: Option<NaiveDate>,
    effective_until: Option<NaiveDate>,
) -> RepoResult<StaffAvailability> {
    if !(0..=6).contains(&day_of_week) {
        return Err(RepoError::Validation(format!(
            "day_of_week must be 0..=6, got {day_of_week}"
        )));
    }

    let existing = list_availability(pool, waiter_id).await?;
    for window in existing
        .iter()
        .filter(|w| w.day_of_week == day_of_week && w.availability_type == availability_type)
    {
        if times_overlap(start_time, end_time, window.start_time, window.end_time) {
            return Err(RepoError::Invariant(format!(
                "Overlapping {availability_type:?} window on day {day_of_week}"
            )));
        }
    }

    let id = new_id();
    sqlx::query(
        "INSERT INTO staff_availability (id, waiter_id, day_of_week, start_time, end_time, \
         availability_type, effective_from, effective_until, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(waiter_id)
    .bind(day_of_week)
    .bind(start_time)
    .bind(end_time)
    .bind(availability_type)
    .bind(effective_from)
    .bind(effective_until)
    .bind(now_millis())
    .execute(pool)
    .await?;

    let window = sqlx::query_as::<_, StaffAvailability>(&format!(
        "SELECT {AVAILABILITY_COLUMNS} FROM staff_availability WHERE id = ?"
    ))
    .bind(&id)
    .fetch_one(pool)
    .await?;
    Ok(window)
}

pub async fn list_availability(
    pool: &SqlitePool,
    waiter_id: &str,
) -> RepoResult<Vec<StaffAvailability>> {
    let windows = sqlx::query_as::<_, StaffAvailability>(&format!(
        "SELECT {AVAILABILITY_COLUMNS} FROM staff_availability WHERE waiter_id = ? \
         ORDER BY day_of_week, start_time"
    ))
    .bind(waiter_id)
    .fetch_all(pool)
    .await?;
    Ok(windows)
}

/// Insert or replace the single preference row for a waiter
#[allow(clippy::too_many_arguments)]
pub async fn upsert_preference(
    pool: &SqlitePool,
    waiter_id: &str,
    preferred_roles: &[WaiterRole],
    preferred_shift_types: &[shared::models::ShiftType],
    preferred_sections: &[String],
    max_hours_per_week: Option<i64>,
    min_hours_per_week: Option<i64>,
    max_shifts_per_week: Option<i64>,
    avoid_clopening: bool,
) -> RepoResult<StaffPreference> {
    let roles = serde_json::to_string(preferred_roles)
        .map_err(|e| RepoError::Validation(e.to_string()))?;
    let shift_types = serde_json::to_string(preferred_shift_types)
        .map_err(|e| RepoError::Validation(e.to_string()))?;
    let sections = serde_json::to_string(preferred_sections)
        .map_err(|e| RepoError::Validation(e.to_string()))?;

    sqlx::query(
        "INSERT INTO staff_preferences (waiter_id, preferred_roles, preferred_shift_types, \
         preferred_sections, max_hours_per_week, min_hours_per_week, max_shifts_per_week, \
         avoid_clopening, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
         ON CONFLICT(waiter_id) DO UPDATE SET \
             preferred_roles = excluded.preferred_roles, \
             preferred_shift_types = excluded.preferred_shift_types, \
             preferred_sections = excluded.preferred_sections, \
             max_hours_per_week = excluded.max_hours_per_week, \
             min_hours_per_week = excluded.min_hours_per_week, \
             max_shifts_per_week = excluded.max_shifts_per_week, \
             avoid_clopening = excluded.avoid_clopening, \
             updated_at = excluded.updated_at",
    )
    .bind(waiter_id)
    .bind(&roles)
    .bind(&shift_types)
    .bind(&sections)
    .bind(max_hours_per_week)
    .bind(min_hours_per_week)
    .bind(max_shifts_per_week)
    .bind(avoid_clopening)
    .bind(now_millis())
    .execute(pool)
    .await?;

    find_preference(pool, waiter_id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to upsert preference".into()))
}

pub async fn find_preference(
    pool: &SqlitePool,
    waiter_id: &str,
) -> RepoResult<Option<StaffPreference>> {
    let pref = sqlx::query_as::<_, StaffPreference>(&format!(
        "SELECT {PREFERENCE_COLUMNS} FROM staff_preferences WHERE waiter_id = ?"
    ))
    .bind(waiter_id)
    .fetch_optional(pool)
    .await?;
    Ok(pref)
}

#[allow(clippy::too_many_arguments)]
pub async fn add_requirement(
    pool: &SqlitePool,
    restaurant_id: &str,
    day_of_week: i64,
    start_time: NaiveTime,
    end_time: NaiveTime,
    role: WaiterRole,
    min_staff: i64,
    max_staff: Option<i64>,
    is_prime_shift: bool,
) -> RepoResult<StaffingRequirement> {
    if !(0..=6).contains(&day_of_week) {
        return Err(RepoError::Validation(format!(
            "day_of_week must be 0..=6, got {day_of_week}"
        )));
    }
    let id = new_id();
    sqlx::query(
        "INSERT INTO staffing_requirements (id, restaurant_id, day_of_week, start_time, end_time, \
         role, min_staff, max_staff, is_prime_shift) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(restaurant_id)
    .bind(day_of_week)
    .bind(start_time)
    .bind(end_time)
    .bind(role)
    .bind(min_staff)
    .bind(max_staff)
    .bind(is_prime_shift)
    .execute(pool)
    .await?;

    let requirement = sqlx::query_as::<_, StaffingRequirement>(&format!(
        "SELECT {REQUIREMENT_COLUMNS} FROM staffing_requirements WHERE id = ?"
    ))
    .bind(&id)
    .fetch_one(pool)
    .await?;
    Ok(requirement)
}

pub async fn list_requirements(
    pool: &SqlitePool,
    restaurant_id: &str,
) -> RepoResult<Vec<StaffingRequirement>> {
    let requirements = sqlx::query_as::<_, StaffingRequirement>(&format!(
        "SELECT {REQUIREMENT_COLUMNS} FROM staffing_requirements WHERE restaurant_id = ? \
         ORDER BY day_of_week, start_time"
    ))
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;
    Ok(requirements)
}
