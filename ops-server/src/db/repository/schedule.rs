//! Schedule Repository — runs, schedules, items, reasoning

use chrono::{NaiveDate, NaiveTime};
use shared::models::{
    GeneratedBy, Schedule, ScheduleItem, ScheduleReasoning, ScheduleRun, ScheduleStatus,
    WaiterRole,
};
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;

use super::{RepoError, RepoResult};

const RUN_COLUMNS: &str = "id, restaurant_id, week_start, engine_version, run_status, \
     inputs_snapshot, summary_metrics, error_message, started_at, completed_at, created_at";
const SCHEDULE_COLUMNS: &str = "id, restaurant_id, week_start, status, version, generated_by, \
     schedule_run_id, summary, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, schedule_id, waiter_id, role, section_id, shift_date, \
     shift_start, shift_end, source, preference_match_score, fairness_impact_score, created_at";
const REASONING_COLUMNS: &str = "id, schedule_run_id, schedule_item_id, reasons, \
     constraint_violations, confidence, narrative, created_at";

// ==================== Runs ====================

pub async fn create_run(
    pool: &SqlitePool,
    restaurant_id: &str,
    week_start: NaiveDate,
    engine_version: &str,
) -> RepoResult<ScheduleRun> {
    let id = new_id();
    sqlx::query(
        "INSERT INTO schedule_runs (id, restaurant_id, week_start, engine_version, run_status, created_at) \
         VALUES (?, ?, ?, ?, 'pending', ?)",
    )
    .bind(&id)
    .bind(restaurant_id)
    .bind(week_start)
    .bind(engine_version)
    .bind(now_millis())
    .execute(pool)
    .await?;

    get_run(pool, &id).await
}

pub async fn get_run(pool: &SqlitePool, id: &str) -> RepoResult<ScheduleRun> {
    let run = sqlx::query_as::<_, ScheduleRun>(&format!(
        "SELECT {RUN_COLUMNS} FROM schedule_runs WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    run.ok_or_else(|| RepoError::NotFound(format!("Schedule run {id} not found")))
}

pub async fn mark_run_started(pool: &SqlitePool, id: &str, inputs_snapshot: &str) -> RepoResult<()> {
    sqlx::query(
        "UPDATE schedule_runs SET run_status = 'running', inputs_snapshot = ?, started_at = ? WHERE id = ?",
    )
    .bind(inputs_snapshot)
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_run_completed(
    pool: &SqlitePool,
    id: &str,
    summary_metrics: &str,
) -> RepoResult<()> {
    sqlx::query(
        "UPDATE schedule_runs SET run_status = 'completed', summary_metrics = ?, completed_at = ? WHERE id = ?",
    )
    .bind(summary_metrics)
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_run_failed(pool: &SqlitePool, id: &str, error: &str) -> RepoResult<()> {
    sqlx::query(
        "UPDATE schedule_runs SET run_status = 'failed', error_message = ?, completed_at = ? WHERE id = ?",
    )
    .bind(error)
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

// ==================== Schedules ====================

/// Create the next draft version for a week (version = latest + 1)
pub async fn create_schedule(
    pool: &SqlitePool,
    restaurant_id: &str,
    week_start: NaiveDate,
    generated_by: GeneratedBy,
    run_id: Option<&str>,
) -> RepoResult<Schedule> {
    let id = new_id();
    let now = now_millis();

    let latest: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(version) FROM schedules WHERE restaurant_id = ? AND week_start = ?",
    )
    .bind(restaurant_id)
    .bind(week_start)
    .fetch_one(pool)
    .await?;
    let version = latest.unwrap_or(0) + 1;

    sqlx::query(
        "INSERT INTO schedules (id, restaurant_id, week_start, status, version, generated_by, \
         schedule_run_id, created_at, updated_at) VALUES (?, ?, ?, 'draft', ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(restaurant_id)
    .bind(week_start)
    .bind(version)
    .bind(generated_by)
    .bind(run_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_schedule(pool, &id).await
}

pub async fn get_schedule(pool: &SqlitePool, id: &str) -> RepoResult<Schedule> {
    let schedule = sqlx::query_as::<_, Schedule>(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    schedule.ok_or_else(|| RepoError::NotFound(format!("Schedule {id} not found")))
}

pub async fn find_published(
    pool: &SqlitePool,
    restaurant_id: &str,
    week_start: NaiveDate,
) -> RepoResult<Option<Schedule>> {
    let schedule = sqlx::query_as::<_, Schedule>(&format!(
        "SELECT {SCHEDULE_COLUMNS} FROM schedules \
         WHERE restaurant_id = ? AND week_start = ? AND status = 'published' LIMIT 1"
    ))
    .bind(restaurant_id)
    .bind(week_start)
    .fetch_optional(pool)
    .await?;
    Ok(schedule)
}

/// Publish a draft: archive the previously published schedule for the same
/// week in the same transaction. Conditional on the draft still being a
/// draft, so a double publish loses with `Conflict`.
pub async fn publish(pool: &SqlitePool, schedule_id: &str) -> RepoResult<Schedule> {
    let schedule = get_schedule(pool, schedule_id).await?;
    if schedule.status != ScheduleStatus::Draft {
        return Err(RepoError::Invariant(format!(
            "Schedule {schedule_id} is not a draft"
        )));
    }

    let now = now_millis();
    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE schedules SET status = 'archived', updated_at = ? \
         WHERE restaurant_id = ? AND week_start = ? AND status = 'published'",
    )
    .bind(now)
    .bind(&schedule.restaurant_id)
    .bind(schedule.week_start)
    .execute(&mut *tx)
    .await?;

    let rows = sqlx::query(
        "UPDATE schedules SET status = 'published', updated_at = ? WHERE id = ? AND status = 'draft'",
    )
    .bind(now)
    .bind(schedule_id)
    .execute(&mut *tx)
    .await?;

    if rows.rows_affected() == 0 {
        return Err(RepoError::Conflict(format!(
            "Schedule {schedule_id} was published concurrently"
        )));
    }

    tx.commit().await?;
    get_schedule(pool, schedule_id).await
}

pub async fn set_summary(pool: &SqlitePool, schedule_id: &str, summary: Option<&str>) -> RepoResult<()> {
    sqlx::query("UPDATE schedules SET summary = ?, updated_at = ? WHERE id = ?")
        .bind(summary)
        .bind(now_millis())
        .bind(schedule_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ==================== Items ====================

#[allow(clippy::too_many_arguments)]
pub async fn insert_item(
    pool: &SqlitePool,
    schedule_id: &str,
    waiter_id: &str,
    role: WaiterRole,
    section_id: Option<&str>,
    shift_date: NaiveDate,
    shift_start: NaiveTime,
    shift_end: NaiveTime,
    source: GeneratedBy,
    preference_match_score: f64,
    fairness_impact_score: f64,
) -> RepoResult<ScheduleItem> {
    let id = new_id();
    sqlx::query(
        "INSERT INTO schedule_items (id, schedule_id, waiter_id, role, section_id, shift_date, \
         shift_start, shift_end, source, preference_match_score, fairness_impact_score, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(schedule_id)
    .bind(waiter_id)
    .bind(role)
    .bind(section_id)
    .bind(shift_date)
    .bind(shift_start)
    .bind(shift_end)
    .bind(source)
    .bind(preference_match_score)
    .bind(fairness_impact_score)
    .bind(now_millis())
    .execute(pool)
    .await?;

    let item = sqlx::query_as::<_, ScheduleItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM schedule_items WHERE id = ?"
    ))
    .bind(&id)
    .fetch_one(pool)
    .await?;
    Ok(item)
}

pub async fn items_for_schedule(pool: &SqlitePool, schedule_id: &str) -> RepoResult<Vec<ScheduleItem>> {
    let items = sqlx::query_as::<_, ScheduleItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM schedule_items WHERE schedule_id = ? \
         ORDER BY shift_date, shift_start, waiter_id"
    ))
    .bind(schedule_id)
    .fetch_all(pool)
    .await?;
    Ok(items)
}

// ==================== Reasoning ====================

pub async fn insert_reasoning(
    pool: &SqlitePool,
    run_id: &str,
    item_id: &str,
    reasons: &[String],
    violations: &[String],
    confidence: f64,
    narrative: Option<&str>,
) -> RepoResult<ScheduleReasoning> {
    let reasons_json = serde_json::to_string(reasons)
        .map_err(|e| RepoError::Validation(e.to_string()))?;
    let violations_json = serde_json::to_string(violations)
        .map_err(|e| RepoError::Validation(e.to_string()))?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO schedule_reasoning (schedule_run_id, schedule_item_id, reasons, \
         constraint_violations, confidence, narrative, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(run_id)
    .bind(item_id)
    .bind(&reasons_json)
    .bind(&violations_json)
    .bind(confidence)
    .bind(narrative)
    .bind(now_millis())
    .fetch_one(pool)
    .await?;

    let reasoning = sqlx::query_as::<_, ScheduleReasoning>(&format!(
        "SELECT {REASONING_COLUMNS} FROM schedule_reasoning WHERE id = ?"
    ))
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(reasoning)
}

pub async fn reasoning_for_item(
    pool: &SqlitePool,
    item_id: &str,
) -> RepoResult<Option<ScheduleReasoning>> {
    let reasoning = sqlx::query_as::<_, ScheduleReasoning>(&format!(
        "SELECT {REASONING_COLUMNS} FROM schedule_reasoning WHERE schedule_item_id = ?"
    ))
    .bind(item_id)
    .fetch_optional(pool)
    .await?;
    Ok(reasoning)
}
