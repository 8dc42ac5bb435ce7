//! Dining Table Repository
//!
//! Holds the CAS transition primitive: every state write is conditional on
//! the previously observed state, appends exactly one `table_state_log`
//! row, and maintains the occupied ⇔ current-visit invariant in the same
//! transaction.

use shared::models::{
    DiningTable, DiningTableCreate, StateSource, TableState, TableStateLog,
};
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;

use super::{RepoError, RepoResult};

const COLUMNS: &str = "id, restaurant_id, section_id, table_number, capacity, table_type, \
     location, state, state_confidence, state_updated_at, current_visit_id, created_at, updated_at";

/// How a transition affects the table's current-visit pointer
#[derive(Debug, Clone)]
pub enum VisitPointer {
    /// Leave the pointer untouched
    Keep,
    /// Point at the visit that occupies the table
    Set(String),
    /// Null the pointer (table no longer occupied)
    Clear,
}

pub async fn create(
    pool: &SqlitePool,
    restaurant_id: &str,
    data: DiningTableCreate,
) -> RepoResult<DiningTable> {
    if !(1..=20).contains(&data.capacity) {
        return Err(RepoError::Validation(format!(
            "Capacity must be 1..=20, got {}",
            data.capacity
        )));
    }

    let id = new_id();
    let now = now_millis();
    let result = sqlx::query(
        "INSERT INTO dining_tables \
         (id, restaurant_id, section_id, table_number, capacity, table_type, location, state, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, 'clean', ?, ?)",
    )
    .bind(&id)
    .bind(restaurant_id)
    .bind(&data.section_id)
    .bind(data.table_number)
    .bind(data.capacity)
    .bind(data.table_type)
    .bind(data.location)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    match result {
        Ok(_) => {}
        Err(e) => {
            let repo_err = RepoError::from(e);
            if matches!(repo_err, RepoError::Duplicate(_)) {
                return Err(RepoError::Duplicate(format!(
                    "Table number {} already exists in this restaurant",
                    data.table_number
                )));
            }
            return Err(repo_err);
        }
    }

    get(pool, &id).await
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> RepoResult<Option<DiningTable>> {
    let table =
        sqlx::query_as::<_, DiningTable>(&format!("SELECT {COLUMNS} FROM dining_tables WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await?;
    Ok(table)
}

pub async fn get(pool: &SqlitePool, id: &str) -> RepoResult<DiningTable> {
    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Table {id} not found")))
}

pub async fn find_by_restaurant(pool: &SqlitePool, restaurant_id: &str) -> RepoResult<Vec<DiningTable>> {
    let tables = sqlx::query_as::<_, DiningTable>(&format!(
        "SELECT {COLUMNS} FROM dining_tables WHERE restaurant_id = ? ORDER BY table_number"
    ))
    .bind(restaurant_id)
    .fetch_all(pool)
    .await?;
    Ok(tables)
}

/// Candidate tables for a party: clean, big enough, smallest excess first.
///
/// Preference match scoring happens in the router; the store only orders by
/// excess seats and table number so results are deterministic.
pub async fn find_available_tables(
    pool: &SqlitePool,
    restaurant_id: &str,
    min_capacity: i64,
) -> RepoResult<Vec<DiningTable>> {
    let tables = sqlx::query_as::<_, DiningTable>(&format!(
        "SELECT {COLUMNS} FROM dining_tables \
         WHERE restaurant_id = ? AND state = 'clean' AND capacity >= ? \
         ORDER BY capacity - ? ASC, table_number ASC, created_at ASC"
    ))
    .bind(restaurant_id)
    .bind(min_capacity)
    .bind(min_capacity)
    .fetch_all(pool)
    .await?;
    Ok(tables)
}

/// Apply an accepted state transition atomically.
///
/// Conditional on `previous` still being the row's state: a concurrent
/// writer makes this return [`RepoError::Conflict`] with nothing changed.
/// Exactly one `table_state_log` row is appended on success.
#[allow(clippy::too_many_arguments)]
pub async fn transition(
    pool: &SqlitePool,
    table_id: &str,
    previous: TableState,
    next: TableState,
    confidence: Option<f64>,
    source: StateSource,
    detail: Option<&str>,
    visit: VisitPointer,
) -> RepoResult<TableStateLog> {
    let mut tx = pool.begin().await?;
    let log = transition_on(&mut tx, table_id, previous, next, confidence, source, detail, visit)
        .await?;
    tx.commit().await?;
    Ok(log)
}

/// Transition variant for callers composing a larger transaction (e.g. the
/// router's seat operation). No commit happens here; a [`RepoError`] leaves
/// the caller's transaction poised to roll back.
#[allow(clippy::too_many_arguments)]
pub async fn transition_on(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    table_id: &str,
    previous: TableState,
    next: TableState,
    confidence: Option<f64>,
    source: StateSource,
    detail: Option<&str>,
    visit: VisitPointer,
) -> RepoResult<TableStateLog> {
    // The invariant is structural, not caller policy
    if next == TableState::Occupied && !matches!(visit, VisitPointer::Set(_)) {
        return Err(RepoError::Invariant(
            "occupied table requires a current visit".into(),
        ));
    }
    if next != TableState::Occupied && matches!(visit, VisitPointer::Set(_)) {
        return Err(RepoError::Invariant(
            "only occupied tables may hold a current visit".into(),
        ));
    }

    let now = now_millis();

    let rows = match &visit {
        VisitPointer::Keep => {
            sqlx::query(
                "UPDATE dining_tables SET state = ?, state_confidence = ?, state_updated_at = ?, \
                 updated_at = ? WHERE id = ? AND state = ?",
            )
            .bind(next)
            .bind(confidence)
            .bind(now)
            .bind(now)
            .bind(table_id)
            .bind(previous)
            .execute(&mut **tx)
            .await?
        }
        VisitPointer::Set(visit_id) => {
            sqlx::query(
                "UPDATE dining_tables SET state = ?, state_confidence = ?, state_updated_at = ?, \
                 updated_at = ?, current_visit_id = ? WHERE id = ? AND state = ?",
            )
            .bind(next)
            .bind(confidence)
            .bind(now)
            .bind(now)
            .bind(visit_id)
            .bind(table_id)
            .bind(previous)
            .execute(&mut **tx)
            .await?
        }
        VisitPointer::Clear => {
            sqlx::query(
                "UPDATE dining_tables SET state = ?, state_confidence = ?, state_updated_at = ?, \
                 updated_at = ?, current_visit_id = NULL WHERE id = ? AND state = ?",
            )
            .bind(next)
            .bind(confidence)
            .bind(now)
            .bind(now)
            .bind(table_id)
            .bind(previous)
            .execute(&mut **tx)
            .await?
        }
    };

    if rows.rows_affected() == 0 {
        // Either the table is gone or someone transitioned it first
        return Err(RepoError::Conflict(format!(
            "Table {table_id} is no longer in state {previous}"
        )));
    }

    let log_id: i64 = sqlx::query_scalar(
        "INSERT INTO table_state_log (table_id, previous_state, next_state, confidence, source, detail, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(table_id)
    .bind(previous)
    .bind(next)
    .bind(confidence)
    .bind(source)
    .bind(detail)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    Ok(TableStateLog {
        id: log_id,
        table_id: table_id.to_string(),
        previous_state: previous,
        next_state: next,
        confidence,
        source,
        detail: detail.map(str::to_string),
        created_at: now,
    })
}

/// Refresh confidence on an idempotent same-state ML push (no log row)
pub async fn refresh_confidence(
    pool: &SqlitePool,
    table_id: &str,
    state: TableState,
    confidence: f64,
) -> RepoResult<bool> {
    let now = now_millis();
    let rows = sqlx::query(
        "UPDATE dining_tables SET state_confidence = ?, state_updated_at = ?, updated_at = ? \
         WHERE id = ? AND state = ? AND (state_confidence IS NULL OR state_confidence < ?)",
    )
    .bind(confidence)
    .bind(now)
    .bind(now)
    .bind(table_id)
    .bind(state)
    .bind(confidence)
    .execute(pool)
    .await?;
    Ok(rows.rows_affected() > 0)
}

/// State change history, most recent first
pub async fn state_history(
    pool: &SqlitePool,
    table_id: &str,
    limit: i64,
) -> RepoResult<Vec<TableStateLog>> {
    let logs = sqlx::query_as::<_, TableStateLog>(
        "SELECT id, table_id, previous_state, next_state, confidence, source, detail, created_at \
         FROM table_state_log WHERE table_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(table_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(logs)
}
