//! Router service — recommend and seat
//!
//! `recommend` is a pure read over the store plus scoring; `seat` executes
//! the decision in one transaction with a CAS occupy of the table, so two
//! concurrent seatings of the same table resolve to one winner and one
//! `Conflict`.

use serde::{Deserialize, Serialize};
use shared::models::{
    LocationPreference, RoutingMode, StateSource, TablePreference, TableState, Visit,
    WaitlistStatus,
};
use shared::util::now_millis;
use shared::{AppError, AppResult, ErrorCode};
use sqlx::SqlitePool;

use crate::db::repository::table::VisitPointer;
use crate::db::repository::{restaurant, shift, table, visit, waiter, waitlist, RepoError};
use crate::routing::scoring::{rank_waiters, score_tables, RankedWaiter, ScoredTable};

/// Why no recommendation could be made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoMatchReason {
    NoTables,
    NoWaiters,
    PreferenceUnsatisfiable,
}

impl NoMatchReason {
    fn message(&self) -> &'static str {
        match self {
            Self::NoTables => "NoTables",
            Self::NoWaiters => "NoWaiters",
            Self::PreferenceUnsatisfiable => "PreferenceUnsatisfiable",
        }
    }
}

/// A seating request: either a waitlist entry or inline party details
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RouteRequest {
    pub waitlist_id: Option<String>,
    pub party_size: Option<i64>,
    #[serde(default)]
    pub table_preference: TablePreference,
    #[serde(default)]
    pub location_preference: LocationPreference,
    /// When set, an unmatched preference is a failure instead of a soft miss
    #[serde(default)]
    pub hard_preference: bool,
}

/// Preference match details for the chosen table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDetails {
    pub type_matched: bool,
    pub location_matched: bool,
    pub capacity_fit: i64,
}

/// Routing outcome returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct RouteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_match: Option<NoMatchReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiter_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiter_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiter_priority: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_details: Option<MatchDetails>,
}

impl RouteResponse {
    fn no_match(reason: NoMatchReason) -> Self {
        Self {
            success: false,
            message: Some(reason.message().to_string()),
            no_match: Some(reason),
            table_id: None,
            table_number: None,
            table_score: None,
            waiter_id: None,
            waiter_name: None,
            waiter_priority: None,
            section_id: None,
            match_details: None,
        }
    }

    fn matched(table: &ScoredTable, ranked: &RankedWaiter) -> Self {
        Self {
            success: true,
            message: None,
            no_match: None,
            table_id: Some(table.table.id.clone()),
            table_number: Some(table.table.table_number),
            table_score: Some(table.score),
            waiter_id: Some(ranked.candidate.waiter_id.clone()),
            waiter_name: Some(ranked.candidate.name.clone()),
            waiter_priority: Some(ranked.priority),
            section_id: Some(
                ranked
                    .candidate
                    .section_id
                    .clone()
                    .unwrap_or_else(|| table.table.section_id.clone().unwrap_or_default()),
            ),
            match_details: Some(MatchDetails {
                type_matched: table.type_matched,
                location_matched: table.location_matched,
                capacity_fit: table.table.capacity,
            }),
        }
    }
}

#[derive(Clone)]
pub struct RouterService {
    pool: SqlitePool,
}

impl RouterService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Recommend the optimal (table, waiter) pair for a party.
    pub async fn recommend(
        &self,
        restaurant_id: &str,
        request: &RouteRequest,
    ) -> AppResult<RouteResponse> {
        let restaurant = restaurant::get(&self.pool, restaurant_id).await.map_err(AppError::from)?;
        let config = restaurant.parsed_config().routing;

        // Resolve the request: waitlist entry preferences win
        let (party_size, table_pref, location_pref) = match &request.waitlist_id {
            Some(waitlist_id) => {
                let entry = waitlist::get(&self.pool, waitlist_id).await.map_err(AppError::from)?;
                if entry.status != WaitlistStatus::Waiting {
                    return Err(AppError::with_message(
                        ErrorCode::WaitlistEntryClosed,
                        format!("Waitlist entry {waitlist_id} is {:?}", entry.status),
                    ));
                }
                (entry.party_size, entry.table_preference, entry.location_preference)
            }
            None => {
                let size = request.party_size.ok_or_else(|| {
                    AppError::validation("party_size is required without waitlist_id")
                })?;
                (size, request.table_preference, request.location_preference)
            }
        };

        let available =
            table::find_available_tables(&self.pool, restaurant_id, party_size)
                .await
                .map_err(AppError::from)?;
        if available.is_empty() {
            return Ok(RouteResponse::no_match(NoMatchReason::NoTables));
        }

        let scored = score_tables(available, party_size, table_pref, location_pref);

        // Hard preference: the party will not accept a miss
        if request.hard_preference {
            let pref_satisfiable = scored.iter().any(|t| {
                (table_pref.is_none() || t.type_matched)
                    && (location_pref.is_none() || t.location_matched)
            });
            if !pref_satisfiable {
                return Ok(RouteResponse::no_match(NoMatchReason::PreferenceUnsatisfiable));
            }
        }

        let candidates = waiter::list_candidate_waiters(&self.pool, restaurant_id)
            .await
            .map_err(AppError::from)?;
        let ranked = rank_waiters(&candidates, &config, now_millis());
        if ranked.is_empty() {
            return Ok(RouteResponse::no_match(NoMatchReason::NoWaiters));
        }

        match config.mode {
            RoutingMode::Rotation => {
                // Best waiter overall takes the best table overall
                Ok(RouteResponse::matched(&scored[0], &ranked[0]))
            }
            RoutingMode::Section => {
                // Highest-priority waiter whose section owns a candidate
                // table; the table is their best-scoring section table
                for waiter in &ranked {
                    let Some(section_id) = &waiter.candidate.section_id else {
                        continue;
                    };
                    if let Some(best) = scored
                        .iter()
                        .find(|t| t.table.section_id.as_deref() == Some(section_id.as_str()))
                    {
                        return Ok(RouteResponse::matched(best, waiter));
                    }
                }
                Ok(RouteResponse::no_match(NoMatchReason::NoWaiters))
            }
        }
    }

    /// Execute a seating decision.
    ///
    /// One transaction: create the Visit, CAS the table clean → occupied,
    /// bump shift stats, and mark the waitlist entry seated. A concurrent
    /// seat of the same table loses the CAS and observes `SeatConflict`.
    pub async fn seat(
        &self,
        restaurant_id: &str,
        table_id: &str,
        waiter_id: &str,
        party_size: i64,
        waitlist_id: Option<&str>,
    ) -> AppResult<Visit> {
        let target = table::get(&self.pool, table_id).await.map_err(AppError::from)?;
        if target.restaurant_id != restaurant_id {
            return Err(AppError::with_message(ErrorCode::TableNotFound, "Table not in restaurant"));
        }
        if target.capacity < party_size {
            return Err(AppError::validation(format!(
                "Party size {party_size} exceeds table capacity {}",
                target.capacity
            )));
        }

        let open_shift = shift::find_open_for_waiter(&self.pool, waiter_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| {
                AppError::with_message(
                    ErrorCode::ShiftNotFound,
                    format!("Waiter {waiter_id} has no active shift"),
                )
            })?;

        let now = now_millis();
        let mut tx = self.pool.begin().await.map_err(RepoError::from).map_err(AppError::from)?;

        let visit_id = visit::insert(
            &mut *tx,
            restaurant_id,
            table_id,
            Some(waiter_id),
            Some(&open_shift.id),
            waitlist_id,
            party_size,
            now,
        )
        .await
        .map_err(AppError::from)?;

        let transition = table::transition_on(
            &mut tx,
            table_id,
            TableState::Clean,
            TableState::Occupied,
            None,
            StateSource::System,
            Some("router.seat"),
            VisitPointer::Set(visit_id.clone()),
        )
        .await;
        if let Err(e) = transition {
            return Err(match e {
                RepoError::Conflict(msg) => AppError::with_message(ErrorCode::SeatConflict, msg),
                other => AppError::from(other),
            });
        }

        sqlx::query(
            "UPDATE shifts SET tables_served = tables_served + 1, total_covers = total_covers + ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(party_size)
        .bind(now)
        .bind(&open_shift.id)
        .execute(&mut *tx)
        .await
        .map_err(RepoError::from)
        .map_err(AppError::from)?;

        if let Some(waitlist_id) = waitlist_id {
            waitlist::mark_seated(&mut *tx, waitlist_id, &visit_id, now)
                .await
                .map_err(AppError::from)?;
        }

        tx.commit().await.map_err(RepoError::from).map_err(AppError::from)?;

        tracing::info!(
            restaurant_id = %restaurant_id,
            table_id = %table_id,
            waiter_id = %waiter_id,
            visit_id = %visit_id,
            party_size,
            "Party seated"
        );

        visit::get(&self.pool, &visit_id).await.map_err(AppError::from)
    }
}
