//! Transactional application of table state decisions
//!
//! Couples the pure state machine to the store: accepted transitions update
//! the table row, append the audit entry, and keep the occupied ⇔ open-visit
//! invariant true by creating or closing visits inside the same transaction.

use shared::models::{TableState, Visit, VisitTotals};
use shared::util::now_millis;
use shared::{AppError, AppResult, ErrorCode};
use sqlx::SqlitePool;

use crate::db::repository::table::VisitPointer;
use crate::db::repository::{shift, table, visit, RepoError};
use crate::tables::state_machine::{self, Decision, Provenance};

/// What happened to an accepted state push
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// Transition applied; one audit row appended
    Applied { previous: TableState, next: TableState },
    /// Same-state ML push with better confidence
    ConfidenceRefreshed,
    /// Same-state push with nothing new
    Ignored,
}

#[derive(Clone)]
pub struct TableStateService {
    pool: SqlitePool,
}

impl TableStateService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Apply a state push from any source.
    ///
    /// `observed_covers` is the classifier's person count, recorded onto the
    /// visit when present. Returns `InvalidTransition` for moves the state
    /// machine rejects and `Conflict` when a concurrent writer wins the CAS.
    pub async fn apply(
        &self,
        table_id: &str,
        next: TableState,
        provenance: Provenance,
        observed_covers: Option<i64>,
    ) -> AppResult<ApplyOutcome> {
        let current = table::get(&self.pool, table_id).await.map_err(AppError::from)?;

        let decision =
            state_machine::evaluate(current.state, current.state_confidence, next, &provenance)
                .map_err(|e| AppError::with_message(ErrorCode::InvalidTransition, e.to_string()))?;

        match decision {
            Decision::Ignore => {
                self.record_covers_if_open(&current.current_visit_id, observed_covers).await?;
                Ok(ApplyOutcome::Ignored)
            }
            Decision::RefreshConfidence => {
                let confidence = provenance.confidence().unwrap_or(0.0);
                table::refresh_confidence(&self.pool, table_id, current.state, confidence)
                    .await
                    .map_err(AppError::from)?;
                self.record_covers_if_open(&current.current_visit_id, observed_covers).await?;
                Ok(ApplyOutcome::ConfidenceRefreshed)
            }
            Decision::Apply => {
                self.apply_transition(&current, next, &provenance, observed_covers).await
            }
        }
    }

    async fn apply_transition(
        &self,
        current: &shared::models::DiningTable,
        next: TableState,
        provenance: &Provenance,
        observed_covers: Option<i64>,
    ) -> AppResult<ApplyOutcome> {
        let now = now_millis();
        let detail = provenance.detail();
        let mut tx = self.pool.begin().await.map_err(RepoError::from).map_err(AppError::from)?;

        let pointer = if next == TableState::Occupied {
            // The invariant demands an open visit; camera- or host-observed
            // occupancy creates an unassigned walk-in visit.
            let visit_id = visit::insert(
                &mut *tx,
                &current.restaurant_id,
                &current.id,
                None,
                None,
                None,
                observed_covers.unwrap_or(0),
                now,
            )
            .await
            .map_err(AppError::from)?;
            VisitPointer::Set(visit_id)
        } else if current.state == TableState::Occupied {
            // Leaving occupied closes the visit that held the table
            if let Some(visit_id) = &current.current_visit_id {
                visit::close(&mut *tx, visit_id, now).await.map_err(AppError::from)?;
            }
            VisitPointer::Clear
        } else {
            VisitPointer::Keep
        };

        let log = table::transition_on(
            &mut tx,
            &current.id,
            current.state,
            next,
            provenance.confidence(),
            provenance.source(),
            Some(&detail),
            pointer,
        )
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(RepoError::from).map_err(AppError::from)?;

        tracing::debug!(
            table_id = %current.id,
            previous = %log.previous_state,
            next = %log.next_state,
            source = %log.source,
            "Table state transition applied"
        );

        Ok(ApplyOutcome::Applied { previous: log.previous_state, next: log.next_state })
    }

    async fn record_covers_if_open(
        &self,
        current_visit_id: &Option<String>,
        observed_covers: Option<i64>,
    ) -> AppResult<()> {
        if let (Some(visit_id), Some(covers)) = (current_visit_id, observed_covers) {
            visit::set_actual_covers(&self.pool, visit_id, covers)
                .await
                .map_err(AppError::from)?;
        }
        Ok(())
    }

    /// Close a visit: attach totals, clear the visit, flip the table to
    /// dirty, and fold money into the serving shift — one transaction for
    /// the visit+table pair, money after commit (degraded path is additive).
    pub async fn close_visit(
        &self,
        visit_id: &str,
        totals: Option<VisitTotals>,
    ) -> AppResult<Visit> {
        let open = visit::get(&self.pool, visit_id).await.map_err(AppError::from)?;
        if !open.is_open() {
            return Err(AppError::with_message(
                ErrorCode::VisitClosed,
                format!("Visit {visit_id} already cleared"),
            ));
        }

        if let Some(totals) = totals {
            visit::set_totals(&self.pool, visit_id, totals).await.map_err(AppError::from)?;
        }

        let now = now_millis();
        let mut tx = self.pool.begin().await.map_err(RepoError::from).map_err(AppError::from)?;

        visit::close(&mut *tx, visit_id, now).await.map_err(AppError::from)?;
        table::transition_on(
            &mut tx,
            &open.table_id,
            TableState::Occupied,
            TableState::Dirty,
            None,
            shared::models::StateSource::System,
            Some("visit.clear"),
            VisitPointer::Clear,
        )
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(RepoError::from).map_err(AppError::from)?;

        let closed = visit::get(&self.pool, visit_id).await.map_err(AppError::from)?;
        if let (Some(shift_id), Some(tip), Some(total)) =
            (&closed.shift_id, closed.tip, closed.total)
        {
            shift::add_money(&self.pool, shift_id, tip, total).await.map_err(AppError::from)?;
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{DiningTableCreate, TableLocation, TableType};

    use crate::db::repository::restaurant;
    use crate::db::DbService;

    async fn setup() -> (SqlitePool, String, String) {
        let db = DbService::new_in_memory().await.unwrap();
        let r = restaurant::create(&db.pool, "Test", "UTC", None).await.unwrap();
        let t = table::create(
            &db.pool,
            &r.id,
            DiningTableCreate {
                section_id: None,
                table_number: 1,
                capacity: 4,
                table_type: TableType::Booth,
                location: TableLocation::Inside,
            },
        )
        .await
        .unwrap();
        (db.pool, r.id, t.id)
    }

    fn ml(confidence: f64) -> Provenance {
        Provenance::Ml { confidence, model_id: Some("dino-v3".into()) }
    }

    #[tokio::test]
    async fn ml_occupancy_creates_visit_and_audit_row() {
        let (pool, _r, table_id) = setup().await;
        let service = TableStateService::new(pool.clone());

        let outcome = service
            .apply(&table_id, TableState::Occupied, ml(0.91), Some(3))
            .await
            .unwrap();
        assert!(matches!(outcome, ApplyOutcome::Applied { next: TableState::Occupied, .. }));

        let t = table::get(&pool, &table_id).await.unwrap();
        assert_eq!(t.state, TableState::Occupied);
        let visit_id = t.current_visit_id.expect("occupied table must hold a visit");
        let v = visit::get(&pool, &visit_id).await.unwrap();
        assert!(v.is_open());
        assert_eq!(v.party_size, 3);

        let history = table::state_history(&pool, &table_id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].next_state, TableState::Occupied);
    }

    #[tokio::test]
    async fn leaving_occupied_closes_the_visit() {
        let (pool, _r, table_id) = setup().await;
        let service = TableStateService::new(pool.clone());

        service.apply(&table_id, TableState::Occupied, ml(0.9), Some(2)).await.unwrap();
        let visit_id = table::get(&pool, &table_id).await.unwrap().current_visit_id.unwrap();

        service.apply(&table_id, TableState::Dirty, ml(0.88), None).await.unwrap();

        let t = table::get(&pool, &table_id).await.unwrap();
        assert_eq!(t.state, TableState::Dirty);
        assert!(t.current_visit_id.is_none());
        let v = visit::get(&pool, &visit_id).await.unwrap();
        assert!(!v.is_open());
        assert!(v.duration_minutes.is_some());
    }

    #[tokio::test]
    async fn low_confidence_same_state_push_is_ignored() {
        let (pool, _r, table_id) = setup().await;
        let service = TableStateService::new(pool.clone());

        service.apply(&table_id, TableState::Occupied, ml(0.9), None).await.unwrap();
        let outcome = service
            .apply(&table_id, TableState::Occupied, ml(0.5), None)
            .await
            .unwrap();
        assert_eq!(outcome, ApplyOutcome::Ignored);

        // Still exactly one audit row
        let history = table::state_history(&pool, &table_id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected_without_changes() {
        let (pool, _r, table_id) = setup().await;
        let service = TableStateService::new(pool.clone());

        let err = service
            .apply(&table_id, TableState::Dirty, ml(0.99), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransition);

        let t = table::get(&pool, &table_id).await.unwrap();
        assert_eq!(t.state, TableState::Clean);
        assert!(table::state_history(&pool, &table_id, 10).await.unwrap().is_empty());
    }
}
