//! Scheduling engine — score-and-rank weekly shift assignment
//!
//! For every staffing-requirement slot, candidates that pass the hard
//! constraints are scored
//!
//! `total = 0.5·constraint + 0.3·(fairness_impact + 50) + 0.2·preference_bonus`
//!
//! and the best is assigned; the running fairness state updates after each
//! assignment. One run holds an exclusive per-(restaurant, week) lock; a
//! failed run is marked `failed` and its partial schedule is discarded by
//! the caller inspecting `run_status`.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use shared::models::{GeneratedBy, RunStatus, StaffingRequirement};
use shared::{AppError, AppResult, ErrorCode};
use sqlx::SqlitePool;

use crate::db::repository::{availability, restaurant, schedule, waiter};
use crate::scheduling::constraints::{self, ShiftAssignment, SoftScore, StaffContext};
use crate::scheduling::fairness::{self, StaffHours};
use crate::scheduling::forecast::DemandForecaster;
use crate::scheduling::narrator::{ScheduleNarrator, SummaryContext};
use crate::scheduling::reasoning::build_reasons;
use crate::utils::time::week_start;

pub const ENGINE_VERSION: &str = "1.0.0";

const CONSTRAINT_WEIGHT: f64 = 0.5;
const FAIRNESS_WEIGHT: f64 = 0.3;
const PREFERENCE_WEIGHT: f64 = 0.2;

/// Covers one scheduled labor-hour absorbs when sizing staffing against
/// the demand forecast
const COVERS_PER_LABOR_HOUR: f64 = 6.0;

/// Exclusive per-(restaurant, week) run locks
#[derive(Clone, Default)]
pub struct RunLocks {
    held: Arc<Mutex<HashSet<(String, NaiveDate)>>>,
}

/// Releases the lock on drop
pub struct RunGuard {
    held: Arc<Mutex<HashSet<(String, NaiveDate)>>>,
    key: (String, NaiveDate),
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lock; None when a run is already in progress.
    pub fn try_acquire(&self, restaurant_id: &str, week: NaiveDate) -> Option<RunGuard> {
        let key = (restaurant_id.to_string(), week);
        let mut held = self.held.lock().expect("run lock poisoned");
        if !held.insert(key.clone()) {
            return None;
        }
        Some(RunGuard { held: Arc::clone(&self.held), key })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Ok(mut held) = self.held.lock() {
            held.remove(&self.key);
        }
    }
}

/// Summary metrics persisted onto the run
#[derive(Debug, Clone, Serialize)]
pub struct EngineSummary {
    pub items_created: usize,
    pub total_hours: f64,
    pub coverage_pct: f64,
    pub fairness_gini: f64,
    pub preference_avg: f64,
    pub forecast_trend: String,
    pub understaffed_slots: Vec<String>,
    /// Days where scheduled labor sits outside the configured thresholds
    /// relative to forecast demand
    pub staffing_alerts: Vec<String>,
}

/// Result of one engine run
#[derive(Debug, Clone, Serialize)]
pub struct EngineResult {
    pub run_id: String,
    pub schedule_id: Option<String>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<EngineSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

struct ScoredCandidate {
    staff_index: usize,
    soft: SoftScore,
    fairness_impact: f64,
    preference_bonus: f64,
    total: f64,
}

pub struct SchedulingEngine {
    pool: SqlitePool,
    forecaster: DemandForecaster,
    narrator: Arc<dyn ScheduleNarrator>,
}

impl SchedulingEngine {
    pub fn new(pool: SqlitePool, narrator: Arc<dyn ScheduleNarrator>) -> Self {
        Self {
            forecaster: DemandForecaster::new(pool.clone()),
            pool,
            narrator,
        }
    }

    /// Execute a scheduling run for the week containing `week`.
    pub async fn run(
        &self,
        locks: &RunLocks,
        restaurant_id: &str,
        week: NaiveDate,
    ) -> AppResult<EngineResult> {
        let target_week = week_start(week);

        let Some(_guard) = locks.try_acquire(restaurant_id, target_week) else {
            return Err(AppError::with_message(
                ErrorCode::RunInProgress,
                format!("A run for {restaurant_id} week {target_week} is already in progress"),
            ));
        };

        let run = schedule::create_run(&self.pool, restaurant_id, target_week, ENGINE_VERSION)
            .await
            .map_err(AppError::from)?;

        match self.execute(&run.id, restaurant_id, target_week).await {
            Ok((schedule_id, summary)) => {
                let metrics_json = serde_json::to_string(&summary)
                    .unwrap_or_else(|_| "{}".to_string());
                schedule::mark_run_completed(&self.pool, &run.id, &metrics_json)
                    .await
                    .map_err(AppError::from)?;
                Ok(EngineResult {
                    run_id: run.id,
                    schedule_id: Some(schedule_id),
                    status: RunStatus::Completed,
                    summary: Some(summary),
                    error_message: None,
                })
            }
            Err(e) => {
                tracing::error!(
                    restaurant_id = %restaurant_id,
                    week = %target_week,
                    error = %e,
                    "Scheduling run failed"
                );
                schedule::mark_run_failed(&self.pool, &run.id, &e.to_string())
                    .await
                    .map_err(AppError::from)?;
                Ok(EngineResult {
                    run_id: run.id,
                    schedule_id: None,
                    status: RunStatus::Failed,
                    summary: None,
                    error_message: Some(e.to_string()),
                })
            }
        }
    }

    async fn execute(
        &self,
        run_id: &str,
        restaurant_id: &str,
        target_week: NaiveDate,
    ) -> AppResult<(String, EngineSummary)> {
        // Snapshot inputs
        let alert_settings = restaurant::get(&self.pool, restaurant_id)
            .await
            .map_err(AppError::from)?
            .parsed_config()
            .alerts;
        let mut staff = self.load_staff_contexts(restaurant_id, target_week).await?;
        let requirements = availability::list_requirements(&self.pool, restaurant_id)
            .await
            .map_err(AppError::from)?;
        let forecast = self.forecaster.forecast_week(restaurant_id, target_week).await?;

        let snapshot = serde_json::json!({
            "staff_count": staff.len(),
            "requirements_count": requirements.len(),
            "forecast_trend": forecast.overall_trend,
            "forecast_total_covers": forecast.total_predicted_covers,
        });
        schedule::mark_run_started(&self.pool, run_id, &snapshot.to_string())
            .await
            .map_err(AppError::from)?;

        let created = schedule::create_schedule(
            &self.pool,
            restaurant_id,
            target_week,
            GeneratedBy::Engine,
            Some(run_id),
        )
        .await
        .map_err(AppError::from)?;

        // Running fairness state, parallel to `staff`
        let mut hours_state: Vec<StaffHours> = staff
            .iter()
            .map(|s| StaffHours {
                waiter_id: s.waiter_id.clone(),
                name: s.name.clone(),
                hours: 0.0,
                prime_hours: 0.0,
                prime_count: 0,
            })
            .collect();

        let mut items_created = 0usize;
        let mut total_hours = 0.0f64;
        let mut slots_required = 0i64;
        let mut slots_filled = 0i64;
        let mut preference_scores: Vec<f64> = Vec::new();
        let mut understaffed: Vec<String> = Vec::new();
        let mut hours_by_day: Vec<f64> = vec![0.0; 7];

        for day_offset in 0..7u64 {
            let date = target_week + Days::new(day_offset);
            let dow = date.weekday().num_days_from_monday() as i64;
            let day_covers = forecast
                .day(date)
                .map(|d| d.total_predicted_covers)
                .unwrap_or(0.0);

            for requirement in requirements.iter().filter(|r| r.day_of_week == dow) {
                slots_required += requirement.min_staff;
                let mut assigned_count = 0i64;

                while assigned_count < requirement.min_staff {
                    let assignment = ShiftAssignment {
                        shift_date: date,
                        start: requirement.start_time,
                        end: requirement.end_time,
                        role: requirement.role,
                        section_id: None,
                    };

                    let Some(best) =
                        self.pick_candidate(&staff, &hours_state, &assignment, requirement)
                    else {
                        break;
                    };

                    let item = schedule::insert_item(
                        &self.pool,
                        &created.id,
                        &staff[best.staff_index].waiter_id,
                        requirement.role,
                        None,
                        date,
                        requirement.start_time,
                        requirement.end_time,
                        GeneratedBy::Engine,
                        best.soft.score,
                        best.fairness_impact,
                    )
                    .await
                    .map_err(AppError::from)?;

                    let (reasons, violations) = build_reasons(
                        &staff[best.staff_index],
                        &assignment,
                        &best.soft,
                        best.fairness_impact,
                        requirement,
                        day_covers,
                    );
                    let narrative = self.narrator.narrate_item(&reasons).await;
                    schedule::insert_reasoning(
                        &self.pool,
                        run_id,
                        &item.id,
                        &reasons,
                        &violations,
                        best.soft.score / 100.0,
                        narrative.as_deref(),
                    )
                    .await
                    .map_err(AppError::from)?;

                    // Update running state
                    let hours = assignment.hours();
                    total_hours += hours;
                    hours_by_day[day_offset as usize] += hours;
                    hours_state[best.staff_index].hours += hours;
                    if requirement.is_prime_shift {
                        hours_state[best.staff_index].prime_hours += hours;
                        hours_state[best.staff_index].prime_count += 1;
                    }
                    preference_scores.push(best.soft.score);
                    staff[best.staff_index].assigned.push(assignment);

                    items_created += 1;
                    assigned_count += 1;
                    slots_filled += 1;
                }

                if assigned_count < requirement.min_staff {
                    understaffed.push(format!(
                        "{} {}–{} {:?} short {}",
                        date.format("%a"),
                        requirement.start_time.format("%H:%M"),
                        requirement.end_time.format("%H:%M"),
                        requirement.role,
                        requirement.min_staff - assigned_count
                    ));
                }
            }
        }

        let report = fairness::evaluate(&hours_state);
        let coverage_pct = if slots_required > 0 {
            slots_filled as f64 / slots_required as f64 * 100.0
        } else {
            100.0
        };
        let preference_avg = if preference_scores.is_empty() {
            0.0
        } else {
            preference_scores.iter().sum::<f64>() / preference_scores.len() as f64
        };

        // Demand alerts: scheduled labor vs what the forecast implies
        let mut staffing_alerts = Vec::new();
        for day_offset in 0..7usize {
            let date = target_week + Days::new(day_offset as u64);
            let forecast_covers =
                forecast.day(date).map(|d| d.total_predicted_covers).unwrap_or(0.0);
            if forecast_covers <= 0.0 {
                continue;
            }
            let needed_hours = forecast_covers / COVERS_PER_LABOR_HOUR;
            let ratio = hours_by_day[day_offset] / needed_hours;
            if ratio < alert_settings.understaffed_threshold {
                staffing_alerts.push(format!(
                    "{}: understaffed for forecast demand ({:.1}h scheduled vs ~{:.1}h needed)",
                    date.format("%a"),
                    hours_by_day[day_offset],
                    needed_hours
                ));
            } else if ratio > alert_settings.overstaffed_threshold {
                staffing_alerts.push(format!(
                    "{}: overstaffed for forecast demand ({:.1}h scheduled vs ~{:.1}h needed)",
                    date.format("%a"),
                    hours_by_day[day_offset],
                    needed_hours
                ));
            }
        }

        let summary = EngineSummary {
            items_created,
            total_hours,
            coverage_pct,
            fairness_gini: report.hours_gini,
            preference_avg,
            forecast_trend: format!("{:?}", forecast.overall_trend).to_lowercase(),
            understaffed_slots: understaffed,
            staffing_alerts,
        };

        let narrative = self
            .narrator
            .narrate_summary(&SummaryContext {
                week_start: target_week,
                items_created,
                total_hours,
                coverage_pct,
                fairness_gini: report.hours_gini,
                preference_avg,
                understaffed_slots: summary.understaffed_slots.clone(),
            })
            .await;
        schedule::set_summary(&self.pool, &created.id, narrative.as_deref())
            .await
            .map_err(AppError::from)?;

        tracing::info!(
            restaurant_id = %restaurant_id,
            week = %target_week,
            items = items_created,
            coverage_pct = format!("{coverage_pct:.1}"),
            gini = format!("{:.3}", report.hours_gini),
            "Scheduling run completed"
        );

        Ok((created.id, summary))
    }

    /// Score every admissible candidate for a slot and pick the winner.
    ///
    /// Ties break on higher preference score, then lower current weekly
    /// hours, then waiter id for determinism.
    fn pick_candidate(
        &self,
        staff: &[StaffContext],
        hours_state: &[StaffHours],
        assignment: &ShiftAssignment,
        requirement: &StaffingRequirement,
    ) -> Option<ScoredCandidate> {
        let mut candidates: Vec<ScoredCandidate> = staff
            .iter()
            .enumerate()
            .filter_map(|(index, member)| {
                if !constraints::check_hard(member, assignment).is_empty() {
                    return None;
                }
                let soft = constraints::score_soft(member, assignment);
                let fairness_impact = fairness::assignment_impact(
                    hours_state,
                    index,
                    assignment.hours(),
                    requirement.is_prime_shift,
                );
                let bonus =
                    constraints::preference_bonus(member, assignment, requirement.is_prime_shift);
                let total = soft.score * CONSTRAINT_WEIGHT
                    + (fairness_impact + 50.0) * FAIRNESS_WEIGHT
                    + bonus * PREFERENCE_WEIGHT;
                Some(ScoredCandidate {
                    staff_index: index,
                    soft,
                    fairness_impact,
                    preference_bonus: bonus,
                    total,
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.preference_bonus
                        .partial_cmp(&a.preference_bonus)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(
                    hours_state[a.staff_index]
                        .hours
                        .partial_cmp(&hours_state[b.staff_index].hours)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
                .then(staff[a.staff_index].waiter_id.cmp(&staff[b.staff_index].waiter_id))
        });

        candidates.into_iter().next()
    }

    /// Load active waiters with availability windows effective for the
    /// target week and their stated preferences.
    async fn load_staff_contexts(
        &self,
        restaurant_id: &str,
        target_week: NaiveDate,
    ) -> AppResult<Vec<StaffContext>> {
        let waiters = waiter::find_active_by_restaurant(&self.pool, restaurant_id)
            .await
            .map_err(AppError::from)?;

        let mut contexts = Vec::with_capacity(waiters.len());
        for w in waiters {
            let windows = availability::list_availability(&self.pool, &w.id)
                .await
                .map_err(AppError::from)?
                .into_iter()
                .filter(|window| window.is_effective_on(target_week))
                .collect();
            let preference = availability::find_preference(&self.pool, &w.id)
                .await
                .map_err(AppError::from)?;

            let (roles, shift_types, sections, max_h, min_h, max_s, avoid) = match &preference {
                Some(p) => (
                    p.roles(),
                    p.shift_types(),
                    p.sections(),
                    p.max_hours_per_week,
                    p.min_hours_per_week,
                    p.max_shifts_per_week,
                    p.avoid_clopening,
                ),
                None => (Vec::new(), Vec::new(), Vec::new(), None, None, None, true),
            };

            contexts.push(StaffContext {
                waiter_id: w.id,
                name: w.name,
                role: w.role,
                is_active: w.is_active,
                availability: windows,
                preferred_roles: roles,
                preferred_shift_types: shift_types,
                preferred_sections: sections,
                max_hours_per_week: max_h,
                min_hours_per_week: min_h,
                max_shifts_per_week: max_s,
                avoid_clopening: avoid,
                assigned: Vec::new(),
            });
        }

        // Deterministic iteration order regardless of query plan
        contexts.sort_by(|a, b| a.waiter_id.cmp(&b.waiter_id));
        Ok(contexts)
    }
}
