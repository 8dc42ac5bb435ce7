//! Scheduling engine end-to-end: brunch staffing, fairness, reasoning,
//! versioning, and the exclusive run lock.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use ops_server::core::{Config, ServerState};
use ops_server::db::repository::{availability, restaurant, schedule, waiter};
use ops_server::scheduling::engine::{RunLocks, SchedulingEngine};
use ops_server::scheduling::narrator::DisabledNarrator;
use ops_server::utils::time::times_overlap;
use shared::models::{
    AvailabilityType, RunStatus, ScheduleStatus, WaiterCreate, WaiterRole,
};
use shared::ErrorCode;

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Monday of a fixed target week
fn target_week() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
}

async fn setup_state() -> ServerState {
    ServerState::initialize_in_memory(&Config::for_tests()).await.unwrap()
}

/// Brunch scenario: Saturday 11–15 needs 5 servers and 2 bartenders; the
/// roster has exactly that many, all available Saturday.
async fn seed_brunch_restaurant(state: &ServerState) -> String {
    let r = restaurant::create(&state.pool, "Brunch House", "UTC", None).await.unwrap();

    for (index, role, count) in [(0, WaiterRole::Server, 5), (100, WaiterRole::Bartender, 2)] {
        for i in 0..count {
            let w = waiter::create(
                &state.pool,
                &r.id,
                WaiterCreate {
                    name: format!("Staff {}", index + i),
                    email: None,
                    phone: None,
                    role,
                },
            )
            .await
            .unwrap();
            // Saturday, 10:00–16:00
            availability::add_availability(
                &state.pool,
                &w.id,
                5,
                t(10, 0),
                t(16, 0),
                AvailabilityType::Available,
                None,
                None,
            )
            .await
            .unwrap();
        }
    }

    availability::add_requirement(
        &state.pool, &r.id, 5, t(11, 0), t(15, 0), WaiterRole::Server, 5, None, true,
    )
    .await
    .unwrap();
    availability::add_requirement(
        &state.pool, &r.id, 5, t(11, 0), t(15, 0), WaiterRole::Bartender, 2, None, true,
    )
    .await
    .unwrap();

    r.id
}

#[tokio::test]
async fn brunch_run_covers_slots_fairly_with_reasoning() {
    let state = setup_state().await;
    let restaurant_id = seed_brunch_restaurant(&state).await;
    let engine = SchedulingEngine::new(state.pool.clone(), Arc::new(DisabledNarrator));

    let result = engine
        .run(&state.run_locks, &restaurant_id, target_week())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed, "{:?}", result.error_message);
    let summary = result.summary.expect("completed runs carry a summary");
    assert_eq!(summary.items_created, 7);
    assert!(summary.coverage_pct >= 90.0, "coverage {}", summary.coverage_pct);
    assert!(summary.fairness_gini <= 0.25, "gini {}", summary.fairness_gini);
    assert!(summary.understaffed_slots.is_empty());

    let schedule_id = result.schedule_id.unwrap();
    let items = schedule::items_for_schedule(&state.pool, &schedule_id).await.unwrap();
    assert_eq!(items.len(), 7);
    assert_eq!(items.iter().filter(|i| i.role == WaiterRole::Server).count(), 5);
    assert_eq!(items.iter().filter(|i| i.role == WaiterRole::Bartender).count(), 2);

    // No waiter holds two overlapping items, and every item has reasoning
    // naming at least one recognized category
    for (i, item) in items.iter().enumerate() {
        for other in items.iter().skip(i + 1) {
            if item.waiter_id == other.waiter_id && item.shift_date == other.shift_date {
                assert!(
                    !times_overlap(item.shift_start, item.shift_end, other.shift_start, other.shift_end),
                    "waiter {} double-booked",
                    item.waiter_id
                );
            }
        }

        let reasoning = schedule::reasoning_for_item(&state.pool, &item.id)
            .await
            .unwrap()
            .expect("every item must have reasoning");
        let lines = reasoning.reason_lines().join(" ").to_lowercase();
        assert!(
            lines.contains("availab")
                || lines.contains("prefer")
                || lines.contains("fairness")
                || lines.contains("forecast")
                || lines.contains("prime"),
            "reasoning must name a category: {lines}"
        );
        assert!((0.0..=100.0).contains(&item.preference_match_score));
        assert!((-50.0..=50.0).contains(&item.fairness_impact_score));
    }
}

#[tokio::test]
async fn reruns_version_up_and_publish_archives_the_predecessor() {
    let state = setup_state().await;
    let restaurant_id = seed_brunch_restaurant(&state).await;
    let engine = SchedulingEngine::new(state.pool.clone(), Arc::new(DisabledNarrator));

    let first = engine.run(&state.run_locks, &restaurant_id, target_week()).await.unwrap();
    let second = engine.run(&state.run_locks, &restaurant_id, target_week()).await.unwrap();

    let s1 = schedule::get_schedule(&state.pool, &first.schedule_id.unwrap()).await.unwrap();
    let s2 = schedule::get_schedule(&state.pool, &second.schedule_id.unwrap()).await.unwrap();
    assert_eq!(s1.version, 1);
    assert_eq!(s2.version, 2);

    let p1 = schedule::publish(&state.pool, &s1.id).await.unwrap();
    assert_eq!(p1.status, ScheduleStatus::Published);

    let p2 = schedule::publish(&state.pool, &s2.id).await.unwrap();
    assert_eq!(p2.status, ScheduleStatus::Published);

    // Publishing v2 archived v1 in the same transaction
    let s1 = schedule::get_schedule(&state.pool, &s1.id).await.unwrap();
    assert_eq!(s1.status, ScheduleStatus::Archived);

    // A draft published twice loses the second time
    let again = schedule::publish(&state.pool, &s2.id).await;
    assert!(again.is_err());
}

#[tokio::test]
async fn run_lock_rejects_overlapping_runs_for_the_same_week() {
    let state = setup_state().await;
    let restaurant_id = seed_brunch_restaurant(&state).await;

    let guard = state
        .run_locks
        .try_acquire(&restaurant_id, target_week())
        .expect("first lock");

    let engine = SchedulingEngine::new(state.pool.clone(), Arc::new(DisabledNarrator));
    let err = engine
        .run(&state.run_locks, &restaurant_id, target_week())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::RunInProgress);

    drop(guard);
    let ok = engine.run(&state.run_locks, &restaurant_id, target_week()).await.unwrap();
    assert_eq!(ok.status, RunStatus::Completed);
}

#[tokio::test]
async fn unstaffable_slot_is_reported_not_fatal() {
    let state = setup_state().await;
    let r = restaurant::create(&state.pool, "Ghost Kitchen", "UTC", None).await.unwrap();
    // A requirement with zero staff on the roster
    availability::add_requirement(
        &state.pool, &r.id, 2, t(9, 0), t(13, 0), WaiterRole::Server, 2, None, false,
    )
    .await
    .unwrap();

    let engine = SchedulingEngine::new(state.pool.clone(), Arc::new(DisabledNarrator));
    let result = engine.run(&state.run_locks, &r.id, target_week()).await.unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    let summary = result.summary.unwrap();
    assert_eq!(summary.items_created, 0);
    assert_eq!(summary.coverage_pct, 0.0);
    assert_eq!(summary.understaffed_slots.len(), 1);
    assert!(summary.understaffed_slots[0].contains("short 2"));
}
