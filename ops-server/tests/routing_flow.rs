//! End-to-end routing: recommend → seat → clear, plus the no-double-seat
//! guarantee under concurrent seating.

use ops_server::core::Config;
use ops_server::core::ServerState;
use ops_server::db::repository::{restaurant, shift, table, visit, waiter, waitlist};
use ops_server::routing::service::{RouteRequest, RouterService};
use ops_server::tables::service::TableStateService;
use shared::models::{
    DiningTableCreate, LocationPreference, RestaurantConfig, RoutingMode, TableLocation,
    TablePreference, TableState, TableType, VisitTotals, WaiterCreate, WaiterRole, WaitlistStatus,
};
use shared::ErrorCode;

async fn setup_state() -> ServerState {
    ServerState::initialize_in_memory(&Config::for_tests()).await.unwrap()
}

async fn create_restaurant(state: &ServerState) -> String {
    let mut config = RestaurantConfig::default();
    config.routing.mode = RoutingMode::Rotation;
    restaurant::create(&state.pool, "Test Bistro", "UTC", Some(&config))
        .await
        .unwrap()
        .id
}

async fn add_table(
    state: &ServerState,
    restaurant_id: &str,
    number: i64,
    capacity: i64,
    table_type: TableType,
) -> String {
    table::create(
        &state.pool,
        restaurant_id,
        DiningTableCreate {
            section_id: None,
            table_number: number,
            capacity,
            table_type,
            location: TableLocation::Inside,
        },
    )
    .await
    .unwrap()
    .id
}

/// A waiter on an active shift, with optional service history baked in
async fn add_waiter_on_shift(
    state: &ServerState,
    restaurant_id: &str,
    name: &str,
    composite_score: f64,
    shift_tips: f64,
) -> (String, String) {
    let w = waiter::create(
        &state.pool,
        restaurant_id,
        WaiterCreate {
            name: name.into(),
            email: None,
            phone: None,
            role: WaiterRole::Server,
        },
    )
    .await
    .unwrap();
    sqlx::query("UPDATE waiters SET composite_score = ? WHERE id = ?")
        .bind(composite_score)
        .bind(&w.id)
        .execute(&state.pool)
        .await
        .unwrap();

    let s = shift::clock_in(&state.pool, restaurant_id, &w.id, None).await.unwrap();
    if shift_tips > 0.0 {
        shift::add_money(&state.pool, &s.id, shift_tips, shift_tips * 5.0).await.unwrap();
    }
    (w.id, s.id)
}

/// Give a waiter `count` currently-open tables by seating real parties
async fn occupy_tables(
    state: &ServerState,
    restaurant_id: &str,
    waiter_id: &str,
    start_number: i64,
    count: i64,
) {
    let router = RouterService::new(state.pool.clone());
    for i in 0..count {
        let table_id =
            add_table(state, restaurant_id, start_number + i, 2, TableType::Table).await;
        router.seat(restaurant_id, &table_id, waiter_id, 2, None).await.unwrap();
    }
}

#[tokio::test]
async fn seat_from_waitlist_prefers_booth_and_lighter_waiter() {
    let state = setup_state().await;
    let restaurant_id = create_restaurant(&state).await;

    // 1 clean booth (cap 4), 1 clean table (cap 2)
    let booth_id = add_table(&state, &restaurant_id, 1, 4, TableType::Booth).await;
    let _table_id = add_table(&state, &restaurant_id, 2, 2, TableType::Table).await;

    // Alice: score 78, 2 open tables, tips 45; Bob: score 65, 3 open tables, tips 62
    let (alice_id, _) = add_waiter_on_shift(&state, &restaurant_id, "Alice", 78.0, 45.0).await;
    let (bob_id, _) = add_waiter_on_shift(&state, &restaurant_id, "Bob", 65.0, 62.0).await;
    occupy_tables(&state, &restaurant_id, &alice_id, 100, 2).await;
    occupy_tables(&state, &restaurant_id, &bob_id, 200, 3).await;

    // Waitlist party of 4 preferring a booth
    let entry = waitlist::create(
        &state.pool,
        &restaurant_id,
        Some("Nguyen"),
        4,
        TablePreference::Booth,
        LocationPreference::None,
        None,
    )
    .await
    .unwrap();

    let router = RouterService::new(state.pool.clone());
    let request = RouteRequest { waitlist_id: Some(entry.id.clone()), ..Default::default() };
    let response = router.recommend(&restaurant_id, &request).await.unwrap();

    assert!(response.success, "expected a match: {response:?}");
    assert_eq!(response.table_id.as_deref(), Some(booth_id.as_str()));
    assert_eq!(response.waiter_id.as_deref(), Some(alice_id.as_str()));
    assert!(response.match_details.unwrap().type_matched);

    // Seat the recommendation
    let seated = router
        .seat(&restaurant_id, &booth_id, &alice_id, 4, Some(&entry.id))
        .await
        .unwrap();

    let booth = table::get(&state.pool, &booth_id).await.unwrap();
    assert_eq!(booth.state, TableState::Occupied);
    assert_eq!(booth.current_visit_id.as_deref(), Some(seated.id.as_str()));

    let entry = waitlist::get(&state.pool, &entry.id).await.unwrap();
    assert_eq!(entry.status, WaitlistStatus::Seated);
    assert_eq!(entry.visit_id.as_deref(), Some(seated.id.as_str()));
}

#[tokio::test]
async fn concurrent_seats_of_one_table_yield_exactly_one_visit() {
    let state = setup_state().await;
    let restaurant_id = create_restaurant(&state).await;
    let table_id = add_table(&state, &restaurant_id, 1, 4, TableType::Booth).await;
    let (alice_id, _) = add_waiter_on_shift(&state, &restaurant_id, "Alice", 78.0, 0.0).await;

    let router_a = RouterService::new(state.pool.clone());
    let router_b = RouterService::new(state.pool.clone());

    let (a, b) = tokio::join!(
        router_a.seat(&restaurant_id, &table_id, &alice_id, 4, None),
        router_b.seat(&restaurant_id, &table_id, &alice_id, 4, None),
    );

    let results = [a, b];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.code == ErrorCode::SeatConflict))
        .count();
    assert_eq!(winners, 1, "exactly one seat must commit");
    assert_eq!(conflicts, 1, "the loser must observe SeatConflict");

    // The loser's transaction rolled back: one visit exists for the table
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM visits WHERE table_id = ?")
        .bind(&table_id)
        .fetch_one(&state.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn clearing_a_visit_flows_money_and_dirties_the_table() {
    let state = setup_state().await;
    let restaurant_id = create_restaurant(&state).await;
    let table_id = add_table(&state, &restaurant_id, 1, 4, TableType::Table).await;
    let (alice_id, shift_id) = add_waiter_on_shift(&state, &restaurant_id, "Alice", 70.0, 0.0).await;

    let router = RouterService::new(state.pool.clone());
    let seated = router.seat(&restaurant_id, &table_id, &alice_id, 3, None).await.unwrap();

    let tables_service = TableStateService::new(state.pool.clone());
    let closed = tables_service
        .close_visit(
            &seated.id,
            Some(VisitTotals { subtotal: 80.0, tax: 8.0, total: 88.0, tip: 17.6 }),
        )
        .await
        .unwrap();

    assert!(closed.cleared_at.is_some());
    assert!(closed.duration_minutes.is_some());
    assert!((closed.tip_percentage.unwrap() - 20.0).abs() < 1e-9);

    let t = table::get(&state.pool, &table_id).await.unwrap();
    assert_eq!(t.state, TableState::Dirty);
    assert!(t.current_visit_id.is_none());

    let s = shift::get(&state.pool, &shift_id).await.unwrap();
    assert_eq!(s.total_tips, 17.6);
    assert_eq!(s.total_sales, 88.0);
    assert_eq!(s.total_covers, 3);

    // Double close observes a conflict-style error
    let again = tables_service.close_visit(&seated.id, None).await;
    assert!(again.is_err());

    // Clock out folds the shift into lifetime totals
    shift::clock_out(&state.pool, &shift_id).await.unwrap();
    let alice = waiter::get(&state.pool, &alice_id).await.unwrap();
    assert_eq!(alice.total_shifts, 1);
    assert_eq!(alice.total_covers, 3);
    assert!((alice.total_tips - 17.6).abs() < 1e-9);

    // Reseating requires a cleaning pass first
    let reseat = visit::find_open_by_table(&state.pool, &table_id).await.unwrap();
    assert!(reseat.is_none());
}

#[tokio::test]
async fn no_tables_and_no_waiters_are_reported_as_such() {
    let state = setup_state().await;
    let restaurant_id = create_restaurant(&state).await;
    let router = RouterService::new(state.pool.clone());

    // No tables at all
    let request = RouteRequest { party_size: Some(2), ..Default::default() };
    let response = router.recommend(&restaurant_id, &request).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("NoTables"));

    // A table but nobody on shift
    add_table(&state, &restaurant_id, 1, 4, TableType::Table).await;
    let response = router.recommend(&restaurant_id, &request).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("NoWaiters"));
}

#[tokio::test]
async fn hard_preference_fails_when_unsatisfiable() {
    let state = setup_state().await;
    let restaurant_id = create_restaurant(&state).await;
    add_table(&state, &restaurant_id, 1, 4, TableType::Table).await;
    add_waiter_on_shift(&state, &restaurant_id, "Alice", 70.0, 0.0).await;

    let router = RouterService::new(state.pool.clone());
    let request = RouteRequest {
        party_size: Some(2),
        table_preference: TablePreference::Booth,
        hard_preference: true,
        ..Default::default()
    };
    let response = router.recommend(&restaurant_id, &request).await.unwrap();
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("PreferenceUnsatisfiable"));

    // Soft by default: same request without the flag still seats the party
    let soft = RouteRequest {
        party_size: Some(2),
        table_preference: TablePreference::Booth,
        ..Default::default()
    };
    let response = router.recommend(&restaurant_id, &soft).await.unwrap();
    assert!(response.success);
}
