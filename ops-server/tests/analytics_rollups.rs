//! Rollup idempotence: recomputing over an unchanged visit set must
//! reproduce identical rows.

use chrono::Utc;
use ops_server::analytics::rollups::AnalyticsService;
use ops_server::core::{Config, ServerState};
use ops_server::db::repository::{metrics, order_item, restaurant, shift, table, waiter};
use ops_server::routing::service::RouterService;
use ops_server::tables::service::TableStateService;
use shared::models::{
    DiningTableCreate, OrderItemCreate, PeriodType, TableLocation, TableState, TableType,
    VisitTotals, WaiterCreate, WaiterRole,
};

async fn seed(state: &ServerState) -> (String, String) {
    let r = restaurant::create(&state.pool, "Rollup Test", "UTC", None).await.unwrap();
    let w = waiter::create(
        &state.pool,
        &r.id,
        WaiterCreate { name: "Dana".into(), email: None, phone: None, role: WaiterRole::Server },
    )
    .await
    .unwrap();
    shift::clock_in(&state.pool, &r.id, &w.id, None).await.unwrap();

    let router = RouterService::new(state.pool.clone());
    let tables_service = TableStateService::new(state.pool.clone());

    for n in 1..=3i64 {
        let t = table::create(
            &state.pool,
            &r.id,
            DiningTableCreate {
                section_id: None,
                table_number: n,
                capacity: 4,
                table_type: TableType::Table,
                location: TableLocation::Inside,
            },
        )
        .await
        .unwrap();

        let visit = router.seat(&r.id, &t.id, &w.id, 2, None).await.unwrap();
        order_item::add_to_visit(
            &state.pool,
            &visit.id,
            OrderItemCreate { menu_item: "Shakshuka".into(), quantity: 2, unit_price: Some(14.0) },
        )
        .await
        .unwrap();
        tables_service
            .close_visit(
                &visit.id,
                Some(VisitTotals { subtotal: 28.0, tax: 2.8, total: 30.8, tip: 6.0 }),
            )
            .await
            .unwrap();

        // Table back to clean so the next seat succeeds
        let dirty = table::get(&state.pool, &t.id).await.unwrap();
        assert_eq!(dirty.state, TableState::Dirty);
    }

    (r.id, w.id)
}

#[tokio::test]
async fn recomputing_rollups_is_byte_identical() {
    let state = ServerState::initialize_in_memory(&Config::for_tests()).await.unwrap();
    let (restaurant_id, waiter_id) = seed(&state).await;
    let today = Utc::now().date_naive();

    let analytics = AnalyticsService::new(state.pool.clone());
    analytics.rollup(&restaurant_id, PeriodType::Daily, today).await.unwrap();

    let waiter_first =
        metrics::find_waiter_metrics(&state.pool, &waiter_id, PeriodType::Daily, today)
            .await
            .unwrap()
            .expect("waiter rollup row");
    let restaurant_first =
        metrics::find_restaurant_metrics(&state.pool, &restaurant_id, PeriodType::Daily, today)
            .await
            .unwrap()
            .expect("restaurant rollup row");
    let menu_first = metrics::find_menu_metrics(&state.pool, &restaurant_id, PeriodType::Daily, today)
        .await
        .unwrap();

    // Recompute over the unchanged visit set
    analytics.rollup(&restaurant_id, PeriodType::Daily, today).await.unwrap();

    let waiter_second =
        metrics::find_waiter_metrics(&state.pool, &waiter_id, PeriodType::Daily, today)
            .await
            .unwrap()
            .unwrap();
    let restaurant_second =
        metrics::find_restaurant_metrics(&state.pool, &restaurant_id, PeriodType::Daily, today)
            .await
            .unwrap()
            .unwrap();
    let menu_second = metrics::find_menu_metrics(&state.pool, &restaurant_id, PeriodType::Daily, today)
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_string(&waiter_first).unwrap(),
        serde_json::to_string(&waiter_second).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&restaurant_first).unwrap(),
        serde_json::to_string(&restaurant_second).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&menu_first).unwrap(),
        serde_json::to_string(&menu_second).unwrap()
    );

    // Sanity on the content itself
    assert_eq!(waiter_first.total_visits, 3);
    assert_eq!(waiter_first.total_covers, 6);
    assert!((waiter_first.total_tips - 18.0).abs() < 1e-9);
    assert_eq!(restaurant_first.total_parties, 3);
    assert_eq!(restaurant_first.waiter_count, Some(1));
    assert_eq!(menu_first.len(), 1);
    assert_eq!(menu_first[0].times_ordered, 6);
    assert!((menu_first[0].total_revenue - 84.0).abs() < 1e-9);
    assert!(menu_first[0].hourly_distribution.is_some());
}

#[tokio::test]
async fn weekly_rollup_normalizes_to_monday() {
    let state = ServerState::initialize_in_memory(&Config::for_tests()).await.unwrap();
    let (restaurant_id, _) = seed(&state).await;
    let today = Utc::now().date_naive();
    let monday = ops_server::utils::time::week_start(today);

    let analytics = AnalyticsService::new(state.pool.clone());
    // Pass an arbitrary weekday; the bucket key must be the Monday
    analytics.rollup(&restaurant_id, PeriodType::Weekly, today).await.unwrap();

    let row = metrics::find_restaurant_metrics(&state.pool, &restaurant_id, PeriodType::Weekly, monday)
        .await
        .unwrap();
    assert!(row.is_some(), "weekly rollup must key on the Monday");
}
