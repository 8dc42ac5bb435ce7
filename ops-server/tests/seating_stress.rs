//! Seating stress: random parties cycling through seat → clear across a
//! full floor, asserting the occupancy invariants hold throughout.

use ops_server::core::{Config, ServerState};
use ops_server::db::repository::{restaurant, shift, table, waiter};
use ops_server::routing::service::{RouteRequest, RouterService};
use ops_server::tables::service::TableStateService;
use ops_server::tables::state_machine::Provenance;
use rand::Rng;
use shared::models::{
    DiningTableCreate, RestaurantConfig, RoutingMode, TableLocation, TableState, TableType,
    VisitTotals, WaiterCreate, WaiterRole,
};

const TABLE_COUNT: i64 = 12;
const WAITER_COUNT: usize = 4;
const ROUNDS: usize = 60;

async fn seed(state: &ServerState) -> String {
    let mut config = RestaurantConfig::default();
    config.routing.mode = RoutingMode::Rotation;
    let r = restaurant::create(&state.pool, "Stress Test", "UTC", Some(&config))
        .await
        .unwrap();

    for n in 1..=TABLE_COUNT {
        let table_type = match n % 3 {
            0 => TableType::Booth,
            1 => TableType::Table,
            _ => TableType::Bar,
        };
        table::create(
            &state.pool,
            &r.id,
            DiningTableCreate {
                section_id: None,
                table_number: n,
                capacity: 2 + (n % 5),
                table_type,
                location: TableLocation::Inside,
            },
        )
        .await
        .unwrap();
    }

    for i in 0..WAITER_COUNT {
        let w = waiter::create(
            &state.pool,
            &r.id,
            WaiterCreate {
                name: format!("Waiter {i}"),
                email: None,
                phone: None,
                role: WaiterRole::Server,
            },
        )
        .await
        .unwrap();
        shift::clock_in(&state.pool, &r.id, &w.id, None).await.unwrap();
    }

    r.id
}

/// Every occupied table points at exactly one open visit and vice versa
async fn assert_occupancy_invariant(state: &ServerState, restaurant_id: &str) {
    let tables = table::find_by_restaurant(&state.pool, restaurant_id).await.unwrap();
    for t in &tables {
        match t.state {
            TableState::Occupied => {
                let visit_id = t
                    .current_visit_id
                    .as_ref()
                    .unwrap_or_else(|| panic!("occupied table {} without visit", t.table_number));
                let open: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM visits WHERE id = ? AND cleared_at IS NULL",
                )
                .bind(visit_id)
                .fetch_one(&state.pool)
                .await
                .unwrap();
                assert_eq!(open, 1, "occupied table {} must hold an open visit", t.table_number);
            }
            _ => {
                assert!(
                    t.current_visit_id.is_none(),
                    "non-occupied table {} holds a visit pointer",
                    t.table_number
                );
            }
        }

        // And no table ever accumulates two open visits
        let open_for_table: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM visits WHERE table_id = ? AND cleared_at IS NULL",
        )
        .bind(&t.id)
        .fetch_one(&state.pool)
        .await
        .unwrap();
        assert!(open_for_table <= 1, "table {} double-seated", t.table_number);
    }
}

#[tokio::test]
async fn random_service_cycles_preserve_invariants() {
    let state = ServerState::initialize_in_memory(&Config::for_tests()).await.unwrap();
    let restaurant_id = seed(&state).await;

    let router = RouterService::new(state.pool.clone());
    let tables_service = TableStateService::new(state.pool.clone());
    let mut rng = rand::thread_rng();
    let mut open_visits: Vec<String> = Vec::new();
    let mut seated = 0usize;

    for round in 0..ROUNDS {
        let party_size = rng.gen_range(1..=6);
        let request = RouteRequest { party_size: Some(party_size), ..Default::default() };
        let response = router.recommend(&restaurant_id, &request).await.unwrap();

        if response.success {
            let visit = router
                .seat(
                    &restaurant_id,
                    response.table_id.as_deref().unwrap(),
                    response.waiter_id.as_deref().unwrap(),
                    party_size,
                    None,
                )
                .await
                .unwrap();
            open_visits.push(visit.id);
            seated += 1;
        }

        // Clear a random open visit about half the time, then bus the table
        if !open_visits.is_empty() && (rng.gen_bool(0.5) || !response.success) {
            let victim = open_visits.remove(rng.gen_range(0..open_visits.len()));
            let total = rng.gen_range(20.0..120.0);
            let closed = tables_service
                .close_visit(
                    &victim,
                    Some(VisitTotals {
                        subtotal: total * 0.9,
                        tax: total * 0.1,
                        total,
                        tip: total * 0.2,
                    }),
                )
                .await
                .unwrap();
            // dirty → clean so the table re-enters the pool
            tables_service
                .apply(
                    &closed.table_id,
                    TableState::Clean,
                    Provenance::System { operation: "busser.reset".into() },
                    None,
                )
                .await
                .unwrap();
        }

        if round % 10 == 9 {
            assert_occupancy_invariant(&state, &restaurant_id).await;
        }
    }

    assert!(seated > 10, "the floor should have cycled plenty of parties: {seated}");
    assert_occupancy_invariant(&state, &restaurant_id).await;

    // Every accepted transition appended exactly one audit row: occupy +
    // clear (+ reset) per closed visit, occupy per still-open visit
    let log_rows: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM table_state_log WHERE source IN ('system')",
    )
    .fetch_one(&state.pool)
    .await
    .unwrap();
    assert!(log_rows >= seated as i64);
}
