//! Order Item Repository (POS ingest surface for menu analytics)

use shared::models::{OrderItem, OrderItemCreate};
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;

use super::{RepoError, RepoResult};

const COLUMNS: &str = "id, visit_id, menu_item, quantity, unit_price, total_price, ordered_at";

pub async fn add_to_visit(
    pool: &SqlitePool,
    visit_id: &str,
    data: OrderItemCreate,
) -> RepoResult<OrderItem> {
    if data.quantity < 1 {
        return Err(RepoError::Validation("quantity must be positive".into()));
    }
    let id = new_id();
    let total_price = data.unit_price.map(|p| p * data.quantity as f64);
    sqlx::query(
        "INSERT INTO order_items (id, visit_id, menu_item, quantity, unit_price, total_price, ordered_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(visit_id)
    .bind(&data.menu_item)
    .bind(data.quantity)
    .bind(data.unit_price)
    .bind(total_price)
    .bind(now_millis())
    .execute(pool)
    .await?;

    let item = sqlx::query_as::<_, OrderItem>(&format!("SELECT {COLUMNS} FROM order_items WHERE id = ?"))
        .bind(&id)
        .fetch_one(pool)
        .await?;
    Ok(item)
}

/// Order lines for a restaurant ordered within `[start, end)` millis
pub async fn find_in_range(
    pool: &SqlitePool,
    restaurant_id: &str,
    start_millis: i64,
    end_millis: i64,
) -> RepoResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT oi.id, oi.visit_id, oi.menu_item, oi.quantity, oi.unit_price, oi.total_price, oi.ordered_at \
         FROM order_items oi JOIN visits v ON v.id = oi.visit_id \
         WHERE v.restaurant_id = ? AND oi.ordered_at >= ? AND oi.ordered_at < ? \
         ORDER BY oi.ordered_at",
    )
    .bind(restaurant_id)
    .bind(start_millis)
    .bind(end_millis)
    .fetch_all(pool)
    .await?;
    Ok(items)
}
