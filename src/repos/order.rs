use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::models::{MenuItemId, OrderFilter, OrderId, OrderItemRow, OrderRow, UserId};

const SELECT: &str = "SELECT o.id, o.user_id, u.username, u.email, o.delivery_crew_id, \
     d.username AS delivery_crew_username, d.email AS delivery_crew_email, \
     o.status, o.total, o.date \
     FROM orders o \
     JOIN users u ON u.id = o.user_id \
     LEFT JOIN users d ON d.id = o.delivery_crew_id";

pub async fn insert(
    conn: &mut PgConnection,
    user_id: UserId,
    total: Decimal,
    date: NaiveDate,
) -> Result<OrderId, sqlx::Error> {
    sqlx::query_scalar::<_, OrderId>(
        "INSERT INTO orders (user_id, total, date) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(user_id)
    .bind(total)
    .bind(date)
    .fetch_one(&mut *conn)
    .await
}

pub async fn insert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    menuitem_id: MenuItemId,
    quantity: i32,
    unit_price: Decimal,
    price: Decimal,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_items (order_id, menuitem_id, quantity, unit_price, price) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(order_id)
    .bind(menuitem_id)
    .bind(quantity)
    .bind(unit_price)
    .bind(price)
    .execute(&mut *conn)
    .await
    .map(|_| ())
}

pub async fn select(conn: &mut PgConnection, filter: OrderFilter) -> Result<Vec<OrderRow>, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SELECT);
    builder.push(" WHERE TRUE");

    if let Some(id) = filter.id {
        builder.push(" AND o.id = ").push_bind(id);
    }
    if let Some(customer) = filter.customer {
        builder.push(" AND o.user_id = ").push_bind(customer);
    }
    if let Some(crew) = filter.delivery_crew {
        builder.push(" AND o.delivery_crew_id = ").push_bind(crew);
    }
    builder.push(" ORDER BY o.id");

    builder.build_query_as().fetch_all(&mut *conn).await
}

pub async fn items_for_orders(
    conn: &mut PgConnection,
    order_ids: &[OrderId],
) -> Result<Vec<OrderItemRow>, sqlx::Error> {
    let ids: Vec<i64> = order_ids.iter().map(|id| id.0).collect();

    sqlx::query_as::<_, OrderItemRow>(
        "SELECT oi.id, oi.order_id, \
             mi.id AS menuitem_id, mi.title AS menuitem_title, mi.price AS menuitem_price, \
             mi.featured AS menuitem_featured, \
             c.id AS category_id, c.slug AS category_slug, c.title AS category_title, \
             oi.quantity, oi.unit_price, oi.price \
         FROM order_items oi \
         JOIN menu_items mi ON mi.id = oi.menuitem_id \
         JOIN categories c ON c.id = mi.category_id \
         WHERE oi.order_id = ANY($1) \
         ORDER BY oi.id",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await
}

/// Writes the two mutable order columns; the service supplies the merged
/// values, everything else is frozen at creation.
pub async fn update(
    conn: &mut PgConnection,
    id: OrderId,
    delivery_crew_id: Option<UserId>,
    delivered: bool,
) -> Result<u64, sqlx::Error> {
    sqlx::query("UPDATE orders SET delivery_crew_id = $2, status = $3 WHERE id = $1")
        .bind(id)
        .bind(delivery_crew_id)
        .bind(delivered)
        .execute(&mut *conn)
        .await
        .map(|done| done.rows_affected())
}

pub async fn delete(conn: &mut PgConnection, id: OrderId) -> Result<u64, sqlx::Error> {
    sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map(|done| done.rows_affected())
}
