use rust_decimal::Decimal;
use sqlx::PgConnection;

use crate::models::{CartLineId, CartLineRow, MenuItemId, UserId};

const SELECT: &str = "SELECT ci.id, ci.user_id, u.username, u.email, \
     mi.id AS menuitem_id, mi.title AS menuitem_title, mi.price AS menuitem_price, \
     mi.featured AS menuitem_featured, \
     c.id AS category_id, c.slug AS category_slug, c.title AS category_title, \
     ci.quantity, ci.unit_price, ci.price \
     FROM cart_items ci \
     JOIN users u ON u.id = ci.user_id \
     JOIN menu_items mi ON mi.id = ci.menuitem_id \
     JOIN categories c ON c.id = mi.category_id";

/// Cart line values captured under lock during order placement.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct LockedLine {
    pub id: CartLineId,
    pub menuitem_id: MenuItemId,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub price: Decimal,
}

/// Atomic insert-or-replace on the (user, menu item) unique key. Returns the
/// line id and whether a new line was created.
pub async fn upsert(
    conn: &mut PgConnection,
    user_id: UserId,
    menuitem_id: MenuItemId,
    quantity: i32,
    unit_price: Decimal,
    price: Decimal,
) -> Result<(CartLineId, bool), sqlx::Error> {
    sqlx::query_as::<_, (CartLineId, bool)>(
        "INSERT INTO cart_items (user_id, menuitem_id, quantity, unit_price, price) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT ON CONSTRAINT cart_line DO UPDATE SET \
             quantity = EXCLUDED.quantity, \
             unit_price = EXCLUDED.unit_price, \
             price = EXCLUDED.price \
         RETURNING id, (xmax = 0) AS created",
    )
    .bind(user_id)
    .bind(menuitem_id)
    .bind(quantity)
    .bind(unit_price)
    .bind(price)
    .fetch_one(&mut *conn)
    .await
}

pub async fn get(conn: &mut PgConnection, id: CartLineId) -> Result<Option<CartLineRow>, sqlx::Error> {
    sqlx::query_as::<_, CartLineRow>(&format!("{} WHERE ci.id = $1", SELECT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn list(conn: &mut PgConnection, user_id: UserId) -> Result<Vec<CartLineRow>, sqlx::Error> {
    sqlx::query_as::<_, CartLineRow>(&format!("{} WHERE ci.user_id = $1 ORDER BY ci.id", SELECT))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
}

/// Reads and row-locks the user's cart lines so a concurrent upsert or a
/// second placement cannot change them before the cart is cleared. A line
/// inserted after this read is not locked; the caller must clear by the
/// returned ids so such a line survives placement.
pub async fn lock_lines(conn: &mut PgConnection, user_id: UserId) -> Result<Vec<LockedLine>, sqlx::Error> {
    sqlx::query_as::<_, LockedLine>(
        "SELECT id, menuitem_id, quantity, unit_price, price \
         FROM cart_items WHERE user_id = $1 ORDER BY id FOR UPDATE",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await
}

/// Deletes exactly the given lines.
pub async fn clear_lines(conn: &mut PgConnection, ids: &[CartLineId]) -> Result<u64, sqlx::Error> {
    let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();

    sqlx::query("DELETE FROM cart_items WHERE id = ANY($1)")
        .bind(ids)
        .execute(&mut *conn)
        .await
        .map(|done| done.rows_affected())
}

pub async fn clear(conn: &mut PgConnection, user_id: UserId) -> Result<u64, sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map(|done| done.rows_affected())
}
