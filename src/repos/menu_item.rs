use sqlx::{PgConnection, Postgres, QueryBuilder};

use crate::models::{MenuItemId, MenuItemQuery, MenuItemRow, MenuItemUpdate, NewMenuItem, PriceOrdering};

const SELECT: &str = "SELECT mi.id, mi.title, mi.price, mi.featured, \
     c.id AS category_id, c.slug AS category_slug, c.title AS category_title \
     FROM menu_items mi \
     JOIN categories c ON c.id = mi.category_id";

pub async fn insert(conn: &mut PgConnection, data: &NewMenuItem) -> Result<MenuItemId, sqlx::Error> {
    sqlx::query_scalar::<_, MenuItemId>(
        "INSERT INTO menu_items (title, price, featured, category_id) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(&data.title)
    .bind(data.price)
    .bind(data.featured)
    .bind(data.category_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn get(conn: &mut PgConnection, id: MenuItemId) -> Result<Option<MenuItemRow>, sqlx::Error> {
    sqlx::query_as::<_, MenuItemRow>(&format!("{} WHERE mi.id = $1", SELECT))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Filtered, searched and ordered listing. Pagination is applied by the
/// caller over the returned collection.
pub async fn list(conn: &mut PgConnection, query: &MenuItemQuery) -> Result<Vec<MenuItemRow>, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SELECT);
    let mut prefix = " WHERE ";

    if let Some(category) = &query.category {
        builder.push(prefix).push("c.title = ").push_bind(category.clone());
        prefix = " AND ";
    }

    if let Some(search) = &query.search {
        let pattern = format!("%{}%", search);
        builder
            .push(prefix)
            .push("(mi.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR c.title ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    match query.price_ordering() {
        Some(PriceOrdering::Ascending) => builder.push(" ORDER BY mi.price ASC, mi.id"),
        Some(PriceOrdering::Descending) => builder.push(" ORDER BY mi.price DESC, mi.id"),
        None => builder.push(" ORDER BY mi.id"),
    };

    builder.build_query_as().fetch_all(&mut *conn).await
}

pub async fn replace(conn: &mut PgConnection, id: MenuItemId, data: &NewMenuItem) -> Result<u64, sqlx::Error> {
    sqlx::query(
        "UPDATE menu_items SET title = $2, price = $3, featured = $4, category_id = $5 \
         WHERE id = $1",
    )
    .bind(id)
    .bind(&data.title)
    .bind(data.price)
    .bind(data.featured)
    .bind(data.category_id)
    .execute(&mut *conn)
    .await
    .map(|done| done.rows_affected())
}

pub async fn update(conn: &mut PgConnection, id: MenuItemId, data: &MenuItemUpdate) -> Result<u64, sqlx::Error> {
    sqlx::query(
        "UPDATE menu_items SET \
             title = COALESCE($2, title), \
             price = COALESCE($3, price), \
             featured = COALESCE($4, featured), \
             category_id = COALESCE($5, category_id) \
         WHERE id = $1",
    )
    .bind(id)
    .bind(data.title.as_deref())
    .bind(data.price)
    .bind(data.featured)
    .bind(data.category_id)
    .execute(&mut *conn)
    .await
    .map(|done| done.rows_affected())
}

pub async fn delete(conn: &mut PgConnection, id: MenuItemId) -> Result<u64, sqlx::Error> {
    sqlx::query("DELETE FROM menu_items WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map(|done| done.rows_affected())
}
