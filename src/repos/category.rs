use sqlx::PgConnection;

use crate::models::{Category, CategoryId, NewCategory};

pub async fn insert(conn: &mut PgConnection, data: &NewCategory) -> Result<Category, sqlx::Error> {
    sqlx::query_as::<_, Category>(
        "INSERT INTO categories (slug, title) VALUES ($1, $2) RETURNING id, slug, title",
    )
    .bind(&data.slug)
    .bind(&data.title)
    .fetch_one(&mut *conn)
    .await
}

pub async fn list(conn: &mut PgConnection) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>("SELECT id, slug, title FROM categories ORDER BY id")
        .fetch_all(&mut *conn)
        .await
}

pub async fn get(conn: &mut PgConnection, id: CategoryId) -> Result<Option<Category>, sqlx::Error> {
    sqlx::query_as::<_, Category>("SELECT id, slug, title FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Returns the number of deleted rows; a foreign key violation surfaces as
/// `sqlx::Error::Database` and means the category is still referenced.
pub async fn delete(conn: &mut PgConnection, id: CategoryId) -> Result<u64, sqlx::Error> {
    sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await
        .map(|done| done.rows_affected())
}
