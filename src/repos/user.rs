use sqlx::PgConnection;

use crate::models::{User, UserId};

#[derive(sqlx::FromRow)]
struct AuthRow {
    id: UserId,
    username: String,
    email: String,
    is_superuser: bool,
}

pub async fn get(conn: &mut PgConnection, id: UserId) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT id, username, email FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn get_by_username(conn: &mut PgConnection, username: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT id, username, email FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(&mut *conn)
        .await
}

/// User plus everything the policy needs: superuser flag and group names.
pub async fn auth_parts(
    conn: &mut PgConnection,
    id: UserId,
) -> Result<Option<(User, bool, Vec<String>)>, sqlx::Error> {
    let row = sqlx::query_as::<_, AuthRow>(
        "SELECT id, username, email, is_superuser FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let groups: Vec<String> =
        sqlx::query_scalar("SELECT group_name FROM user_groups WHERE user_id = $1")
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(Some((
        User {
            id: row.id,
            username: row.username,
            email: row.email,
        },
        row.is_superuser,
        groups,
    )))
}

pub async fn group_members(conn: &mut PgConnection, group: &str) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT u.id, u.username, u.email \
         FROM users u \
         JOIN user_groups g ON g.user_id = u.id \
         WHERE g.group_name = $1 \
         ORDER BY u.id",
    )
    .bind(group)
    .fetch_all(&mut *conn)
    .await
}

pub async fn in_group(conn: &mut PgConnection, id: UserId, group: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM user_groups WHERE user_id = $1 AND group_name = $2)",
    )
    .bind(id)
    .bind(group)
    .fetch_one(&mut *conn)
    .await
}

pub async fn add_to_group(conn: &mut PgConnection, id: UserId, group: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_groups (user_id, group_name) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(id)
    .bind(group)
    .execute(&mut *conn)
    .await
    .map(|_| ())
}

pub async fn remove_from_group(conn: &mut PgConnection, id: UserId, group: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM user_groups WHERE user_id = $1 AND group_name = $2")
        .bind(id)
        .bind(group)
        .execute(&mut *conn)
        .await
        .map(|_| ())
}
