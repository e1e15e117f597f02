use sqlx::PgPool;

/// Idempotent startup schema. The unique cart constraint is what makes the
/// cart upsert atomic per (user, menu item) pair.
const UP: &[&str] = &[
    "
    CREATE TABLE IF NOT EXISTS categories (
        id    BIGSERIAL PRIMARY KEY,
        slug  VARCHAR(100) NOT NULL UNIQUE,
        title VARCHAR(255) NOT NULL
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS menu_items (
        id          BIGSERIAL PRIMARY KEY,
        title       VARCHAR(255) NOT NULL,
        price       NUMERIC(6,2) NOT NULL,
        featured    BOOLEAN NOT NULL DEFAULT FALSE,
        category_id BIGINT NOT NULL REFERENCES categories (id) ON DELETE RESTRICT
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS users (
        id           BIGSERIAL PRIMARY KEY,
        username     VARCHAR(150) NOT NULL UNIQUE,
        email        VARCHAR(255) NOT NULL,
        is_superuser BOOLEAN NOT NULL DEFAULT FALSE
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS user_groups (
        user_id    BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        group_name VARCHAR(150) NOT NULL,

        PRIMARY KEY (user_id, group_name)
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS cart_items (
        id          BIGSERIAL PRIMARY KEY,
        user_id     BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        menuitem_id BIGINT NOT NULL REFERENCES menu_items (id) ON DELETE CASCADE,
        quantity    INTEGER NOT NULL CHECK (quantity > 0),
        unit_price  NUMERIC(6,2) NOT NULL,
        price       NUMERIC(6,2) NOT NULL,

        CONSTRAINT cart_line UNIQUE (user_id, menuitem_id)
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS orders (
        id               BIGSERIAL PRIMARY KEY,
        user_id          BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        delivery_crew_id BIGINT REFERENCES users (id) ON DELETE SET NULL,
        status           BOOLEAN NOT NULL DEFAULT FALSE,
        total            NUMERIC(8,2) NOT NULL,
        date             DATE NOT NULL
    )
    ",
    "
    CREATE TABLE IF NOT EXISTS order_items (
        id          BIGSERIAL PRIMARY KEY,
        order_id    BIGINT NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
        menuitem_id BIGINT NOT NULL REFERENCES menu_items (id) ON DELETE CASCADE,
        quantity    INTEGER NOT NULL,
        unit_price  NUMERIC(6,2) NOT NULL,
        price       NUMERIC(6,2) NOT NULL,

        CONSTRAINT order_line UNIQUE (order_id, menuitem_id)
    )
    ",
];

pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in UP {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await
}
