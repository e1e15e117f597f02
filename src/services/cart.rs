use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::debug;
use validator::Validate;

use super::memory::{self, MemoryStore, StoredCartLine};
use super::types::ServiceResult;
use crate::errors::Error;
use crate::models::{CartLine, CartLineId, UpsertCartLine, UserId};
use crate::repos;

/// Per-user cart. One line per menu item; the unit price is frozen at the
/// catalog price in effect when the line is written.
#[async_trait]
pub trait CartService: Send + Sync {
    async fn get_cart(&self, user_id: UserId) -> ServiceResult<Vec<CartLine>>;
    /// Inserts or replaces the line for the payload's menu item. Returns the
    /// resulting line and whether it was newly created.
    async fn set_item(&self, user_id: UserId, data: UpsertCartLine) -> ServiceResult<(CartLine, bool)>;
    async fn clear_cart(&self, user_id: UserId) -> ServiceResult<()>;
}

/// Computes the line price, rejecting values the NUMERIC(6,2) price columns
/// cannot hold.
fn line_price(quantity: i32, unit_price: Decimal) -> Result<Decimal, Error> {
    let price = Decimal::from(quantity) * unit_price;
    if price > Decimal::new(9999_99, 2) {
        return Err(Error::validation("Line price exceeds 9999.99"));
    }

    Ok(price)
}

pub struct CartServiceImpl {
    db_pool: PgPool,
}

impl CartServiceImpl {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CartService for CartServiceImpl {
    async fn get_cart(&self, user_id: UserId) -> ServiceResult<Vec<CartLine>> {
        let mut conn = self.db_pool.acquire().await?;

        let rows = repos::cart_item::list(&mut conn, user_id).await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    async fn set_item(&self, user_id: UserId, data: UpsertCartLine) -> ServiceResult<(CartLine, bool)> {
        data.validate()?;
        let mut tx = self.db_pool.begin().await?;

        let menu_item = repos::menu_item::get(&mut tx, data.menuitem_id)
            .await?
            .ok_or_else(|| Error::validation("Menu item does not exist"))?;
        let unit_price = menu_item.price;
        let price = line_price(data.quantity, unit_price)?;

        let (id, created) = repos::cart_item::upsert(
            &mut tx,
            user_id,
            data.menuitem_id,
            data.quantity,
            unit_price,
            price,
        )
        .await?;
        let row = repos::cart_item::get(&mut tx, id)
            .await?
            .ok_or(Error::NotFound)?;
        tx.commit().await?;
        debug!(
            "User {} set cart line {} x{} (created: {})",
            user_id, data.menuitem_id, data.quantity, created
        );

        Ok((row.into(), created))
    }

    async fn clear_cart(&self, user_id: UserId) -> ServiceResult<()> {
        let mut conn = self.db_pool.acquire().await?;

        repos::cart_item::clear(&mut conn, user_id).await?;
        debug!("Cleared cart of user {}", user_id);

        Ok(())
    }
}

pub struct CartServiceMemory {
    inner: MemoryStore,
}

impl CartServiceMemory {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CartService for CartServiceMemory {
    async fn get_cart(&self, user_id: UserId) -> ServiceResult<Vec<CartLine>> {
        let state = memory::lock(&self.inner);

        Ok(state
            .cart_lines
            .values()
            .filter(|line| line.user_id == user_id)
            .filter_map(|line| state.cart_line(line))
            .collect())
    }

    async fn set_item(&self, user_id: UserId, data: UpsertCartLine) -> ServiceResult<(CartLine, bool)> {
        data.validate()?;
        let mut state = memory::lock(&self.inner);

        let unit_price = state
            .menu_items
            .get(&data.menuitem_id)
            .map(|item| item.price)
            .ok_or_else(|| Error::validation("Menu item does not exist"))?;
        let price = line_price(data.quantity, unit_price)?;

        let existing = state
            .cart_lines
            .values()
            .find(|line| line.user_id == user_id && line.menuitem_id == data.menuitem_id)
            .map(|line| line.id);
        let (id, created) = match existing {
            Some(id) => (id, false),
            None => (CartLineId(state.next_id()), true),
        };
        let stored = StoredCartLine {
            id,
            user_id,
            menuitem_id: data.menuitem_id,
            quantity: data.quantity,
            unit_price,
            price,
        };
        state.cart_lines.insert(id, stored.clone());

        let line = state.cart_line(&stored).ok_or(Error::NotFound)?;
        Ok((line, created))
    }

    async fn clear_cart(&self, user_id: UserId) -> ServiceResult<()> {
        let mut state = memory::lock(&self.inner);

        state.cart_lines.retain(|_, line| line.user_id != user_id);

        Ok(())
    }
}
