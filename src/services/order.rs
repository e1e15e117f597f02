use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::debug;

use super::memory::{self, MemoryStore, StoredOrder, StoredOrderItem};
use super::types::ServiceResult;
use crate::errors::Error;
use crate::models::{
    parse_status, AuthUser, CartLineId, Order, OrderFilter, OrderId, OrderItem, OrderItemId,
    OrderPatch, OrderStatus, OrderUpdate, Role, UserId, DELIVERY_CREW_GROUP,
};
use crate::repos;

/// Order lifecycle: placement from the cart, listing scoped to the caller,
/// crew assignment and status transitions.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Converts the caller's cart into a placed order atomically; the cart is
    /// empty afterwards.
    async fn place_order(&self, caller: &AuthUser) -> ServiceResult<Order>;
    async fn list_orders(&self, caller: &AuthUser) -> ServiceResult<Vec<Order>>;
    async fn get_order(&self, caller: &AuthUser, id: OrderId) -> ServiceResult<Order>;
    /// Merge-writes crew assignment and status. Manager only.
    async fn replace_order(&self, caller: &AuthUser, id: OrderId, update: OrderUpdate)
        -> ServiceResult<Order>;
    /// Partial update; delivery crew may only move the status of an order
    /// assigned to them.
    async fn patch_order(&self, caller: &AuthUser, id: OrderId, patch: OrderPatch)
        -> ServiceResult<Order>;
    async fn delete_order(&self, caller: &AuthUser, id: OrderId) -> ServiceResult<()>;
}

/// Merged target values for the two mutable order columns.
fn merge_update(
    current: &Order,
    delivery_crew_id: Option<UserId>,
    status: Option<&str>,
) -> ServiceResult<(Option<UserId>, OrderStatus)> {
    let crew = match delivery_crew_id {
        Some(id) => Some(id),
        None => current.delivery_crew.as_ref().map(|u| u.id),
    };
    let status = match status {
        Some(raw) => {
            let next = parse_status(raw)?;
            if !current.status.can_transition(next) {
                return Err(Error::validation("Delivered orders cannot be moved back to placed"));
            }
            next
        }
        None => current.status,
    };

    Ok((crew, status))
}

pub struct OrderServiceImpl {
    db_pool: PgPool,
}

impl OrderServiceImpl {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    async fn load_orders(&self, filter: OrderFilter) -> ServiceResult<Vec<Order>> {
        let mut conn = self.db_pool.acquire().await?;

        let rows = repos::order::select(&mut conn, filter).await?;
        let ids: Vec<OrderId> = rows.iter().map(|row| row.id).collect();

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        if !ids.is_empty() {
            for row in repos::order::items_for_orders(&mut conn, &ids).await? {
                items_by_order.entry(row.order_id).or_default().push(row.into());
            }
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = items_by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect())
    }

    async fn load_order(&self, filter: OrderFilter) -> ServiceResult<Order> {
        self.load_orders(filter).await?.pop().ok_or(Error::NotFound)
    }

    /// Shared merge-write path for PUT and the manager PATCH.
    async fn apply_update(&self, id: OrderId, update: OrderUpdate) -> ServiceResult<Order> {
        let current = self.load_order(OrderFilter::default().with_id(id)).await?;

        if let Some(crew_id) = update.delivery_crew_id {
            let mut conn = self.db_pool.acquire().await?;
            repos::user::get(&mut conn, crew_id)
                .await?
                .ok_or(Error::NotFound)?;
            if !repos::user::in_group(&mut conn, crew_id, DELIVERY_CREW_GROUP).await? {
                return Err(Error::validation("User is not delivery crew"));
            }
        }
        let (crew, status) = merge_update(&current, update.delivery_crew_id, update.status.as_deref())?;

        let mut conn = self.db_pool.acquire().await?;
        repos::order::update(&mut conn, id, crew, status.into_db()).await?;
        debug!("Updated order {}: crew {:?}, status {:?}", id, crew, status);

        self.load_order(OrderFilter::default().with_id(id)).await
    }
}

#[async_trait]
impl OrderService for OrderServiceImpl {
    async fn place_order(&self, caller: &AuthUser) -> ServiceResult<Order> {
        let mut tx = self.db_pool.begin().await?;

        let lines = repos::cart_item::lock_lines(&mut tx, caller.id).await?;
        if lines.is_empty() {
            return Err(Error::validation("Cart is empty"));
        }

        let total: Decimal = lines.iter().map(|line| line.price).sum();
        let date = Utc::now().date_naive();
        let order_id = repos::order::insert(&mut tx, caller.id, total, date).await?;
        for line in &lines {
            repos::order::insert_item(
                &mut tx,
                order_id,
                line.menuitem_id,
                line.quantity,
                line.unit_price,
                line.price,
            )
            .await?;
        }
        // Clear by id: a line inserted after the locked read stays in the
        // cart instead of being destroyed without having been charged.
        let charged: Vec<CartLineId> = lines.iter().map(|line| line.id).collect();
        repos::cart_item::clear_lines(&mut tx, &charged).await?;
        tx.commit().await?;
        debug!(
            "User {} placed order {} with {} lines, total {}",
            caller.id,
            order_id,
            lines.len(),
            total
        );

        self.load_order(OrderFilter::default().with_id(order_id)).await
    }

    async fn list_orders(&self, caller: &AuthUser) -> ServiceResult<Vec<Order>> {
        self.load_orders(OrderFilter::visible_to(caller)).await
    }

    async fn get_order(&self, caller: &AuthUser, id: OrderId) -> ServiceResult<Order> {
        self.load_order(OrderFilter::visible_to(caller).with_id(id)).await
    }

    async fn replace_order(
        &self,
        _caller: &AuthUser,
        id: OrderId,
        update: OrderUpdate,
    ) -> ServiceResult<Order> {
        self.apply_update(id, update).await
    }

    async fn patch_order(
        &self,
        caller: &AuthUser,
        id: OrderId,
        patch: OrderPatch,
    ) -> ServiceResult<Order> {
        match caller.role {
            Role::Administrator | Role::Manager => {
                self.apply_update(
                    id,
                    OrderUpdate {
                        delivery_crew_id: patch.delivery_crew_id,
                        status: patch.status,
                    },
                )
                .await
            }
            Role::DeliveryCrew => {
                let filter = OrderFilter::visible_to(caller).with_id(id);
                let current = self.load_order(filter).await?;

                let raw = match &patch.status {
                    Some(raw) if patch.is_status_only() => raw.as_str(),
                    _ => return Err(Error::validation("Only status can be updated")),
                };
                let (crew, status) = merge_update(&current, None, Some(raw))?;

                let mut conn = self.db_pool.acquire().await?;
                repos::order::update(&mut conn, id, crew, status.into_db()).await?;
                debug!("Crew {} moved order {} to {:?}", caller.id, id, status);

                self.load_order(filter).await
            }
            Role::Customer => Err(Error::Forbidden),
        }
    }

    async fn delete_order(&self, _caller: &AuthUser, id: OrderId) -> ServiceResult<()> {
        let mut conn = self.db_pool.acquire().await?;

        if repos::order::delete(&mut conn, id).await? == 0 {
            return Err(Error::NotFound);
        }
        debug!("Deleted order {}", id);

        Ok(())
    }
}

pub struct OrderServiceMemory {
    inner: MemoryStore,
}

impl OrderServiceMemory {
    pub fn new(inner: MemoryStore) -> Self {
        Self { inner }
    }

    fn collect(state: &memory::MemoryState, filter: OrderFilter) -> Vec<Order> {
        state
            .orders
            .values()
            .filter(|stored| filter.matches(stored.id, stored.user_id, stored.delivery_crew_id))
            .filter_map(|stored| state.order(stored))
            .collect()
    }

    fn apply_update(
        state: &mut memory::MemoryState,
        id: OrderId,
        update: OrderUpdate,
    ) -> ServiceResult<Order> {
        let current = Self::collect(state, OrderFilter::default().with_id(id))
            .pop()
            .ok_or(Error::NotFound)?;

        if let Some(crew_id) = update.delivery_crew_id {
            let stored = state.users.get(&crew_id).ok_or(Error::NotFound)?;
            if !stored.groups.iter().any(|g| g == DELIVERY_CREW_GROUP) {
                return Err(Error::validation("User is not delivery crew"));
            }
        }
        let (crew, status) = merge_update(&current, update.delivery_crew_id, update.status.as_deref())?;

        let stored = state.orders.get_mut(&id).ok_or(Error::NotFound)?;
        stored.delivery_crew_id = crew;
        stored.status = status;

        Self::collect(state, OrderFilter::default().with_id(id))
            .pop()
            .ok_or(Error::NotFound)
    }
}

#[async_trait]
impl OrderService for OrderServiceMemory {
    async fn place_order(&self, caller: &AuthUser) -> ServiceResult<Order> {
        let mut state = memory::lock(&self.inner);

        let lines: Vec<_> = state
            .cart_lines
            .values()
            .filter(|line| line.user_id == caller.id)
            .cloned()
            .collect();
        if lines.is_empty() {
            return Err(Error::validation("Cart is empty"));
        }

        let total: Decimal = lines.iter().map(|line| line.price).sum();
        let id = OrderId(state.next_id());
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            items.push(StoredOrderItem {
                id: OrderItemId(state.next_id()),
                menuitem_id: line.menuitem_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                price: line.price,
            });
        }
        state.orders.insert(
            id,
            StoredOrder {
                id,
                user_id: caller.id,
                delivery_crew_id: None,
                status: OrderStatus::Placed,
                total,
                date: Utc::now().date_naive(),
                items,
            },
        );
        let charged: Vec<CartLineId> = lines.iter().map(|line| line.id).collect();
        state.cart_lines.retain(|line_id, _| !charged.contains(line_id));

        Self::collect(&state, OrderFilter::default().with_id(id))
            .pop()
            .ok_or(Error::NotFound)
    }

    async fn list_orders(&self, caller: &AuthUser) -> ServiceResult<Vec<Order>> {
        let state = memory::lock(&self.inner);

        Ok(Self::collect(&state, OrderFilter::visible_to(caller)))
    }

    async fn get_order(&self, caller: &AuthUser, id: OrderId) -> ServiceResult<Order> {
        let state = memory::lock(&self.inner);

        Self::collect(&state, OrderFilter::visible_to(caller).with_id(id))
            .pop()
            .ok_or(Error::NotFound)
    }

    async fn replace_order(
        &self,
        _caller: &AuthUser,
        id: OrderId,
        update: OrderUpdate,
    ) -> ServiceResult<Order> {
        let mut state = memory::lock(&self.inner);

        Self::apply_update(&mut state, id, update)
    }

    async fn patch_order(
        &self,
        caller: &AuthUser,
        id: OrderId,
        patch: OrderPatch,
    ) -> ServiceResult<Order> {
        let mut state = memory::lock(&self.inner);

        match caller.role {
            Role::Administrator | Role::Manager => Self::apply_update(
                &mut state,
                id,
                OrderUpdate {
                    delivery_crew_id: patch.delivery_crew_id,
                    status: patch.status,
                },
            ),
            Role::DeliveryCrew => {
                let filter = OrderFilter::visible_to(caller).with_id(id);
                let current = Self::collect(&state, filter).pop().ok_or(Error::NotFound)?;

                let raw = match &patch.status {
                    Some(raw) if patch.is_status_only() => raw.as_str(),
                    _ => return Err(Error::validation("Only status can be updated")),
                };
                let (crew, status) = merge_update(&current, None, Some(raw))?;

                let stored = state.orders.get_mut(&id).ok_or(Error::NotFound)?;
                stored.delivery_crew_id = crew;
                stored.status = status;

                Self::collect(&state, filter).pop().ok_or(Error::NotFound)
            }
            Role::Customer => Err(Error::Forbidden),
        }
    }

    async fn delete_order(&self, _caller: &AuthUser, id: OrderId) -> ServiceResult<()> {
        let mut state = memory::lock(&self.inner);

        state.orders.remove(&id).ok_or(Error::NotFound)?;

        Ok(())
    }
}
