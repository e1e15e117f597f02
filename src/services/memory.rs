//! Shared in-memory storage behind the memory service implementations, used
//! where a live database is unavailable.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{
    CartLine, CartLineId, Category, CategoryId, MenuItem, MenuItemId, Order, OrderId, OrderItem,
    OrderItemId, OrderStatus, User, UserId,
};

/// Directory entry: the public user plus the attributes role resolution
/// reads.
#[derive(Clone, Debug)]
pub struct StoredUser {
    pub user: User,
    pub is_superuser: bool,
    pub groups: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct StoredMenuItem {
    pub id: MenuItemId,
    pub title: String,
    pub price: Decimal,
    pub featured: bool,
    pub category_id: CategoryId,
}

#[derive(Clone, Debug)]
pub struct StoredCartLine {
    pub id: CartLineId,
    pub user_id: UserId,
    pub menuitem_id: MenuItemId,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub price: Decimal,
}

#[derive(Clone, Debug)]
pub struct StoredOrderItem {
    pub id: OrderItemId,
    pub menuitem_id: MenuItemId,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub price: Decimal,
}

#[derive(Clone, Debug)]
pub struct StoredOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub delivery_crew_id: Option<UserId>,
    pub status: OrderStatus,
    pub total: Decimal,
    pub date: NaiveDate,
    pub items: Vec<StoredOrderItem>,
}

/// Flat relational state. Keyed maps are ordered so listings come out in id
/// order, matching the database queries.
#[derive(Debug, Default)]
pub struct MemoryState {
    next_id: i64,
    pub users: BTreeMap<UserId, StoredUser>,
    pub categories: BTreeMap<CategoryId, Category>,
    pub menu_items: BTreeMap<MenuItemId, StoredMenuItem>,
    pub cart_lines: BTreeMap<CartLineId, StoredCartLine>,
    pub orders: BTreeMap<OrderId, StoredOrder>,
}

pub type MemoryStore = Arc<Mutex<MemoryState>>;

pub fn new_store() -> MemoryStore {
    Arc::new(Mutex::new(MemoryState::default()))
}

/// Locks the store, recovering the guard if a previous holder panicked.
pub fn lock(store: &MemoryStore) -> MutexGuard<'_, MemoryState> {
    store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryState {
    pub fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn seed_user(&mut self, username: &str, is_superuser: bool, groups: &[&str]) -> UserId {
        let id = UserId(self.next_id());
        self.users.insert(
            id,
            StoredUser {
                user: User {
                    id,
                    username: username.to_string(),
                    email: format!("{}@example.com", username),
                },
                is_superuser,
                groups: groups.iter().map(|g| g.to_string()).collect(),
            },
        );
        id
    }

    pub fn seed_category(&mut self, slug: &str, title: &str) -> CategoryId {
        let id = CategoryId(self.next_id());
        self.categories.insert(
            id,
            Category {
                id,
                slug: slug.to_string(),
                title: title.to_string(),
            },
        );
        id
    }

    pub fn seed_menu_item(&mut self, title: &str, price: Decimal, category_id: CategoryId) -> MenuItemId {
        let id = MenuItemId(self.next_id());
        self.menu_items.insert(
            id,
            StoredMenuItem {
                id,
                title: title.to_string(),
                price,
                featured: false,
                category_id,
            },
        );
        id
    }

    pub fn user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|stored| stored.user.clone())
    }

    pub fn menu_item(&self, id: MenuItemId) -> Option<MenuItem> {
        let stored = self.menu_items.get(&id)?;
        let category = self.categories.get(&stored.category_id)?;

        Some(MenuItem {
            id: stored.id,
            title: stored.title.clone(),
            price: stored.price,
            featured: stored.featured,
            category: category.clone(),
        })
    }

    pub fn cart_line(&self, stored: &StoredCartLine) -> Option<CartLine> {
        Some(CartLine {
            id: stored.id,
            user: self.user(stored.user_id)?,
            menuitem: self.menu_item(stored.menuitem_id)?,
            quantity: stored.quantity,
            unit_price: stored.unit_price,
            price: stored.price,
        })
    }

    pub fn order(&self, stored: &StoredOrder) -> Option<Order> {
        let delivery_crew = match stored.delivery_crew_id {
            Some(id) => Some(self.user(id)?),
            None => None,
        };
        let mut order_items = Vec::with_capacity(stored.items.len());
        for item in &stored.items {
            order_items.push(OrderItem {
                id: item.id,
                menuitem: self.menu_item(item.menuitem_id)?,
                quantity: item.quantity,
                unit_price: item.unit_price,
                price: item.price,
            });
        }

        Some(Order {
            id: stored.id,
            user: self.user(stored.user_id)?,
            delivery_crew,
            status: stored.status,
            total: stored.total,
            date: stored.date,
            order_items,
        })
    }
}
