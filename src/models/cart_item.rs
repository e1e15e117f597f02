use derive_more::{Display, From, FromStr, Into};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::category::{Category, CategoryId};
use super::menu_item::{MenuItem, MenuItemId};
use super::user::{User, UserId};

#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[sqlx(transparent)]
pub struct CartLineId(pub i64);

/// One cart line: a menu item with a quantity and the unit price frozen at
/// the time the line was added or last replaced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub user: User,
    pub menuitem: MenuItem,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub price: Decimal,
}

/// Flat row shape of a cart line joined with owner, menu item and category.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CartLineRow {
    pub id: CartLineId,
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub menuitem_id: MenuItemId,
    pub menuitem_title: String,
    pub menuitem_price: Decimal,
    pub menuitem_featured: bool,
    pub category_id: CategoryId,
    pub category_slug: String,
    pub category_title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub price: Decimal,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        CartLine {
            id: row.id,
            user: User {
                id: row.user_id,
                username: row.username,
                email: row.email,
            },
            menuitem: MenuItem {
                id: row.menuitem_id,
                title: row.menuitem_title,
                price: row.menuitem_price,
                featured: row.menuitem_featured,
                category: Category {
                    id: row.category_id,
                    slug: row.category_slug,
                    title: row.category_title,
                },
            },
            quantity: row.quantity,
            unit_price: row.unit_price,
            price: row.price,
        }
    }
}

/// Upsert payload for `POST /api/cart/menu-items`. Replaces any existing
/// line for the same menu item; quantity defaults to 1 and is bounded so
/// the computed line price stays within the two-decimal fixed-point range.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct UpsertCartLine {
    pub menuitem_id: MenuItemId,
    #[validate(range(min = 1, max = 10_000))]
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}
