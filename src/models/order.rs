use std::str::FromStr;

use chrono::NaiveDate;
use derive_more::{Display, From, FromStr, Into};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

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
pub struct OrderId(pub i64);

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
pub struct OrderItemId(pub i64);

/// Order state machine. Backed by a boolean column (placed = false,
/// delivered = true); the only permitted transition is Placed → Delivered.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Placed,
    Delivered,
}

impl OrderStatus {
    pub fn into_db(self) -> bool {
        match self {
            OrderStatus::Placed => false,
            OrderStatus::Delivered => true,
        }
    }

    pub fn from_db(delivered: bool) -> Self {
        if delivered {
            OrderStatus::Delivered
        } else {
            OrderStatus::Placed
        }
    }

    /// Identity writes are accepted; the only real transition is
    /// Placed → Delivered.
    pub fn can_transition(self, to: OrderStatus) -> bool {
        self == to || (self == OrderStatus::Placed && to == OrderStatus::Delivered)
    }
}

impl FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "delivered" => Ok(OrderStatus::Delivered),
            _ => Err(()),
        }
    }
}

/// Order as served by the API, with owner, assigned crew and items expanded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user: User,
    pub delivery_crew: Option<User>,
    pub status: OrderStatus,
    pub total: Decimal,
    pub date: NaiveDate,
    pub order_items: Vec<OrderItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub menuitem: MenuItem,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub price: Decimal,
}

/// Flat row shape of an order joined with its owner and assigned crew.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct OrderRow {
    pub id: OrderId,
    pub user_id: UserId,
    pub username: String,
    pub email: String,
    pub delivery_crew_id: Option<UserId>,
    pub delivery_crew_username: Option<String>,
    pub delivery_crew_email: Option<String>,
    pub status: bool,
    pub total: Decimal,
    pub date: NaiveDate,
}

impl OrderRow {
    pub fn into_order(self, order_items: Vec<OrderItem>) -> Order {
        let delivery_crew = match (
            self.delivery_crew_id,
            self.delivery_crew_username,
            self.delivery_crew_email,
        ) {
            (Some(id), Some(username), Some(email)) => Some(User {
                id,
                username,
                email,
            }),
            _ => None,
        };

        Order {
            id: self.id,
            user: User {
                id: self.user_id,
                username: self.username,
                email: self.email,
            },
            delivery_crew,
            status: OrderStatus::from_db(self.status),
            total: self.total,
            date: self.date,
            order_items,
        }
    }
}

/// Flat row shape of an order item joined with menu item and category.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: OrderItemId,
    pub order_id: OrderId,
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

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
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

/// Selection mask for orders; unset fields do not constrain the selection.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderFilter {
    pub id: Option<OrderId>,
    pub customer: Option<UserId>,
    pub delivery_crew: Option<UserId>,
}

impl OrderFilter {
    /// Scope visible to the caller: administrators and managers see all
    /// orders, delivery crew only orders assigned to them, customers only
    /// their own.
    pub fn visible_to(caller: &super::AuthUser) -> Self {
        use super::Role::*;

        match caller.role {
            Administrator | Manager => OrderFilter::default(),
            DeliveryCrew => OrderFilter {
                delivery_crew: Some(caller.id),
                ..Default::default()
            },
            Customer => OrderFilter {
                customer: Some(caller.id),
                ..Default::default()
            },
        }
    }

    pub fn with_id(mut self, id: OrderId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn matches(&self, id: OrderId, customer: UserId, delivery_crew: Option<UserId>) -> bool {
        self.id.map_or(true, |v| v == id)
            && self.customer.map_or(true, |v| v == customer)
            && self.delivery_crew.map_or(true, |v| delivery_crew == Some(v))
    }
}

/// Merge payload for `PUT /api/orders/{id}`; unspecified fields keep their
/// prior values.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct OrderUpdate {
    pub delivery_crew_id: Option<UserId>,
    pub status: Option<String>,
}

/// Payload for `PATCH /api/orders/{id}`. Unknown fields are captured so the
/// delivery-crew path can reject anything besides `status`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct OrderPatch {
    pub delivery_crew_id: Option<UserId>,
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrderPatch {
    /// True when the patch touches `status` and nothing else.
    pub fn is_status_only(&self) -> bool {
        self.status.is_some() && self.delivery_crew_id.is_none() && self.extra.is_empty()
    }
}

/// Parses a wire status value, surfacing unknown values as a validation
/// failure.
pub fn parse_status(raw: &str) -> Result<OrderStatus, crate::errors::Error> {
    raw.parse()
        .map_err(|()| crate::errors::Error::Validation(format!("Unknown order status '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placed_to_delivered_is_the_only_real_transition() {
        use OrderStatus::*;

        assert!(Placed.can_transition(Delivered));
        assert!(Placed.can_transition(Placed));
        assert!(Delivered.can_transition(Delivered));
        assert!(!Delivered.can_transition(Placed));
    }

    #[test]
    fn status_round_trips_through_the_boolean_column() {
        assert_eq!(OrderStatus::from_db(OrderStatus::Placed.into_db()), OrderStatus::Placed);
        assert_eq!(
            OrderStatus::from_db(OrderStatus::Delivered.into_db()),
            OrderStatus::Delivered
        );
    }

    #[test]
    fn unknown_status_values_are_rejected() {
        assert!(parse_status("placed").is_ok());
        assert!(parse_status("delivered").is_ok());
        assert!(parse_status("shipped").is_err());
        assert!(parse_status("Delivered").is_err());
    }

    #[test]
    fn patch_with_extra_fields_is_not_status_only() {
        let patch: OrderPatch =
            serde_json::from_value(serde_json::json!({ "status": "delivered" })).unwrap();
        assert!(patch.is_status_only());

        let patch: OrderPatch =
            serde_json::from_value(serde_json::json!({ "status": "delivered", "total": "0.00" }))
                .unwrap();
        assert!(!patch.is_status_only());

        let patch: OrderPatch = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(!patch.is_status_only());
    }
}
