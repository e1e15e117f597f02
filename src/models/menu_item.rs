use derive_more::{Display, From, FromStr, Into};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::category::{Category, CategoryId};
use super::common::PageParams;

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
pub struct MenuItemId(pub i64);

/// Menu item as served by the API, with its category expanded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub title: String,
    pub price: Decimal,
    pub featured: bool,
    pub category: Category,
}

/// Flat row shape of a menu item joined with its category.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct MenuItemRow {
    pub id: MenuItemId,
    pub title: String,
    pub price: Decimal,
    pub featured: bool,
    pub category_id: CategoryId,
    pub category_slug: String,
    pub category_title: String,
}

impl From<MenuItemRow> for MenuItem {
    fn from(row: MenuItemRow) -> Self {
        MenuItem {
            id: row.id,
            title: row.title,
            price: row.price,
            featured: row.featured,
            category: Category {
                id: row.category_id,
                slug: row.category_slug,
                title: row.category_title,
            },
        }
    }
}

/// Payload for creating a menu item or fully replacing one.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewMenuItem {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(custom(function = "validate_price"))]
    pub price: Decimal,
    #[serde(default)]
    pub featured: bool,
    pub category_id: CategoryId,
}

/// Partial-update payload; unspecified fields retain prior values.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct MenuItemUpdate {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(custom(function = "validate_price"))]
    pub price: Option<Decimal>,
    pub featured: Option<bool>,
    pub category_id: Option<CategoryId>,
}

/// Max value representable by the NUMERIC(6,2) price columns.
fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    let max = Decimal::new(9999_99, 2);
    if *price >= Decimal::ZERO && *price <= max {
        Ok(())
    } else {
        Err(ValidationError::new("price"))
    }
}

/// Listing parameters: field filter, free-text search, price ordering and
/// pagination, all optional.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MenuItemQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Recognized `ordering` values for menu item listings.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PriceOrdering {
    Ascending,
    Descending,
}

impl MenuItemQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            per_page: self.per_page,
        }
    }

    pub fn price_ordering(&self) -> Option<PriceOrdering> {
        match self.ordering.as_deref() {
            Some("price") => Some(PriceOrdering::Ascending),
            Some("-price") => Some(PriceOrdering::Descending),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_must_fit_two_decimal_fixed_point() {
        let item = |price| NewMenuItem {
            title: "Lemonade".into(),
            price,
            featured: false,
            category_id: CategoryId(1),
        };

        assert!(item(dec!(2.50)).validate().is_ok());
        assert!(item(dec!(0.00)).validate().is_ok());
        assert!(item(dec!(-0.01)).validate().is_err());
        assert!(item(dec!(10000.00)).validate().is_err());
    }

    #[test]
    fn only_price_orderings_are_recognized() {
        let query = |ordering: Option<&str>| MenuItemQuery {
            ordering: ordering.map(Into::into),
            ..Default::default()
        };

        assert_eq!(
            query(Some("price")).price_ordering(),
            Some(PriceOrdering::Ascending)
        );
        assert_eq!(
            query(Some("-price")).price_ordering(),
            Some(PriceOrdering::Descending)
        );
        assert_eq!(query(Some("title")).price_ordering(), None);
        assert_eq!(query(None).price_ordering(), None);
    }
}
