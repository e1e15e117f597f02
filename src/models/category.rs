use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

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
pub struct CategoryId(pub i64);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub slug: String,
    pub title: String,
}

/// Payload for creating a category.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(length(min = 1, max = 100), custom(function = "validate_slug"))]
    pub slug: String,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let url_safe = slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if url_safe {
        Ok(())
    } else {
        Err(ValidationError::new("slug"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_must_be_url_safe() {
        let ok = NewCategory {
            slug: "soft-drinks_2".into(),
            title: "Soft Drinks".into(),
        };
        assert!(ok.validate().is_ok());

        let bad = NewCategory {
            slug: "soft drinks".into(),
            title: "Soft Drinks".into(),
        };
        assert!(bad.validate().is_err());
    }
}
