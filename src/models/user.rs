use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};

/// Name of the managers group in the role directory.
pub const MANAGER_GROUP: &str = "Manager";
/// Name of the delivery crew group in the role directory.
pub const DELIVERY_CREW_GROUP: &str = "Delivery crew";

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
pub struct UserId(pub i64);

/// Public user representation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

/// Effective role of a caller, resolved once per request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Administrator,
    Manager,
    DeliveryCrew,
    Customer,
}

impl Role {
    /// Resolves the highest-precedence role from the superuser flag and group
    /// memberships: Administrator > Manager > DeliveryCrew > Customer.
    pub fn resolve<S: AsRef<str>>(is_superuser: bool, groups: &[S]) -> Role {
        if is_superuser {
            return Role::Administrator;
        }
        if groups.iter().any(|g| g.as_ref() == MANAGER_GROUP) {
            return Role::Manager;
        }
        if groups.iter().any(|g| g.as_ref() == DELIVERY_CREW_GROUP) {
            return Role::DeliveryCrew;
        }
        Role::Customer
    }

    pub fn is_manager(self) -> bool {
        matches!(self, Role::Administrator | Role::Manager)
    }
}

/// Authenticated caller with the resolved effective role.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn as_user(&self) -> User {
        User {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// Named staff group addressable through the membership endpoints.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserGroup {
    Manager,
    DeliveryCrew,
}

impl UserGroup {
    /// Parses the URL segment form used by `/api/groups/{group}/users`.
    pub fn from_path_segment(s: &str) -> Option<Self> {
        match s {
            "manager" => Some(UserGroup::Manager),
            "delivery-crew" => Some(UserGroup::DeliveryCrew),
            _ => None,
        }
    }

    /// Group name as stored in the role directory.
    pub fn name(self) -> &'static str {
        match self {
            UserGroup::Manager => MANAGER_GROUP,
            UserGroup::DeliveryCrew => DELIVERY_CREW_GROUP,
        }
    }
}
