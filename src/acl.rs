//! Authorization policy: a pure decision function over the caller's
//! effective role. Deny by default; per-resource visibility (own cart, own
//! or assigned orders) is enforced by the services on top of these gates.

use crate::errors::Error;
use crate::models::Role;

/// Actions gated by the policy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    /// Read menu items and categories.
    BrowseCatalog,
    /// Create, edit or delete menu items.
    ManageMenu,
    /// Create or delete categories.
    ManageCategories,
    /// List or change Manager / Delivery-crew membership.
    ManageGroups,
    /// Read or mutate the caller's own cart.
    UseCart,
    /// Convert the caller's cart into an order.
    PlaceOrder,
    /// List or read orders (scoped to the caller's visibility).
    ViewOrders,
    /// Full update of an order, including crew assignment.
    ReplaceOrder,
    /// Partial update of an order.
    UpdateOrder,
    /// Delete an order.
    DeleteOrder,
}

/// Decides whether `role` may perform `action`.
pub fn decide(role: Role, action: Action) -> bool {
    use self::Action::*;
    use self::Role::*;

    match action {
        BrowseCatalog | UseCart | PlaceOrder | ViewOrders => true,
        ManageMenu | ManageGroups | ReplaceOrder | DeleteOrder => role.is_manager(),
        ManageCategories => role == Administrator,
        UpdateOrder => role.is_manager() || role == DeliveryCrew,
    }
}

/// Policy gate used by the handlers.
pub fn ensure(role: Role, action: Action) -> Result<(), Error> {
    if decide(role, action) {
        Ok(())
    } else {
        Err(Error::Forbidden)
    }
}
