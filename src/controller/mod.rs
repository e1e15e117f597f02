//! HTTP surface: request extraction, policy gates and handlers. Handlers
//! check the policy, then delegate to the services.

pub mod routing;

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::debug;

use crate::acl::{self, Action};
use crate::errors::Error;
use crate::models::{
    AuthUser, CartLine, Category, MenuItem, MenuItemId, MenuItemQuery, MenuItemUpdate,
    NewCategory, NewMenuItem, Order, OrderId, OrderPatch, OrderUpdate, Page, UpsertCartLine, User,
    UserGroup, UserId,
};
use crate::services::{
    CartService, CartServiceImpl, CartServiceMemory, CatalogService, CatalogServiceImpl,
    CatalogServiceMemory, MemoryStore, OrderService, OrderServiceImpl, OrderServiceMemory,
    UserService, UserServiceImpl, UserServiceMemory,
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserService>,
    pub catalog: Arc<dyn CatalogService>,
    pub cart: Arc<dyn CartService>,
    pub orders: Arc<dyn OrderService>,
}

impl AppState {
    pub fn pg(db_pool: PgPool) -> Self {
        AppState {
            users: Arc::new(UserServiceImpl::new(db_pool.clone())),
            catalog: Arc::new(CatalogServiceImpl::new(db_pool.clone())),
            cart: Arc::new(CartServiceImpl::new(db_pool.clone())),
            orders: Arc::new(OrderServiceImpl::new(db_pool)),
        }
    }

    pub fn in_memory(store: MemoryStore) -> Self {
        AppState {
            users: Arc::new(UserServiceMemory::new(store.clone())),
            catalog: Arc::new(CatalogServiceMemory::new(store.clone())),
            cart: Arc::new(CartServiceMemory::new(store.clone())),
            orders: Arc::new(OrderServiceMemory::new(store)),
        }
    }
}

/// The gateway in front of this service authenticates requests and forwards
/// the user id in the Authorization header as a plain integer. Anything else
/// is treated as an unauthenticated caller.
#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(Error::Forbidden)?;
        let id: UserId = raw.trim().parse().map_err(|_| Error::Forbidden)?;

        let caller = state.users.get_auth_user(id).await?;
        debug!("Authenticated {} as {:?}", caller.username, caller.role);

        Ok(caller)
    }
}

pub async fn healthcheck() -> &'static str {
    "Ok"
}

pub async fn list_menu_items(
    State(state): State<AppState>,
    Query(query): Query<MenuItemQuery>,
) -> Result<Json<Page<MenuItem>>, Error> {
    Ok(Json(state.catalog.list_menu_items(query).await?))
}

pub async fn get_menu_item(
    State(state): State<AppState>,
    Path(id): Path<MenuItemId>,
) -> Result<Json<MenuItem>, Error> {
    Ok(Json(state.catalog.get_menu_item(id).await?))
}

pub async fn create_menu_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(data): Json<NewMenuItem>,
) -> Result<(StatusCode, Json<MenuItem>), Error> {
    acl::ensure(caller.role, Action::ManageMenu)?;

    let item = state.catalog.create_menu_item(data).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn replace_menu_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<MenuItemId>,
    Json(data): Json<NewMenuItem>,
) -> Result<Json<MenuItem>, Error> {
    acl::ensure(caller.role, Action::ManageMenu)?;

    Ok(Json(state.catalog.replace_menu_item(id, data).await?))
}

pub async fn update_menu_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<MenuItemId>,
    Json(data): Json<MenuItemUpdate>,
) -> Result<Json<MenuItem>, Error> {
    acl::ensure(caller.role, Action::ManageMenu)?;

    Ok(Json(state.catalog.update_menu_item(id, data).await?))
}

pub async fn delete_menu_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<MenuItemId>,
) -> Result<StatusCode, Error> {
    acl::ensure(caller.role, Action::ManageMenu)?;

    state.catalog.delete_menu_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, Error> {
    Ok(Json(state.catalog.list_categories().await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(data): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), Error> {
    acl::ensure(caller.role, Action::ManageCategories)?;

    let category = state.catalog.create_category(data).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[derive(Debug, Deserialize)]
pub struct AddGroupUser {
    pub username: String,
}

/// Unknown group paths are a missing resource for every caller; the role
/// gate applies only to the two real groups.
fn parse_group(segment: &str) -> Result<UserGroup, Error> {
    UserGroup::from_path_segment(segment).ok_or(Error::NotFound)
}

pub async fn list_group_users(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(group): Path<String>,
) -> Result<Json<Vec<User>>, Error> {
    let group = parse_group(&group)?;
    acl::ensure(caller.role, Action::ManageGroups)?;

    Ok(Json(state.users.group_members(group).await?))
}

pub async fn add_group_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(group): Path<String>,
    Json(data): Json<AddGroupUser>,
) -> Result<(StatusCode, Json<Value>), Error> {
    let group = parse_group(&group)?;
    acl::ensure(caller.role, Action::ManageGroups)?;

    state.users.add_to_group(&data.username, group).await?;
    let detail = match group {
        UserGroup::Manager => "User added to managers",
        UserGroup::DeliveryCrew => "User added to delivery crew",
    };
    Ok((StatusCode::CREATED, Json(json!({ "detail": detail }))))
}

pub async fn remove_group_user(
    State(state): State<AppState>,
    caller: AuthUser,
    Path((group, user_id)): Path<(String, UserId)>,
) -> Result<Json<Value>, Error> {
    let group = parse_group(&group)?;
    acl::ensure(caller.role, Action::ManageGroups)?;

    state.users.remove_from_group(user_id, group).await?;
    let detail = match group {
        UserGroup::Manager => "User removed from managers",
        UserGroup::DeliveryCrew => "User removed from delivery crew",
    };
    Ok(Json(json!({ "detail": detail })))
}

pub async fn get_cart(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<CartLine>>, Error> {
    acl::ensure(caller.role, Action::UseCart)?;

    Ok(Json(state.cart.get_cart(caller.id).await?))
}

pub async fn set_cart_item(
    State(state): State<AppState>,
    caller: AuthUser,
    Json(data): Json<UpsertCartLine>,
) -> Result<(StatusCode, Json<CartLine>), Error> {
    acl::ensure(caller.role, Action::UseCart)?;

    let (line, created) = state.cart.set_item(caller.id, data).await?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(line)))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<StatusCode, Error> {
    acl::ensure(caller.role, Action::UseCart)?;

    state.cart.clear_cart(caller.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_orders(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Json<Vec<Order>>, Error> {
    acl::ensure(caller.role, Action::ViewOrders)?;

    Ok(Json(state.orders.list_orders(&caller).await?))
}

pub async fn place_order(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<(StatusCode, Json<Order>), Error> {
    acl::ensure(caller.role, Action::PlaceOrder)?;

    let order = state.orders.place_order(&caller).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, Error> {
    acl::ensure(caller.role, Action::ViewOrders)?;

    Ok(Json(state.orders.get_order(&caller, id).await?))
}

pub async fn replace_order(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<OrderId>,
    Json(update): Json<OrderUpdate>,
) -> Result<Json<Order>, Error> {
    acl::ensure(caller.role, Action::ReplaceOrder)?;

    Ok(Json(state.orders.replace_order(&caller, id, update).await?))
}

pub async fn patch_order(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<OrderId>,
    Json(patch): Json<OrderPatch>,
) -> Result<Json<Order>, Error> {
    acl::ensure(caller.role, Action::UpdateOrder)?;

    Ok(Json(state.orders.patch_order(&caller, id, patch).await?))
}

pub async fn delete_order(
    State(state): State<AppState>,
    caller: AuthUser,
    Path(id): Path<OrderId>,
) -> Result<StatusCode, Error> {
    acl::ensure(caller.role, Action::DeleteOrder)?;

    state.orders.delete_order(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
