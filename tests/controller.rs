//! End-to-end tests over the HTTP surface, backed by the in-memory services.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use maplit::hashset;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use bistro_lib::controller::routing::make_router;
use bistro_lib::controller::AppState;
use bistro_lib::models::{DELIVERY_CREW_GROUP, MANAGER_GROUP};
use bistro_lib::services::{lock, new_store};

struct Ctx {
    app: Router,
    admin: i64,
    manager: i64,
    crew: i64,
    alice: i64,
    bob: i64,
    drinks: i64,
    lemonade: i64,
    pizza: i64,
}

fn setup() -> Ctx {
    let store = new_store();
    let (admin, manager, crew, alice, bob, drinks, lemonade, pizza);
    {
        let mut state = lock(&store);
        admin = state.seed_user("admin", true, &[]).0;
        manager = state.seed_user("mia", false, &[MANAGER_GROUP]).0;
        crew = state.seed_user("carl", false, &[DELIVERY_CREW_GROUP]).0;
        alice = state.seed_user("alice", false, &[]).0;
        bob = state.seed_user("bob", false, &[]).0;
        let drinks_id = state.seed_category("drinks", "Drinks");
        let mains = state.seed_category("mains", "Mains");
        drinks = drinks_id.0;
        lemonade = state.seed_menu_item("Lemonade", dec!(2.50), drinks_id).0;
        pizza = state.seed_menu_item("Margherita", dec!(9.00), mains).0;
    }

    Ctx {
        app: make_router(AppState::in_memory(store)),
        admin,
        manager,
        crew,
        alice,
        bob,
        drinks,
        lemonade,
        pizza,
    }
}

async fn request(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<i64>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, user.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

    (status, value)
}

async fn get(app: &Router, uri: &str, user: Option<i64>) -> (StatusCode, Value) {
    request(app, Method::GET, uri, user, None).await
}

async fn post(app: &Router, uri: &str, user: Option<i64>, body: Value) -> (StatusCode, Value) {
    request(app, Method::POST, uri, user, Some(body)).await
}

/// Places an order for `user` after filling the cart with one line.
async fn place_order(ctx: &Ctx, user: i64, menuitem_id: i64, quantity: i64) -> i64 {
    let (status, _) = post(
        &ctx.app,
        "/api/cart/menu-items",
        Some(user),
        json!({ "menuitem_id": menuitem_id, "quantity": quantity }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = post(&ctx.app, "/api/orders", Some(user), json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn healthcheck_responds() {
    let ctx = setup();

    let (status, _) = get(&ctx.app, "/healthcheck", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn cart_to_order_flow_freezes_prices_and_empties_the_cart() {
    let ctx = setup();

    let (status, line) = post(
        &ctx.app,
        "/api/cart/menu-items",
        Some(ctx.alice),
        json!({ "menuitem_id": ctx.lemonade, "quantity": 3 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(line["quantity"], 3);
    assert_eq!(line["unit_price"], "2.50");
    assert_eq!(line["price"], "7.50");
    assert_eq!(line["menuitem"]["title"], "Lemonade");

    let (status, order) = post(&ctx.app, "/api/orders", Some(ctx.alice), json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "placed");
    assert_eq!(order["total"], "7.50");
    assert_eq!(order["user"]["username"], "alice");
    assert!(order["delivery_crew"].is_null());
    assert_eq!(order["order_items"].as_array().unwrap().len(), 1);
    assert_eq!(order["order_items"][0]["quantity"], 3);
    assert_eq!(order["order_items"][0]["unit_price"], "2.50");
    assert_eq!(order["order_items"][0]["price"], "7.50");

    let (status, cart) = get(&ctx.app, "/api/cart/menu-items", Some(ctx.alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cart.as_array().unwrap().is_empty());

    let (status, body) = post(&ctx.app, "/api/orders", Some(ctx.alice), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Cart is empty");
}

#[tokio::test]
async fn adding_the_same_menu_item_replaces_the_line() {
    let ctx = setup();

    let (status, _) = post(
        &ctx.app,
        "/api/cart/menu-items",
        Some(ctx.alice),
        json!({ "menuitem_id": ctx.lemonade, "quantity": 1 }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, line) = post(
        &ctx.app,
        "/api/cart/menu-items",
        Some(ctx.alice),
        json!({ "menuitem_id": ctx.lemonade, "quantity": 5 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(line["quantity"], 5);
    assert_eq!(line["price"], "12.50");

    let (_, cart) = get(&ctx.app, "/api/cart/menu-items", Some(ctx.alice)).await;
    assert_eq!(cart.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cart_rejects_bad_lines() {
    let ctx = setup();

    let (status, body) = post(
        &ctx.app,
        "/api/cart/menu-items",
        Some(ctx.alice),
        json!({ "menuitem_id": 9999 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Menu item does not exist");

    let (status, _) = post(
        &ctx.app,
        "/api/cart/menu-items",
        Some(ctx.alice),
        json!({ "menuitem_id": ctx.lemonade, "quantity": 0 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(
        &ctx.app,
        "/api/cart/menu-items",
        Some(ctx.alice),
        json!({ "menuitem_id": ctx.lemonade, "quantity": 20_000 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Within the quantity bound, but 9999 lemonades overflow the price
    // columns.
    let (status, body) = post(
        &ctx.app,
        "/api/cart/menu-items",
        Some(ctx.alice),
        json!({ "menuitem_id": ctx.lemonade, "quantity": 9_999 }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Line price exceeds 9999.99");

    let (_, cart) = get(&ctx.app, "/api/cart/menu-items", Some(ctx.alice)).await;
    assert!(cart.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn cart_quantity_defaults_to_one() {
    let ctx = setup();

    let (status, line) = post(
        &ctx.app,
        "/api/cart/menu-items",
        Some(ctx.alice),
        json!({ "menuitem_id": ctx.lemonade }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(line["quantity"], 1);
    assert_eq!(line["price"], "2.50");
}

#[tokio::test]
async fn menu_item_writes_need_a_manager() {
    let ctx = setup();
    let payload = json!({ "title": "Iced Tea", "price": "3.00", "category_id": ctx.drinks });

    for user in [ctx.alice, ctx.crew] {
        let (status, _) = post(&ctx.app, "/api/menu-items", Some(user), payload.clone()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    let (status, item) = post(&ctx.app, "/api/menu-items", Some(ctx.manager), payload).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["title"], "Iced Tea");
    assert_eq!(item["category"]["slug"], "drinks");
    let id = item["id"].as_i64().unwrap();

    let (status, item) = request(
        &ctx.app,
        Method::PATCH,
        &format!("/api/menu-items/{}", id),
        Some(ctx.manager),
        Some(json!({ "price": "3.25" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["price"], "3.25");
    assert_eq!(item["title"], "Iced Tea");

    let (status, _) = request(
        &ctx.app,
        Method::DELETE,
        &format!("/api/menu-items/{}", id),
        Some(ctx.manager),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = get(&ctx.app, &format!("/api/menu-items/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn replacing_a_menu_item_overwrites_every_field() {
    let ctx = setup();

    let (status, item) = request(
        &ctx.app,
        Method::PUT,
        &format!("/api/menu-items/{}", ctx.lemonade),
        Some(ctx.manager),
        Some(json!({ "title": "Pink Lemonade", "price": "2.75", "featured": true, "category_id": ctx.drinks })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["title"], "Pink Lemonade");
    assert_eq!(item["price"], "2.75");
    assert_eq!(item["featured"], true);
}

#[tokio::test]
async fn categories_are_administrator_only() {
    let ctx = setup();
    let payload = json!({ "slug": "desserts", "title": "Desserts" });

    let (status, _) = post(&ctx.app, "/api/categories", Some(ctx.manager), payload.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, category) = post(&ctx.app, "/api/categories", Some(ctx.admin), payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(category["slug"], "desserts");

    let (status, body) = post(&ctx.app, "/api/categories", Some(ctx.admin), payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Category with this slug already exists");

    let (status, categories) = get(&ctx.app, "/api/categories", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(categories.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn menu_listing_filters_searches_orders_and_pages() {
    let ctx = setup();

    let (status, page) = get(&ctx.app, "/api/menu-items", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 2);
    assert_eq!(page["results"].as_array().unwrap().len(), 2);

    let (_, page) = get(&ctx.app, "/api/menu-items?category=Drinks", None).await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["title"], "Lemonade");

    let (_, page) = get(&ctx.app, "/api/menu-items?search=lemon", None).await;
    assert_eq!(page["count"], 1);
    assert_eq!(page["results"][0]["title"], "Lemonade");

    let (_, page) = get(&ctx.app, "/api/menu-items?ordering=-price", None).await;
    assert_eq!(page["results"][0]["title"], "Margherita");

    let (_, page) = get(&ctx.app, "/api/menu-items?ordering=price", None).await;
    assert_eq!(page["results"][0]["title"], "Lemonade");

    let (_, page) = get(&ctx.app, "/api/menu-items?per_page=1&page=2", None).await;
    assert_eq!(page["count"], 2);
    assert_eq!(page["results"].as_array().unwrap().len(), 1);
    assert_eq!(page["results"][0]["title"], "Margherita");

    let (_, page) = get(&ctx.app, "/api/menu-items?per_page=1&page=5", None).await;
    assert!(page["results"].as_array().unwrap().is_empty());

    let (status, item) = get(&ctx.app, &format!("/api/menu-items/{}", ctx.pizza), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["title"], "Margherita");
    assert_eq!(item["category"]["title"], "Mains");
}

#[tokio::test]
async fn group_membership_is_managed_by_managers() {
    let ctx = setup();

    let (status, _) = post(
        &ctx.app,
        "/api/groups/delivery-crew/users",
        Some(ctx.alice),
        json!({ "username": "bob" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = post(
        &ctx.app,
        "/api/groups/delivery-crew/users",
        Some(ctx.manager),
        json!({ "username": "bob" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["detail"], "User added to delivery crew");

    let (status, members) = get(&ctx.app, "/api/groups/delivery-crew/users", Some(ctx.manager)).await;
    assert_eq!(status, StatusCode::OK);
    let usernames: std::collections::HashSet<String> = members
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["username"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(usernames, hashset! { "carl".to_string(), "bob".to_string() });

    let (status, body) = request(
        &ctx.app,
        Method::DELETE,
        &format!("/api/groups/delivery-crew/users/{}", ctx.bob),
        Some(ctx.manager),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "User removed from delivery crew");

    let (_, members) = get(&ctx.app, "/api/groups/delivery-crew/users", Some(ctx.manager)).await;
    assert_eq!(members.as_array().unwrap().len(), 1);

    let (status, _) = post(
        &ctx.app,
        "/api/groups/manager/users",
        Some(ctx.manager),
        json!({ "username": "nobody" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = get(&ctx.app, "/api/groups/cooks/users", Some(ctx.manager)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Nonexistent groups are missing for every caller, not a role failure.
    let (status, _) = get(&ctx.app, "/api/groups/cooks/users", Some(ctx.alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn orders_are_scoped_to_their_viewer() {
    let ctx = setup();
    let order_id = place_order(&ctx, ctx.alice, ctx.lemonade, 2).await;

    let (status, _) = get(&ctx.app, &format!("/api/orders/{}", order_id), Some(ctx.alice)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&ctx.app, &format!("/api/orders/{}", order_id), Some(ctx.bob)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, orders) = get(&ctx.app, "/api/orders", Some(ctx.bob)).await;
    assert!(orders.as_array().unwrap().is_empty());

    // Not assigned to this order yet.
    let (status, _) = get(&ctx.app, &format!("/api/orders/{}", order_id), Some(ctx.crew)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, orders) = get(&ctx.app, "/api/orders", Some(ctx.manager)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn managers_assign_delivery_crew() {
    let ctx = setup();
    let order_id = place_order(&ctx, ctx.alice, ctx.lemonade, 2).await;
    let uri = format!("/api/orders/{}", order_id);

    let (status, _) = request(
        &ctx.app,
        Method::PUT,
        &uri,
        Some(ctx.alice),
        Some(json!({ "delivery_crew_id": ctx.crew })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = request(
        &ctx.app,
        Method::PUT,
        &uri,
        Some(ctx.manager),
        Some(json!({ "delivery_crew_id": ctx.bob })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "User is not delivery crew");

    let (status, _) = request(
        &ctx.app,
        Method::PUT,
        &uri,
        Some(ctx.manager),
        Some(json!({ "delivery_crew_id": 9999 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, order) = request(
        &ctx.app,
        Method::PUT,
        &uri,
        Some(ctx.manager),
        Some(json!({ "delivery_crew_id": ctx.crew })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["delivery_crew"]["username"], "carl");
    assert_eq!(order["status"], "placed");

    // Merge semantics: a later status write keeps the assignment.
    let (status, order) = request(
        &ctx.app,
        Method::PUT,
        &uri,
        Some(ctx.manager),
        Some(json!({ "status": "delivered" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["delivery_crew"]["username"], "carl");
    assert_eq!(order["status"], "delivered");
}

#[tokio::test]
async fn delivery_crew_may_only_move_the_status() {
    let ctx = setup();
    let order_id = place_order(&ctx, ctx.alice, ctx.lemonade, 1).await;
    let uri = format!("/api/orders/{}", order_id);

    // Unassigned crew does not see the order at all.
    let (status, _) = request(
        &ctx.app,
        Method::PATCH,
        &uri,
        Some(ctx.crew),
        Some(json!({ "status": "delivered" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(
        &ctx.app,
        Method::PUT,
        &uri,
        Some(ctx.manager),
        Some(json!({ "delivery_crew_id": ctx.crew })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = request(
        &ctx.app,
        Method::PATCH,
        &uri,
        Some(ctx.crew),
        Some(json!({ "status": "delivered", "total": "0.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Only status can be updated");

    let (status, body) = request(
        &ctx.app,
        Method::PATCH,
        &uri,
        Some(ctx.crew),
        Some(json!({ "status": "shipped" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Unknown order status 'shipped'");

    let (_, order) = get(&ctx.app, &uri, Some(ctx.alice)).await;
    assert_eq!(order["status"], "placed");
    assert_eq!(order["total"], "2.50");

    let (status, order) = request(
        &ctx.app,
        Method::PATCH,
        &uri,
        Some(ctx.crew),
        Some(json!({ "status": "delivered" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "delivered");

    let (status, body) = request(
        &ctx.app,
        Method::PATCH,
        &uri,
        Some(ctx.crew),
        Some(json!({ "status": "placed" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Delivered orders cannot be moved back to placed");
}

#[tokio::test]
async fn customers_cannot_patch_or_delete_orders() {
    let ctx = setup();
    let order_id = place_order(&ctx, ctx.alice, ctx.lemonade, 1).await;
    let uri = format!("/api/orders/{}", order_id);

    let (status, _) = request(
        &ctx.app,
        Method::PATCH,
        &uri,
        Some(ctx.alice),
        Some(json!({ "status": "delivered" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = request(&ctx.app, Method::DELETE, &uri, Some(ctx.alice), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = request(&ctx.app, Method::DELETE, &uri, Some(ctx.manager), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = get(&ctx.app, &uri, Some(ctx.alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(&ctx.app, Method::DELETE, &uri, Some(ctx.manager), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unauthenticated_callers_are_rejected() {
    let ctx = setup();

    let (status, body) = get(&ctx.app, "/api/cart/menu-items", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "Unauthorized");

    let (status, _) = get(&ctx.app, "/api/orders", Some(9999)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/orders")
        .header(header::AUTHORIZATION, "Bearer nonsense")
        .body(Body::empty())
        .unwrap();
    let response = ctx.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
