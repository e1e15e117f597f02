use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use super::*;

pub fn make_router(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/api/menu-items", get(list_menu_items).post(create_menu_item))
        .route(
            "/api/menu-items/:menu_item_id",
            get(get_menu_item)
                .put(replace_menu_item)
                .patch(update_menu_item)
                .delete(delete_menu_item),
        )
        .route("/api/categories", get(list_categories).post(create_category))
        .route("/api/groups/:group/users", get(list_group_users).post(add_group_user))
        .route("/api/groups/:group/users/:user_id", axum::routing::delete(remove_group_user))
        .route(
            "/api/cart/menu-items",
            get(get_cart).post(set_cart_item).delete(clear_cart),
        )
        .route("/api/orders", get(list_orders).post(place_order))
        .route(
            "/api/orders/:order_id",
            get(get_order)
                .put(replace_order)
                .patch(patch_order)
                .delete(delete_order),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
