pub mod cart_item;
pub mod category;
pub mod menu_item;
pub mod order;
pub mod user;
