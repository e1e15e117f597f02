pub mod common;
pub use self::common::*;

pub mod user;
pub use self::user::*;

pub mod category;
pub use self::category::*;

pub mod menu_item;
pub use self::menu_item::*;

pub mod cart_item;
pub use self::cart_item::*;

pub mod order;
pub use self::order::*;
