pub mod types;
pub use self::types::*;

pub mod memory;
pub use self::memory::*;

pub mod users;
pub use self::users::*;

pub mod catalog;
pub use self::catalog::*;

pub mod cart;
pub use self::cart::*;

pub mod order;
pub use self::order::*;
