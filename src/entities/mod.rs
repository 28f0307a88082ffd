//! Database entities for the storefront core.

pub mod address;
pub mod cart;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod order_status_history;
pub mod product;
pub mod user;

pub use order::{OrderStatus, PaymentMethod};
pub use user::UserRole;
