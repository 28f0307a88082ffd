//! Domain services. Each takes an explicit [`Actor`](crate::auth::Actor)
//! where identity matters and owns its own transactions.

pub mod addresses;
pub mod audit;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod dashboard;
pub mod orders;

pub use addresses::AddressService;
pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
pub use dashboard::DashboardService;
pub use orders::OrderService;
