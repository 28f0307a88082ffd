pub mod addresses;
pub mod carts;
pub mod checkout;
pub mod common;
pub mod dashboard;
pub mod health;
pub mod orders;
pub mod products;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::services::{
    AddressService, CartService, CatalogService, CheckoutService, DashboardService, OrderService,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub use crate::AppState;

/// Services layer used by the HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub catalog: Arc<CatalogService>,
    pub addresses: Arc<AddressService>,
    pub dashboard: Arc<DashboardService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            cart: Arc::new(CartService::new(
                db.clone(),
                event_sender.clone(),
                config.clone(),
            )),
            checkout: Arc::new(CheckoutService::new(
                db.clone(),
                event_sender.clone(),
                config.clone(),
            )),
            orders: Arc::new(OrderService::new(
                db.clone(),
                event_sender.clone(),
                config,
            )),
            catalog: Arc::new(CatalogService::new(db.clone(), event_sender)),
            addresses: Arc::new(AddressService::new(db.clone())),
            dashboard: Arc::new(DashboardService::new(db)),
        }
    }
}
