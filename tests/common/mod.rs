#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use grocery_api::{
    auth::Actor,
    config::AppConfig,
    db::{self, DbConfig},
    entities::{address, product, user, UserRole},
    events::{Event, EventSender},
    services::checkout::CheckoutInput,
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_grocery_api_integration_runs";

/// Application state over a fresh in-memory SQLite database.
pub struct TestApp {
    pub state: AppState,
    router: Router,
    events: mpsc::Receiver<Event>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds the app after letting the caller adjust the configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        adjust(&mut cfg);

        // One connection keeps every query on the same in-memory database.
        let db_cfg = DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..DbConfig::default()
        };
        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, events) = mpsc::channel(1024);
        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));
        let router = grocery_api::build_router(state.clone());

        Self {
            state,
            router,
            events,
        }
    }

    pub fn token_for(&self, actor: &Actor) -> String {
        self.state
            .auth
            .issue_token(actor)
            .expect("token issuance in tests")
    }

    /// Events emitted so far, in order.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_user(&self, role: UserRole) -> Actor {
        let id = Uuid::new_v4();
        user::ActiveModel {
            id: Set(id),
            email: Set(format!("{}@example.com", id.simple())),
            first_name: Set("Anna".to_string()),
            last_name: Set("Ivanova".to_string()),
            phone: Set("+7 900 000-00-00".to_string()),
            role: Set(role),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed user");
        Actor::new(id, role)
    }

    pub async fn seed_product(&self, price: Decimal, stock: i32) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Buckwheat 900 g".to_string()),
            brand: Set("Mistral".to_string()),
            unit: Set("pcs".to_string()),
            price: Set(price),
            discount_percent: Set(0),
            stock: Set(stock),
            is_available: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed product")
    }

    pub async fn seed_address(&self, owner: &Actor) -> address::Model {
        address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner.id),
            name: Set("Home".to_string()),
            street: Set("Lenina st.".to_string()),
            house: Set("12".to_string()),
            entrance: Set("2".to_string()),
            floor: Set("5".to_string()),
            apartment: Set("48".to_string()),
            comment: Set(String::new()),
            is_default: Set(false),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed address")
    }

    pub async fn product(&self, id: Uuid) -> product::Model {
        self.state
            .services
            .catalog
            .get_product(id)
            .await
            .expect("product lookup")
    }
}

pub fn checkout_input(address_id: Uuid) -> CheckoutInput {
    CheckoutInput {
        address_id,
        payment_method: grocery_api::entities::PaymentMethod::Cash,
        delivery_date: None,
        delivery_time: None,
        comment: Some("Ring twice".to_string()),
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
