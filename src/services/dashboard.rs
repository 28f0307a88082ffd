use crate::{
    auth::Actor,
    entities::{order, order_item, product, user, OrderStatus, UserRole},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

const RECENT_ORDERS: u64 = 10;
const POPULAR_PRODUCTS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecentOrder {
    pub id: Uuid,
    pub order_number: String,
    pub full_name: String,
    pub status: OrderStatus,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult, ToSchema)]
pub struct PopularProduct {
    pub product_id: Uuid,
    pub name: String,
    pub order_lines: i64,
}

/// Back-office landing page counters
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardSummary {
    pub total_products: u64,
    pub available_products: u64,
    pub total_orders: u64,
    pub pending_orders: u64,
    pub total_clients: u64,
    pub recent_orders: Vec<RecentOrder>,
    pub popular_products: Vec<PopularProduct>,
}

#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DatabaseConnection>,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Staff-only store overview.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn summary(&self, actor: &Actor) -> Result<DashboardSummary, ServiceError> {
        actor.require_staff()?;
        let db = &*self.db;

        let total_products = product::Entity::find().count(db).await?;
        let available_products = product::Entity::find()
            .filter(product::Column::IsAvailable.eq(true))
            .count(db)
            .await?;
        let total_orders = order::Entity::find().count(db).await?;
        let pending_orders = order::Entity::find()
            .filter(order::Column::Status.eq(OrderStatus::Pending))
            .count(db)
            .await?;
        let total_clients = user::Entity::find()
            .filter(user::Column::Role.eq(UserRole::Client))
            .count(db)
            .await?;

        let recent_orders = order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .limit(RECENT_ORDERS)
            .all(db)
            .await?
            .into_iter()
            .map(|o| RecentOrder {
                id: o.id,
                order_number: o.order_number,
                full_name: o.full_name,
                status: o.status,
                total_price: o.total_price,
                created_at: o.created_at,
            })
            .collect();

        let popular_products = order_item::Entity::find()
            .select_only()
            .column(order_item::Column::ProductId)
            .column_as(order_item::Column::ProductName.max(), "name")
            .column_as(order_item::Column::Id.count(), "order_lines")
            .group_by(order_item::Column::ProductId)
            .order_by_desc(order_item::Column::Id.count())
            .limit(POPULAR_PRODUCTS)
            .into_model::<PopularProduct>()
            .all(db)
            .await?;

        Ok(DashboardSummary {
            total_products,
            available_products,
            total_orders,
            pending_orders,
            total_clients,
            recent_orders,
            popular_products,
        })
    }
}
