use crate::{
    auth::Actor,
    entities::{order_item, product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Outcome of retiring a product from the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Retired {
    /// No order ever referenced the product, so the row is gone.
    Deleted,
    /// Orders reference the product; it is hidden from sale instead.
    Disabled,
}

/// Read access to products plus the only two ways stock and catalog rows
/// are changed by the core: the guarded decrement and retirement.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Fetches a product or fails with `NotFound`.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        find_product(&*self.db, product_id).await
    }

    /// Removes `amount` units of stock in a single guarded statement.
    ///
    /// The update only matches while `stock >= amount`, so two buyers racing
    /// for the last units can never drive stock negative: the loser sees zero
    /// affected rows and gets `OutOfStock`. Runs on whatever connection or
    /// transaction the caller passes.
    #[instrument(skip(conn))]
    pub async fn decrement_stock<C>(
        conn: &C,
        product_id: Uuid,
        amount: i32,
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        if amount <= 0 {
            return Err(ServiceError::ValidationError(format!(
                "Stock decrement must be positive, got {}",
                amount
            )));
        }

        let result = product::Entity::update_many()
            .col_expr(
                product::Column::Stock,
                Expr::col(product::Column::Stock).sub(amount),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::Stock.gte(amount))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            let current = find_product(conn, product_id).await?;
            warn!(
                product_id = %product_id,
                requested = amount,
                available = current.stock,
                "guarded stock decrement lost"
            );
            return Err(ServiceError::OutOfStock {
                product_id,
                requested: amount,
                available: current.stock,
            });
        }

        Ok(())
    }

    /// Takes a product off sale. Products that appear on any order line are
    /// only disabled, since order history must keep pointing at them.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn retire_product(
        &self,
        actor: &Actor,
        product_id: Uuid,
    ) -> Result<Retired, ServiceError> {
        actor.require_staff()?;

        let txn = self.db.begin().await?;
        let existing = find_product(&txn, product_id).await?;

        let references = order_item::Entity::find()
            .filter(order_item::Column::ProductId.eq(product_id))
            .count(&txn)
            .await?;

        let outcome = if references == 0 {
            product::Entity::delete_by_id(product_id).exec(&txn).await?;
            Retired::Deleted
        } else {
            let mut active: product::ActiveModel = existing.into();
            active.is_available = Set(false);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?;
            Retired::Disabled
        };

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductRetired {
                product_id,
                deleted: outcome == Retired::Deleted,
            })
            .await;

        info!(product_id = %product_id, outcome = ?outcome, "product retired");
        Ok(outcome)
    }
}

pub(crate) async fn find_product<C>(conn: &C, product_id: Uuid) -> Result<product::Model, ServiceError>
where
    C: ConnectionTrait,
{
    product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}
