use crate::{
    auth::Actor,
    config::AppConfig,
    entities::{order, order_item, order_status_history, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::audit,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveEnum, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Staff request to move an order to a new status
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct TransitionInput {
    pub status: OrderStatus,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
    #[validate(length(max = 2000))]
    pub manager_notes: Option<String>,
}

/// Order line with its derived total
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl From<order_item::Model> for OrderItemView {
    fn from(item: order_item::Model) -> Self {
        Self {
            total_price: item.total_price(),
            id: item.id,
            product_id: item.product_id,
            product_name: item.product_name,
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

/// Order with items and audit history
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetail {
    #[schema(value_type = Object)]
    pub order: order::Model,
    pub items: Vec<OrderItemView>,
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<order_status_history::Model>,
    pub final_total: Decimal,
}

impl OrderDetail {
    pub fn new(
        order: order::Model,
        items: Vec<order_item::Model>,
        history: Vec<order_status_history::Model>,
    ) -> Self {
        Self {
            final_total: order.final_total(),
            items: items.into_iter().map(OrderItemView::from).collect(),
            history,
            order,
        }
    }
}

/// Row on the customer's "my orders" page
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub item_count: i32,
    pub total_price: Decimal,
    pub delivery_price: Decimal,
    pub final_total: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Audit comment for a transition: the explicit comment, else the manager
/// notes, else a generated "Status changed to ..." line.
pub fn transition_comment(
    comment: Option<&str>,
    manager_notes: Option<&str>,
    to: OrderStatus,
) -> String {
    [comment, manager_notes]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Status changed to {}", to.label()))
}

/// Order workflow and order reads
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Moves an order to `input.status` on behalf of a staff member.
    ///
    /// The status write is a compare-and-set on the status and version that
    /// were read, and the audit entry is written in the same transaction.
    /// If another transition got there first nothing is written and the
    /// caller gets `ConcurrentModification`.
    #[instrument(skip(self, input), fields(actor_id = %actor.id, order_id = %order_id, to = %input.status))]
    pub async fn transition(
        &self,
        actor: &Actor,
        order_id: Uuid,
        input: TransitionInput,
    ) -> Result<order::Model, ServiceError> {
        actor.require_staff()?;
        input.validate()?;

        let to = input.status;
        let txn = self.db.begin().await?;

        let current = find_order(&txn, order_id).await?;
        let from = current.status;

        if self.config.enforce_status_graph && !from.can_transition_to(to) {
            return Err(ServiceError::InvalidTransition { from, to });
        }

        let now = Utc::now();
        let updated = Self::apply_transition(&txn, actor, &current, &input, now).await?;
        txn.commit().await?;

        counter!("grocery.order.transition", 1, "to" => to.to_string());
        info!(
            "Order {} status updated from '{}' to '{}'",
            order_id, from, to
        );

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status: from,
                new_status: to,
                changed_by: actor.id,
                at: now,
            })
            .await;
        match to {
            OrderStatus::Completed if from != to => {
                self.event_sender
                    .send_or_log(Event::OrderCompleted(order_id))
                    .await
            }
            OrderStatus::Cancelled if from != to => {
                self.event_sender
                    .send_or_log(Event::OrderCancelled(order_id))
                    .await
            }
            _ => {}
        }

        Ok(updated)
    }

    /// Writes a transition of `current` to `input.status` on `conn`.
    ///
    /// The update only matches while the row still has the status and version
    /// of `current`; otherwise nothing is written and the result is
    /// `ConcurrentModification`. The history entry goes through the same
    /// connection, so callers pass their transaction.
    pub async fn apply_transition<C>(
        conn: &C,
        actor: &Actor,
        current: &order::Model,
        input: &TransitionInput,
        now: DateTime<Utc>,
    ) -> Result<order::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let order_id = current.id;
        let to = input.status;
        let manager_notes = input
            .manager_notes
            .clone()
            .unwrap_or_else(|| current.manager_notes.clone());
        let completed_at = if to == OrderStatus::Completed {
            Some(now)
        } else {
            current.completed_at
        };

        let result = order::Entity::update_many()
            .col_expr(order::Column::Status, Expr::value(to.to_value()))
            .col_expr(order::Column::ManagerId, Expr::value(Some(actor.id)))
            .col_expr(order::Column::ManagerNotes, Expr::value(manager_notes))
            .col_expr(order::Column::CompletedAt, Expr::value(completed_at))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .col_expr(
                order::Column::Version,
                Expr::col(order::Column::Version).add(1),
            )
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(current.status.to_value()))
            .filter(order::Column::Version.eq(current.version))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            error!("Order {} changed concurrently", order_id);
            counter!("grocery.db.transaction.rolled_back", 1);
            return Err(ServiceError::ConcurrentModification(order_id));
        }

        let comment = transition_comment(
            input.comment.as_deref(),
            input.manager_notes.as_deref(),
            to,
        );
        audit::record(conn, order_id, to, Some(actor.id), comment).await?;

        find_order(conn, order_id).await
    }

    /// Order with items and history. Customers only see their own orders;
    /// anyone else's order looks missing.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn get_order(
        &self,
        actor: &Actor,
        order_id: Uuid,
    ) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db;
        let order = visible_order(db, actor, order_id).await?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::ProductName)
            .all(db)
            .await?;
        let history = audit::history_for(db, order_id).await?;

        Ok(OrderDetail::new(order, items, history))
    }

    /// The actor's own orders, newest first.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn list_orders_for(&self, actor: &Actor) -> Result<Vec<OrderSummary>, ServiceError> {
        let rows = order::Entity::find()
            .filter(order::Column::UserId.eq(actor.id))
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .find_with_related(order_item::Entity)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(order, items)| OrderSummary {
                id: order.id,
                item_count: items.iter().map(|i| i.quantity).sum(),
                final_total: order.final_total(),
                order_number: order.order_number,
                status: order.status,
                total_price: order.total_price,
                delivery_price: order.delivery_price,
                created_at: order.created_at,
            })
            .collect())
    }

    /// Status history, newest first.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn history(
        &self,
        actor: &Actor,
        order_id: Uuid,
    ) -> Result<Vec<order_status_history::Model>, ServiceError> {
        let db = &*self.db;
        visible_order(db, actor, order_id).await?;
        audit::history_for(db, order_id).await
    }
}

async fn find_order<C>(conn: &C, order_id: Uuid) -> Result<order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    order::Entity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

async fn visible_order<C>(
    conn: &C,
    actor: &Actor,
    order_id: Uuid,
) -> Result<order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let order = find_order(conn, order_id).await?;
    if actor.is_staff() || order.user_id == actor.id {
        Ok(order)
    } else {
        Err(ServiceError::NotFound(format!("Order {} not found", order_id)))
    }
}
