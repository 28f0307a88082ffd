//! Append-only order status history.
//!
//! Entries are only ever inserted, inside the same transaction as the status
//! change they describe. No update or delete path exists.

use crate::{
    entities::{order_status_history, OrderStatus},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

/// Appends one history entry on the caller's connection or transaction.
pub async fn record<C>(
    conn: &C,
    order_id: Uuid,
    status: OrderStatus,
    changed_by: Option<Uuid>,
    comment: String,
) -> Result<order_status_history::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let entry = order_status_history::ActiveModel {
        id: NotSet,
        order_id: Set(order_id),
        status: Set(status),
        changed_by: Set(changed_by),
        comment: Set(comment),
        created_at: Set(Utc::now()),
    };

    Ok(entry.insert(conn).await?)
}

/// History of one order, newest first.
pub async fn history_for<C>(
    conn: &C,
    order_id: Uuid,
) -> Result<Vec<order_status_history::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(order_status_history::Entity::find()
        .filter(order_status_history::Column::OrderId.eq(order_id))
        .order_by_desc(order_status_history::Column::Id)
        .all(conn)
        .await?)
}

/// The most recent entry, if any transition has happened yet.
pub async fn latest_for<C>(
    conn: &C,
    order_id: Uuid,
) -> Result<Option<order_status_history::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(order_status_history::Entity::find()
        .filter(order_status_history::Column::OrderId.eq(order_id))
        .order_by_desc(order_status_history::Column::Id)
        .one(conn)
        .await?)
}
