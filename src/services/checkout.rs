use crate::{
    auth::Actor,
    config::AppConfig,
    entities::{cart_item, order, order_item, user, OrderStatus, PaymentMethod},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        addresses::AddressService,
        cart::{compute_totals, find_cart, load_lines},
        catalog::CatalogService,
        orders::OrderDetail,
    },
};
use chrono::{NaiveDate, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Customer's checkout form
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutInput {
    pub address_id: Uuid,
    pub payment_method: PaymentMethod,
    pub delivery_date: Option<NaiveDate>,
    #[validate(length(max = 100))]
    pub delivery_time: Option<String>,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

/// Turns a cart into an order.
///
/// Preconditions are checked in a fixed order and the first failure wins:
/// minimum order amount, address ownership, then stock for every line.
/// Order creation, item snapshots, stock decrements and emptying the cart
/// all happen in one transaction, so a failure at any step persists nothing.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

impl CheckoutService {
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

    /// Places an order from the actor's cart.
    ///
    /// # Returns
    ///
    /// * `Ok(OrderDetail)` - The new `pending` order with its items
    /// * `Err(ServiceError::BelowMinimum)` - Cart empty or below the minimum amount
    /// * `Err(ServiceError::InvalidAddress)` - Address missing or not owned by the actor
    /// * `Err(ServiceError::OutOfStock)` - A line exceeds stock, including a lost race
    #[instrument(skip(self, input), fields(actor_id = %actor.id, address_id = %input.address_id))]
    pub async fn checkout(
        &self,
        actor: &Actor,
        input: CheckoutInput,
    ) -> Result<OrderDetail, ServiceError> {
        input.validate()?;

        match self.place_order(actor, input).await {
            Ok(detail) => {
                counter!("grocery.checkout.completed", 1);
                Ok(detail)
            }
            Err(e) => {
                counter!("grocery.checkout.failed", 1, "reason" => e.code());
                counter!("grocery.db.transaction.rolled_back", 1);
                warn!(error = %e, "checkout failed");
                Err(e)
            }
        }
    }

    async fn place_order(
        &self,
        actor: &Actor,
        input: CheckoutInput,
    ) -> Result<OrderDetail, ServiceError> {
        let minimum = self.config.minimum_order_amount;
        let txn = self.db.begin().await?;

        let cart = find_cart(&txn, actor.id).await?;
        let lines = match &cart {
            Some(cart) => load_lines(&txn, cart.id).await?,
            None => Vec::new(),
        };
        let totals = compute_totals(&lines);

        if lines.is_empty() || totals.total_price < minimum {
            return Err(ServiceError::BelowMinimum {
                total: totals.total_price,
                minimum,
            });
        }

        let address = AddressService::get_address(&txn, input.address_id, actor.id).await?;

        for (line, product) in &lines {
            let available = product.purchasable_stock();
            if line.quantity > available {
                return Err(ServiceError::OutOfStock {
                    product_id: product.id,
                    requested: line.quantity,
                    available,
                });
            }
        }

        let customer = user::Entity::find_by_id(actor.id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", actor.id)))?;

        let delivery_time = input
            .delivery_time
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.config.default_delivery_time.clone());

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(generate_order_number()),
            user_id: Set(actor.id),
            status: Set(OrderStatus::Pending),
            full_name: Set(customer.full_name()),
            email: Set(customer.email.clone()),
            phone: Set(customer.phone.clone()),
            delivery_address: Set(address.full_address()),
            entrance: Set(address.entrance.clone()),
            floor: Set(address.floor.clone()),
            apartment: Set(address.apartment.clone()),
            message: Set(input.comment.unwrap_or_default()),
            total_price: Set(totals.total_price),
            delivery_price: Set(self.config.delivery_price),
            payment_method: Set(input.payment_method),
            delivery_date: Set(input.delivery_date),
            delivery_time: Set(delivery_time),
            created_at: Set(now),
            updated_at: Set(now),
            completed_at: Set(None),
            manager_id: Set(None),
            manager_notes: Set(String::new()),
            version: Set(1),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (line, product) in &lines {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                product_name: Set(product.name.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(product.final_price()),
            }
            .insert(&txn)
            .await?;
            items.push(item);

            CatalogService::decrement_stock(&txn, product.id, line.quantity).await?;
        }

        if let Some(cart) = &cart {
            cart_item::Entity::delete_many()
                .filter(cart_item::Column::CartId.eq(cart.id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;

        info!(
            order_id = %order_id,
            order_number = %order.order_number,
            total = %order.total_price,
            "order placed"
        );

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        for item in &items {
            self.event_sender
                .send_or_log(Event::StockDecremented {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::CheckoutCompleted {
                order_id,
                user_id: actor.id,
                total: order.total_price,
            })
            .await;

        Ok(OrderDetail::new(order, items, Vec::new()))
    }
}

/// "ORD-" followed by eight upper-case hex digits.
pub fn generate_order_number() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", hex[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_format() {
        let number = generate_order_number();
        assert_eq!(number.len(), 12);
        assert!(number.starts_with("ORD-"));
        assert!(number[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn overlong_delivery_time_fails_validation() {
        let input = CheckoutInput {
            address_id: Uuid::new_v4(),
            payment_method: PaymentMethod::Card,
            delivery_date: None,
            delivery_time: Some("x".repeat(101)),
            comment: None,
        };
        assert!(input.validate().is_err());
    }
}
