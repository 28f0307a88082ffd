use crate::{
    auth::Actor,
    config::AppConfig,
    entities::{cart, cart_item, product},
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::find_product,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Shopping cart service.
///
/// Each user owns exactly one cart, created lazily on first access. The
/// cart only ever stores (product, quantity) lines; prices are read from the
/// catalog every time totals are computed, so a price change is reflected
/// immediately without touching the cart.
///
/// The cart never reserves stock. Quantities are checked against the
/// product's purchasable stock when lines change and again at checkout.
///
/// # Examples
///
/// ```ignore
/// let cart_service = CartService::new(db, event_sender, config);
///
/// cart_service.add(&actor, product_id, 2).await?;
/// let totals = cart_service.totals(&actor).await?;
/// ```
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
}

/// Live cart totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartTotals {
    pub total_items: i32,
    pub total_price: Decimal,
}

/// One cart line as shown to the customer
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLineView {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub available_stock: i32,
}

/// Cart page and checkout page data
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartView {
    pub cart_id: Uuid,
    pub items: Vec<CartLineView>,
    pub total_items: i32,
    pub total_price: Decimal,
    pub minimum_order_amount: Decimal,
    pub delivery_price: Decimal,
    pub total_with_delivery: Decimal,
    pub meets_minimum: bool,
}

/// Sums quantities and quantity × live price over the given lines.
pub fn compute_totals(lines: &[(cart_item::Model, product::Model)]) -> CartTotals {
    lines.iter().fold(
        CartTotals {
            total_items: 0,
            total_price: Decimal::ZERO,
        },
        |acc, (line, product)| CartTotals {
            total_items: acc.total_items + line.quantity,
            total_price: acc.total_price + product.final_price() * Decimal::from(line.quantity),
        },
    )
}

/// Cart lines joined with their products, oldest line first.
pub(crate) async fn load_lines<C>(
    conn: &C,
    cart_id: Uuid,
) -> Result<Vec<(cart_item::Model, product::Model)>, ServiceError>
where
    C: ConnectionTrait,
{
    let rows = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::AddedAt)
        .find_also_related(product::Entity)
        .all(conn)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(line, product)| product.map(|p| (line, p)))
        .collect())
}

/// The user's cart, if one has been created.
pub(crate) async fn find_cart<C>(conn: &C, user_id: Uuid) -> Result<Option<cart::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

impl CartService {
    /// Creates a new `CartService` instance.
    ///
    /// # Arguments
    ///
    /// * `db` - Database connection pool
    /// * `event_sender` - Event sender for publishing cart events
    /// * `config` - Application configuration (minimum order and delivery fee)
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

    /// Returns the actor's cart, creating it on first access.
    ///
    /// Two requests racing to create the same cart are resolved by the unique
    /// index on `carts.user_id`: the loser's insert fails and it re-reads the
    /// winner's row.
    ///
    /// # Returns
    ///
    /// * `Ok(cart::Model)` - The existing or newly created cart
    /// * `Err(ServiceError)` - Database error
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn get_or_create(&self, actor: &Actor) -> Result<cart::Model, ServiceError> {
        if let Some(existing) = find_cart(&*self.db, actor.id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let cart_id = Uuid::new_v4();
        let created = cart::ActiveModel {
            id: Set(cart_id),
            user_id: Set(actor.id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await;

        match created {
            Ok(cart) => {
                self.event_sender
                    .send_or_log(Event::CartCreated {
                        cart_id,
                        user_id: actor.id,
                    })
                    .await;
                info!("Created cart: {}", cart_id);
                Ok(cart)
            }
            Err(insert_err) => {
                debug!(error = %insert_err, "cart insert failed, re-reading");
                find_cart(&*self.db, actor.id)
                    .await?
                    .ok_or(ServiceError::DatabaseError(insert_err))
            }
        }
    }

    /// Adds `quantity` units of a product, merging into an existing line.
    ///
    /// The merged quantity must not exceed the product's purchasable stock;
    /// on failure the cart is left unchanged. Stock itself is not touched.
    ///
    /// # Returns
    ///
    /// * `Ok(cart_item::Model)` - The created or merged line
    /// * `Err(ServiceError::ValidationError)` - `quantity < 1`
    /// * `Err(ServiceError::NotFound)` - Product does not exist
    /// * `Err(ServiceError::OutOfStock)` - Not enough stock for the merged quantity
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn add(
        &self,
        actor: &Actor,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let cart = self.get_or_create(actor).await?;
        let txn = self.db.begin().await?;

        let product = find_product(&txn, product_id).await?;

        let existing = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        let available = product.purchasable_stock();
        let merged = existing
            .as_ref()
            .map_or(0, |line| line.quantity)
            .checked_add(quantity)
            .ok_or(ServiceError::OutOfStock {
                product_id,
                requested: i32::MAX,
                available,
            })?;
        if merged > available {
            return Err(ServiceError::OutOfStock {
                product_id,
                requested: merged,
                available,
            });
        }

        let line = match existing {
            Some(line) => {
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(merged);
                active.update(&txn).await?
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product_id),
                    quantity: Set(quantity),
                    added_at: Set(Utc::now()),
                }
                .insert(&txn)
                .await?
            }
        };

        touch_cart(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: line.cart_id,
                product_id,
                quantity,
            })
            .await;

        info!(product_id = %product_id, quantity = line.quantity, "cart line added");
        Ok(line)
    }

    /// Sets a line's quantity. Zero or less removes the line.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(line))` - The updated line
    /// * `Ok(None)` - The line was removed
    /// * `Err(ServiceError::NotFound)` - No such line in the actor's cart
    /// * `Err(ServiceError::OutOfStock)` - Quantity exceeds purchasable stock
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn set_quantity(
        &self,
        actor: &Actor,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Option<cart_item::Model>, ServiceError> {
        let txn = self.db.begin().await?;
        let (cart, line) = owned_line(&txn, actor, item_id).await?;
        let cart_id = cart.id;

        if quantity <= 0 {
            line.delete(&txn).await?;
            touch_cart(&txn, cart).await?;
            txn.commit().await?;

            self.event_sender
                .send_or_log(Event::CartItemRemoved { cart_id, item_id })
                .await;
            return Ok(None);
        }

        let product = find_product(&txn, line.product_id).await?;
        let available = product.purchasable_stock();
        if quantity > available {
            return Err(ServiceError::OutOfStock {
                product_id: product.id,
                requested: quantity,
                available,
            });
        }

        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(quantity);
        let updated = active.update(&txn).await?;
        touch_cart(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id,
                item_id,
                quantity,
            })
            .await;

        Ok(Some(updated))
    }

    /// Deletes one line from the actor's cart.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn remove(&self, actor: &Actor, item_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let (cart, line) = owned_line(&txn, actor, item_id).await?;
        let cart_id = cart.id;

        line.delete(&txn).await?;
        touch_cart(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved { cart_id, item_id })
            .await;
        Ok(())
    }

    /// Deletes every line. The cart itself stays.
    ///
    /// Returns the number of lines removed.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn clear(&self, actor: &Actor) -> Result<u64, ServiceError> {
        let cart = self.get_or_create(actor).await?;
        let cart_id = cart.id;

        let txn = self.db.begin().await?;
        let removed = cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .exec(&txn)
            .await?
            .rows_affected;
        touch_cart(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartCleared(cart_id))
            .await;

        info!(cart_id = %cart_id, removed, "cart cleared");
        Ok(removed)
    }

    /// Item count and price at live catalog prices.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn totals(&self, actor: &Actor) -> Result<CartTotals, ServiceError> {
        let cart = self.get_or_create(actor).await?;
        let lines = load_lines(&*self.db, cart.id).await?;
        Ok(compute_totals(&lines))
    }

    /// Full cart view with per-line prices and the checkout figures.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn view(&self, actor: &Actor) -> Result<CartView, ServiceError> {
        let cart = self.get_or_create(actor).await?;
        let lines = load_lines(&*self.db, cart.id).await?;
        let totals = compute_totals(&lines);

        let items = lines
            .iter()
            .map(|(line, product)| {
                let unit_price = product.final_price();
                CartLineView {
                    item_id: line.id,
                    product_id: product.id,
                    product_name: product.name.clone(),
                    unit: product.unit.clone(),
                    quantity: line.quantity,
                    unit_price,
                    line_total: unit_price * Decimal::from(line.quantity),
                    available_stock: product.purchasable_stock(),
                }
            })
            .collect();

        let minimum = self.config.minimum_order_amount;
        let delivery_price = self.config.delivery_price;

        Ok(CartView {
            cart_id: cart.id,
            items,
            total_items: totals.total_items,
            total_price: totals.total_price,
            minimum_order_amount: minimum,
            delivery_price,
            total_with_delivery: totals.total_price + delivery_price,
            meets_minimum: totals.total_items > 0 && totals.total_price >= minimum,
        })
    }
}

/// Finds a line that belongs to the actor's cart.
async fn owned_line<C>(
    conn: &C,
    actor: &Actor,
    item_id: Uuid,
) -> Result<(cart::Model, cart_item::Model), ServiceError>
where
    C: ConnectionTrait,
{
    let not_found = || ServiceError::NotFound(format!("Cart item {} not found", item_id));

    let cart = find_cart(conn, actor.id).await?.ok_or_else(not_found)?;
    let line = cart_item::Entity::find_by_id(item_id)
        .filter(cart_item::Column::CartId.eq(cart.id))
        .one(conn)
        .await?
        .ok_or_else(not_found)?;

    Ok((cart, line))
}

async fn touch_cart<C>(conn: &C, cart: cart::Model) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let mut active: cart::ActiveModel = cart.into();
    active.updated_at = Set(Utc::now());
    active.update(conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn line_with(price: Decimal, discount: i32, quantity: i32) -> (cart_item::Model, product::Model) {
        let product_id = Uuid::new_v4();
        let now = Utc::now();
        (
            cart_item::Model {
                id: Uuid::new_v4(),
                cart_id: Uuid::nil(),
                product_id,
                quantity,
                added_at: now,
            },
            product::Model {
                id: product_id,
                name: "Bread".to_string(),
                brand: String::new(),
                unit: "pcs".to_string(),
                price,
                discount_percent: discount,
                stock: 100,
                is_available: true,
                created_at: now,
                updated_at: now,
            },
        )
    }

    #[test]
    fn empty_cart_totals_are_zero() {
        let totals = compute_totals(&[]);
        assert_eq!(totals.total_items, 0);
        assert_eq!(totals.total_price, Decimal::ZERO);
    }

    #[test]
    fn totals_use_discounted_price() {
        let lines = vec![line_with(dec!(100), 10, 3), line_with(dec!(45.50), 0, 2)];
        let totals = compute_totals(&lines);
        assert_eq!(totals.total_items, 5);
        assert_eq!(totals.total_price, dec!(361.00));
    }

    proptest! {
        #[test]
        fn total_is_sum_of_line_totals(
            specs in proptest::collection::vec((1i64..100_000, 0i32..=100, 1i32..50), 0..8)
        ) {
            let lines: Vec<_> = specs
                .iter()
                .map(|(cents, discount, qty)| line_with(Decimal::new(*cents, 2), *discount, *qty))
                .collect();
            let totals = compute_totals(&lines);

            let expected_items: i32 = specs.iter().map(|(_, _, q)| *q).sum();
            let expected_price: Decimal = lines
                .iter()
                .map(|(l, p)| p.final_price() * Decimal::from(l.quantity))
                .sum();
            prop_assert_eq!(totals.total_items, expected_items);
            prop_assert_eq!(totals.total_price, expected_price);
        }
    }
}
