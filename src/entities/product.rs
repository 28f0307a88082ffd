use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog product. Price and stock are owned by the catalog; the cart and
/// checkout only read them, and stock only moves through guarded decrements.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub brand: String,
    pub unit: String,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    pub discount_percent: i32,
    pub stock: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Applies a percentage discount and rounds to cents.
pub fn discounted_price(price: Decimal, discount_percent: i32) -> Decimal {
    let percent = Decimal::from(discount_percent.clamp(0, 100));
    (price * (Decimal::ONE_HUNDRED - percent) / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl Model {
    /// Live selling price after discount.
    pub fn final_price(&self) -> Decimal {
        discounted_price(self.price, self.discount_percent)
    }

    /// Units a customer may put in a cart right now.
    pub fn purchasable_stock(&self) -> i32 {
        if self.is_available {
            self.stock.max(0)
        } else {
            0
        }
    }
}
