use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Placed order. Contact and address fields are snapshots taken at checkout,
/// so later profile or address edits never rewrite history.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,

    pub full_name: String,
    pub email: String,
    pub phone: String,

    pub delivery_address: String,
    pub entrance: String,
    pub floor: String,
    pub apartment: String,
    pub message: String,

    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub delivery_price: Decimal,
    pub payment_method: PaymentMethod,
    pub delivery_date: Option<NaiveDate>,
    pub delivery_time: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub manager_id: Option<Uuid>,
    pub manager_notes: String,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::order_status_history::Entity")]
    StatusHistory,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Restrict"
    )]
    User,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::order_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Goods plus delivery.
    pub fn final_total(&self) -> Decimal {
        self.total_price + self.delivery_price
    }
}

/// Order workflow state
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    #[sea_orm(string_value = "preparing")]
    Preparing,
    #[sea_orm(string_value = "delivering")]
    Delivering,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Human-readable name used in default audit comments.
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Preparing => "Preparing",
            OrderStatus::Delivering => "Delivering",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    /// Whether staff may move an order from `self` to `to`.
    ///
    /// Orders advance one step at a time along
    /// pending → confirmed → preparing → delivering → completed and may be
    /// cancelled from any non-terminal state. Re-applying the current status
    /// is allowed so staff can update notes. Terminal states never move.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;

        if self.is_terminal() {
            return false;
        }
        if *self == to {
            return true;
        }
        matches!(
            (self, to),
            (_, Cancelled)
                | (Pending, Confirmed)
                | (Confirmed, Preparing)
                | (Preparing, Delivering)
                | (Delivering, Completed)
        )
    }
}

/// How the customer intends to pay. Recorded only, never charged here.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    utoipa::ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "card")]
    Card,
    #[sea_orm(string_value = "online")]
    Online,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use sea_orm::Iterable;

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Confirmed)]
    #[case(OrderStatus::Confirmed, OrderStatus::Preparing)]
    #[case(OrderStatus::Preparing, OrderStatus::Delivering)]
    #[case(OrderStatus::Delivering, OrderStatus::Completed)]
    #[case(OrderStatus::Pending, OrderStatus::Cancelled)]
    #[case(OrderStatus::Delivering, OrderStatus::Cancelled)]
    #[case(OrderStatus::Preparing, OrderStatus::Preparing)]
    fn allowed_transitions(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        assert!(from.can_transition_to(to));
    }

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Completed)]
    #[case(OrderStatus::Pending, OrderStatus::Delivering)]
    #[case(OrderStatus::Delivering, OrderStatus::Pending)]
    #[case(OrderStatus::Confirmed, OrderStatus::Pending)]
    #[case(OrderStatus::Completed, OrderStatus::Completed)]
    #[case(OrderStatus::Cancelled, OrderStatus::Pending)]
    fn rejected_transitions(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        assert!(!from.can_transition_to(to));
    }

    #[test]
    fn terminal_states_reject_everything() {
        for terminal in [OrderStatus::Completed, OrderStatus::Cancelled] {
            for to in OrderStatus::iter() {
                assert!(!terminal.can_transition_to(to), "{terminal} -> {to}");
            }
        }
    }

    #[test]
    fn status_round_trips_through_strings() {
        use std::str::FromStr;
        assert_eq!(OrderStatus::Delivering.to_string(), "delivering");
        assert_eq!(OrderStatus::from_str("cancelled").unwrap(), OrderStatus::Cancelled);
        assert_eq!(OrderStatus::Pending.label(), "Pending");
        assert_eq!(
            serde_json::to_string(&PaymentMethod::Online).unwrap(),
            "\"online\""
        );
    }

    #[test]
    fn final_total_adds_delivery() {
        let order = Model {
            id: Uuid::new_v4(),
            order_number: "ORD-0A1B2C3D".to_string(),
            user_id: Uuid::new_v4(),
            status: OrderStatus::Pending,
            full_name: "Anna Petrova".to_string(),
            email: "anna@example.com".to_string(),
            phone: String::new(),
            delivery_address: "Lenina st., house 10".to_string(),
            entrance: String::new(),
            floor: String::new(),
            apartment: String::new(),
            message: String::new(),
            total_price: dec!(540.50),
            delivery_price: dec!(99),
            payment_method: PaymentMethod::Cash,
            delivery_date: None,
            delivery_time: "Today 18:00-22:00".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            completed_at: None,
            manager_id: None,
            manager_notes: String::new(),
            version: 1,
        };
        assert_eq!(order.final_total(), dec!(639.50));
    }
}
