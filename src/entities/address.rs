use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery address saved by a customer
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "addresses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub street: String,
    pub house: String,
    pub entrance: String,
    pub floor: String,
    pub apartment: String,
    pub comment: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Single-line rendering used for the order's address snapshot.
    /// Blank optional parts are omitted.
    pub fn full_address(&self) -> String {
        let mut parts = vec![format!("{}, house {}", self.street.trim(), self.house.trim())];
        if !self.entrance.trim().is_empty() {
            parts.push(format!("entrance {}", self.entrance.trim()));
        }
        if !self.floor.trim().is_empty() {
            parts.push(format!("floor {}", self.floor.trim()));
        }
        if !self.apartment.trim().is_empty() {
            parts.push(format!("apt. {}", self.apartment.trim()));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Model {
        Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Home".to_string(),
            street: "Lenina st.".to_string(),
            house: "10".to_string(),
            entrance: "2".to_string(),
            floor: "5".to_string(),
            apartment: "42".to_string(),
            comment: String::new(),
            is_default: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn full_address_includes_all_parts() {
        assert_eq!(
            address().full_address(),
            "Lenina st., house 10, entrance 2, floor 5, apt. 42"
        );
    }

    #[test]
    fn full_address_skips_blank_parts() {
        let mut addr = address();
        addr.entrance = String::new();
        addr.floor = " ".to_string();
        assert_eq!(addr.full_address(), "Lenina st., house 10, apt. 42");

        addr.apartment = String::new();
        assert_eq!(addr.full_address(), "Lenina st., house 10");
    }
}
