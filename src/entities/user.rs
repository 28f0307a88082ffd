use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Storefront account. Registration and profile editing live outside this
/// crate; the core only reads these rows for contact snapshots and roles.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::address::Entity")]
    Addresses,
    #[sea_orm(has_one = "super::cart::Entity")]
    Cart,
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Addresses.def()
    }
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// "First Last", or the email when both names are blank.
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.email.clone()
        } else {
            name.to_string()
        }
    }
}

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
pub enum UserRole {
    #[sea_orm(string_value = "client")]
    Client,
    #[sea_orm(string_value = "manager")]
    Manager,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl UserRole {
    /// Managers and admins operate the back office.
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Manager | UserRole::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn user(first: &str, last: &str) -> Model {
        Model {
            id: Uuid::new_v4(),
            email: "anna@example.com".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            phone: "+70000000000".to_string(),
            role: UserRole::Client,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn full_name_joins_first_and_last() {
        assert_eq!(user("Anna", "Petrova").full_name(), "Anna Petrova");
        assert_eq!(user("Anna", "").full_name(), "Anna");
    }

    #[test]
    fn full_name_falls_back_to_email() {
        assert_eq!(user(" ", "").full_name(), "anna@example.com");
    }

    #[test]
    fn staff_roles() {
        assert!(!UserRole::Client.is_staff());
        assert!(UserRole::Manager.is_staff());
        assert!(UserRole::Admin.is_staff());
        assert_eq!(UserRole::from_str("manager").unwrap(), UserRole::Manager);
        assert_eq!(UserRole::Admin.to_string(), "admin");
    }
}
