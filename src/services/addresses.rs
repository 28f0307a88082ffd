use crate::{auth::Actor, entities::address, errors::ServiceError};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Ownership-checked access to delivery addresses
#[derive(Clone)]
pub struct AddressService {
    db: Arc<DatabaseConnection>,
}

impl AddressService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Loads an address that must belong to `owner`. A missing address and
    /// someone else's address are indistinguishable to the caller.
    pub async fn get_address<C>(
        conn: &C,
        address_id: Uuid,
        owner: Uuid,
    ) -> Result<address::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        address::Entity::find_by_id(address_id)
            .filter(address::Column::UserId.eq(owner))
            .one(conn)
            .await?
            .ok_or(ServiceError::InvalidAddress(address_id))
    }

    /// The owner's addresses, default first.
    #[instrument(skip(self))]
    pub async fn list_for(&self, owner: Uuid) -> Result<Vec<address::Model>, ServiceError> {
        Ok(address::Entity::find()
            .filter(address::Column::UserId.eq(owner))
            .order_by_desc(address::Column::IsDefault)
            .order_by_asc(address::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Makes `address_id` the actor's only default address.
    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn set_default(
        &self,
        actor: &Actor,
        address_id: Uuid,
    ) -> Result<address::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let target = Self::get_address(&txn, address_id, actor.id).await?;

        address::Entity::update_many()
            .col_expr(address::Column::IsDefault, Expr::value(false))
            .filter(address::Column::UserId.eq(actor.id))
            .filter(address::Column::Id.ne(address_id))
            .exec(&txn)
            .await?;

        let mut active: address::ActiveModel = target.into();
        active.is_default = Set(true);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(address_id = %address_id, user_id = %actor.id, "default address changed");
        Ok(updated)
    }
}
