//! # Data Repository Layer
//!
//! Repository traits for the entities the order workflow touches: orders (with
//! their line items), products and users. [`pg`] holds the PostgreSQL
//! implementations; [`memory`] an in-process store with the same semantics.
//!
//! Order creation is a single repository call so that the guest-account
//! upsert, the order row and all item rows share one transaction.

use std::sync::Arc;

use async_trait::async_trait;
use model::{NewOrder, NewOrderItem, Order, OrderChanges, OrderStats, OrderStatus, Product, User};
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod pg;

pub use memory::InMemoryStore;
pub use pg::{PgOrdersRepository, PgProductsRepository, PgUsersRepository};

/// # RepositoryError
///
/// Error types that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying PostgreSQL error
    #[error("Database error: {0}")]
    Db(#[from] tokio_postgres::Error),
    /// Failed to obtain a connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    /// No result found.
    #[error("Not found")]
    NotFound,
    /// A stored value could not be mapped onto the domain model.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// # ProductsRepository
///
/// Read access to the catalog. The order workflow never writes products.
#[async_trait]
pub trait ProductsRepository: Send + Sync {
    /// Product by id, `None` when it does not exist.
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Product>, RepositoryError>;
}

/// # UsersRepository
///
/// Account lookups used by the admin guard and the guest-account checks.
#[async_trait]
pub trait UsersRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;
}

/// # OrdersRepository
///
/// Orders are the main aggregate: every returned [`Order`] carries its items
/// in insertion order.
#[async_trait]
pub trait OrdersRepository: Send + Sync {
    /// Atomically upserts the guest account identified by `guest_email`,
    /// inserts the order in status `NEW` owned by it, and inserts every item.
    /// Either all rows are committed or none are.
    async fn create(
        &self,
        guest_email: &str,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<Order, RepositoryError>;

    /// Returns [`RepositoryError::NotFound`] when no order has this id.
    async fn get_by_id(&self, id: Uuid) -> Result<Order, RepositoryError>;

    /// Case-insensitive exact phone match, newest first.
    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Order>, RepositoryError>;

    /// Every order, newest first.
    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError>;

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, RepositoryError>;

    /// Overwrites only the fields present in `changes`.
    async fn update_info(&self, id: Uuid, changes: &OrderChanges) -> Result<Order, RepositoryError>;

    async fn stats(&self) -> Result<OrderStats, RepositoryError>;
}

#[async_trait]
impl<T: ProductsRepository + ?Sized> ProductsRepository for Arc<T> {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Product>, RepositoryError> {
        ProductsRepository::get_by_id(&**self, id).await
    }
}

#[async_trait]
impl<T: UsersRepository + ?Sized> UsersRepository for Arc<T> {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        UsersRepository::get_by_id(&**self, id).await
    }
}

#[async_trait]
impl<T: OrdersRepository + ?Sized> OrdersRepository for Arc<T> {
    async fn create(
        &self,
        guest_email: &str,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<Order, RepositoryError> {
        (**self).create(guest_email, order, items).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Order, RepositoryError> {
        OrdersRepository::get_by_id(&**self, id).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Order>, RepositoryError> {
        (**self).find_by_phone(phone).await
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        (**self).list_all().await
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, RepositoryError> {
        (**self).update_status(id, status).await
    }

    async fn update_info(&self, id: Uuid, changes: &OrderChanges) -> Result<Order, RepositoryError> {
        (**self).update_info(id, changes).await
    }

    async fn stats(&self) -> Result<OrderStats, RepositoryError> {
        (**self).stats().await
    }
}
