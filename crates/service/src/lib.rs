//! Business logic layer for order management.
//!
//! This module defines the [`OrderService`] trait and its async implementation
//! [`OrderServiceImpl`]. The service validates requests, runs the catalog
//! checks of [`integrity`], and delegates persistence to the repositories.
//!
//! # Features
//! - Guest checkout: unauthenticated orders belong to one sentinel account.
//! - Atomic creation of an order and its line items.
//! - Case-insensitive order lookup by phone.
//! - Status changes and partial info updates with an ownership check.
//! - Well-typed error handling via [`ServiceError`].

use async_trait::async_trait;
use model::api::{CreateOrderRequest, UpdateOrderRequest};
use model::{Order, OrderChanges, OrderStats, OrderStatus};
use repository::{OrdersRepository, ProductsRepository, RepositoryError};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub mod integrity;

/// The main error type for all operations in [`OrderService`] and [`OrderServiceImpl`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request is structurally invalid (missing or malformed fields).
    #[error("{0}")]
    Validation(String),
    /// The declared total does not match the sum of the lines.
    #[error("Order total mismatch. Expected: {expected:.2}, Received: {received:.2}")]
    TotalMismatch { expected: Decimal, received: Decimal },
    #[error("Product with ID {0} not found")]
    ProductNotFound(Uuid),
    #[error("Product \"{product}\" is out of stock")]
    OutOfStock { product: String },
    #[error("Not enough stock for product \"{product}\". Available: {available}, Requested: {requested}")]
    InsufficientStock {
        product: String,
        available: i32,
        requested: i32,
    },
    #[error("Price mismatch for product \"{product}\". Current price: {current}, Order price: {submitted}")]
    PriceMismatch {
        product: String,
        current: Decimal,
        submitted: Decimal,
    },
    #[error("Order with ID {0} not found")]
    OrderNotFound(Uuid),
    /// A customer tried to change an order placed with another phone number.
    #[error("Phone number does not match the order")]
    OwnershipMismatch,
    /// Customers cannot edit an order that is already completed.
    #[error("Order {0} is completed and can no longer be changed")]
    OrderCompleted(Uuid),
    /// A repository (database) operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),
}

impl ServiceError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "ValidationError",
            ServiceError::TotalMismatch { .. } => "TotalMismatch",
            ServiceError::ProductNotFound(_) => "ProductNotFound",
            ServiceError::OutOfStock { .. } => "OutOfStock",
            ServiceError::InsufficientStock { .. } => "InsufficientStock",
            ServiceError::PriceMismatch { .. } => "PriceMismatch",
            ServiceError::OrderNotFound(_) => "OrderNotFound",
            ServiceError::OwnershipMismatch => "OwnershipMismatch",
            ServiceError::OrderCompleted(_) => "OrderCompleted",
            ServiceError::Storage(_) => "StorageError",
        }
    }

    fn order_lookup(id: Uuid) -> impl FnOnce(RepositoryError) -> ServiceError {
        move |err| match err {
            RepositoryError::NotFound => ServiceError::OrderNotFound(id),
            other => ServiceError::Storage(other),
        }
    }
}

/// Who is asking for an order change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requester {
    Admin,
    /// A customer proving ownership with the phone the order was placed with.
    Customer { phone: Option<String> },
}

impl Requester {
    pub fn customer(phone: Option<String>) -> Self {
        Requester::Customer { phone }
    }
}

/// Trait describing business operations for order management.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Validates the request against the catalog and atomically persists the
    /// order with its items, owned by the guest account.
    ///
    /// # Errors
    /// Any integrity error (`TotalMismatch`, `ProductNotFound`, `OutOfStock`,
    /// `InsufficientStock`, `PriceMismatch`), `Validation` for malformed input,
    /// or `Storage` if the transaction fails. Nothing is written on error.
    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ServiceError>;

    /// Orders placed with `phone` (case-insensitive), newest first; empty when none.
    async fn get_orders_by_phone(&self, phone: &str) -> Result<Vec<Order>, ServiceError>;

    /// Every order, newest first.
    async fn get_all_orders(&self) -> Result<Vec<Order>, ServiceError>;

    /// Overwrites the status of an order.
    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, ServiceError>;

    /// Partially updates customer-facing fields (and, for admins, the status).
    async fn update_order_info(
        &self,
        id: Uuid,
        request: UpdateOrderRequest,
        requester: Requester,
    ) -> Result<Order, ServiceError>;

    /// Order counters and revenue for the admin dashboard.
    async fn order_stats(&self) -> Result<OrderStats, ServiceError>;
}

/// Async implementation of [`OrderService`] using the repository pattern.
pub struct OrderServiceImpl<R1, R2> {
    orders_repo: R1,
    products_repo: R2,
    guest_email: String,
}

impl<R1, R2> OrderServiceImpl<R1, R2>
where
    R1: OrdersRepository + Send + Sync,
    R2: ProductsRepository + Send + Sync,
{
    /// Constructs a new [`OrderServiceImpl`].
    ///
    /// # Arguments
    /// * `orders_repo` - The repository for orders and their items.
    /// * `products_repo` - The catalog the integrity checks read from.
    /// * `guest_email` - Sentinel e-mail of the account owning guest orders.
    pub fn new(orders_repo: R1, products_repo: R2, guest_email: impl Into<String>) -> Self {
        Self {
            orders_repo,
            products_repo,
            guest_email: guest_email.into(),
        }
    }

    fn warn_on_unusual_transition(&self, id: Uuid, from: OrderStatus, to: OrderStatus) {
        if !from.is_conventional_transition(to) {
            warn!(order_id = %id, %from, %to, "order status moved outside the usual flow");
        }
    }
}

#[async_trait]
impl<R1, R2> OrderService for OrderServiceImpl<R1, R2>
where
    R1: OrdersRepository + Send + Sync,
    R2: ProductsRepository + Send + Sync,
{
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, ServiceError> {
        request.validate().map_err(ServiceError::Validation)?;

        let items =
            integrity::validate_and_enrich(&self.products_repo, &request.items, request.total).await?;

        let order = self
            .orders_repo
            .create(&self.guest_email, &request.to_new_order(), &items)
            .await?;

        info!(order_id = %order.id, total = %order.total, "order created");
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn get_orders_by_phone(&self, phone: &str) -> Result<Vec<Order>, ServiceError> {
        if phone.trim().is_empty() {
            return Err(ServiceError::Validation("Phone number is required".into()));
        }
        Ok(self.orders_repo.find_by_phone(phone).await?)
    }

    #[instrument(skip(self))]
    async fn get_all_orders(&self) -> Result<Vec<Order>, ServiceError> {
        Ok(self.orders_repo.list_all().await?)
    }

    #[instrument(skip(self))]
    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, ServiceError> {
        let current = self
            .orders_repo
            .get_by_id(id)
            .await
            .map_err(ServiceError::order_lookup(id))?;
        self.warn_on_unusual_transition(id, current.status, status);

        let updated = self
            .orders_repo
            .update_status(id, status)
            .await
            .map_err(ServiceError::order_lookup(id))?;
        info!(order_id = %id, from = %current.status, to = %status, "order status updated");
        Ok(updated)
    }

    #[instrument(skip(self, request))]
    async fn update_order_info(
        &self,
        id: Uuid,
        request: UpdateOrderRequest,
        requester: Requester,
    ) -> Result<Order, ServiceError> {
        let changes = OrderChanges::from(request);
        if changes.is_empty() {
            return Err(ServiceError::Validation("No fields to update".into()));
        }

        let current = self
            .orders_repo
            .get_by_id(id)
            .await
            .map_err(ServiceError::order_lookup(id))?;

        match &requester {
            Requester::Admin => {
                if let Some(status) = changes.status {
                    self.warn_on_unusual_transition(id, current.status, status);
                }
            }
            Requester::Customer { phone } => {
                let owns = phone.as_deref().is_some_and(|p| current.phone_matches(p));
                if !owns {
                    warn!(order_id = %id, "order update rejected: phone mismatch");
                    return Err(ServiceError::OwnershipMismatch);
                }
                if changes.status.is_some() {
                    return Err(ServiceError::Validation(
                        "Only administrators can change the order status".into(),
                    ));
                }
                if current.status == OrderStatus::Completed {
                    return Err(ServiceError::OrderCompleted(id));
                }
            }
        }

        let updated = self
            .orders_repo
            .update_info(id, &changes)
            .await
            .map_err(ServiceError::order_lookup(id))?;
        info!(order_id = %id, admin = matches!(requester, Requester::Admin), "order info updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn order_stats(&self) -> Result<OrderStats, ServiceError> {
        Ok(self.orders_repo.stats().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::api::{CustomerInfo, OrderItemRequest};
    use model::Product;
    use repository::InMemoryStore;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    const GUEST: &str = "guest@lanternstore.com";
    const PHONE: &str = "+1-555-0100";

    struct Fixture {
        store: Arc<InMemoryStore>,
        service: OrderServiceImpl<Arc<InMemoryStore>, Arc<InMemoryStore>>,
        lantern: Product,
        wick: Product,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let lantern = Product {
            id: Uuid::new_v4(),
            name: "Lantern".to_string(),
            price: dec!(10.00),
            stock_count: 0,
            in_stock: true,
            images: vec!["lantern.png".to_string()],
        };
        let wick = Product {
            id: Uuid::new_v4(),
            name: "Wick".to_string(),
            price: dec!(5.00),
            stock_count: 3,
            in_stock: true,
            images: vec![],
        };
        store.insert_product(lantern.clone()).await;
        store.insert_product(wick.clone()).await;
        let service = OrderServiceImpl::new(store.clone(), store.clone(), GUEST);
        Fixture {
            store,
            service,
            lantern,
            wick,
        }
    }

    fn request(items: Vec<OrderItemRequest>, total: Decimal) -> CreateOrderRequest {
        CreateOrderRequest {
            items,
            customer_info: CustomerInfo {
                full_name: "John Doe".to_string(),
                phone: PHONE.to_string(),
                address: "123 Main St".to_string(),
                notes: Some("after 6 PM".to_string()),
            },
            total,
        }
    }

    fn line(product: &Product, quantity: i32, price: Decimal) -> OrderItemRequest {
        OrderItemRequest {
            product_id: product.id,
            quantity,
            price,
        }
    }

    impl Fixture {
        fn valid_request(&self) -> CreateOrderRequest {
            request(
                vec![line(&self.lantern, 2, dec!(10.00)), line(&self.wick, 1, dec!(5.00))],
                dec!(25.00),
            )
        }
    }

    #[tokio::test]
    async fn test_create_order_persists_order_and_items() {
        let fx = fixture().await;
        let order = fx.service.create_order(fx.valid_request()).await.unwrap();

        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.total, dec!(25.00));
        assert_eq!(order.items_total(), dec!(25.00));
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].name, "Lantern");
        assert_eq!(order.items[0].image, "lantern.png");
        assert_eq!(order.items[1].image, "");
        assert_eq!(fx.store.order_count().await, 1);
        assert_eq!(fx.store.item_count().await, 2);
    }

    #[tokio::test]
    async fn test_declared_total_off_by_fifty_cents_fails() {
        let fx = fixture().await;
        let mut req = fx.valid_request();
        req.total = dec!(25.50);
        let err = fx.service.create_order(req).await.unwrap_err();
        assert_eq!(err.kind(), "TotalMismatch");
        assert_eq!(err.to_string(), "Order total mismatch. Expected: 25.00, Received: 25.50");
    }

    #[tokio::test]
    async fn test_failed_validation_writes_nothing() {
        let fx = fixture().await;
        let req = request(vec![line(&fx.wick, 5, dec!(5.00))], dec!(25.00));
        let err = fx.service.create_order(req).await.unwrap_err();

        assert_eq!(err.kind(), "InsufficientStock");
        assert_eq!(fx.store.order_count().await, 0);
        assert_eq!(fx.store.item_count().await, 0);
        assert_eq!(fx.store.user_count_with_email(GUEST).await, 0);
    }

    #[tokio::test]
    async fn test_storage_failure_mid_create_writes_nothing() {
        let fx = fixture().await;
        fx.store.fail_item_inserts(true);
        let err = fx.service.create_order(fx.valid_request()).await.unwrap_err();

        assert!(matches!(err, ServiceError::Storage(_)));
        assert_eq!(fx.store.order_count().await, 0);
        assert_eq!(fx.store.item_count().await, 0);
    }

    #[tokio::test]
    async fn test_stock_is_not_decremented() {
        let fx = fixture().await;
        fx.service.create_order(fx.valid_request()).await.unwrap();
        let wick = ProductsRepository::get_by_id(&*fx.store, fx.wick.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wick.stock_count, 3);
    }

    #[tokio::test]
    async fn test_guest_account_is_shared() {
        let fx = fixture().await;
        let first = fx.service.create_order(fx.valid_request()).await.unwrap();
        let second = fx.service.create_order(fx.valid_request()).await.unwrap();
        assert_eq!(first.user_id, second.user_id);
        assert_eq!(fx.store.user_count_with_email(GUEST).await, 1);
    }

    #[tokio::test]
    async fn test_malformed_request_is_validation_error() {
        let fx = fixture().await;
        let mut req = fx.valid_request();
        req.customer_info.full_name = String::new();
        let err = fx.service.create_order(req).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[tokio::test]
    async fn test_orders_by_phone_case_insensitive() {
        let fx = fixture().await;
        let mut req = fx.valid_request();
        req.customer_info.phone = "abc-555".to_string();
        let created = fx.service.create_order(req).await.unwrap();

        let lower = fx.service.get_orders_by_phone("abc-555").await.unwrap();
        let upper = fx.service.get_orders_by_phone("ABC-555").await.unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.len(), 1);
        assert_eq!(lower[0].id, created.id);

        let none = fx.service.get_orders_by_phone("+1-555-0199").await.unwrap();
        assert!(none.is_empty());
        assert!(fx.service.get_orders_by_phone("  ").await.is_err());
    }

    #[tokio::test]
    async fn test_update_status_overwrites_any_value() {
        let fx = fixture().await;
        let order = fx.service.create_order(fx.valid_request()).await.unwrap();

        let done = fx
            .service
            .update_order_status(order.id, OrderStatus::Completed)
            .await
            .unwrap();
        assert_eq!(done.status, OrderStatus::Completed);

        let back = fx
            .service
            .update_order_status(order.id, OrderStatus::New)
            .await
            .unwrap();
        assert_eq!(back.status, OrderStatus::New);
    }

    #[tokio::test]
    async fn test_update_status_unknown_order() {
        let fx = fixture().await;
        let missing = Uuid::new_v4();
        let err = fx
            .service
            .update_order_status(missing, OrderStatus::Shipping)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::OrderNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn test_update_info_unknown_order() {
        let fx = fixture().await;
        let missing = Uuid::new_v4();
        let req = UpdateOrderRequest {
            address: Some("9 Elm St".to_string()),
            ..UpdateOrderRequest::default()
        };

        for requester in [Requester::Admin, Requester::customer(Some(PHONE.to_string()))] {
            let err = fx
                .service
                .update_order_info(missing, req.clone(), requester)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::OrderNotFound(id) if id == missing));
        }
    }

    #[tokio::test]
    async fn test_oversized_amounts_are_rejected_before_storage() {
        let fx = fixture().await;
        let huge = request(vec![line(&fx.lantern, i32::MAX, dec!(100000000000000000000))], dec!(1));
        let err = fx.service.create_order(huge).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");

        let sub_cent = request(vec![line(&fx.lantern, 1000, dec!(9.995))], dec!(9995.00));
        let err = fx.service.create_order(sub_cent).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
        assert_eq!(fx.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_customer_with_wrong_phone_is_rejected() {
        let fx = fixture().await;
        let order = fx.service.create_order(fx.valid_request()).await.unwrap();
        let req = UpdateOrderRequest {
            notes: Some("leave at door".to_string()),
            ..UpdateOrderRequest::default()
        };

        let err = fx
            .service
            .update_order_info(order.id, req.clone(), Requester::customer(Some("+1-555-0199".into())))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "OwnershipMismatch");

        let err = fx
            .service
            .update_order_info(order.id, req, Requester::customer(None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "OwnershipMismatch");
    }

    #[tokio::test]
    async fn test_updating_notes_leaves_other_fields() {
        let fx = fixture().await;
        let order = fx.service.create_order(fx.valid_request()).await.unwrap();
        let req = UpdateOrderRequest {
            notes: Some("leave at door".to_string()),
            ..UpdateOrderRequest::default()
        };

        let updated = fx
            .service
            .update_order_info(order.id, req, Requester::customer(Some(PHONE.to_lowercase())))
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some("leave at door"));
        assert_eq!(updated.customer_name, order.customer_name);
        assert_eq!(updated.phone, order.phone);
        assert_eq!(updated.address, order.address);
        assert_eq!(updated.items.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_string_is_an_update() {
        let fx = fixture().await;
        let order = fx.service.create_order(fx.valid_request()).await.unwrap();
        let req = UpdateOrderRequest {
            notes: Some(String::new()),
            ..UpdateOrderRequest::default()
        };
        let updated = fx
            .service
            .update_order_info(order.id, req, Requester::Admin)
            .await
            .unwrap();
        assert_eq!(updated.notes.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_customer_cannot_change_status_or_completed_orders() {
        let fx = fixture().await;
        let order = fx.service.create_order(fx.valid_request()).await.unwrap();
        let owner = || Requester::customer(Some(PHONE.to_string()));

        let status_change = UpdateOrderRequest {
            status: Some(OrderStatus::Completed),
            ..UpdateOrderRequest::default()
        };
        let err = fx
            .service
            .update_order_info(order.id, status_change.clone(), owner())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");

        fx.service
            .update_order_info(order.id, status_change, Requester::Admin)
            .await
            .unwrap();

        let address_change = UpdateOrderRequest {
            address: Some("456 Side St".to_string()),
            ..UpdateOrderRequest::default()
        };
        let err = fx
            .service
            .update_order_info(order.id, address_change.clone(), owner())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "OrderCompleted");

        let updated = fx
            .service
            .update_order_info(order.id, address_change, Requester::Admin)
            .await
            .unwrap();
        assert_eq!(updated.address, "456 Side St");
    }

    #[tokio::test]
    async fn test_update_without_fields_is_rejected() {
        let fx = fixture().await;
        let order = fx.service.create_order(fx.valid_request()).await.unwrap();
        let err = fx
            .service
            .update_order_info(order.id, UpdateOrderRequest::default(), Requester::Admin)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[tokio::test]
    async fn test_order_stats() {
        let fx = fixture().await;
        let a = fx.service.create_order(fx.valid_request()).await.unwrap();
        fx.service.create_order(fx.valid_request()).await.unwrap();
        fx.service
            .update_order_status(a.id, OrderStatus::Completed)
            .await
            .unwrap();

        let stats = fx.service.order_stats().await.unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.new_orders, 1);
        assert_eq!(stats.completed_orders, 1);
        assert_eq!(stats.total_revenue, dec!(25.00));
        assert_eq!(fx.service.get_all_orders().await.unwrap().len(), 2);
    }
}
