//! In-memory implementation of every repository trait.
//!
//! Backs the service and HTTP tests and local experiments. All state sits
//! behind one `RwLock`, so `create` is all-or-nothing like the PostgreSQL
//! transaction it stands in for.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use model::{NewOrder, NewOrderItem, Order, OrderChanges, OrderItem, OrderStats, OrderStatus, Product, User};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{OrdersRepository, ProductsRepository, RepositoryError, UsersRepository};

#[derive(Debug, Default)]
struct State {
    products: HashMap<Uuid, Product>,
    users: HashMap<Uuid, User>,
    /// Orders without items, with their insertion sequence number.
    orders: HashMap<Uuid, (u64, Order)>,
    /// Item rows in insertion order.
    items: Vec<OrderItem>,
    next_seq: u64,
}

impl State {
    fn assemble(&self, order: &Order) -> Order {
        let mut order = order.clone();
        order.items = self
            .items
            .iter()
            .filter(|item| item.order_id == order.id)
            .cloned()
            .collect();
        order
    }

    fn newest_first<'a>(&self, orders: impl Iterator<Item = &'a (u64, Order)>) -> Vec<Order> {
        let mut found: Vec<&(u64, Order)> = orders.collect();
        found.sort_by(|a, b| b.0.cmp(&a.0));
        found.into_iter().map(|(_, order)| self.assemble(order)).collect()
    }
}

/// Thread-safe in-memory store implementing the products, users and orders repositories.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<State>,
    fail_item_inserts: AtomicBool,
}

impl InMemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        let mut state = self.inner.write().await;
        state.products.insert(product.id, product);
    }

    pub async fn insert_user(&self, user: User) {
        let mut state = self.inner.write().await;
        state.users.insert(user.id, user);
    }

    /// Makes subsequent `create` calls fail while writing item rows.
    pub fn fail_item_inserts(&self, fail: bool) {
        self.fail_item_inserts.store(fail, Ordering::SeqCst);
    }

    /// Number of stored order rows.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    /// Number of stored order item rows.
    pub async fn item_count(&self) -> usize {
        self.inner.read().await.items.len()
    }

    /// Number of accounts with the given e-mail.
    pub async fn user_count_with_email(&self, email: &str) -> usize {
        let state = self.inner.read().await;
        state.users.values().filter(|u| u.email == email).count()
    }
}

#[async_trait]
impl ProductsRepository for InMemoryStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Product>, RepositoryError> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }
}

#[async_trait]
impl UsersRepository for InMemoryStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl OrdersRepository for InMemoryStore {
    async fn create(
        &self,
        guest_email: &str,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<Order, RepositoryError> {
        let mut state = self.inner.write().await;

        // Stage every row first; nothing is written unless all of them succeed.
        let existing_guest = state.users.values().find(|u| u.email == guest_email).cloned();
        let guest = existing_guest.clone().unwrap_or_else(|| User {
            id: Uuid::new_v4(),
            email: guest_email.to_string(),
            name: "Guest User".to_string(),
            is_admin: false,
        });

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let stored = Order {
            id: order_id,
            user_id: guest.id,
            customer_name: order.customer_name.clone(),
            phone: order.phone.clone(),
            address: order.address.clone(),
            notes: order.notes.clone(),
            total: order.total,
            status: OrderStatus::New,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
        };

        if self.fail_item_inserts.load(Ordering::SeqCst) {
            return Err(RepositoryError::InvalidData(
                "order item insert rejected".to_string(),
            ));
        }
        let rows: Vec<OrderItem> = items
            .iter()
            .map(|it| OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: it.product_id,
                name: it.name.clone(),
                price: it.price,
                quantity: it.quantity,
                image: it.image.clone(),
            })
            .collect();

        if existing_guest.is_none() {
            state.users.insert(guest.id, guest);
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.orders.insert(order_id, (seq, stored.clone()));
        state.items.extend(rows.iter().cloned());

        Ok(Order { items: rows, ..stored })
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Order, RepositoryError> {
        let state = self.inner.read().await;
        let (_, order) = state.orders.get(&id).ok_or(RepositoryError::NotFound)?;
        Ok(state.assemble(order))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Order>, RepositoryError> {
        let state = self.inner.read().await;
        Ok(state.newest_first(
            state
                .orders
                .values()
                .filter(|(_, order)| order.phone_matches(phone)),
        ))
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let state = self.inner.read().await;
        Ok(state.newest_first(state.orders.values()))
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, RepositoryError> {
        let changes = OrderChanges {
            status: Some(status),
            ..OrderChanges::default()
        };
        self.update_info(id, &changes).await
    }

    async fn update_info(&self, id: Uuid, changes: &OrderChanges) -> Result<Order, RepositoryError> {
        let mut state = self.inner.write().await;
        let (_, order) = state.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        changes.apply_to(order);
        order.updated_at = Utc::now();
        let order = order.clone();
        Ok(state.assemble(&order))
    }

    async fn stats(&self) -> Result<OrderStats, RepositoryError> {
        let state = self.inner.read().await;
        let mut stats = OrderStats::default();
        let mut revenue = Decimal::ZERO;
        for (_, order) in state.orders.values() {
            stats.total_orders += 1;
            match order.status {
                OrderStatus::New => stats.new_orders += 1,
                OrderStatus::Completed => {
                    stats.completed_orders += 1;
                    revenue += order.total;
                }
                status if status.is_processing() => stats.processing_orders += 1,
                _ => {}
            }
        }
        stats.total_revenue = revenue.round_dp(2);
        Ok(stats)
    }
}
