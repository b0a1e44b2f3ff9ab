//! PostgreSQL implementations of the repository traits.
//!
//! Each repository holds a `deadpool_postgres::Pool` and checks a connection
//! out per call. Multi-row writes go through `*_tx` helpers that run inside
//! the caller's [`Transaction`].

use std::collections::HashMap;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use model::{NewOrder, NewOrderItem, Order, OrderChanges, OrderItem, OrderStats, OrderStatus, Product, User};
use rust_decimal::Decimal;
use tokio_postgres::{Client, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use crate::{OrdersRepository, ProductsRepository, RepositoryError, UsersRepository};

const GUEST_NAME: &str = "Guest User";

const ORDER_COLUMNS: &str = r#"
    id, user_id, customer_name, phone, address, notes, total, status, created_at, updated_at
"#;

/// PostgreSQL implementation of the [`ProductsRepository`] trait.
pub struct PgProductsRepository {
    db: Pool,
}

impl PgProductsRepository {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductsRepository for PgProductsRepository {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Product>, RepositoryError> {
        let query = r#"
            SELECT id, name, price, stock_count, in_stock, images
            FROM products WHERE id = $1
        "#;
        let client = self.db.get().await?;
        let row = client.query_opt(query, &[&id]).await?;
        Ok(row.map(|row| Product {
            id: row.get("id"),
            name: row.get("name"),
            price: row.get("price"),
            stock_count: row.get("stock_count"),
            in_stock: row.get("in_stock"),
            images: row.get("images"),
        }))
    }
}

/// PostgreSQL implementation of the [`UsersRepository`] trait.
pub struct PgUsersRepository {
    db: Pool,
}

impl PgUsersRepository {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }
}

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        is_admin: row.get("is_admin"),
    }
}

#[async_trait]
impl UsersRepository for PgUsersRepository {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let query = "SELECT id, email, name, is_admin FROM users WHERE id = $1";
        let client = self.db.get().await?;
        let row = client.query_opt(query, &[&id]).await?;
        Ok(row.as_ref().map(user_from_row))
    }
}

/// Returns the id of the guest account, creating it if needed.
///
/// The no-op `DO UPDATE` makes `RETURNING` yield the existing row, so two
/// concurrent first orders both end up with the same account.
async fn upsert_guest_tx(tx: &Transaction<'_>, email: &str) -> Result<Uuid, RepositoryError> {
    let query = r#"
        INSERT INTO users (id, email, name, password, is_admin)
        VALUES ($1, $2, $3, '', FALSE)
        ON CONFLICT (email) DO UPDATE SET email = EXCLUDED.email
        RETURNING id
    "#;
    let row = tx
        .query_one(query, &[&Uuid::new_v4(), &email, &GUEST_NAME])
        .await?;
    Ok(row.get("id"))
}

/// PostgreSQL implementation of the [`OrdersRepository`] trait.
///
/// Orders and their line items live in `orders` and `order_items`; reads
/// always attach the items.
pub struct PgOrdersRepository {
    db: Pool,
}

impl PgOrdersRepository {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }

    async fn insert_order_tx(
        &self,
        tx: &Transaction<'_>,
        user_id: Uuid,
        order: &NewOrder,
    ) -> Result<Order, RepositoryError> {
        let query = format!(
            r#"
            INSERT INTO orders (id, user_id, customer_name, phone, address, notes, total, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let row = tx
            .query_one(
                query.as_str(),
                &[
                    &Uuid::new_v4(),
                    &user_id,
                    &order.customer_name,
                    &order.phone,
                    &order.address,
                    &order.notes,
                    &order.total,
                    &OrderStatus::New.as_str(),
                ],
            )
            .await?;
        order_from_row(&row)
    }

    async fn insert_items_tx(
        &self,
        tx: &Transaction<'_>,
        order_id: Uuid,
        items: &[NewOrderItem],
    ) -> Result<Vec<OrderItem>, RepositoryError> {
        let query = r#"
            INSERT INTO order_items (id, order_id, product_id, position, name, price, quantity, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#;
        let mut inserted = Vec::with_capacity(items.len());
        for (position, it) in items.iter().enumerate() {
            let id = Uuid::new_v4();
            let position = position as i32;
            tx.execute(
                query,
                &[
                    &id,
                    &order_id,
                    &it.product_id,
                    &position,
                    &it.name,
                    &it.price,
                    &it.quantity,
                    &it.image,
                ],
            )
            .await?;
            inserted.push(OrderItem {
                id,
                order_id,
                product_id: it.product_id,
                name: it.name.clone(),
                price: it.price,
                quantity: it.quantity,
                image: it.image.clone(),
            });
        }
        Ok(inserted)
    }
}

fn order_from_row(row: &Row) -> Result<Order, RepositoryError> {
    let status: String = row.get("status");
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;
    Ok(Order {
        id: row.get("id"),
        user_id: row.get("user_id"),
        customer_name: row.get("customer_name"),
        phone: row.get("phone"),
        address: row.get("address"),
        notes: row.get("notes"),
        total: row.get("total"),
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        items: Vec::new(),
    })
}

/// Loads the items of every given order and attaches them in insertion order.
async fn attach_items(client: &Client, mut orders: Vec<Order>) -> Result<Vec<Order>, RepositoryError> {
    if orders.is_empty() {
        return Ok(orders);
    }
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let query = r#"
        SELECT id, order_id, product_id, name, price, quantity, image
        FROM order_items WHERE order_id = ANY($1)
        ORDER BY order_id, position
    "#;
    let rows = client.query(query, &[&ids]).await?;

    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        let item = OrderItem {
            id: row.get("id"),
            order_id: row.get("order_id"),
            product_id: row.get("product_id"),
            name: row.get("name"),
            price: row.get("price"),
            quantity: row.get("quantity"),
            image: row.get("image"),
        };
        by_order.entry(item.order_id).or_default().push(item);
    }
    for order in &mut orders {
        order.items = by_order.remove(&order.id).unwrap_or_default();
    }
    Ok(orders)
}

async fn fetch_one(client: &Client, row: Option<Row>) -> Result<Order, RepositoryError> {
    let row = row.ok_or(RepositoryError::NotFound)?;
    let order = order_from_row(&row)?;
    let mut orders = attach_items(client, vec![order]).await?;
    orders.pop().ok_or(RepositoryError::NotFound)
}

async fn fetch_many(client: &Client, rows: Vec<Row>) -> Result<Vec<Order>, RepositoryError> {
    let orders = rows
        .iter()
        .map(order_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    attach_items(client, orders).await
}

#[async_trait]
impl OrdersRepository for PgOrdersRepository {
    async fn create(
        &self,
        guest_email: &str,
        order: &NewOrder,
        items: &[NewOrderItem],
    ) -> Result<Order, RepositoryError> {
        let mut client = self.db.get().await?;
        let tx = client.transaction().await?;

        let user_id = upsert_guest_tx(&tx, guest_email).await?;
        let mut created = self.insert_order_tx(&tx, user_id, order).await?;
        created.items = self.insert_items_tx(&tx, created.id, items).await?;

        tx.commit().await?;
        debug!(order_id = %created.id, items = created.items.len(), "order committed");
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Order, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let client = self.db.get().await?;
        let row = client.query_opt(query.as_str(), &[&id]).await?;
        fetch_one(&client, row).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Vec<Order>, RepositoryError> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE lower(phone) = lower($1) ORDER BY created_at DESC"
        );
        let client = self.db.get().await?;
        let rows = client.query(query.as_str(), &[&phone]).await?;
        fetch_many(&client, rows).await
    }

    async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC");
        let client = self.db.get().await?;
        let rows = client.query(query.as_str(), &[]).await?;
        fetch_many(&client, rows).await
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus) -> Result<Order, RepositoryError> {
        let query = format!(
            r#"
            UPDATE orders SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let client = self.db.get().await?;
        let row = client
            .query_opt(query.as_str(), &[&id, &status.as_str()])
            .await?;
        fetch_one(&client, row).await
    }

    async fn update_info(&self, id: Uuid, changes: &OrderChanges) -> Result<Order, RepositoryError> {
        // NULL parameters keep the stored value.
        let query = format!(
            r#"
            UPDATE orders SET
                customer_name = COALESCE($2, customer_name),
                phone         = COALESCE($3, phone),
                address       = COALESCE($4, address),
                notes         = COALESCE($5, notes),
                status        = COALESCE($6, status),
                updated_at    = now()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let status = changes.status.map(|s| s.as_str());
        let client = self.db.get().await?;
        let row = client
            .query_opt(
                query.as_str(),
                &[
                    &id,
                    &changes.customer_name,
                    &changes.phone,
                    &changes.address,
                    &changes.notes,
                    &status,
                ],
            )
            .await?;
        fetch_one(&client, row).await
    }

    async fn stats(&self) -> Result<OrderStats, RepositoryError> {
        let query = r#"
            SELECT
                COUNT(*) AS total_orders,
                COUNT(*) FILTER (WHERE status = 'NEW') AS new_orders,
                COUNT(*) FILTER (WHERE status IN ('NEGOTIATING', 'SHIPPING')) AS processing_orders,
                COUNT(*) FILTER (WHERE status = 'COMPLETED') AS completed_orders,
                COALESCE(SUM(total) FILTER (WHERE status = 'COMPLETED'), 0) AS total_revenue
            FROM orders
        "#;
        let client = self.db.get().await?;
        let row = client.query_one(query, &[]).await?;
        let revenue: Decimal = row.get("total_revenue");
        Ok(OrderStats {
            total_orders: row.get("total_orders"),
            new_orders: row.get("new_orders"),
            processing_orders: row.get("processing_orders"),
            completed_orders: row.get("completed_orders"),
            total_revenue: revenue.round_dp(2),
        })
    }
}
