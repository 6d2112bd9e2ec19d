//! Order repository.
//!
//! Orders are created in one transaction: the header insert carries
//! `ON CONFLICT (idempotency_key) DO NOTHING`, so concurrent retries of the
//! same submission serialize on the unique index and exactly one of them
//! writes. The line items are only inserted by the transaction that won.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use group_order_core::{LineItem, MemberId, NewOrder, Order, OrderId, OrderStatus};

use super::{CreateOutcome, OrderRepository, RepositoryError};

/// `PostgreSQL`-backed [`OrderRepository`].
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn items_for(
        &self,
        order_ids: &[Uuid],
    ) -> Result<HashMap<OrderId, Vec<LineItem>>, RepositoryError> {
        let rows = sqlx::query_as::<_, ItemRow>(
            r"
            SELECT order_id, product_name, unit_price, quantity
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            ",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<OrderId, Vec<LineItem>> = HashMap::new();
        for row in rows {
            items.entry(row.order_id).or_default().push(LineItem {
                product_name: row.product_name,
                unit_price: row.unit_price,
                quantity: row.quantity,
            });
        }
        Ok(items)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: MemberId,
    created_at: DateTime<Utc>,
    customer_name: String,
    phone: String,
    delivery_location: String,
    note: String,
    total_amount: i64,
    status: OrderStatus,
    admin_note: Option<String>,
    batch_id: String,
}

impl OrderRow {
    fn into_order(self, order_items: Vec<LineItem>) -> Result<Order, RepositoryError> {
        if order_items.is_empty() {
            return Err(RepositoryError::DataCorruption(format!(
                "order {} has no line items",
                self.id
            )));
        }

        Ok(Order {
            id: self.id,
            member_id: self.user_id,
            created_at: self.created_at,
            customer_name: self.customer_name,
            phone: self.phone,
            delivery_location: self.delivery_location,
            note: self.note,
            total_amount: self.total_amount,
            status: self.status,
            admin_note: self.admin_note,
            batch_id: self.batch_id,
            order_items,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    order_id: OrderId,
    product_name: String,
    unit_price: i64,
    quantity: i64,
}

const ORDER_COLUMNS: &str = "id, user_id, created_at, customer_name, phone, delivery_location, \
                             note, total_amount, status, admin_note, batch_id";

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, order: &NewOrder) -> Result<CreateOutcome, RepositoryError> {
        if order.items.is_empty() {
            return Err(RepositoryError::InvalidInput(
                "order has no line items".to_owned(),
            ));
        }
        let total = order
            .total()
            .ok_or_else(|| RepositoryError::InvalidInput("order total overflows".to_owned()))?;

        let mut tx = self.pool.begin().await?;

        let inserted: Option<OrderId> = sqlx::query_scalar(
            r"
            INSERT INTO orders (
                id, user_id, customer_name, phone, delivery_location, note,
                total_amount, batch_id, idempotency_key
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING id
            ",
        )
        .bind(OrderId::random())
        .bind(order.member_id)
        .bind(&order.customer_name)
        .bind(&order.phone)
        .bind(&order.delivery_location)
        .bind(&order.note)
        .bind(total)
        .bind(order.batch_id.as_str())
        .bind(&order.idempotency_key)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(order_id) = inserted else {
            tx.rollback().await?;

            let existing: Option<(OrderId, MemberId)> = sqlx::query_as(
                r"
                SELECT id, user_id
                FROM orders
                WHERE idempotency_key = $1
                ",
            )
            .bind(&order.idempotency_key)
            .fetch_optional(&self.pool)
            .await?;

            return match existing {
                Some((id, owner)) if owner == order.member_id => Ok(CreateOutcome::Existing(id)),
                Some(_) => Err(RepositoryError::Conflict(
                    "idempotency key belongs to another member".to_owned(),
                )),
                // The conflicting row vanished between the insert and the read.
                None => Err(RepositoryError::NotFound),
            };
        };

        let names: Vec<&str> = order
            .items
            .iter()
            .map(|item| item.product_name.as_str())
            .collect();
        let prices: Vec<i64> = order.items.iter().map(|item| item.unit_price).collect();
        let quantities: Vec<i64> = order.items.iter().map(|item| item.quantity).collect();

        sqlx::query(
            r"
            INSERT INTO order_items (order_id, position, product_name, unit_price, quantity)
            SELECT $1, t.position::int, t.product_name, t.unit_price, t.quantity
            FROM UNNEST($2::text[], $3::bigint[], $4::bigint[])
                 WITH ORDINALITY AS t(product_name, unit_price, quantity, position)
            ",
        )
        .bind(order_id)
        .bind(names)
        .bind(prices)
        .bind(quantities)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CreateOutcome::Created(order_id))
    }

    async fn find_by_idempotency_key(
        &self,
        member_id: MemberId,
        idempotency_key: &str,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let id: Option<OrderId> = sqlx::query_scalar(
            r"
            SELECT id
            FROM orders
            WHERE idempotency_key = $1 AND user_id = $2
            ",
        )
        .bind(idempotency_key)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get_for_member(
        &self,
        id: OrderId,
        member_id: MemberId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut items = self.items_for(&[*row.id.as_uuid()]).await?;
        let order_items = items.remove(&row.id).unwrap_or_default();
        row.into_order(order_items).map(Some)
    }

    async fn list_for_member(
        &self,
        member_id: MemberId,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(member_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|row| *row.id.as_uuid()).collect();
        let mut items = self.items_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect()
    }
}
