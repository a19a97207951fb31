// src/db/order_repo.rs

use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::order::{NewOrder, Order, OrderItem, OrderStatus},
};

#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(
        &self,
        company_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, AppError> {
        // `$2 IS NULL` deixa o filtro opcional sem montar SQL dinâmico
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE company_id = $1 AND ($2::order_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(company_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    pub async fn get<'e, E>(&self, executor: E, company_id: Uuid, order_id: Uuid) -> Result<Order, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 AND company_id = $2")
            .bind(order_id)
            .bind(company_id)
            .fetch_optional(executor)
            .await?
            .ok_or(AppError::NotFound("Pedido"))
    }

    /// Mesma busca, travando a linha para a troca de status.
    pub async fn get_for_update<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        order_id: Uuid,
    ) -> Result<Order, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE id = $1 AND company_id = $2 FOR UPDATE",
        )
        .bind(order_id)
        .bind(company_id)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Pedido"))
    }

    pub async fn items<'e, E>(&self, executor: E, order_id: Uuid) -> Result<Vec<OrderItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY product_name ASC",
        )
        .bind(order_id)
        .fetch_all(executor)
        .await?;
        Ok(items)
    }

    pub async fn insert_order<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        order: &NewOrder,
        total_amount: Decimal,
    ) -> Result<Order, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders
                (company_id, conversation_id, customer_name, customer_phone,
                 customer_address, source, total_amount, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(order.conversation_id)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.customer_address)
        .bind(order.source)
        .bind(total_amount)
        .bind(&order.notes)
        .fetch_one(executor)
        .await?;
        Ok(created)
    }

    pub async fn insert_item<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        product_id: Uuid,
        product_name: &str,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<OrderItem, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let item = sqlx::query_as::<_, OrderItem>(
            r#"
            INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(order_id)
        .bind(product_id)
        .bind(product_name)
        .bind(quantity)
        .bind(unit_price)
        .fetch_one(executor)
        .await?;
        Ok(item)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        order_id: Uuid,
        status: OrderStatus,
    ) -> Result<Order, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let order = sqlx::query_as::<_, Order>(
            "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(order_id)
        .bind(status)
        .fetch_one(executor)
        .await?;
        Ok(order)
    }
}
