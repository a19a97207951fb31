// src/db/company_repo.rs

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::company::{Company, CompanyStats, OrderStatusCount},
};

// O repositório de empresas, responsável por todas as interações com a tabela 'companies'
#[derive(Clone)]
pub struct CompanyRepository {
    pool: PgPool,
}

impl CompanyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Company>, AppError> {
        let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(company)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Company>, AppError> {
        let company = sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(company)
    }

    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<Company, AppError> {
        sqlx::query_as::<_, Company>(
            "INSERT INTO companies (name, email, password_hash) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Converte erro de violação de chave única em um erro mais amigável
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() {
                    return AppError::EmailAlreadyExists;
                }
            }
            e.into()
        })
    }

    pub async fn update_name(&self, id: Uuid, name: &str) -> Result<Company, AppError> {
        sqlx::query_as::<_, Company>(
            "UPDATE companies SET name = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Empresa"))
    }

    /// Indicadores gerais. Uma transação dá um retrato consistente dos números.
    pub async fn stats(&self, company_id: Uuid) -> Result<CompanyStats, AppError> {
        let mut tx = self.pool.begin().await?;

        let (total_products, active_products, out_of_stock_products): (i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       COUNT(*) FILTER (WHERE is_active),
                       COUNT(*) FILTER (WHERE is_active AND stock_quantity = 0)
                FROM products
                WHERE company_id = $1
                "#,
            )
            .bind(company_id)
            .fetch_one(&mut *tx)
            .await?;

        let orders_by_status = sqlx::query_as::<_, OrderStatusCount>(
            r#"
            SELECT status, COUNT(*) AS count
            FROM orders
            WHERE company_id = $1
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(company_id)
        .fetch_all(&mut *tx)
        .await?;

        // Receita: pedidos que não foram cancelados nem estão só pendentes
        let revenue: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT SUM(total_amount)
            FROM orders
            WHERE company_id = $1
              AND status IN ('confirmed', 'shipped', 'delivered')
            "#,
        )
        .bind(company_id)
        .fetch_one(&mut *tx)
        .await?;

        let (conversations, unread_messages): (i64, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), SUM(unread_count)::BIGINT FROM conversations WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_one(&mut *tx)
        .await?;

        let connected_pages: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM facebook_pages WHERE company_id = $1 AND is_active",
        )
        .bind(company_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CompanyStats {
            total_products,
            active_products,
            out_of_stock_products,
            orders_by_status,
            revenue: revenue.unwrap_or(Decimal::ZERO),
            conversations,
            unread_messages: unread_messages.unwrap_or(0),
            connected_pages,
        })
    }
}
