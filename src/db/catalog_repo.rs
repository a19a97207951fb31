// src/db/catalog_repo.rs

use sqlx::{Executor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::catalog::{Category, Product, ProductFilter, ProductPayload},
};

#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Categorias
    // ---

    pub async fn list_categories(&self, company_id: Uuid) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE company_id = $1 ORDER BY name ASC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    pub async fn category_belongs_to(
        &self,
        company_id: Uuid,
        category_id: Uuid,
    ) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1 AND company_id = $2)",
        )
        .bind(category_id)
        .bind(company_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create_category(
        &self,
        company_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Category, AppError> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (company_id, name, description)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_category_conflict(e, name))
    }

    pub async fn update_category(
        &self,
        company_id: Uuid,
        category_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Category, AppError> {
        sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = $3, description = $4, updated_at = NOW()
            WHERE id = $2 AND company_id = $1
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(category_id)
        .bind(name)
        .bind(description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_category_conflict(e, name))?
        .ok_or(AppError::NotFound("Categoria"))
    }

    /// Apaga a categoria; os produtos ficam sem categoria (ON DELETE SET NULL).
    pub async fn delete_category(&self, company_id: Uuid, category_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND company_id = $2")
            .bind(category_id)
            .bind(company_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Categoria"));
        }
        Ok(())
    }

    // ---
    // Produtos
    // ---

    pub async fn list_products(
        &self,
        company_id: Uuid,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, AppError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM products WHERE company_id = ");
        qb.push_bind(company_id);

        if let Some(category_id) = filter.category_id {
            qb.push(" AND category_id = ").push_bind(category_id);
        }
        if let Some(search) = filter.search.as_deref().filter(|s| !s.trim().is_empty()) {
            qb.push(" AND name ILIKE ").push_bind(format!("%{}%", search.trim()));
        }
        if filter.active_only {
            qb.push(" AND is_active");
        }
        qb.push(" ORDER BY name ASC");

        let products = qb.build_query_as::<Product>().fetch_all(&self.pool).await?;
        Ok(products)
    }

    /// Catálogo enviado ao assistente: só produtos ativos, com estoque primeiro e o nome da categoria.
    pub async fn list_catalog(&self, company_id: Uuid, limit: i64) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT p.*, c.name AS category_name
            FROM products p
            LEFT JOIN categories c ON c.id = p.category_id AND c.company_id = p.company_id
            WHERE p.company_id = $1 AND p.is_active
            ORDER BY (p.stock_quantity > 0) DESC, p.name ASC
            LIMIT $2
            "#,
        )
        .bind(company_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    pub async fn get_product(&self, company_id: Uuid, product_id: Uuid) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1 AND company_id = $2")
            .bind(product_id)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("Produto"))
    }

    pub async fn create_product(
        &self,
        company_id: Uuid,
        input: &ProductPayload,
    ) -> Result<Product, AppError> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products
                (company_id, category_id, name, description, price, sale_price,
                 stock_quantity, image_url, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(input.category_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.sale_price)
        .bind(input.stock_quantity)
        .bind(&input.image_url)
        .bind(input.is_active)
        .fetch_one(&self.pool)
        .await?;
        Ok(product)
    }

    pub async fn update_product(
        &self,
        company_id: Uuid,
        product_id: Uuid,
        input: &ProductPayload,
    ) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET category_id = $3, name = $4, description = $5, price = $6,
                sale_price = $7, stock_quantity = $8, image_url = $9,
                is_active = $10, updated_at = NOW()
            WHERE id = $2 AND company_id = $1
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(product_id)
        .bind(input.category_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.sale_price)
        .bind(input.stock_quantity)
        .bind(&input.image_url)
        .bind(input.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Produto"))
    }

    pub async fn delete_product(&self, company_id: Uuid, product_id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1 AND company_id = $2")
            .bind(product_id)
            .bind(company_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Produto"));
        }
        Ok(())
    }

    // ---
    // Funções de "Escrita" (Transacionais)
    // ---
    // Estas usam o padrão genérico 'Executor' para rodar dentro de uma transação.

    /// Trava as linhas dos produtos do pedido (SELECT ... FOR UPDATE).
    pub async fn lock_products<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        product_ids: &[Uuid],
    ) -> Result<Vec<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE company_id = $1 AND id = ANY($2)
            ORDER BY id
            FOR UPDATE
            "#,
        )
        .bind(company_id)
        .bind(product_ids)
        .fetch_all(executor)
        .await?;
        Ok(products)
    }

    /// Soma `delta` ao estoque. Retorna None se o resultado ficaria negativo.
    pub async fn adjust_stock<'e, E>(
        &self,
        executor: E,
        company_id: Uuid,
        product_id: Uuid,
        delta: i32,
    ) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $3, updated_at = NOW()
            WHERE id = $2 AND company_id = $1 AND stock_quantity + $3 >= 0
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(product_id)
        .bind(delta)
        .fetch_optional(executor)
        .await?;
        Ok(product)
    }
}

fn map_category_conflict(e: sqlx::Error, name: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::CategoryNameAlreadyExists(name.to_string());
        }
    }
    e.into()
}
