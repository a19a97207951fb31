// src/services/catalog_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::CatalogRepository,
    models::catalog::{Category, CategoryPayload, Product, ProductFilter, ProductPayload},
};

#[derive(Clone)]
pub struct CatalogService {
    repo: CatalogRepository,
    pool: PgPool,
}

impl CatalogService {
    pub fn new(repo: CatalogRepository, pool: PgPool) -> Self {
        Self { repo, pool }
    }

    // =========================================================================
    //  CATEGORIAS
    // =========================================================================

    pub async fn list_categories(&self, company_id: Uuid) -> Result<Vec<Category>, AppError> {
        self.repo.list_categories(company_id).await
    }

    pub async fn create_category(
        &self,
        company_id: Uuid,
        payload: &CategoryPayload,
    ) -> Result<Category, AppError> {
        self.repo
            .create_category(company_id, payload.name.trim(), payload.description.as_deref())
            .await
    }

    pub async fn update_category(
        &self,
        company_id: Uuid,
        category_id: Uuid,
        payload: &CategoryPayload,
    ) -> Result<Category, AppError> {
        self.repo
            .update_category(
                company_id,
                category_id,
                payload.name.trim(),
                payload.description.as_deref(),
            )
            .await
    }

    // Os produtos ficam sem categoria (ON DELETE SET NULL)
    pub async fn delete_category(&self, company_id: Uuid, category_id: Uuid) -> Result<(), AppError> {
        self.repo.delete_category(company_id, category_id).await
    }

    // =========================================================================
    //  PRODUTOS
    // =========================================================================

    pub async fn list_products(
        &self,
        company_id: Uuid,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, AppError> {
        self.repo.list_products(company_id, filter).await
    }

    pub async fn get_product(&self, company_id: Uuid, product_id: Uuid) -> Result<Product, AppError> {
        self.repo.get_product(company_id, product_id).await
    }

    pub async fn create_product(
        &self,
        company_id: Uuid,
        payload: &ProductPayload,
    ) -> Result<Product, AppError> {
        self.ensure_category(company_id, payload.category_id).await?;
        self.repo.create_product(company_id, payload).await
    }

    pub async fn update_product(
        &self,
        company_id: Uuid,
        product_id: Uuid,
        payload: &ProductPayload,
    ) -> Result<Product, AppError> {
        self.ensure_category(company_id, payload.category_id).await?;
        self.repo.update_product(company_id, product_id, payload).await
    }

    pub async fn delete_product(&self, company_id: Uuid, product_id: Uuid) -> Result<(), AppError> {
        self.repo.delete_product(company_id, product_id).await
    }

    /// Entrada ou saída manual de estoque. O saldo nunca fica negativo.
    pub async fn adjust_stock(
        &self,
        company_id: Uuid,
        product_id: Uuid,
        delta: i32,
    ) -> Result<Product, AppError> {
        let mut tx = self.pool.begin().await?;

        let product = self
            .repo
            .lock_products(&mut *tx, company_id, &[product_id])
            .await?
            .into_iter()
            .next()
            .ok_or(AppError::NotFound("Produto"))?;

        let updated = self
            .repo
            .adjust_stock(&mut *tx, company_id, product_id, delta)
            .await?
            .ok_or_else(|| AppError::InsufficientStock { product: product.name.clone() })?;

        tx.commit().await?;

        tracing::info!(
            "📦 Estoque de '{}' ajustado em {} (agora {})",
            updated.name,
            delta,
            updated.stock_quantity
        );
        Ok(updated)
    }

    // A categoria tem que ser da mesma empresa do produto.
    async fn ensure_category(&self, company_id: Uuid, category_id: Option<Uuid>) -> Result<(), AppError> {
        if let Some(category_id) = category_id {
            if !self.repo.category_belongs_to(company_id, category_id).await? {
                return Err(AppError::NotFound("Categoria"));
            }
        }
        Ok(())
    }
}
