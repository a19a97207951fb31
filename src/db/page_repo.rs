// src/db/page_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{common::error::AppError, models::facebook::FacebookPage};

#[derive(Clone)]
pub struct PageRepository {
    pool: PgPool,
}

impl PageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Usado pelo webhook: a página identifica a empresa dona da mensagem.
    pub async fn find_active_by_page_id(&self, page_id: &str) -> Result<Option<FacebookPage>, AppError> {
        let page = sqlx::query_as::<_, FacebookPage>(
            "SELECT * FROM facebook_pages WHERE page_id = $1 AND is_active",
        )
        .bind(page_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(page)
    }

    pub async fn find_for_company(
        &self,
        company_id: Uuid,
        page_id: &str,
    ) -> Result<Option<FacebookPage>, AppError> {
        let page = sqlx::query_as::<_, FacebookPage>(
            "SELECT * FROM facebook_pages WHERE page_id = $1 AND company_id = $2",
        )
        .bind(page_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(page)
    }

    pub async fn get(&self, company_id: Uuid, id: Uuid) -> Result<FacebookPage, AppError> {
        sqlx::query_as::<_, FacebookPage>(
            "SELECT * FROM facebook_pages WHERE id = $1 AND company_id = $2",
        )
        .bind(id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Página"))
    }

    pub async fn list(&self, company_id: Uuid) -> Result<Vec<FacebookPage>, AppError> {
        let pages = sqlx::query_as::<_, FacebookPage>(
            "SELECT * FROM facebook_pages WHERE company_id = $1 ORDER BY page_name ASC",
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(pages)
    }

    /// Liga (ou religa) uma página à empresa.
    /// O `WHERE` do `DO UPDATE` impede tomar a página de outra empresa: nesse caso nada volta.
    pub async fn upsert(
        &self,
        company_id: Uuid,
        page_id: &str,
        page_name: &str,
        access_token: &str,
    ) -> Result<FacebookPage, AppError> {
        sqlx::query_as::<_, FacebookPage>(
            r#"
            INSERT INTO facebook_pages (company_id, page_id, page_name, access_token)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (page_id)
            DO UPDATE SET
                page_name = EXCLUDED.page_name,
                access_token = EXCLUDED.access_token,
                is_active = TRUE,
                updated_at = NOW()
            WHERE facebook_pages.company_id = EXCLUDED.company_id
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(page_id)
        .bind(page_name)
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::PageOwnedByAnotherCompany)
    }

    pub async fn set_subscribed(&self, id: Uuid, subscribed: bool) -> Result<FacebookPage, AppError> {
        sqlx::query_as::<_, FacebookPage>(
            r#"
            UPDATE facebook_pages SET webhook_subscribed = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(subscribed)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Página"))
    }

    /// Desativa a página quando o token foi revogado (código 190).
    pub async fn deactivate_by_page_id(&self, page_id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE facebook_pages SET is_active = FALSE, updated_at = NOW() WHERE page_id = $1")
            .bind(page_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, company_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM facebook_pages WHERE id = $1 AND company_id = $2")
            .bind(id)
            .bind(company_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Página"));
        }
        Ok(())
    }
}
