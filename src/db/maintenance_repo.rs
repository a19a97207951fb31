// src/db/maintenance_repo.rs

use sqlx::{Executor, PgPool, Postgres};

use crate::{
    common::error::AppError,
    models::maintenance::{
        CompanyRef, ForeignCategoryProduct, MaintenanceReport, OrphanConversation, PageRef,
    },
};

#[derive(Clone)]
pub struct MaintenanceRepository {
    pool: PgPool,
}

impl MaintenanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn report(&self) -> Result<MaintenanceReport, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Conversas cuja página não está registrada para a própria empresa
        let orphan_conversations = sqlx::query_as::<_, OrphanConversation>(
            r#"
            SELECT c.id AS conversation_id, c.company_id, c.page_id
            FROM conversations c
            WHERE NOT EXISTS (
                SELECT 1 FROM facebook_pages p
                WHERE p.page_id = c.page_id AND p.company_id = c.company_id
            )
            ORDER BY c.created_at
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        // 2. Mensagens com company_id diferente do da conversa
        let mismatched_messages: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM messages m
            JOIN conversations c ON c.id = m.conversation_id
            WHERE m.company_id <> c.company_id
            "#,
        )
        .fetch_one(&mut *tx)
        .await?;

        // 3. Produtos apontando para categoria de outra empresa
        let foreign_category_products = sqlx::query_as::<_, ForeignCategoryProduct>(
            r#"
            SELECT pr.id AS product_id, pr.company_id, pr.category_id
            FROM products pr
            JOIN categories cat ON cat.id = pr.category_id
            WHERE cat.company_id <> pr.company_id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        // 4. Empresas com página mas sem configuração do Gemini
        let companies_without_gemini = sqlx::query_as::<_, CompanyRef>(
            r#"
            SELECT co.id AS company_id, co.name
            FROM companies co
            WHERE EXISTS (SELECT 1 FROM facebook_pages p WHERE p.company_id = co.id)
              AND NOT EXISTS (SELECT 1 FROM gemini_settings g WHERE g.company_id = co.id)
            ORDER BY co.name
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        // 5. Páginas ativas de empresas suspensas
        let active_pages_of_suspended = sqlx::query_as::<_, PageRef>(
            r#"
            SELECT p.id, p.company_id, p.page_id
            FROM facebook_pages p
            JOIN companies co ON co.id = p.company_id
            WHERE p.is_active AND co.status = 'suspended'
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(MaintenanceReport {
            orphan_conversations,
            mismatched_messages,
            foreign_category_products,
            companies_without_gemini,
            active_pages_of_suspended,
        })
    }

    // Cada correção é um UPDATE guardado pelo próprio predicado: rodar duas vezes não muda nada.

    pub async fn realign_message_companies<'e, E>(&self, executor: E) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE messages m SET company_id = c.company_id
            FROM conversations c
            WHERE c.id = m.conversation_id AND m.company_id <> c.company_id
            "#,
        )
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn detach_foreign_categories<'e, E>(&self, executor: E) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE products pr SET category_id = NULL, updated_at = NOW()
            FROM categories cat
            WHERE cat.id = pr.category_id AND cat.company_id <> pr.company_id
            "#,
        )
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn deactivate_pages_of_suspended<'e, E>(&self, executor: E) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE facebook_pages p SET is_active = FALSE, updated_at = NOW()
            FROM companies co
            WHERE co.id = p.company_id AND co.status = 'suspended' AND p.is_active
            "#,
        )
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }
}
