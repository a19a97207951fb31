// src/db/conversation_repo.rs

use std::time::Duration;

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::conversation::{
        Conversation, DeliveryOutcome, DeliveryStatus, Message, NewMessage, PendingDelivery,
    },
};

#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Uma conversa por (empresa, página, cliente). O UPSERT evita corrida entre webhooks.
    pub async fn find_or_create(
        &self,
        company_id: Uuid,
        page_id: &str,
        customer_facebook_id: &str,
        customer_name: Option<&str>,
    ) -> Result<Conversation, AppError> {
        let conversation = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (company_id, page_id, customer_facebook_id, customer_name)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (company_id, page_id, customer_facebook_id)
            DO UPDATE SET
                customer_name = COALESCE(EXCLUDED.customer_name, conversations.customer_name)
            RETURNING *
            "#,
        )
        .bind(company_id)
        .bind(page_id)
        .bind(customer_facebook_id)
        .bind(customer_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(conversation)
    }

    pub async fn list(&self, company_id: Uuid) -> Result<Vec<Conversation>, AppError> {
        let conversations = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT * FROM conversations
            WHERE company_id = $1
            ORDER BY last_message_at DESC NULLS LAST, created_at DESC
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(conversations)
    }

    pub async fn get(&self, company_id: Uuid, conversation_id: Uuid) -> Result<Conversation, AppError> {
        sqlx::query_as::<_, Conversation>(
            "SELECT * FROM conversations WHERE id = $1 AND company_id = $2",
        )
        .bind(conversation_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Conversa"))
    }

    /// Grava a mensagem. `None` quando o `facebook_message_id` já existe (reentrega do webhook).
    pub async fn insert_message(&self, msg: &NewMessage) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages
                (conversation_id, company_id, sender_type, content, image_url,
                 facebook_message_id, delivery_status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (facebook_message_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(msg.conversation_id)
        .bind(msg.company_id)
        .bind(msg.sender_type)
        .bind(&msg.content)
        .bind(&msg.image_url)
        .bind(&msg.facebook_message_id)
        .bind(msg.delivery_status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message)
    }

    pub async fn get_message(&self, company_id: Uuid, message_id: Uuid) -> Result<Message, AppError> {
        sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = $1 AND company_id = $2")
            .bind(message_id)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("Mensagem"))
    }

    pub async fn messages(&self, company_id: Uuid, conversation_id: Uuid) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE conversation_id = $1 AND company_id = $2
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation_id)
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// As últimas `limit` mensagens, em ordem cronológica.
    pub async fn recent_messages(&self, conversation_id: Uuid, limit: i64) -> Result<Vec<Message>, AppError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM (
                SELECT * FROM messages
                WHERE conversation_id = $1
                ORDER BY created_at DESC
                LIMIT $2
            ) recent
            ORDER BY created_at ASC
            "#,
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    /// Atualiza o resumo da conversa. Só mensagem de cliente conta como não lida.
    pub async fn touch(
        &self,
        conversation_id: Uuid,
        last_message: &str,
        from_customer: bool,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message = $2,
                last_message_at = NOW(),
                unread_count = unread_count + CASE WHEN $3 THEN 1 ELSE 0 END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(conversation_id)
        .bind(last_message)
        .bind(from_customer)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_read(&self, company_id: Uuid, conversation_id: Uuid) -> Result<Conversation, AppError> {
        sqlx::query_as::<_, Conversation>(
            r#"
            UPDATE conversations SET unread_count = 0, updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING *
            "#,
        )
        .bind(conversation_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Conversa"))
    }

    pub async fn set_bot_enabled(
        &self,
        company_id: Uuid,
        conversation_id: Uuid,
        enabled: bool,
    ) -> Result<Conversation, AppError> {
        sqlx::query_as::<_, Conversation>(
            r#"
            UPDATE conversations SET bot_enabled = $3, updated_at = NOW()
            WHERE id = $1 AND company_id = $2
            RETURNING *
            "#,
        )
        .bind(conversation_id)
        .bind(company_id)
        .bind(enabled)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("Conversa"))
    }

    // ---
    // Fila de envio (outbox)
    // ---

    /// Reserva um lote para envio numa única instrução: as linhas passam a `sending`
    /// antes de qualquer chamada à Graph API. Também retoma as que ficaram em `sending`
    /// por mais de `stale_after` (processo que caiu no meio do envio).
    pub async fn claim_pending<'e, E>(
        &self,
        executor: E,
        batch_size: i64,
        stale_after: Duration,
    ) -> Result<Vec<PendingDelivery>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let pending = sqlx::query_as::<_, PendingDelivery>(
            r#"
            WITH claimed AS (
                SELECT m.id
                FROM messages m
                JOIN conversations c ON c.id = m.conversation_id
                JOIN facebook_pages p ON p.page_id = c.page_id AND p.company_id = c.company_id
                WHERE m.sender_type IN ('bot', 'page')
                  AND p.is_active
                  AND (
                      m.delivery_status = 'pending'
                      OR (m.delivery_status = 'sending'
                          AND m.last_attempt_at < NOW() - make_interval(secs => $2))
                  )
                ORDER BY m.created_at ASC
                LIMIT $1
                FOR UPDATE OF m SKIP LOCKED
            )
            UPDATE messages m
            SET delivery_status = 'sending', last_attempt_at = NOW()
            FROM claimed, conversations c, facebook_pages p
            WHERE m.id = claimed.id
              AND c.id = m.conversation_id
              AND p.page_id = c.page_id AND p.company_id = c.company_id
            RETURNING m.id AS message_id, m.content, m.image_url, m.attempts,
                      c.page_id, c.customer_facebook_id, p.access_token
            "#,
        )
        .bind(batch_size)
        .bind(stale_after.as_secs_f64())
        .fetch_all(executor)
        .await?;
        Ok(pending)
    }

    /// Registra o resultado de uma tentativa com o status já decidido por quem enviou.
    /// Só mexe em linhas `sending`: uma tentativa atrasada não sobrescreve outra.
    pub async fn record_delivery<'e, E>(
        &self,
        executor: E,
        message_id: Uuid,
        outcome: &DeliveryOutcome,
        status: DeliveryStatus,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let facebook_message_id = match outcome {
            DeliveryOutcome::Sent { facebook_message_id } => Some(facebook_message_id.as_str()),
            _ => None,
        };
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET delivery_status = $2,
                facebook_message_id = COALESCE($3, facebook_message_id),
                last_error = $4,
                attempts = attempts + 1,
                last_attempt_at = NOW()
            WHERE id = $1 AND delivery_status = 'sending'
            "#,
        )
        .bind(message_id)
        .bind(status)
        .bind(facebook_message_id)
        .bind(outcome.error())
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
