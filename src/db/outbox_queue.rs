// src/db/outbox_queue.rs
// Fila de envio sobre o Postgres: as linhas de `messages` com status `pending`/`sending`.

use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{ConversationRepository, PageRepository},
    models::conversation::{DeliveryOutcome, DeliveryStatus, PendingDelivery},
    workers::outbox::OutboxQueue,
};

#[derive(Clone)]
pub struct PgOutboxQueue {
    repo: ConversationRepository,
    page_repo: PageRepository,
    stale_after: Duration,
}

impl PgOutboxQueue {
    pub fn new(repo: ConversationRepository, page_repo: PageRepository, stale_after: Duration) -> Self {
        Self { repo, page_repo, stale_after }
    }
}

#[async_trait]
impl OutboxQueue for PgOutboxQueue {
    async fn claim(&self, batch_size: i64) -> Result<Vec<PendingDelivery>, AppError> {
        self.repo
            .claim_pending(self.repo.pool(), batch_size, self.stale_after)
            .await
    }

    async fn record(
        &self,
        message_id: Uuid,
        outcome: &DeliveryOutcome,
        status: DeliveryStatus,
    ) -> Result<(), AppError> {
        let updated = self
            .repo
            .record_delivery(self.repo.pool(), message_id, outcome, status)
            .await?;
        if !updated {
            tracing::warn!("⚠️ Mensagem {} não estava mais em envio; resultado ignorado", message_id);
        }
        Ok(())
    }

    async fn deactivate_page(&self, page_id: &str) -> Result<(), AppError> {
        self.page_repo.deactivate_by_page_id(page_id).await
    }
}
