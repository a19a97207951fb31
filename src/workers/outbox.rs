// src/workers/outbox.rs
// Worker de envio: reenvia mensagens do bot/atendente que ficaram pendentes.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::conversation::{DeliveryOutcome, DeliveryStatus, PendingDelivery},
    services::auto_reply::MessengerGateway,
};

/// Onde as mensagens pendentes ficam guardadas.
#[async_trait]
pub trait OutboxQueue: Send + Sync {
    /// Reserva até `batch_size` mensagens; elas saem da fila até o `record`.
    async fn claim(&self, batch_size: i64) -> Result<Vec<PendingDelivery>, AppError>;
    async fn record(
        &self,
        message_id: Uuid,
        outcome: &DeliveryOutcome,
        status: DeliveryStatus,
    ) -> Result<(), AppError>;
    async fn deactivate_page(&self, page_id: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct OutboxSettings {
    pub interval: Duration,
    pub batch_size: i64,
    pub max_attempts: i32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub sent: usize,
    pub retrying: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct OutboxWorker {
    queue: Arc<dyn OutboxQueue>,
    gateway: Arc<dyn MessengerGateway>,
    settings: OutboxSettings,
}

impl OutboxWorker {
    pub fn new(
        queue: Arc<dyn OutboxQueue>,
        gateway: Arc<dyn MessengerGateway>,
        settings: OutboxSettings,
    ) -> Self {
        Self { queue, gateway, settings }
    }

    /// Laço principal. Um lote por vez: o próximo tick só começa depois do anterior,
    /// e ticks perdidos são pulados.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            "📮 Worker de envio iniciado (a cada {:?}, lote de {})",
            self.settings.interval,
            self.settings.batch_size
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) if report != BatchReport::default() => {
                            tracing::info!(
                                "📮 Lote processado: {} enviadas, {} para nova tentativa, {} falharam",
                                report.sent, report.retrying, report.failed
                            );
                        }
                        Ok(_) => {}
                        Err(e) => tracing::error!("🔥 Erro no worker de envio: {}", e),
                    }
                }
            }
        }

        tracing::info!("📮 Worker de envio encerrado");
    }

    /// Um lote: reserva, envia e registra cada mensagem.
    pub async fn run_once(&self) -> Result<BatchReport, AppError> {
        let pending = self.queue.claim(self.settings.batch_size).await?;

        let mut report = BatchReport::default();
        for delivery in pending {
            let outcome = self.send(&delivery).await;
            let status = outcome.status_after(delivery.attempts + 1, self.settings.max_attempts);
            match status {
                DeliveryStatus::Sent => report.sent += 1,
                DeliveryStatus::Pending => report.retrying += 1,
                _ => report.failed += 1,
            }
            // Uma falha ao gravar não pode travar o resto do lote
            if let Err(e) = self.queue.record(delivery.message_id, &outcome, status).await {
                tracing::error!("🔥 Falha ao registrar envio da mensagem {}: {}", delivery.message_id, e);
            }
        }

        Ok(report)
    }

    async fn send(&self, delivery: &PendingDelivery) -> DeliveryOutcome {
        let result = match delivery.image_url.as_deref() {
            Some(url) => {
                self.gateway
                    .send_image(&delivery.access_token, &delivery.customer_facebook_id, url)
                    .await
            }
            None => {
                self.gateway
                    .send_text(&delivery.access_token, &delivery.customer_facebook_id, &delivery.content)
                    .await
            }
        };

        if let Err(e) = &result {
            if e.is_invalid_page_token() {
                // O token vale para a página inteira: as próximas mensagens dela também falhariam
                if let Err(db_err) = self.queue.deactivate_page(&delivery.page_id).await {
                    tracing::error!("🔥 Falha ao desativar página com token revogado: {}", db_err);
                }
            }
        }
        DeliveryOutcome::from_send_result(result)
    }
}
