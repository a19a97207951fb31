// src/services/maintenance.rs
// Diagnóstico e reparo de dados inconsistentes entre empresas.

use crate::{
    common::error::AppError,
    db::MaintenanceRepository,
    models::maintenance::{MaintenanceReport, RepairSummary},
};

#[derive(Clone)]
pub struct MaintenanceService {
    repo: MaintenanceRepository,
}

impl MaintenanceService {
    pub fn new(repo: MaintenanceRepository) -> Self {
        Self { repo }
    }

    pub async fn report(&self) -> Result<MaintenanceReport, AppError> {
        self.repo.report().await
    }

    /// Roda todas as correções numa transação.
    /// Sem `apply` a transação é desfeita no fim: os números mostram o que seria alterado.
    pub async fn repair(&self, apply: bool) -> Result<RepairSummary, AppError> {
        let mut tx = self.repo.pool().begin().await?;

        let messages_realigned = self.repo.realign_message_companies(&mut *tx).await?;
        let categories_detached = self.repo.detach_foreign_categories(&mut *tx).await?;
        let pages_deactivated = self.repo.deactivate_pages_of_suspended(&mut *tx).await?;

        if apply {
            tx.commit().await?;
        } else {
            tx.rollback().await?;
        }

        let summary = RepairSummary {
            applied: apply,
            messages_realigned,
            categories_detached,
            pages_deactivated,
        };

        tracing::info!(
            "🔧 Reparo {}: {} mensagens, {} produtos, {} páginas",
            if apply { "aplicado" } else { "simulado" },
            summary.messages_realigned,
            summary.categories_detached,
            summary.pages_deactivated
        );
        Ok(summary)
    }
}
