// src/services/page_service.rs

use uuid::Uuid;

use crate::{
    clients::graph::GraphClient,
    common::error::AppError,
    db::PageRepository,
    models::facebook::FacebookPage,
};

#[derive(Clone)]
pub struct PageService {
    repo: PageRepository,
    graph: GraphClient,
}

impl PageService {
    pub fn new(repo: PageRepository, graph: GraphClient) -> Self {
        Self { repo, graph }
    }

    pub async fn list(&self, company_id: Uuid) -> Result<Vec<FacebookPage>, AppError> {
        self.repo.list(company_id).await
    }

    /// Liga uma página à empresa a partir do token.
    /// O token é validado na Graph API, que também informa o id e o nome da página.
    pub async fn connect(&self, company_id: Uuid, access_token: &str) -> Result<FacebookPage, AppError> {
        // 1. Valida o token
        let info = self.graph.get_page_info(access_token).await.map_err(|e| {
            if e.is_invalid_page_token() {
                AppError::BadRequest("Token de página inválido ou expirado.".into())
            } else {
                e
            }
        })?;

        // 2. Grava (a página não pode pertencer a outra empresa)
        let page = self
            .repo
            .upsert(company_id, &info.id, &info.name, access_token)
            .await?;

        tracing::info!("🔗 Página '{}' ({}) ligada à empresa {}", page.page_name, page.page_id, company_id);
        Ok(page)
    }

    /// Assina o app nos eventos de mensagem da página.
    pub async fn subscribe(&self, company_id: Uuid, id: Uuid) -> Result<FacebookPage, AppError> {
        let page = self.repo.get(company_id, id).await?;
        let subscribed = self.graph.subscribe_app(&page.page_id, &page.access_token).await?;
        if !subscribed {
            tracing::warn!("⚠️ Graph API não confirmou a assinatura da página {}", page.page_id);
        }
        self.repo.set_subscribed(page.id, subscribed).await
    }

    pub async fn disconnect(&self, company_id: Uuid, id: Uuid) -> Result<(), AppError> {
        self.repo.delete(company_id, id).await
    }
}
