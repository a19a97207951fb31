// src/services/conversation_service.rs

use uuid::Uuid;

use crate::{
    clients::graph::{split_message, GraphClient, MESSAGE_CHAR_LIMIT},
    common::error::AppError,
    db::{ConversationRepository, PageRepository},
    models::conversation::{
        Conversation, DeliveryOutcome, DeliveryStatus, Message, NewMessage, SenderType,
    },
};

#[derive(Clone)]
pub struct ConversationService {
    repo: ConversationRepository,
    page_repo: PageRepository,
    graph: GraphClient,
    max_attempts: i32,
}

impl ConversationService {
    pub fn new(
        repo: ConversationRepository,
        page_repo: PageRepository,
        graph: GraphClient,
        max_attempts: i32,
    ) -> Self {
        Self { repo, page_repo, graph, max_attempts }
    }

    pub async fn list(&self, company_id: Uuid) -> Result<Vec<Conversation>, AppError> {
        self.repo.list(company_id).await
    }

    pub async fn messages(&self, company_id: Uuid, conversation_id: Uuid) -> Result<Vec<Message>, AppError> {
        // Garante que a conversa é da empresa antes de listar
        self.repo.get(company_id, conversation_id).await?;
        self.repo.messages(company_id, conversation_id).await
    }

    pub async fn mark_read(&self, company_id: Uuid, conversation_id: Uuid) -> Result<Conversation, AppError> {
        self.repo.mark_read(company_id, conversation_id).await
    }

    pub async fn set_bot_enabled(
        &self,
        company_id: Uuid,
        conversation_id: Uuid,
        enabled: bool,
    ) -> Result<Conversation, AppError> {
        let conversation = self.repo.set_bot_enabled(company_id, conversation_id, enabled).await?;
        tracing::info!(
            "🤖 Bot {} na conversa {}",
            if enabled { "ligado" } else { "desligado" },
            conversation_id
        );
        Ok(conversation)
    }

    /// Resposta manual do atendente. Texto acima de 2000 caracteres vira várias mensagens,
    /// cada uma com seu próprio registro de envio. Falha temporária deixa a mensagem
    /// (e as seguintes) pendentes para o worker.
    pub async fn reply(&self, company_id: Uuid, conversation_id: Uuid, text: &str) -> Result<Vec<Message>, AppError> {
        let conversation = self.repo.get(company_id, conversation_id).await?;
        let page = self
            .page_repo
            .find_for_company(company_id, &conversation.page_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| AppError::BadRequest("A página desta conversa não está ativa.".into()))?;

        let chunks = split_message(text, MESSAGE_CHAR_LIMIT);
        if chunks.is_empty() {
            return Err(AppError::BadRequest("A mensagem não pode ser vazia.".into()));
        }

        let mut stored_ids = Vec::with_capacity(chunks.len());
        let mut held_back: Option<DeliveryStatus> = None;
        for chunk in &chunks {
            // 1. Grava (em envio, ou já na fila se um pedaço anterior não saiu)
            let mut outgoing = NewMessage::outgoing(&conversation, SenderType::Page, chunk.clone());
            if let Some(status) = held_back {
                outgoing.delivery_status = status;
            }
            let stored = self
                .repo
                .insert_message(&outgoing)
                .await?
                .ok_or_else(|| anyhow::anyhow!("mensagem de saída não foi gravada"))?;
            stored_ids.push(stored.id);
            if held_back.is_some() {
                continue;
            }

            // 2. Envia
            let result = self
                .graph
                .send_text(&page.access_token, &conversation.customer_facebook_id, chunk)
                .await;
            if let Err(e) = &result {
                if e.is_invalid_page_token() {
                    self.page_repo.deactivate_by_page_id(&page.page_id).await?;
                }
            }
            let outcome = DeliveryOutcome::from_send_result(result);

            // 3. Registra
            let status = outcome.status_after(1, self.max_attempts);
            self.repo
                .record_delivery(self.repo.pool(), stored.id, &outcome, status)
                .await?;
            if !outcome.is_sent() {
                tracing::warn!("📭 Resposta manual {} não enviada: {:?}", stored.id, outcome);
            }
            held_back = outcome.queued_status();
        }

        if let Some(last) = chunks.last() {
            self.repo.touch(conversation.id, last, false).await?;
        }

        // Devolve as mensagens com o status final (sent, pending ou failed)
        let mut messages = Vec::with_capacity(stored_ids.len());
        for id in stored_ids {
            messages.push(self.repo.get_message(company_id, id).await?);
        }
        Ok(messages)
    }
}
