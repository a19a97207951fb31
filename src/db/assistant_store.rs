// src/db/assistant_store.rs
// Implementação em Postgres do `AssistantStore`, montada sobre os repositórios.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        CatalogRepository, CompanyRepository, ConversationRepository, GeminiSettingsRepository,
        PageRepository,
    },
    models::{
        catalog::Product,
        company::Company,
        conversation::{Conversation, DeliveryOutcome, Message, NewMessage},
        facebook::FacebookPage,
        gemini::GeminiSettings,
        order::{NewOrder, OrderDetail},
    },
    services::{auto_reply::AssistantStore, order_service::OrderService},
};

#[derive(Clone)]
pub struct AssistantStoreImpl {
    company_repo: CompanyRepository,
    page_repo: PageRepository,
    gemini_repo: GeminiSettingsRepository,
    conversation_repo: ConversationRepository,
    catalog_repo: CatalogRepository,
    order_service: OrderService,
    max_attempts: i32,
}

impl AssistantStoreImpl {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        company_repo: CompanyRepository,
        page_repo: PageRepository,
        gemini_repo: GeminiSettingsRepository,
        conversation_repo: ConversationRepository,
        catalog_repo: CatalogRepository,
        order_service: OrderService,
        max_attempts: i32,
    ) -> Self {
        Self {
            company_repo,
            page_repo,
            gemini_repo,
            conversation_repo,
            catalog_repo,
            order_service,
            max_attempts,
        }
    }
}

#[async_trait]
impl AssistantStore for AssistantStoreImpl {
    async fn find_active_page(&self, page_id: &str) -> Result<Option<FacebookPage>, AppError> {
        self.page_repo.find_active_by_page_id(page_id).await
    }

    async fn find_company(&self, company_id: Uuid) -> Result<Option<Company>, AppError> {
        self.company_repo.find_by_id(company_id).await
    }

    async fn gemini_settings(&self, company_id: Uuid) -> Result<Option<GeminiSettings>, AppError> {
        self.gemini_repo.get(company_id).await
    }

    async fn find_or_create_conversation(
        &self,
        company_id: Uuid,
        page_id: &str,
        customer_facebook_id: &str,
        customer_name: Option<&str>,
    ) -> Result<Conversation, AppError> {
        self.conversation_repo
            .find_or_create(company_id, page_id, customer_facebook_id, customer_name)
            .await
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Option<Message>, AppError> {
        self.conversation_repo.insert_message(message).await
    }

    async fn touch_conversation(
        &self,
        conversation_id: Uuid,
        last_message: &str,
        from_customer: bool,
    ) -> Result<(), AppError> {
        self.conversation_repo
            .touch(conversation_id, last_message, from_customer)
            .await
    }

    async fn recent_messages(&self, conversation_id: Uuid, limit: i64) -> Result<Vec<Message>, AppError> {
        self.conversation_repo.recent_messages(conversation_id, limit).await
    }

    async fn catalog(&self, company_id: Uuid, limit: i64) -> Result<Vec<Product>, AppError> {
        self.catalog_repo.list_catalog(company_id, limit).await
    }

    async fn find_product(&self, company_id: Uuid, product_id: Uuid) -> Result<Option<Product>, AppError> {
        match self.catalog_repo.get_product(company_id, product_id).await {
            Ok(product) => Ok(Some(product)),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_order(&self, company_id: Uuid, order: NewOrder) -> Result<OrderDetail, AppError> {
        self.order_service.create_order(company_id, order).await
    }

    async fn record_delivery(&self, message_id: Uuid, outcome: &DeliveryOutcome) -> Result<(), AppError> {
        let status = outcome.status_after(1, self.max_attempts);
        self.conversation_repo
            .record_delivery(self.conversation_repo.pool(), message_id, outcome, status)
            .await?;
        Ok(())
    }

    async fn deactivate_page(&self, page_id: &str) -> Result<(), AppError> {
        self.page_repo.deactivate_by_page_id(page_id).await
    }
}
