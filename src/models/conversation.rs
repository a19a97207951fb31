// src/models/conversation.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "sender_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    Customer,
    Bot,
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "delivery_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Received, // mensagem do cliente
    Sending,  // envio em andamento
    Pending,  // aguardando o worker de envio
    Sent,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    #[schema(ignore)]
    pub company_id: Uuid,
    pub page_id: String,
    pub customer_facebook_id: String,
    pub customer_name: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i32,
    pub bot_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    #[schema(ignore)]
    pub company_id: Uuid,
    pub sender_type: SenderType,
    pub content: String,
    pub image_url: Option<String>,
    pub facebook_message_id: Option<String>,
    pub delivery_status: DeliveryStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Mensagem a ser gravada.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub company_id: Uuid,
    pub sender_type: SenderType,
    pub content: String,
    pub image_url: Option<String>,
    pub facebook_message_id: Option<String>,
    pub delivery_status: DeliveryStatus,
}

impl NewMessage {
    pub fn from_customer(conversation: &Conversation, content: String, mid: Option<String>) -> Self {
        Self {
            conversation_id: conversation.id,
            company_id: conversation.company_id,
            sender_type: SenderType::Customer,
            content,
            image_url: None,
            facebook_message_id: mid,
            delivery_status: DeliveryStatus::Received,
        }
    }

    pub fn outgoing(conversation: &Conversation, sender_type: SenderType, content: String) -> Self {
        Self {
            conversation_id: conversation.id,
            company_id: conversation.company_id,
            sender_type,
            content,
            image_url: None,
            facebook_message_id: None,
            // Já nasce "em envio": o worker não pode pegá-la enquanto o envio direto não termina
            delivery_status: DeliveryStatus::Sending,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendMessagePayload {
    #[validate(length(min = 1, max = 20000, message = "A mensagem não pode ser vazia."))]
    pub text: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BotTogglePayload {
    pub enabled: bool,
}

/// Resultado de uma tentativa de envio pela Graph API.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryOutcome {
    Sent { facebook_message_id: String },
    /// Falha temporária: continua pendente para o worker tentar de novo
    Retry { error: String },
    Failed { error: String },
}

impl DeliveryOutcome {
    pub fn from_send_result(result: Result<String, crate::common::error::AppError>) -> Self {
        match result {
            Ok(mid) => DeliveryOutcome::Sent { facebook_message_id: mid },
            Err(e) if e.is_transient() => DeliveryOutcome::Retry { error: e.to_string() },
            Err(e) => DeliveryOutcome::Failed { error: e.to_string() },
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryOutcome::Sent { .. })
    }

    /// Status da mensagem depois da tentativa número `attempt` (a primeira é 1).
    pub fn status_after(&self, attempt: i32, max_attempts: i32) -> DeliveryStatus {
        match self {
            DeliveryOutcome::Sent { .. } => DeliveryStatus::Sent,
            DeliveryOutcome::Retry { .. } if attempt < max_attempts => DeliveryStatus::Pending,
            _ => DeliveryStatus::Failed,
        }
    }

    /// Status dos pedaços seguintes de um texto quando este não saiu: eles nem são
    /// tentados agora e esperam o worker (ou já falham junto).
    pub fn queued_status(&self) -> Option<DeliveryStatus> {
        match self {
            DeliveryOutcome::Sent { .. } => None,
            DeliveryOutcome::Retry { .. } => Some(DeliveryStatus::Pending),
            DeliveryOutcome::Failed { .. } => Some(DeliveryStatus::Failed),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DeliveryOutcome::Sent { .. } => None,
            DeliveryOutcome::Retry { error } | DeliveryOutcome::Failed { error } => Some(error),
        }
    }
}

/// Mensagem pendente já com o que é preciso para enviá-la.
#[derive(Debug, Clone, FromRow)]
pub struct PendingDelivery {
    pub message_id: Uuid,
    pub content: String,
    pub image_url: Option<String>,
    pub attempts: i32,
    pub page_id: String,
    pub customer_facebook_id: String,
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::AppError;

    #[test]
    fn delivery_outcome_classification() {
        assert_eq!(
            DeliveryOutcome::from_send_result(Ok("m_1".into())),
            DeliveryOutcome::Sent { facebook_message_id: "m_1".into() }
        );

        let throttled = Err(AppError::GraphApi { code: 613, message: "limite".into() });
        assert!(matches!(
            DeliveryOutcome::from_send_result(throttled),
            DeliveryOutcome::Retry { .. }
        ));

        let expired = Err(AppError::GraphApi { code: 190, message: "token".into() });
        assert!(matches!(
            DeliveryOutcome::from_send_result(expired),
            DeliveryOutcome::Failed { .. }
        ));

        // 5xx sem corpo da Graph API continua sendo temporário
        let unavailable = Err(AppError::GraphApi { code: 503, message: "HTTP 503".into() });
        assert!(matches!(
            DeliveryOutcome::from_send_result(unavailable),
            DeliveryOutcome::Retry { .. }
        ));
    }

    #[test]
    fn retry_becomes_failed_at_the_last_attempt() {
        let retry = DeliveryOutcome::Retry { error: "HTTP 503".into() };
        assert_eq!(retry.status_after(1, 3), DeliveryStatus::Pending);
        assert_eq!(retry.status_after(2, 3), DeliveryStatus::Pending);
        assert_eq!(retry.status_after(3, 3), DeliveryStatus::Failed);

        let sent = DeliveryOutcome::Sent { facebook_message_id: "m_1".into() };
        assert_eq!(sent.status_after(3, 3), DeliveryStatus::Sent);
        assert_eq!(sent.error(), None);

        let failed = DeliveryOutcome::Failed { error: "token".into() };
        assert_eq!(failed.status_after(1, 3), DeliveryStatus::Failed);
        assert_eq!(failed.error(), Some("token"));
    }

    #[test]
    fn chunks_after_an_unsent_one_are_queued() {
        let sent = DeliveryOutcome::Sent { facebook_message_id: "m_1".into() };
        let retry = DeliveryOutcome::Retry { error: "HTTP 503".into() };
        let failed = DeliveryOutcome::Failed { error: "token".into() };
        assert_eq!(sent.queued_status(), None);
        assert_eq!(retry.queued_status(), Some(DeliveryStatus::Pending));
        assert_eq!(failed.queued_status(), Some(DeliveryStatus::Failed));
    }

    #[test]
    fn outgoing_message_starts_in_flight() {
        let now = chrono::Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            page_id: "pagina".into(),
            customer_facebook_id: "cliente".into(),
            customer_name: None,
            last_message: None,
            last_message_at: None,
            unread_count: 0,
            bot_enabled: true,
            created_at: now,
            updated_at: now,
        };
        let outgoing = NewMessage::outgoing(&conversation, SenderType::Bot, "Oi".into());
        assert_eq!(outgoing.delivery_status, DeliveryStatus::Sending);
    }
}
