// src/models/facebook.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use utoipa::ToSchema;
use validator::Validate;

// Substitui facebook_settings, facebook_pages e a view "unified".
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FacebookPage {
    pub id: Uuid,
    #[schema(ignore)]
    pub company_id: Uuid,
    #[schema(example = "112233445566778")]
    pub page_id: String,
    pub page_name: String,

    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub access_token: String,

    pub is_active: bool,
    pub webhook_subscribed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectPagePayload {
    /// Token de acesso da página (gerado no painel da Meta)
    #[validate(length(min = 10, message = "O token de acesso é obrigatório."))]
    pub access_token: String,
}

/// Resposta de `GET /me?fields=id,name` com um token de página.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PageInfo {
    pub id: String,
    pub name: String,
}

// --- Webhook do Messenger ---

/// Parâmetros da verificação (`GET /webhook/facebook`).
#[derive(Debug, Deserialize)]
pub struct WebhookVerifyQuery {
    #[serde(rename = "hub.mode")]
    pub hub_mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub hub_verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub hub_challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    pub id: String,
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Deserialize)]
pub struct MessagingEvent {
    pub sender: MessagingParty,
    pub recipient: MessagingParty,
    #[serde(default)]
    pub timestamp: i64,
    /// Ausente em entregas, leituras e postbacks
    pub message: Option<MessagingContent>,
}

#[derive(Debug, Deserialize)]
pub struct MessagingParty {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct MessagingContent {
    pub mid: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub is_echo: bool,
}
